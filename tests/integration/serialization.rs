#![allow(missing_docs)]

use std::collections::HashSet;

use arcvector::storage::{
    CellSnapshot, MULTI_ARC_CAPACITY, TAG_ARRAY, TAG_DEGREE_COUNTER, TAG_MULTIPLE_ARC, TAG_NO_ARCS,
    TAG_SIMPLE, WORD_END, WORD_TERM,
};
use arcvector::{ArcCell, ArcDir, ArcError, Graph, Predicator, Result, VertexId};

fn decode(bytes: &[u8], owner: VertexId, side: ArcDir) -> Result<ArcCell> {
    ArcCell::decode(bytes, owner, side, MULTI_ARC_CAPACITY, &mut |_| true)
}

fn populated() -> Result<(Graph, Vec<VertexId>)> {
    let g = Graph::default();
    let ids: Vec<VertexId> = (0..4).map(|_| g.create_vertex()).collect();
    g.add_arc(ids[0], ids[1], Predicator::stat(0x200))?;
    g.add_arc(ids[0], ids[1], Predicator::stat(0x201))?;
    g.add_arc(ids[0], ids[2], Predicator::stat(0x200))?;
    g.add_arc(ids[3], ids[0], Predicator::stat(0x202))?;
    Ok((g, ids))
}

fn words_of(g: &Graph, id: VertexId, side: ArcDir) -> Result<Vec<u64>> {
    g.serialize_cell(id, side)
}

#[test]
fn stream_tags_per_representation() -> Result<()> {
    let (g, ids) = populated()?;

    assert_eq!(words_of(&g, ids[2], ArcDir::Out)?, vec![TAG_NO_ARCS, WORD_END]);

    let simple = words_of(&g, ids[0], ArcDir::In)?;
    assert_eq!(simple.len(), 4);
    assert_eq!(simple[0], TAG_SIMPLE);
    assert_eq!(simple[1], ids[3].0);
    let pred = Predicator::from_bits(simple[2])?;
    assert_eq!(pred.dir, ArcDir::In);
    assert!(pred.same_data(&Predicator::stat(0x202)));
    assert_eq!(simple[3], WORD_END);

    let array = words_of(&g, ids[0], ArcDir::Out)?;
    assert_eq!(array[0], TAG_ARRAY);
    assert_eq!(*array.last().unwrap_or(&0), WORD_END);
    assert!(array.contains(&TAG_MULTIPLE_ARC));
    assert!(array.contains(&WORD_TERM));
    // tag + [3, head, p, p, 0] + [1, head, p] + end
    assert_eq!(array.len(), 1 + 5 + 3 + 1);
    Ok(())
}

#[test]
fn cells_rebuild_from_words() -> Result<()> {
    let (g, ids) = populated()?;
    let known: HashSet<VertexId> = ids.iter().copied().collect();
    for id in &ids {
        for side in [ArcDir::Out, ArcDir::In] {
            let words = words_of(&g, *id, side)?;
            let cell =
                ArcCell::from_words(&words, side, MULTI_ARC_CAPACITY, &mut |v| known.contains(&v))?;
            assert_eq!(cell.to_words().len(), words.len());
            assert_eq!(cell.snapshot(), g.snapshot(*id, side)?);
            cell.check_invariants()?;
        }
    }
    Ok(())
}

#[test]
fn counters_serialize_as_counts() -> Result<()> {
    let (g, ids) = populated()?;
    g.convert_inarcs_to_counter(ids[1])?;
    let words = words_of(&g, ids[1], ArcDir::In)?;
    assert_eq!(words, vec![TAG_DEGREE_COUNTER, 2, WORD_END]);
    let cell = ArcCell::from_words(&words, ArcDir::In, MULTI_ARC_CAPACITY, &mut |_| true)?;
    assert_eq!(cell.degree(), 2);
    Ok(())
}

#[test]
fn unknown_neighbors_are_rejected() -> Result<()> {
    let (g, ids) = populated()?;
    let words = words_of(&g, ids[0], ArcDir::Out)?;
    let err = ArcCell::from_words(&words, ArcDir::Out, MULTI_ARC_CAPACITY, &mut |v| v != ids[2])
        .unwrap_err();
    assert!(matches!(err, ArcError::Corruption(_)));
    Ok(())
}

#[test]
fn streams_read_back_only_into_their_own_side() -> Result<()> {
    let (g, ids) = populated()?;
    let out = words_of(&g, ids[0], ArcDir::Out)?;
    let inc = words_of(&g, ids[0], ArcDir::In)?;
    for (words, wrong) in [(&out, ArcDir::In), (&inc, ArcDir::Out)] {
        let err = ArcCell::from_words(words, wrong, MULTI_ARC_CAPACITY, &mut |_| true).unwrap_err();
        assert!(matches!(err, ArcError::Corruption(_)), "{err}");
    }
    Ok(())
}

#[test]
fn decoded_chains_respect_configured_capacity() -> Result<()> {
    let (g, ids) = populated()?;
    // ids[0] -> ids[1] is a chain of two relationships.
    let words = words_of(&g, ids[0], ArcDir::Out)?;
    assert!(ArcCell::from_words(&words, ArcDir::Out, 2, &mut |_| true).is_ok());
    let err = ArcCell::from_words(&words, ArcDir::Out, 1, &mut |_| true).unwrap_err();
    assert!(matches!(err, ArcError::Corruption(_)));
    Ok(())
}

#[test]
fn truncated_and_padded_streams_are_rejected() -> Result<()> {
    let (g, ids) = populated()?;
    let words = words_of(&g, ids[0], ArcDir::Out)?;
    let truncated = &words[..words.len() - 1];
    assert!(matches!(
        ArcCell::from_words(truncated, ArcDir::Out, MULTI_ARC_CAPACITY, &mut |_| true),
        Err(ArcError::Corruption(_))
    ));
    let mut padded = words.clone();
    padded.push(0);
    assert!(matches!(
        ArcCell::from_words(&padded, ArcDir::Out, MULTI_ARC_CAPACITY, &mut |_| true),
        Err(ArcError::Corruption(_))
    ));
    Ok(())
}

#[test]
fn envelope_guards_owner_side_and_payload() -> Result<()> {
    let (g, ids) = populated()?;
    let bytes = g.encode_cell(ids[0], ArcDir::Out)?;
    let cell = decode(&bytes, ids[0], ArcDir::Out)?;
    assert_eq!(cell.degree(), 3);

    assert!(decode(&bytes, ids[1], ArcDir::Out).is_err());
    assert!(decode(&bytes, ids[0], ArcDir::In).is_err());

    let mut flipped = bytes.to_vec();
    let mid = flipped.len() / 2;
    flipped[mid] ^= 0x01;
    let err = decode(&flipped, ids[0], ArcDir::Out).unwrap_err();
    assert!(matches!(err, ArcError::Corruption(_)));
    Ok(())
}

#[test]
fn snapshot_json_and_dump() -> Result<()> {
    let (g, ids) = populated()?;
    let snapshot = g.snapshot(ids[0], ArcDir::Out)?;
    let json = snapshot.to_json()?;
    let parsed: CellSnapshot =
        serde_json::from_str(&json).map_err(|err| ArcError::Corruption(err.to_string()))?;
    assert_eq!(parsed, snapshot);
    assert_eq!(snapshot.summary(), "Array/3");

    let dump = g.debug_dump(ids[0], ArcDir::Out)?;
    assert!(dump.starts_with("degree=3"));
    assert!(dump.contains("ffffffffffffffff"));
    Ok(())
}
