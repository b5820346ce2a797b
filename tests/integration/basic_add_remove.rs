#![allow(missing_docs)]

use std::sync::Arc;

use arcvector::storage::{ArcMetrics, CounterMetrics};
use arcvector::{
    AccumulatorKind, AddOutcome, ArcDir, ArcError, ArcVectorOptions, CellType, Graph, Modifier,
    PredValue, Predicator, RelId, Result, TimingBudget, VertexId,
};

fn graph() -> Graph {
    Graph::new(ArcVectorOptions::new().dump_on_error(false))
}

fn counter(rel: u16, n: u32) -> Predicator {
    Predicator::new(RelId(rel), Modifier::Counter, PredValue::uint(n))
}

#[test]
fn cell_grows_and_shrinks_through_every_representation() -> Result<()> {
    let g = graph();
    let a = g.create_vertex();
    let heads: Vec<VertexId> = (0..3).map(|_| g.create_vertex()).collect();

    assert_eq!(g.cell_type(a, ArcDir::Out)?, CellType::NoArcs);
    assert_eq!(g.add_arc(a, heads[0], Predicator::stat(0x200))?, AddOutcome::Inserted);
    assert_eq!(g.cell_type(a, ArcDir::Out)?, CellType::Simple);
    g.add_arc(a, heads[1], Predicator::stat(0x200))?;
    g.add_arc(a, heads[2], Predicator::stat(0x200))?;
    assert_eq!(g.cell_type(a, ArcDir::Out)?, CellType::Array);
    assert_eq!(g.degree(a, ArcDir::Out)?, 3);

    let mut budget = TimingBudget::infinite();
    assert_eq!(g.remove_arcs(a, Some(heads[0]), Predicator::wildcard(), &mut budget)?, 1);
    assert_eq!(g.cell_type(a, ArcDir::Out)?, CellType::Array);
    assert_eq!(g.remove_arcs(a, Some(heads[1]), Predicator::wildcard(), &mut budget)?, 1);
    assert_eq!(g.cell_type(a, ArcDir::Out)?, CellType::Simple);
    assert_eq!(g.remove_arcs(a, Some(heads[2]), Predicator::wildcard(), &mut budget)?, 1);
    assert_eq!(g.cell_type(a, ArcDir::Out)?, CellType::NoArcs);

    for head in heads {
        assert_eq!(g.cell_type(head, ArcDir::In)?, CellType::NoArcs);
    }
    assert_eq!(g.size(), 0);
    assert_eq!(g.rev_size(), 0);
    g.verify()?;
    Ok(())
}

#[test]
fn readd_updates_in_place() -> Result<()> {
    let metrics = Arc::new(CounterMetrics::default());
    let sink: Arc<dyn ArcMetrics> = metrics.clone();
    let g = Graph::new(ArcVectorOptions::new().metrics(sink));
    let (a, b) = (g.create_vertex(), g.create_vertex());

    assert_eq!(g.add_arc(a, b, counter(0x200, 3))?, AddOutcome::Inserted);
    assert_eq!(g.add_arc(a, b, counter(0x200, 4))?, AddOutcome::Updated);
    assert_eq!(g.degree(a, ArcDir::Out)?, 1);
    assert_eq!(g.size(), 1);

    let out = g.get_arc_value(a, b, &Predicator::relationship(0x200))?.map(|p| p.value);
    let inc = g
        .get_arc_value(b, a, &Predicator::relationship(0x200).with_dir(ArcDir::In))?
        .map(|p| p.value);
    assert_eq!(out, Some(PredValue::uint(7)));
    assert_eq!(inc, out);

    g.add_arc(a, b, Predicator::new(RelId(0x201), Modifier::Unsigned, PredValue::uint(9)))?;
    g.add_arc(a, b, Predicator::new(RelId(0x201), Modifier::Unsigned, PredValue::uint(2)))?;
    let plain = g.get_arc_value(a, b, &Predicator::relationship(0x201))?.map(|p| p.value);
    assert_eq!(plain, Some(PredValue::uint(2)));

    use std::sync::atomic::Ordering::Relaxed;
    assert_eq!(metrics.out_added.load(Relaxed), 2);
    assert_eq!(metrics.in_added.load(Relaxed), 2);
    assert_eq!(metrics.updated.load(Relaxed), 4);
    g.verify()?;
    Ok(())
}

#[test]
fn accumulator_policy_comes_from_options() -> Result<()> {
    let g = Graph::new(ArcVectorOptions::new().accumulator(AccumulatorKind::Max.policy()));
    let (a, b) = (g.create_vertex(), g.create_vertex());
    g.add_arc(a, b, counter(0x200, 8))?;
    g.add_arc(a, b, counter(0x200, 5))?;
    let value = g.get_arc_value(a, b, &Predicator::relationship(0x200))?.map(|p| p.value);
    assert_eq!(value, Some(PredValue::uint(8)));
    Ok(())
}

#[test]
fn same_relationship_with_different_modifiers_are_distinct_arcs() -> Result<()> {
    let g = graph();
    let (a, b) = (g.create_vertex(), g.create_vertex());
    g.add_arc(a, b, Predicator::stat(0x200))?;
    g.add_arc(a, b, counter(0x200, 1))?;
    assert_eq!(g.degree(a, ArcDir::Out)?, 2);
    assert_eq!(g.degree(b, ArcDir::In)?, 2);

    let mut budget = TimingBudget::infinite();
    let probe = Predicator::new(RelId(0x200), Modifier::Static, PredValue::default());
    assert_eq!(g.remove_arcs(a, Some(b), probe, &mut budget)?, 1);
    assert_eq!(g.degree(b, ArcDir::In)?, 1);
    g.verify()?;
    Ok(())
}

#[test]
fn relationship_none_is_ignored() -> Result<()> {
    let g = graph();
    let (a, b) = (g.create_vertex(), g.create_vertex());
    let none = Predicator::new(RelId::NONE, Modifier::Static, PredValue::default());
    let outcome = g.add_arc(a, b, none)?;
    assert_eq!(outcome, AddOutcome::Rejected);
    assert_eq!(g.size(), 0);
    assert!(!g.vertex(a)?.has_outarcs());
    Ok(())
}

#[test]
fn relationships_beyond_the_word_range_are_refused() -> Result<()> {
    let g = graph();
    let (a, b) = (g.create_vertex(), g.create_vertex());
    for rel in [0x4000, 0x4200, u16::MAX] {
        let err = g.add_arc(a, b, Predicator::stat(rel)).unwrap_err();
        assert!(matches!(err, ArcError::InvalidArgument(_)), "rel {rel:#x}: {err}");
    }
    assert_eq!(g.size(), 0);
    assert_eq!(g.rev_size(), 0);
    assert_eq!(g.cell_type(b, ArcDir::In)?, CellType::NoArcs);

    g.add_arc(a, b, Predicator::stat(RelId::MAX.0))?;
    let words = g.serialize_cell(a, ArcDir::Out)?;
    let pred = Predicator::from_bits(words[2])?;
    assert_eq!(pred.rel, RelId::MAX);
    g.verify()?;
    Ok(())
}

#[test]
fn wildcard_modifier_cannot_be_stored() {
    let g = graph();
    let (a, b) = (g.create_vertex(), g.create_vertex());
    let err = g.add_arc(a, b, Predicator::relationship(0x200)).unwrap_err();
    assert!(matches!(err, ArcError::InvalidArgument(_)));
    assert_eq!(g.size(), 0);
}

#[test]
fn removing_absent_arcs_is_a_no_op() -> Result<()> {
    let g = graph();
    let (a, b, c) = (g.create_vertex(), g.create_vertex(), g.create_vertex());
    g.add_arc(a, b, Predicator::stat(0x200))?;
    let mut budget = TimingBudget::infinite();
    assert_eq!(g.remove_arcs(a, Some(c), Predicator::wildcard(), &mut budget)?, 0);
    assert_eq!(g.remove_arcs(a, Some(b), Predicator::relationship(0x201), &mut budget)?, 0);
    assert_eq!(g.remove_arcs(c, None, Predicator::wildcard(), &mut budget)?, 0);
    assert_eq!(g.size(), 1);
    Ok(())
}

#[test]
fn flags_follow_first_and_last_arc() -> Result<()> {
    let g = graph();
    let (a, b) = (g.create_vertex(), g.create_vertex());
    g.add_arc(a, b, Predicator::stat(0x200))?;
    g.add_arc(a, b, Predicator::stat(0x201))?;
    assert!(g.vertex(a)?.has_outarcs());
    assert!(g.vertex(b)?.has_inarcs());
    assert!(!g.vertex(a)?.has_inarcs());

    let mut budget = TimingBudget::infinite();
    g.remove_arcs(a, Some(b), Predicator::relationship(0x200), &mut budget)?;
    assert!(g.vertex(a)?.has_outarcs());
    g.remove_arcs(a, Some(b), Predicator::relationship(0x201), &mut budget)?;
    assert!(!g.vertex(a)?.has_outarcs());
    assert!(!g.vertex(b)?.has_inarcs());
    Ok(())
}
