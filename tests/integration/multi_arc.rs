#![allow(missing_docs)]

use arcvector::storage::MULTI_ARC_CAPACITY;
use arcvector::{
    ArcDir, ArcError, ArcVectorOptions, CellType, Graph, Modifier, PredValue, Predicator, RelId,
    Result, TimingBudget,
};

fn graph_with_capacity(capacity: usize) -> Graph {
    Graph::new(
        ArcVectorOptions::new()
            .multi_arc_capacity(capacity)
            .dump_on_error(false),
    )
}

#[test]
fn chain_grows_per_key_and_demotes_on_removal() -> Result<()> {
    let g = graph_with_capacity(16);
    let (a, b) = (g.create_vertex(), g.create_vertex());
    for rel in 0x200..0x205 {
        g.add_arc(a, b, Predicator::stat(rel))?;
    }
    let snapshot = g.snapshot(a, ArcDir::Out)?;
    assert_eq!(snapshot.kind, CellType::Array);
    assert_eq!(snapshot.degree, 5);
    assert!(snapshot.arcs.iter().all(|arc| arc.multi));
    assert_eq!(g.degree(b, ArcDir::In)?, 5);

    let mut budget = TimingBudget::infinite();
    for rel in 0x200..0x204 {
        assert_eq!(g.remove_arcs(a, Some(b), Predicator::relationship(rel), &mut budget)?, 1);
    }
    let snapshot = g.snapshot(a, ArcDir::Out)?;
    assert_eq!(snapshot.kind, CellType::Simple);
    assert!(!snapshot.arcs[0].multi);
    assert_eq!(g.cell_type(b, ArcDir::In)?, CellType::Simple);
    g.verify()?;
    Ok(())
}

#[test]
fn chain_next_to_single_arcs() -> Result<()> {
    let g = graph_with_capacity(16);
    let (a, b, c) = (g.create_vertex(), g.create_vertex(), g.create_vertex());
    g.add_arc(a, b, Predicator::stat(0x200))?;
    g.add_arc(a, b, Predicator::stat(0x201))?;
    g.add_arc(a, c, Predicator::stat(0x200))?;

    let snapshot = g.snapshot(a, ArcDir::Out)?;
    let multi: Vec<bool> = snapshot.arcs.iter().map(|arc| arc.multi).collect();
    assert_eq!(multi, vec![true, true, false]);

    let mut budget = TimingBudget::infinite();
    assert_eq!(g.remove_arcs(a, Some(b), Predicator::relationship(0x201), &mut budget)?, 1);
    let snapshot = g.snapshot(a, ArcDir::Out)?;
    assert_eq!(snapshot.kind, CellType::Array);
    assert!(snapshot.arcs.iter().all(|arc| !arc.multi));
    g.verify()?;
    Ok(())
}

#[test]
fn capacity_overflow_leaves_both_sides_untouched() -> Result<()> {
    let g = graph_with_capacity(3);
    let (a, b) = (g.create_vertex(), g.create_vertex());
    for rel in 0x200..0x203 {
        g.add_arc(a, b, Predicator::stat(rel))?;
    }
    let err = g.add_arc(a, b, Predicator::stat(0x203)).unwrap_err();
    assert!(matches!(err, ArcError::Capacity { capacity: 3 }));
    assert!(err.is_fatal());
    assert_eq!(g.degree(a, ArcDir::Out)?, 3);
    assert_eq!(g.degree(b, ArcDir::In)?, 3);

    // Existing keys still update at capacity.
    let existing = Predicator::new(RelId(0x200), Modifier::Static, PredValue::default());
    assert_eq!(g.add_arc(a, b, existing)?, arcvector::AddOutcome::Updated);
    g.verify()?;
    Ok(())
}

#[test]
fn default_capacity_covers_every_assignable_relationship() -> Result<()> {
    let g = Graph::new(ArcVectorOptions::new().dump_on_error(false));
    let (a, b) = (g.create_vertex(), g.create_vertex());
    let assignable = RelId::SYSTEM_START.0..=RelId::USER_END.0;
    for (added, rel) in assignable.clone().enumerate() {
        assert_eq!(g.add_arc(a, b, Predicator::stat(rel))?, arcvector::AddOutcome::Inserted);
        assert_eq!(g.degree(a, ArcDir::Out)?, added as u64 + 1);
    }
    assert_eq!(g.degree(a, ArcDir::Out)? as usize, MULTI_ARC_CAPACITY);

    let err = g.add_arc(a, b, Predicator::stat(RelId::EXCEPTION_START.0)).unwrap_err();
    assert!(matches!(err, ArcError::Capacity { capacity } if capacity == MULTI_ARC_CAPACITY));
    assert_eq!(g.degree(a, ArcDir::Out)? as usize, MULTI_ARC_CAPACITY);
    assert_eq!(g.degree(b, ArcDir::In)? as usize, MULTI_ARC_CAPACITY);
    assert_eq!(g.size(), assignable.count() as i64);
    g.verify()?;
    Ok(())
}

#[test]
fn modifiers_split_keys_within_a_chain() -> Result<()> {
    let g = graph_with_capacity(16);
    let (a, b) = (g.create_vertex(), g.create_vertex());
    for modifier in [Modifier::Static, Modifier::Counter, Modifier::Float] {
        g.add_arc(a, b, Predicator::new(RelId(0x200), modifier, PredValue::uint(1)))?;
    }
    assert_eq!(g.degree(a, ArcDir::Out)?, 3);

    let mut budget = TimingBudget::infinite();
    let floats = Predicator::new(RelId(0x200), Modifier::Float, PredValue::default());
    assert_eq!(g.remove_arcs(a, Some(b), floats, &mut budget)?, 1);
    assert_eq!(g.remove_arcs(a, Some(b), Predicator::relationship(0x200), &mut budget)?, 2);
    assert_eq!(g.cell_type(a, ArcDir::Out)?, CellType::NoArcs);
    g.verify()?;
    Ok(())
}
