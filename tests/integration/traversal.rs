#![allow(missing_docs)]

use arcvector::storage::{ArcCollector, Collect, FirstMatch, FnFilter};
use arcvector::{
    ArcDir, ArcError, ArcList, ArcView, Graph, HeadSet, Modifier, PredValue, Predicator,
    PredicatorFilter, RelId, Result, ValueCondition, VertexId, VertexList,
};

/// Hub with out-arcs to four spokes; spokes 0 and 1 link back with the same
/// predicator, spoke 2 links back with a different relationship.
fn hub_and_spokes() -> Result<(Graph, VertexId, Vec<VertexId>)> {
    let g = Graph::default();
    let hub = g.create_vertex();
    let spokes: Vec<VertexId> = (0..4).map(|_| g.create_vertex()).collect();
    for (i, spoke) in spokes.iter().enumerate() {
        let value = PredValue::uint(i as u32 * 10);
        let score = Predicator::new(RelId(0x200), Modifier::Unsigned, value);
        g.add_arc(hub, *spoke, score)?;
    }
    for spoke in &spokes[..2] {
        let value = g
            .get_arc_value(hub, *spoke, &Predicator::relationship(0x200))?
            .map(|p| p.value)
            .unwrap_or_default();
        g.add_arc(*spoke, hub, Predicator::new(RelId(0x200), Modifier::Unsigned, value))?;
    }
    g.add_arc(spokes[2], hub, Predicator::stat(0x300))?;
    Ok((g, hub, spokes))
}

#[test]
fn arcs_by_side() -> Result<()> {
    let (g, hub, spokes) = hub_and_spokes()?;
    let any = PredicatorFilter::any();

    let mut out = ArcList::new();
    assert_eq!(g.get_arcs(hub, ArcDir::Out, &any, &mut out)?, 4);
    assert!(out.arcs().iter().all(|arc| arc.pred.dir == ArcDir::Out));

    let mut inc = ArcList::new();
    assert_eq!(g.get_arcs(hub, ArcDir::In, &any, &mut inc)?, 3);
    assert!(inc.arcs().iter().all(|arc| arc.pred.dir == ArcDir::In));

    let mut all = ArcList::new();
    assert_eq!(g.get_arcs(hub, ArcDir::Any, &any, &mut all)?, 7);

    let mut both = ArcList::new();
    assert_eq!(g.get_arcs(hub, ArcDir::Both, &any, &mut both)?, 2);
    let mut heads: Vec<VertexId> = both.arcs().iter().map(|arc| arc.head).collect();
    heads.sort_unstable();
    assert_eq!(heads, spokes[..2].to_vec());
    assert!(both.arcs().iter().all(|arc| arc.pred.dir == ArcDir::Both));
    Ok(())
}

#[test]
fn value_filter_and_limit() -> Result<()> {
    let (g, hub, spokes) = hub_and_spokes()?;
    let probe = Predicator::new(RelId(0x200), Modifier::Unsigned, PredValue::uint(20))
        .with_condition(ValueCondition::Gte);
    let filter = PredicatorFilter::new(probe);

    let mut vertices = VertexList::new();
    g.get_vertices(hub, ArcDir::Out, &filter, &mut vertices)?;
    let mut found = vertices.into_vertices();
    found.sort_unstable();
    assert_eq!(found, spokes[2..].to_vec());

    let mut limited = ArcList::with_limit(1);
    g.get_arcs(hub, ArcDir::Out, &PredicatorFilter::any(), &mut limited)?;
    assert_eq!(limited.len(), 1);
    Ok(())
}

#[test]
fn head_sets() -> Result<()> {
    let (g, hub, spokes) = hub_and_spokes()?;
    let any = PredicatorFilter::any();
    let stranger = g.create_vertex();

    assert!(g.has_arc(hub, ArcDir::Out, &HeadSet::Any, &any)?);
    assert!(g.has_arc(hub, ArcDir::Out, &HeadSet::AnyOf(vec![stranger, spokes[3]]), &any)?);
    assert!(!g.has_arc(hub, ArcDir::Out, &HeadSet::AnyOf(vec![stranger]), &any)?);
    assert!(g.has_arc(hub, ArcDir::Out, &HeadSet::AllOf(spokes.clone()), &any)?);
    assert!(!g.has_arc(hub, ArcDir::In, &HeadSet::AllOf(spokes.clone()), &any)?);
    assert!(g.has_arc(hub, ArcDir::Any, &HeadSet::Vertex(spokes[2]), &any)?);
    assert!(g.has_arc(hub, ArcDir::Both, &HeadSet::AllOf(spokes[..2].to_vec()), &any)?);
    assert!(!g.has_arc(hub, ArcDir::Both, &HeadSet::Vertex(spokes[2]), &any)?);
    assert!(!g.has_arc(stranger, ArcDir::Any, &HeadSet::Any, &any)?);
    Ok(())
}

#[test]
fn custom_filters_and_collectors() -> Result<()> {
    let (g, hub, spokes) = hub_and_spokes()?;

    let odd = FnFilter(|arc: &ArcView| -> Result<bool> { Ok(arc.pred.value.as_uint() % 20 == 10) });
    let mut list = ArcList::new();
    g.get_arcs(hub, ArcDir::Out, &odd, &mut list)?;
    let mut heads: Vec<VertexId> = list.arcs().iter().map(|arc| arc.head).collect();
    heads.sort_unstable();
    assert_eq!(heads, vec![spokes[1], spokes[3]]);

    let mut first = FirstMatch::default();
    let back = PredicatorFilter::new(Predicator::relationship(0x300));
    g.get_arcs(hub, ArcDir::In, &back, &mut first)?;
    assert_eq!(first.found().map(|arc| arc.head), Some(spokes[2]));

    let failing = FnFilter(|_: &ArcView| -> Result<bool> {
        Err(ArcError::InvalidArgument("rejected".into()))
    });
    assert!(g.get_arcs(hub, ArcDir::Out, &failing, &mut ArcList::new()).is_err());
    Ok(())
}

/// Collector counting arcs per relationship, stopping after a budget.
struct Budgeted {
    seen: usize,
    stop_after: usize,
}

impl ArcCollector for Budgeted {
    fn collect(&mut self, _arc: ArcView) -> Collect {
        self.seen += 1;
        if self.seen >= self.stop_after {
            Collect::Stop
        } else {
            Collect::Continue
        }
    }
}

#[test]
fn collector_can_stop_a_scan() -> Result<()> {
    let (g, hub, _) = hub_and_spokes()?;
    let mut collector = Budgeted { seen: 0, stop_after: 2 };
    g.get_arcs(hub, ArcDir::Out, &PredicatorFilter::any(), &mut collector)?;
    assert_eq!(collector.seen, 2);
    Ok(())
}
