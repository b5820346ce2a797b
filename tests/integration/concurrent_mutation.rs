#![allow(missing_docs)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier, Once};
use std::thread;
use std::time::Duration;

use arcvector::{
    ArcDir, ArcError, ArcList, ArcVectorOptions, Graph, Modifier, PredValue, Predicator,
    PredicatorFilter, RelId, Result, TimingBudget, VertexId,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("arcvector=warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

fn shared_graph(vertices: usize) -> (Arc<Graph>, Arc<Vec<VertexId>>) {
    let options = ArcVectorOptions::new()
        .retry_interval(Duration::from_micros(200))
        .dump_on_error(false);
    let graph = Arc::new(Graph::new(options));
    let ids = Arc::new((0..vertices).map(|_| graph.create_vertex()).collect());
    (graph, ids)
}

/// Runs seeded random mutations; timeouts are expected and counted.
fn chaos_worker(
    graph: &Graph,
    ids: &[VertexId],
    seed: u64,
    ops: usize,
    timeouts: &AtomicU64,
) -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for step in 0..ops {
        let tail = ids[rng.gen_range(0..ids.len())];
        let head = ids[rng.gen_range(0..ids.len())];
        let rel = 0x200 + rng.gen_range(0..6u16);
        let mut budget = TimingBudget::millis(20);
        let outcome = match rng.gen_range(0..10u32) {
            0..=4 => {
                let pred = if rng.gen_bool(0.5) {
                    Predicator::stat(rel)
                } else {
                    Predicator::new(RelId(rel), Modifier::Counter, PredValue::uint(1))
                };
                graph.add_arc_within(tail, head, pred, &mut budget).map(|_| ())
            }
            5 | 6 => graph
                .remove_arcs(tail, Some(head), Predicator::relationship(rel), &mut budget)
                .map(|_| ()),
            7 => graph
                .remove_arcs(tail, None, Predicator::relationship(rel), &mut budget)
                .map(|_| ()),
            8 => graph
                .remove_arcs(tail, None, Predicator::wildcard().with_dir(ArcDir::In), &mut budget)
                .map(|_| ()),
            _ => {
                let mut list = ArcList::new();
                graph
                    .get_arcs(tail, ArcDir::Both, &PredicatorFilter::any(), &mut list)
                    .map(|_| ())
            }
        };
        match outcome {
            Ok(()) => {}
            Err(err) if err.is_transient() => {
                timeouts.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                tracing::error!(seed, step, error = %err, "chaos worker failed");
                return Err(err);
            }
        }
    }
    Ok(())
}

#[test]
fn seeded_chaos_keeps_graph_consistent() -> Result<()> {
    init_tracing();
    let (graph, ids) = shared_graph(24);
    let timeouts = Arc::new(AtomicU64::new(0));
    let barrier = Arc::new(Barrier::new(4));

    let workers: Vec<_> = (0..4u64)
        .map(|worker| {
            let graph = Arc::clone(&graph);
            let ids = Arc::clone(&ids);
            let timeouts = Arc::clone(&timeouts);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                chaos_worker(&graph, &ids, 0xA5A5 + worker, 2_000, &timeouts)
            })
        })
        .collect();
    for handle in workers {
        handle.join().expect("worker panicked")?;
    }

    let report = graph.verify()?;
    assert_eq!(report.out_arcs as i64, graph.size());
    assert_eq!(report.in_arcs as i64, graph.rev_size());
    Ok(())
}

#[test]
fn crossing_inarc_removals_make_progress() -> Result<()> {
    init_tracing();
    let (graph, ids) = shared_graph(2);
    let (a, b) = (ids[0], ids[1]);
    for rel in 0x200..0x220 {
        graph.add_arc(a, b, Predicator::stat(rel))?;
        graph.add_arc(b, a, Predicator::stat(rel))?;
    }

    let barrier = Arc::new(Barrier::new(2));
    let workers: Vec<_> = [a, b]
        .into_iter()
        .map(|owner| {
            let graph = Arc::clone(&graph);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut budget = TimingBudget::new(Duration::from_secs(10));
                let every_inarc = Predicator::wildcard().with_dir(ArcDir::In);
                graph.remove_arcs(owner, None, every_inarc, &mut budget)
            })
        })
        .collect();
    let mut removed = 0;
    for handle in workers {
        removed += handle.join().expect("worker panicked")?;
    }
    assert_eq!(removed, 64);
    assert_eq!(graph.size(), 0);
    graph.verify()?;
    Ok(())
}

#[test]
fn partial_removals_are_accounted() -> Result<()> {
    init_tracing();
    let (graph, ids) = shared_graph(9);
    let hub = ids[0];
    let inserted = Arc::new(AtomicU64::new(0));
    let removed = Arc::new(AtomicU64::new(0));
    let barrier = Arc::new(Barrier::new(ids.len()));

    let mut workers: Vec<_> = ids[1..]
        .iter()
        .copied()
        .enumerate()
        .map(|(i, tail)| {
            let graph = Arc::clone(&graph);
            let inserted = Arc::clone(&inserted);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || -> Result<()> {
                let mut rng = ChaCha8Rng::seed_from_u64(i as u64);
                barrier.wait();
                for _ in 0..500 {
                    let rel = 0x200 + rng.gen_range(0..4u16);
                    let mut budget = TimingBudget::millis(10);
                    match graph.add_arc_within(tail, hub, Predicator::stat(rel), &mut budget) {
                        Ok(arcvector::AddOutcome::Inserted) => {
                            inserted.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(_) => {}
                        Err(err) if err.is_transient() => {}
                        Err(err) => return Err(err),
                    }
                }
                Ok(())
            })
        })
        .collect();

    workers.push({
        let graph = Arc::clone(&graph);
        let removed = Arc::clone(&removed);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || -> Result<()> {
            barrier.wait();
            for round in 0..200 {
                let mut budget = if round % 2 == 0 {
                    TimingBudget::zero()
                } else {
                    TimingBudget::millis(2)
                };
                let probe = Predicator::wildcard().with_dir(ArcDir::In);
                match graph.remove_arcs(hub, None, probe, &mut budget) {
                    Ok(n) => {
                        removed.fetch_add(n, Ordering::Relaxed);
                    }
                    Err(ArcError::Timeout { removed: partial, .. }) => {
                        removed.fetch_add(partial, Ordering::Relaxed);
                    }
                    Err(err) => return Err(err),
                }
            }
            Ok(())
        })
    });
    for handle in workers {
        handle.join().expect("worker panicked")?;
    }

    let expected = inserted.load(Ordering::Relaxed) - removed.load(Ordering::Relaxed);
    assert_eq!(graph.size(), expected as i64);
    assert_eq!(graph.degree(hub, ArcDir::In)?, expected);
    graph.verify()?;
    Ok(())
}
