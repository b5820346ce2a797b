//! Command-line driver for the arcvector reference graph.
#![forbid(unsafe_code)]

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use arcvector::storage::{ArcMetrics, CounterMetrics};
use arcvector::{
    ArcDir, ArcError, ArcList, Graph, Modifier, PredValue, Predicator, PredicatorFilter, RelId,
    TimingBudget, VerifyReport, VertexId,
};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{CliConfig, StressDefaults};

#[derive(Parser, Debug)]
#[command(
    name = "arcvector",
    version,
    about = "Exercise the arcvector adjacency engine",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "ARCVECTOR_CONFIG",
        value_name = "FILE",
        help = "TOML configuration file"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for reports"
    )]
    format: OutputFormat,

    #[arg(
        short,
        long,
        global = true,
        action = ArgAction::Count,
        help = "Increase log verbosity (repeatable)"
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Build a small graph, mutate it and print every cell")]
    Demo,

    #[command(about = "Run seeded concurrent mutations and verify the result")]
    Stress(StressCmd),

    #[command(subcommand, about = "Inspect or create configuration files")]
    Config(ConfigCmd),
}

#[derive(Args, Debug)]
struct StressCmd {
    #[arg(long, help = "Number of vertices")]
    vertices: Option<usize>,

    #[arg(long, help = "Operations per thread")]
    ops: Option<usize>,

    #[arg(long, help = "Worker threads")]
    threads: Option<usize>,

    #[arg(long, help = "RNG seed")]
    seed: Option<u64>,

    #[arg(long, value_name = "MS", help = "Lock budget per operation")]
    budget_ms: Option<u64>,

    #[arg(long, help = "Distinct user relationships to draw from")]
    relationships: Option<u16>,
}

impl StressCmd {
    fn resolve(&self, defaults: &StressDefaults) -> StressDefaults {
        StressDefaults {
            vertices: self.vertices.unwrap_or(defaults.vertices).max(1),
            ops: self.ops.unwrap_or(defaults.ops),
            threads: self.threads.unwrap_or(defaults.threads).max(1),
            seed: self.seed.unwrap_or(defaults.seed),
            budget_ms: self.budget_ms.unwrap_or(defaults.budget_ms),
            relationships: self.relationships.unwrap_or(defaults.relationships).max(1),
        }
    }
}

#[derive(Subcommand, Debug)]
enum ConfigCmd {
    #[command(about = "Print the effective configuration")]
    Show,

    #[command(about = "Write a configuration file with every default")]
    Init {
        #[arg(value_name = "PATH")]
        path: PathBuf,

        #[arg(long, help = "Overwrite an existing file")]
        force: bool,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = CliConfig::load(cli.config.clone())?;
    if let Some(path) = config.path() {
        debug!(path = %path.display(), "arcvector.cli.config_loaded");
    }

    match &cli.command {
        Command::Demo => {
            let report = run_demo(&config)?;
            emit(cli.format, &report, || print_demo_text(&report))?;
        }
        Command::Stress(cmd) => {
            let params = cmd.resolve(config.stress());
            let report = run_stress(&config, &params)?;
            emit(cli.format, &report, || print_stress_text(&report))?;
            if report.verify.is_none() {
                std::process::exit(2);
            }
        }
        Command::Config(ConfigCmd::Show) => match cli.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(config.arcvector())?;
                println!("{json}");
            }
            OutputFormat::Text => print!("{}", config.to_toml()?),
        },
        Command::Config(ConfigCmd::Init { path, force }) => {
            CliConfig::write_template(path, *force)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "arcvector=warn",
        1 => "arcvector=info",
        2 => "arcvector=debug",
        _ => "arcvector=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: Fn(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct DemoCell {
    vertex: u64,
    side: &'static str,
    summary: String,
    cell: arcvector::storage::CellSnapshot,
}

#[derive(Debug, Serialize)]
struct DemoReport {
    steps: Vec<String>,
    cells: Vec<DemoCell>,
    size: i64,
    rev_size: i64,
    verify: VerifyReport,
}

/// Builds A-(111)->B, B-(222)->C, C-(333)->D, C-(444)->E, D-(555)->E,
/// D-(666)->E, then removes the in-arcs of C with relationship 222 and every
/// in-arc of E.
fn run_demo(config: &CliConfig) -> Result<DemoReport, Box<dyn Error>> {
    let graph = Graph::new(config.options());
    let names = ["A", "B", "C", "D", "E"];
    let ids: Vec<VertexId> = names.iter().map(|_| graph.create_vertex()).collect();
    let mut steps = Vec::new();

    let arcs = [
        (0, 1, 111),
        (1, 2, 222),
        (2, 3, 333),
        (2, 4, 444),
        (3, 4, 555),
        (3, 4, 666),
    ];
    for (tail, head, rel) in arcs {
        graph.add_arc(ids[tail], ids[head], Predicator::stat(rel))?;
        steps.push(format!("add {}-({rel})->{}", names[tail], names[head]));
    }

    let mut budget = TimingBudget::infinite();
    let removed = graph.remove_arcs(
        ids[2],
        None,
        Predicator::relationship(222).with_dir(ArcDir::In),
        &mut budget,
    )?;
    steps.push(format!("remove in-arcs of C with relationship 222: {removed}"));
    let every_inarc = Predicator::wildcard().with_dir(ArcDir::In);
    let removed = graph.remove_arcs(ids[4], None, every_inarc, &mut budget)?;
    steps.push(format!("remove every in-arc of E: {removed}"));

    let mut cells = Vec::new();
    for id in &ids {
        for side in [ArcDir::Out, ArcDir::In] {
            let cell = graph.snapshot(*id, side)?;
            cells.push(DemoCell {
                vertex: id.0,
                side: side.as_str(),
                summary: cell.summary(),
                cell,
            });
        }
    }
    let verify = graph.verify()?;
    info!(vertices = ids.len(), size = graph.size(), "arcvector.cli.demo_done");
    Ok(DemoReport {
        steps,
        cells,
        size: graph.size(),
        rev_size: graph.rev_size(),
        verify,
    })
}

fn print_demo_text(report: &DemoReport) {
    for step in &report.steps {
        println!("{step}");
    }
    println!();
    for cell in &report.cells {
        let arcs: Vec<String> = cell
            .cell
            .arcs
            .iter()
            .map(|arc| format!("{}:{}", arc.head, arc.rel))
            .collect();
        println!("v{} {:<3} {:<12} {}", cell.vertex, cell.side, cell.summary, arcs.join(" "));
    }
    println!();
    println!("size={} rev_size={}", report.size, report.rev_size);
    println!(
        "verify: vertices={} out={} in={} counters={}",
        report.verify.vertices,
        report.verify.out_arcs,
        report.verify.in_arcs,
        report.verify.counters
    );
}

#[derive(Debug, Default, Serialize)]
struct WorkerTally {
    adds: u64,
    removes: u64,
    removed: u64,
    expired: u64,
    timeouts: u64,
    rejected: u64,
    scans: u64,
}

impl WorkerTally {
    fn merge(&mut self, other: &WorkerTally) {
        self.adds += other.adds;
        self.removes += other.removes;
        self.removed += other.removed;
        self.expired += other.expired;
        self.timeouts += other.timeouts;
        self.rejected += other.rejected;
        self.scans += other.scans;
    }
}

#[derive(Debug, Serialize)]
struct MetricsSummary {
    out_added: u64,
    in_added: u64,
    updated: u64,
    out_removed: u64,
    in_removed: u64,
    expired: u64,
    retries: u64,
}

impl MetricsSummary {
    fn from_counters(metrics: &CounterMetrics) -> Self {
        use std::sync::atomic::Ordering::Relaxed;
        Self {
            out_added: metrics.out_added.load(Relaxed),
            in_added: metrics.in_added.load(Relaxed),
            updated: metrics.updated.load(Relaxed),
            out_removed: metrics.out_removed.load(Relaxed),
            in_removed: metrics.in_removed.load(Relaxed),
            expired: metrics.expired.load(Relaxed),
            retries: metrics.retries.load(Relaxed),
        }
    }
}

#[derive(Debug, Serialize)]
struct StressReport {
    params: StressDefaults,
    elapsed_ms: u128,
    tally: WorkerTally,
    metrics: MetricsSummary,
    size: i64,
    rev_size: i64,
    verify: Option<VerifyReport>,
    verify_error: Option<String>,
}

fn run_stress(config: &CliConfig, params: &StressDefaults) -> Result<StressReport, Box<dyn Error>> {
    let metrics = Arc::new(CounterMetrics::default());
    let sink: Arc<dyn ArcMetrics> = metrics.clone();
    let graph = Arc::new(Graph::new(config.options().metrics(sink)));
    let ids: Arc<Vec<VertexId>> =
        Arc::new((0..params.vertices).map(|_| graph.create_vertex()).collect());
    info!(
        vertices = params.vertices,
        threads = params.threads,
        ops = params.ops,
        seed = params.seed,
        "arcvector.cli.stress_start"
    );

    let started = Instant::now();
    let workers: Vec<_> = (0..params.threads)
        .map(|worker| {
            let graph = Arc::clone(&graph);
            let ids = Arc::clone(&ids);
            let params = params.clone();
            thread::spawn(move || stress_worker(&graph, &ids, &params, worker as u64))
        })
        .collect();

    let mut tally = WorkerTally::default();
    for handle in workers {
        let worker = handle
            .join()
            .map_err(|_| "stress worker panicked")??;
        tally.merge(&worker);
    }
    let elapsed_ms = started.elapsed().as_millis();

    let (verify, verify_error) = match graph.verify() {
        Ok(report) => (Some(report), None),
        Err(err) => (None, Some(err.to_string())),
    };
    Ok(StressReport {
        params: params.clone(),
        elapsed_ms,
        tally,
        metrics: MetricsSummary::from_counters(&metrics),
        size: graph.size(),
        rev_size: graph.rev_size(),
        verify,
        verify_error,
    })
}

fn stress_worker(
    graph: &Graph,
    ids: &[VertexId],
    params: &StressDefaults,
    worker: u64,
) -> Result<WorkerTally, ArcError> {
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed.wrapping_add(worker));
    let mut tally = WorkerTally::default();
    let budget = Duration::from_millis(params.budget_ms);
    let pick = |rng: &mut ChaCha8Rng| ids[rng.gen_range(0..ids.len())];

    for step in 0..params.ops {
        let clock = 1_000 + step as u32;
        let tail = pick(&mut rng);
        let head = pick(&mut rng);
        let rel = RelId::USER_START.0 + rng.gen_range(0..params.relationships);
        let mut timing = TimingBudget::new(budget);
        let outcome = match rng.gen_range(0..100u32) {
            0..=44 => {
                tally.adds += 1;
                let pred = match rng.gen_range(0..3u32) {
                    0 => Predicator::stat(rel),
                    1 => {
                        let step = PredValue::uint(rng.gen_range(1..10));
                        Predicator::new(RelId(rel), Modifier::Counter, step)
                    }
                    _ => Predicator::expiring(rel, clock + rng.gen_range(1..200)),
                };
                graph.add_arc_within(tail, head, pred, &mut timing).map(|_| ())
            }
            45..=69 => {
                tally.removes += 1;
                graph
                    .remove_arcs(tail, Some(head), Predicator::relationship(rel), &mut timing)
                    .map(|n| tally.removed += n)
            }
            70..=79 => {
                tally.removes += 1;
                graph
                    .remove_arcs(tail, None, Predicator::relationship(rel), &mut timing)
                    .map(|n| tally.removed += n)
            }
            80..=87 => {
                tally.removes += 1;
                let probe = Predicator::relationship(rel).with_dir(ArcDir::In);
                graph
                    .remove_arcs(tail, None, probe, &mut timing)
                    .map(|n| tally.removed += n)
            }
            88..=93 => graph.expire_arcs(clock).map(|n| tally.expired += n),
            _ => {
                tally.scans += 1;
                let mut list = ArcList::with_limit(16);
                graph
                    .get_arcs(tail, ArcDir::Any, &PredicatorFilter::any(), &mut list)
                    .map(|_| ())
            }
        };
        match outcome {
            Ok(()) => {}
            Err(ArcError::Timeout { removed, .. }) => {
                tally.timeouts += 1;
                tally.removed += removed;
            }
            Err(ArcError::Capacity { .. }) => tally.rejected += 1,
            Err(err) => {
                warn!(worker, step, error = %err, "arcvector.cli.stress_failed");
                return Err(err);
            }
        }
    }
    Ok(tally)
}

fn print_stress_text(report: &StressReport) {
    let p = &report.params;
    println!(
        "vertices={} threads={} ops/thread={} seed={} elapsed={}ms",
        p.vertices, p.threads, p.ops, p.seed, report.elapsed_ms
    );
    let t = &report.tally;
    println!(
        "adds={} removes={} removed={} expired={} timeouts={} rejected={} scans={}",
        t.adds, t.removes, t.removed, t.expired, t.timeouts, t.rejected, t.scans
    );
    let m = &report.metrics;
    println!(
        "metrics: out_added={} in_added={} updated={} out_removed={} in_removed={} \
             expired={} retries={}",
        m.out_added, m.in_added, m.updated, m.out_removed, m.in_removed, m.expired, m.retries
    );
    println!("size={} rev_size={}", report.size, report.rev_size);
    match (&report.verify, &report.verify_error) {
        (Some(v), _) => println!(
            "verify: ok vertices={} out={} in={} counters={}",
            v.vertices, v.out_arcs, v.in_arcs, v.counters
        ),
        (None, Some(err)) => println!("verify: FAILED {err}"),
        (None, None) => println!("verify: skipped"),
    }
}
