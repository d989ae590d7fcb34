//! TSP Solvers - Command Line Interface
//!
//! Generates random instances, solves them with any of the engines and
//! benchmarks several engines against each other.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use tsp_solvers::benchmark::{append_records, Algorithm, Benchmark, BenchmarkConfig, RunRecord};
use tsp_solvers::heuristics::construction::Initializer;
use tsp_solvers::{Graph, Solution};

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "tsp-solvers")]
#[command(version = "1.0")]
#[command(about = "Heuristic and exact solvers for the Travelling Salesman Problem")]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a random Euclidean instance
    Generate {
        /// Number of vertices
        #[arg(short = 'n', long)]
        vertices: usize,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Output JSON file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Solve an instance with one algorithm
    Solve {
        /// Instance JSON file; a random instance is generated when omitted
        #[arg(short, long)]
        instance: Option<PathBuf>,

        /// Vertices of the generated instance
        #[arg(long, default_value = "20")]
        vertices: usize,

        /// Algorithm: 2opt, 3opt, sa2opt, sa3opt, ga, aco, pso, exact, mtz, dp
        #[arg(short, long, default_value = "2opt")]
        algorithm: Algorithm,

        /// Initial tours: random or nearest-neighbor
        #[arg(long, default_value = "random")]
        initializer: Initializer,

        /// Time limit in seconds
        #[arg(short, long, default_value = "60")]
        time_limit: f64,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Append the run to this CSV log
        #[arg(long)]
        log: Option<PathBuf>,

        /// Write the solution as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run several algorithms on one instance
    Benchmark {
        /// Instance JSON file; a random instance is generated when omitted
        #[arg(short, long)]
        instance: Option<PathBuf>,

        /// Vertices of the generated instance
        #[arg(long, default_value = "20")]
        vertices: usize,

        /// Comma-separated algorithms (default: all heuristics)
        #[arg(short, long, value_delimiter = ',')]
        algorithms: Vec<Algorithm>,

        /// Number of runs per stochastic algorithm
        #[arg(short, long, default_value = "5")]
        runs: usize,

        /// Time limit per run
        #[arg(short, long, default_value = "60")]
        time_limit: f64,

        /// Exact solver time limit
        #[arg(long, default_value = "300")]
        exact_time_limit: f64,

        #[arg(long, default_value = "random")]
        initializer: Initializer,

        /// Seed of the first run
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// CSV result log (appended)
        #[arg(short, long, default_value = "results.csv")]
        output: PathBuf,

        /// Also write per-algorithm statistics to this CSV file
        #[arg(long)]
        stats: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::from_default_env().filter_level(level).init();

    match cli.command {
        Commands::Generate { vertices, seed, output } => generate_instance(vertices, seed, &output),

        Commands::Solve { instance, vertices, algorithm, initializer, time_limit, seed, log, output } => {
            let graph = load_or_generate(instance.as_deref(), vertices, seed);
            solve_instance(&graph, algorithm, initializer, time_limit, seed, log, output);
        }

        Commands::Benchmark {
            instance,
            vertices,
            algorithms,
            runs,
            time_limit,
            exact_time_limit,
            initializer,
            seed,
            output,
            stats,
        } => {
            let graph = load_or_generate(instance.as_deref(), vertices, seed);
            let config = BenchmarkConfig { runs, seed, time_limit, exact_time_limit, initializer, ..Default::default() };
            run_benchmark(&graph, algorithms, config, &output, stats);
        }
    }
}

fn fail(context: &str, e: impl std::fmt::Display) -> ! {
    eprintln!("{}: {}", context, e);
    std::process::exit(1);
}

fn load_or_generate(path: Option<&Path>, vertices: usize, seed: u64) -> Graph {
    match path {
        Some(path) => {
            println!("Loading instance from {:?}...", path);
            Graph::load_json(path).unwrap_or_else(|e| fail("Error loading instance", e))
        }
        None => {
            println!("Generating random instance with {} vertices (seed {})...", vertices, seed);
            Graph::random(vertices, seed).unwrap_or_else(|e| fail("Error generating instance", e))
        }
    }
}

fn generate_instance(vertices: usize, seed: u64, output: &Path) {
    let graph = Graph::random(vertices, seed).unwrap_or_else(|e| fail("Error generating instance", e));
    graph.save_json(output).unwrap_or_else(|e| fail("Error saving instance", e));
    println!("Instance with {} vertices saved to {:?}", graph.len(), output);
}

fn solve_instance(
    graph: &Graph,
    algorithm: Algorithm,
    initializer: Initializer,
    time_limit: f64,
    seed: u64,
    log: Option<PathBuf>,
    output: Option<PathBuf>,
) {
    let config = BenchmarkConfig { time_limit, exact_time_limit: time_limit, initializer, seed, ..Default::default() };
    let mut solver = algorithm.build(graph.clone(), &config, seed).unwrap_or_else(|e| fail("Error", e));

    println!("Solving with {} ...", solver.name());
    let solution = solver.run();
    print_solution(&solution);

    if let Some(path) = log {
        let record = RunRecord::from_solution(&solution, graph.len(), seed);
        append_records(&path, &[record]).unwrap_or_else(|e| fail("Error writing log", e));
        println!("Run appended to {:?}", path);
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&solution).unwrap_or_else(|e| fail("Error serializing solution", e));
        std::fs::write(&path, json).unwrap_or_else(|e| fail("Error saving solution", e));
        println!("Solution saved to {:?}", path);
    }
}

fn print_solution(solution: &Solution) {
    println!("\n=== Solution ===");
    println!("Algorithm:   {}", solution.algorithm);
    if solution.is_resolved() {
        println!("Cost:        {:.4}", solution.cost);
    } else {
        println!("Cost:        unresolved");
    }
    println!("Time:        {:.3}s", solution.computation_time);
    if let Some(iterations) = solution.iterations {
        println!("Iterations:  {}", iterations);
    }
    println!("Termination: {}", solution.termination);
    if solution.tour.len() <= 30 {
        println!("Tour:        {:?}", solution.tour);
    }
}

fn run_benchmark(
    graph: &Graph,
    algorithms: Vec<Algorithm>,
    config: BenchmarkConfig,
    output: &Path,
    stats: Option<PathBuf>,
) {
    let algorithms = if algorithms.is_empty() {
        Algorithm::ALL.iter().copied().filter(|a| !a.is_deterministic()).collect()
    } else {
        algorithms
    };

    let mut benchmark = Benchmark::new(config);
    let pb = ProgressBar::new(benchmark.job_count(&algorithms) as u64);
    if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} runs") {
        pb.set_style(style.progress_chars("#>-"));
    }
    benchmark = benchmark.with_progress(pb.clone());

    if let Err(e) = benchmark.run(graph, &algorithms) {
        pb.abandon();
        fail("Benchmark failed", e);
    }
    pb.finish_and_clear();

    println!("{}", benchmark.generate_report());

    benchmark.append_to_csv(output).unwrap_or_else(|e| fail("Error writing results", e));
    println!("Results appended to {:?}", output);

    if let Some(path) = stats {
        benchmark.export_statistics_csv(&path).unwrap_or_else(|e| fail("Error writing statistics", e));
        println!("Statistics saved to {:?}", path);
    }
}
