//! Benchmarking and experimentation module.
//!
//! Runs selected algorithms (several seeded runs each) against one graph,
//! collects [`RunRecord`]s, aggregates them per algorithm and appends them to a
//! CSV result log. Every run gets its own clone of the graph, so independent
//! runs can go to rayon worker threads.

use std::collections::HashMap;
use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::str::FromStr;

use chrono::Utc;
use indicatif::ProgressBar;
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Distribution, Max, Min};

use crate::error::Result;
use crate::exact::{DynamicProgramming, ExactConfig, MillerTuckerZemlin, SubtourElimination};
use crate::graph::Graph;
use crate::heuristics::aco::{ACOConfig, AntColonyOptimization};
use crate::heuristics::construction::Initializer;
use crate::heuristics::genetic::{GAConfig, GeneticAlgorithm};
use crate::heuristics::local_search::{LocalSearchConfig, LocalSearchSolver};
use crate::heuristics::pso::{PSOConfig, ParticleSwarmOptimization};
use crate::solution::{Solution, Solver, Termination};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    TwoOpt,
    ThreeOpt,
    AnnealedTwoOpt,
    AnnealedThreeOpt,
    Genetic,
    AntColony,
    ParticleSwarm,
    Exact,
    MillerTuckerZemlin,
    DynamicProgramming,
}

impl Algorithm {
    pub const ALL: [Algorithm; 10] = [
        Algorithm::TwoOpt,
        Algorithm::ThreeOpt,
        Algorithm::AnnealedTwoOpt,
        Algorithm::AnnealedThreeOpt,
        Algorithm::Genetic,
        Algorithm::AntColony,
        Algorithm::ParticleSwarm,
        Algorithm::Exact,
        Algorithm::MillerTuckerZemlin,
        Algorithm::DynamicProgramming,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::TwoOpt => "2opt",
            Algorithm::ThreeOpt => "3opt",
            Algorithm::AnnealedTwoOpt => "sa2opt",
            Algorithm::AnnealedThreeOpt => "sa3opt",
            Algorithm::Genetic => "ga",
            Algorithm::AntColony => "aco",
            Algorithm::ParticleSwarm => "pso",
            Algorithm::Exact => "exact",
            Algorithm::MillerTuckerZemlin => "mtz",
            Algorithm::DynamicProgramming => "dp",
        }
    }

    /// Same result for every seed.
    pub fn is_deterministic(&self) -> bool {
        matches!(self, Algorithm::Exact | Algorithm::MillerTuckerZemlin | Algorithm::DynamicProgramming)
    }

    /// Build a ready-to-run solver over its own copy of `graph`.
    pub fn build(&self, graph: Graph, config: &BenchmarkConfig, seed: u64) -> Result<Box<dyn Solver + Send>> {
        let local = |base: LocalSearchConfig| LocalSearchConfig {
            initializer: config.initializer,
            time_limit: config.time_limit,
            seed,
            ..base
        };

        Ok(match self {
            Algorithm::TwoOpt => Box::new(LocalSearchSolver::new(graph, local(LocalSearchConfig::two_opt()))),
            Algorithm::ThreeOpt => Box::new(LocalSearchSolver::new(graph, local(LocalSearchConfig::three_opt()))),
            Algorithm::AnnealedTwoOpt => {
                Box::new(LocalSearchSolver::new(graph, local(LocalSearchConfig::annealed_two_opt())))
            }
            Algorithm::AnnealedThreeOpt => {
                Box::new(LocalSearchSolver::new(graph, local(LocalSearchConfig::annealed_three_opt())))
            }
            Algorithm::Genetic => Box::new(GeneticAlgorithm::new(
                graph,
                GAConfig {
                    initializer: config.initializer,
                    time_limit: config.time_limit,
                    seed,
                    ..config.genetic.clone()
                },
            )),
            Algorithm::AntColony => Box::new(AntColonyOptimization::new(
                graph,
                ACOConfig { time_limit: config.time_limit, seed, ..config.ant_colony.clone() },
            )),
            Algorithm::ParticleSwarm => Box::new(ParticleSwarmOptimization::new(
                graph,
                PSOConfig {
                    initializer: config.initializer,
                    time_limit: config.time_limit,
                    seed,
                    ..config.particle_swarm.clone()
                },
            )),
            Algorithm::Exact => Box::new(SubtourElimination::new(
                graph,
                ExactConfig { time_limit: config.exact_time_limit, ..config.exact.clone() },
            )),
            Algorithm::MillerTuckerZemlin => Box::new(MillerTuckerZemlin::new(
                graph,
                ExactConfig { time_limit: config.exact_time_limit, ..config.exact.clone() },
            )),
            Algorithm::DynamicProgramming => Box::new(DynamicProgramming::new(graph)?),
        })
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key = s.to_ascii_lowercase().replace(['-', '_'], "");
        Algorithm::ALL
            .iter()
            .copied()
            .find(|a| a.name() == key)
            .or(match key.as_str() {
                "twoopt" => Some(Algorithm::TwoOpt),
                "threeopt" => Some(Algorithm::ThreeOpt),
                "genetic" => Some(Algorithm::Genetic),
                "antcolony" => Some(Algorithm::AntColony),
                "particleswarm" => Some(Algorithm::ParticleSwarm),
                "heldkarp" => Some(Algorithm::DynamicProgramming),
                "dfj" => Some(Algorithm::Exact),
                "millertuckerzemlin" => Some(Algorithm::MillerTuckerZemlin),
                _ => None,
            })
            .ok_or_else(|| {
                let names: Vec<&str> = Algorithm::ALL.iter().map(|a| a.name()).collect();
                format!("unknown algorithm '{s}' (expected one of {})", names.join(", "))
            })
    }
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Number of runs per stochastic algorithm
    pub runs: usize,
    /// Seed of the first run; run `k` uses `seed + k`
    pub seed: u64,
    /// Time limit per heuristic run in seconds
    pub time_limit: f64,
    /// Exact solver time limit
    pub exact_time_limit: f64,
    pub initializer: Initializer,
    pub genetic: GAConfig,
    pub ant_colony: ACOConfig,
    pub particle_swarm: PSOConfig,
    pub exact: ExactConfig,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            runs: 5,
            seed: 42,
            time_limit: 60.0,
            exact_time_limit: 300.0,
            initializer: Initializer::Random,
            genetic: GAConfig::default(),
            ant_colony: ACOConfig::default(),
            particle_swarm: PSOConfig::default(),
            exact: ExactConfig::default(),
        }
    }
}

/// One row of the result log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub algorithm: String,
    pub vertices: usize,
    pub seed: u64,
    pub cost: f64,
    pub time_secs: f64,
    pub iterations: Option<usize>,
    pub termination: Termination,
    /// RFC 3339, UTC
    pub timestamp: String,
}

impl RunRecord {
    pub fn from_solution(solution: &Solution, vertices: usize, seed: u64) -> Self {
        RunRecord {
            algorithm: solution.algorithm.clone(),
            vertices,
            seed,
            cost: solution.cost,
            time_secs: solution.computation_time,
            iterations: solution.iterations,
            termination: solution.termination,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Aggregated statistics for an algorithm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmStatistics {
    pub algorithm: String,
    pub runs: usize,
    /// Runs that produced a tour (excludes the unresolved sentinel)
    pub resolved: usize,
    pub mean_cost: f64,
    pub std_dev_cost: f64,
    pub best_cost: f64,
    pub worst_cost: f64,
    pub mean_time: f64,
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    progress: Option<ProgressBar>,
    records: Vec<RunRecord>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark { config, progress: None, records: Vec::new() }
    }

    /// Tick `progress` once per finished run.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Number of runs `run` performs for `algorithms`.
    pub fn job_count(&self, algorithms: &[Algorithm]) -> usize {
        algorithms
            .iter()
            .map(|a| if a.is_deterministic() { 1 } else { self.config.runs.max(1) })
            .sum()
    }

    /// Run every algorithm on `graph`; runs are spread over rayon workers.
    pub fn run(&mut self, graph: &Graph, algorithms: &[Algorithm]) -> Result<Vec<RunRecord>> {
        let jobs: Vec<(Algorithm, u64)> = algorithms
            .iter()
            .flat_map(|&a| {
                let runs = if a.is_deterministic() { 1 } else { self.config.runs.max(1) };
                (0..runs as u64).map(move |k| (a, k))
            })
            .map(|(a, k)| (a, self.config.seed + k))
            .collect();

        info!("Running {} jobs on {} vertices", jobs.len(), graph.len());

        let config = &self.config;
        let progress = self.progress.as_ref();
        let records: Vec<Result<RunRecord>> = jobs
            .par_iter()
            .map(|&(algorithm, seed)| {
                let mut solver = algorithm.build(graph.clone(), config, seed)?;
                let mut solution = solver.run();
                solution.algorithm = algorithm.name().to_string();
                if let Some(pb) = progress {
                    pb.inc(1);
                }
                if !solution.is_resolved() {
                    warn!("{} (seed {}) did not produce a tour", algorithm, seed);
                }
                Ok(RunRecord::from_solution(&solution, graph.len(), seed))
            })
            .collect();

        let records = records.into_iter().collect::<Result<Vec<_>>>()?;
        self.records.extend(records.iter().cloned());
        Ok(records)
    }

    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    /// Per-algorithm statistics, in first-seen order.
    pub fn compute_statistics(&self) -> Vec<AlgorithmStatistics> {
        compute_statistics(&self.records)
    }

    /// Append every record collected so far to `path`.
    pub fn append_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        append_records(path, &self.records)
    }

    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for stat in self.compute_statistics() {
            writer.serialize(stat)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("          TSP Benchmark Report\n");
        report.push_str("========================================\n\n");

        report.push_str(&format!(
            "{:<10} {:>9} {:>12} {:>10} {:>12} {:>12} {:>10}\n",
            "Algorithm", "Resolved", "Mean Cost", "Std Dev", "Best Cost", "Worst Cost", "Mean Time"
        ));
        report.push_str("-".repeat(81).as_str());
        report.push('\n');

        for stat in self.compute_statistics() {
            report.push_str(&format!(
                "{:<10} {:>9} {:>12.2} {:>10.2} {:>12.2} {:>12.2} {:>9.3}s\n",
                stat.algorithm,
                format!("{}/{}", stat.resolved, stat.runs),
                stat.mean_cost,
                stat.std_dev_cost,
                stat.best_cost,
                stat.worst_cost,
                stat.mean_time
            ));
        }

        report.push_str("-".repeat(81).as_str());
        report.push('\n');
        report
    }
}

pub fn compute_statistics(records: &[RunRecord]) -> Vec<AlgorithmStatistics> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&RunRecord>> = HashMap::new();
    for record in records {
        let key = record.algorithm.as_str();
        if !groups.contains_key(key) {
            order.push(key);
        }
        groups.entry(key).or_default().push(record);
    }

    order
        .into_iter()
        .map(|algorithm| {
            let group = &groups[algorithm];
            let resolved: Vec<&RunRecord> = group.iter().copied().filter(|r| r.cost.is_finite()).collect();
            let costs = Data::new(resolved.iter().map(|r| r.cost).collect::<Vec<f64>>());
            let times = Data::new(group.iter().map(|r| r.time_secs).collect::<Vec<f64>>());

            let (mean_cost, std_dev_cost, best_cost, worst_cost) = if resolved.is_empty() {
                (f64::NAN, f64::NAN, f64::NAN, f64::NAN)
            } else {
                let std_dev = costs.std_dev().filter(|s| s.is_finite()).unwrap_or(0.0);
                (costs.mean().unwrap_or(f64::NAN), std_dev, costs.min(), costs.max())
            };

            AlgorithmStatistics {
                algorithm: algorithm.to_string(),
                runs: group.len(),
                resolved: resolved.len(),
                mean_cost,
                std_dev_cost,
                best_cost,
                worst_cost,
                mean_time: times.mean().unwrap_or(0.0),
            }
        })
        .collect()
}

/// Append `records` to a CSV log, writing the header only when the file is new or empty.
pub fn append_records<P: AsRef<Path>>(path: P, records: &[RunRecord]) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let needs_header = file.metadata()?.len() == 0;
    let mut writer = csv::WriterBuilder::new().has_headers(needs_header).from_writer(file);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<RunRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::unit_square;

    fn record(algorithm: &str, cost: f64, time: f64) -> RunRecord {
        RunRecord {
            algorithm: algorithm.to_string(),
            vertices: 4,
            seed: 0,
            cost,
            time_secs: time,
            iterations: Some(1),
            termination: Termination::LocalOptimum,
            timestamp: String::new(),
        }
    }

    fn quick_config() -> BenchmarkConfig {
        BenchmarkConfig {
            runs: 2,
            time_limit: 10.0,
            exact_time_limit: 30.0,
            genetic: GAConfig { population_size: 10, max_generations: 10, ..Default::default() },
            ant_colony: ACOConfig { num_ants: 5, max_iterations: 10, ..Default::default() },
            particle_swarm: PSOConfig { num_particles: 30, max_iterations: 10, ..Default::default() },
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!("2opt".parse::<Algorithm>().unwrap(), Algorithm::TwoOpt);
        assert_eq!("SA-3opt".parse::<Algorithm>().unwrap(), Algorithm::AnnealedThreeOpt);
        assert_eq!("held-karp".parse::<Algorithm>().unwrap(), Algorithm::DynamicProgramming);
        assert_eq!("Miller-Tucker-Zemlin".parse::<Algorithm>().unwrap(), Algorithm::MillerTuckerZemlin);
        assert!("tabu".parse::<Algorithm>().is_err());
        for a in Algorithm::ALL {
            assert_eq!(a.name().parse::<Algorithm>().unwrap(), a);
        }
    }

    #[test]
    fn test_statistics() {
        let records = vec![
            record("ga", 10.0, 1.0),
            record("aco", 7.0, 3.0),
            record("ga", 14.0, 2.0),
            record("exact", crate::solution::UNRESOLVED_COST, 5.0),
        ];
        let stats = compute_statistics(&records);

        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].algorithm, "ga");
        assert_eq!(stats[0].runs, 2);
        assert!((stats[0].mean_cost - 12.0).abs() < 1e-12);
        assert!((stats[0].std_dev_cost - 8f64.sqrt()).abs() < 1e-9);
        assert_eq!(stats[0].best_cost, 10.0);
        assert_eq!(stats[0].worst_cost, 14.0);
        assert!((stats[0].mean_time - 1.5).abs() < 1e-12);
        assert_eq!(stats[1].std_dev_cost, 0.0);
        assert_eq!(stats[2].resolved, 0);
        assert!(stats[2].mean_cost.is_nan());
    }

    #[test]
    fn test_benchmark_runs_every_job() {
        let mut bench = Benchmark::new(quick_config());
        let algorithms = [Algorithm::TwoOpt, Algorithm::ParticleSwarm, Algorithm::DynamicProgramming];
        assert_eq!(bench.job_count(&algorithms), 5);

        let records = bench.run(&unit_square(), &algorithms).unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[0].algorithm, "2opt");
        assert_eq!(records[1].seed, 43);
        assert!(records.iter().all(|r| (r.cost - 4.0).abs() < 1e-9));
        assert!(bench.generate_report().contains("pso"));
    }

    #[test]
    fn test_exact_formulations_agree() {
        let graph = Graph::random(6, 21).unwrap();
        let mut bench = Benchmark::new(quick_config());
        let algorithms = [Algorithm::Exact, Algorithm::MillerTuckerZemlin, Algorithm::DynamicProgramming];
        assert_eq!(bench.job_count(&algorithms), 3);

        let records = bench.run(&graph, &algorithms).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.termination == Termination::Optimal));
        assert!(records.iter().all(|r| (r.cost - records[2].cost).abs() < 1e-6));
    }

    #[test]
    fn test_csv_log_appends_single_header() {
        let path = std::env::temp_dir().join(format!("tsp-solvers-log-{}.csv", std::process::id()));
        let _ = std::fs::remove_file(&path);

        append_records(&path, &[record("ga", 10.0, 1.0)]).unwrap();
        append_records(&path, &[record("aco", 7.0, 3.0), record("pso", 8.0, 2.0)]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("algorithm").count(), 1);

        let back = read_records(&path).unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back[1].algorithm, "aco");
        assert_eq!(back[2].iterations, Some(1));
        assert_eq!(back[0].termination, Termination::LocalOptimum);

        let _ = std::fs::remove_file(&path);
    }
}
