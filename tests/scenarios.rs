use tsp_solvers::benchmark::{Algorithm, BenchmarkConfig};
use tsp_solvers::exact::{held_karp, ExactConfig, MillerTuckerZemlin, SubtourElimination};
use tsp_solvers::graph::{Graph, Vertex};
use tsp_solvers::heuristics::construction::Initializer;
use tsp_solvers::solution::{is_permutation, Solver, Termination};

fn unit_square() -> Graph {
    Graph::from_vertices(vec![
        Vertex::new(0, 0.0, 0.0),
        Vertex::new(1, 1.0, 0.0),
        Vertex::new(2, 1.0, 1.0),
        Vertex::new(3, 0.0, 1.0),
    ])
    .unwrap()
}

#[test]
fn every_engine_solves_the_unit_square() {
    let graph = unit_square();
    let config = BenchmarkConfig {
        time_limit: 30.0,
        exact_time_limit: 30.0,
        initializer: Initializer::Random,
        particle_swarm: tsp_solvers::heuristics::pso::PSOConfig { num_particles: 30, ..Default::default() },
        ..Default::default()
    };

    for algorithm in Algorithm::ALL {
        for seed in [0, 4, 42] {
            let mut solver = algorithm.build(graph.clone(), &config, seed).unwrap();
            let solution = solver.run();

            assert!(is_permutation(&solution.tour, 4), "{algorithm}: {:?}", solution.tour);
            assert!((solution.cost - 4.0).abs() < 1e-9, "{algorithm} seed {seed}: cost {}", solution.cost);
            assert!((graph.tour_cost(&solution.tour) - solution.cost).abs() < 1e-9);
            assert!(!solution.termination.timed_out(), "{algorithm} ran out of time");
        }
    }
}

fn brute_force(graph: &Graph) -> f64 {
    fn permute(rest: &mut Vec<usize>, k: usize, graph: &Graph, best: &mut f64) {
        if k == rest.len() {
            let mut tour = vec![0];
            tour.extend_from_slice(rest);
            *best = best.min(graph.tour_cost(&tour));
            return;
        }
        for i in k..rest.len() {
            rest.swap(k, i);
            permute(rest, k + 1, graph, best);
            rest.swap(k, i);
        }
    }
    let mut rest: Vec<usize> = (1..graph.len()).collect();
    let mut best = f64::INFINITY;
    permute(&mut rest, 0, graph, &mut best);
    best
}

#[test]
fn exact_matches_brute_force_on_five_vertices() {
    for seed in 0..5 {
        let graph = Graph::random(5, seed).unwrap();
        let optimum = brute_force(&graph);

        let mut exact = SubtourElimination::new(graph.clone(), ExactConfig::default());
        let solution = exact.run();
        assert!((solution.cost - optimum).abs() < 1e-6, "seed {seed}");

        let mut mtz = MillerTuckerZemlin::new(graph.clone(), ExactConfig::default());
        let solution = mtz.run();
        assert!((solution.cost - optimum).abs() < 1e-6, "mtz seed {seed}");
    }
}

#[test]
fn exact_matches_held_karp_on_random_graphs() {
    for seed in 0..3 {
        let graph = Graph::random(7, seed).unwrap();
        let (_, optimum) = held_karp(&graph).unwrap();

        let mut exact = SubtourElimination::new(graph.clone(), ExactConfig { time_limit: 120.0, ..Default::default() });
        let solution = exact.run();

        assert_eq!(solution.termination, Termination::Optimal);
        assert!(is_permutation(&solution.tour, 7));
        assert!((solution.cost - optimum).abs() < 1e-6, "seed {seed}: {} vs {}", solution.cost, optimum);
        assert!(exact.solve_calls() >= 1);
    }
}

#[test]
fn exact_handles_explicit_cost_matrix() {
    let costs = vec![
        vec![0.0, 3.0, 9.0, 4.0, 7.0],
        vec![3.0, 0.0, 2.0, 8.0, 6.0],
        vec![9.0, 2.0, 0.0, 5.0, 1.0],
        vec![4.0, 8.0, 5.0, 0.0, 3.0],
        vec![7.0, 6.0, 1.0, 3.0, 0.0],
    ];
    let graph = Graph::from_cost_matrix(&costs).unwrap();
    let (_, optimum) = held_karp(&graph).unwrap();

    let mut exact = SubtourElimination::new(graph, ExactConfig::default());
    let solution = exact.run();
    assert!(solution.is_resolved());
    assert!((solution.cost - optimum).abs() < 1e-9);
}

#[test]
fn heuristics_never_beat_the_optimum() {
    let graph = Graph::random(9, 5).unwrap();
    let (_, optimum) = held_karp(&graph).unwrap();
    let config = BenchmarkConfig { time_limit: 10.0, ..Default::default() };

    for algorithm in Algorithm::ALL.iter().filter(|a| !a.is_deterministic()) {
        let mut solver = algorithm.build(graph.clone(), &config, 3).unwrap();
        let solution = solver.run();
        assert!(is_permutation(&solution.tour, 9), "{algorithm}");
        assert!(solution.cost >= optimum - 1e-9, "{algorithm}: {} < {}", solution.cost, optimum);
    }
}

#[test]
fn zero_time_budget_still_returns_a_tour() {
    let graph = Graph::random(12, 1).unwrap();
    let config = BenchmarkConfig { time_limit: 0.0, ..Default::default() };

    for algorithm in [Algorithm::TwoOpt, Algorithm::Genetic, Algorithm::ParticleSwarm] {
        let mut solver = algorithm.build(graph.clone(), &config, 1).unwrap();
        let solution = solver.run();
        assert_eq!(solution.termination, Termination::TimeLimit, "{algorithm}");
        assert!(is_permutation(&solution.tour, 12), "{algorithm}");
    }
}

#[test]
fn graph_json_round_trip() {
    let path = std::env::temp_dir().join(format!("tsp-solvers-graph-{}.json", std::process::id()));
    let graph = Graph::random(15, 11).unwrap();

    graph.save_json(&path).unwrap();
    let back = Graph::load_json(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(back.len(), 15);
    let coordinates = |g: &Graph| g.vertices().iter().map(|v| (v.id, v.coordinates())).collect::<Vec<_>>();
    assert_eq!(coordinates(&back), coordinates(&graph));
    assert_eq!(back.distance_matrix(), graph.distance_matrix());
}
