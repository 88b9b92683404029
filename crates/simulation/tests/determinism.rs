//! Tests for deterministic simulation.

use quorum_simulation::{NetworkConfig, NodeIndex, SimulationRunner, SimulationStats};
use quorum_types::Hash;
use std::time::Duration;

fn lossy_config() -> NetworkConfig {
    NetworkConfig {
        packet_loss_rate: 0.1,
        ..NetworkConfig::default()
    }
}

fn run(seed: u64) -> (SimulationStats, Vec<Option<Hash>>) {
    let mut runner = SimulationRunner::new(lossy_config(), seed);
    for view in 1..=8 {
        let _ = runner.run_view((view % 4) as NodeIndex, view, 2);
    }
    runner.run_for(Duration::from_secs(5));

    let roots = (0..4).map(|node| runner.root_id(node)).collect();
    (runner.stats().clone(), roots)
}

#[test]
fn test_determinism_same_seed() {
    let (stats1, roots1) = run(12345);
    let (stats2, roots2) = run(12345);

    assert_eq!(stats1, stats2, "Same seed should produce identical stats");
    assert_eq!(roots1, roots2, "Same seed should produce identical roots");
    assert!(stats1.events_processed > 0);
}

#[test]
fn test_lossy_network_drops_messages() {
    let (stats, _) = run(99);

    assert!(stats.messages_dropped_loss > 0);
    assert!(stats.delivery_rate() < 1.0);
    assert_eq!(stats.halts, 0);
}
