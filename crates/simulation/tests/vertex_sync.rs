//! Vertex sync of a replica that missed part of the chain.

use quorum_simulation::{NetworkConfig, NodeIndex, SimulationRunner};
use std::time::Duration;
use tracing_test::traced_test;

const LAGGING: NodeIndex = 3;

/// Leaders rotate over the replicas that stay in sync.
fn leader(view: u64) -> NodeIndex {
    (view % 3) as NodeIndex
}

fn run_views(runner: &mut SimulationRunner, views: std::ops::RangeInclusive<u64>) {
    for view in views {
        assert!(
            runner.run_view(leader(view), view, 1).is_some(),
            "view {view} should certify"
        );
    }
}

#[traced_test]
#[test]
fn test_lagging_replica_fetches_missing_chain_once_responses_flow() {
    let mut runner = SimulationRunner::new(NetworkConfig::default(), 7);

    run_views(&mut runner, 1..=4);
    assert_eq!(runner.root_id(LAGGING), runner.root_id(0));

    // The lagging replica misses two views and every vertex response.
    for kind in [
        "ProposalReceived",
        "ViewQuorumReached",
        "GetVerticesResponseReceived",
    ] {
        runner.network_mut().withhold(LAGGING, kind);
    }
    run_views(&mut runner, 5..=6);

    // Proposals flow again, so the replica learns it is behind and starts
    // fetching, but its requests keep timing out.
    runner.network_mut().release(LAGGING, "ProposalReceived");
    runner.network_mut().release(LAGGING, "ViewQuorumReached");
    run_views(&mut runner, 7..=7);
    runner.run_for(Duration::from_secs(2));

    let lagging = runner.node(LAGGING).unwrap();
    assert!(lagging.bft_sync().counters().request_timeouts > 0);
    assert!(lagging.bft_sync().pending_requests().count() > 0);
    assert_ne!(runner.root_id(LAGGING), runner.root_id(0));

    runner.network_mut().release_all();
    runner.run_for(Duration::from_secs(5));
    run_views(&mut runner, 8..=10);
    runner.run_for(Duration::from_secs(2));

    let expected = runner.root_id(0);
    for node in 1..4 {
        assert_eq!(runner.root_id(node), expected, "node {node} root");
    }

    let counters = runner.node(LAGGING).unwrap().bft_sync().counters();
    assert!(counters.responses_processed >= 2);
    assert!(
        counters.request_timeouts <= 30,
        "took {} timeouts to converge",
        counters.request_timeouts
    );
    assert!(!runner.is_halted(LAGGING));
    assert_eq!(runner.stats().halts, 0);
}

#[traced_test]
#[test]
fn test_replica_missing_one_view_syncs_from_quorum_certificate() {
    let mut runner = SimulationRunner::new(NetworkConfig::default(), 3);

    run_views(&mut runner, 1..=3);

    runner.network_mut().withhold(LAGGING, "ProposalReceived");
    run_views(&mut runner, 4..=4);
    runner.network_mut().release_all();

    // The QC for view 4 made the replica fetch the vertex it never saw.
    let qc4 = runner.node(0).unwrap().store().high_qc().highest_qc().clone();
    let lagging = runner.node(LAGGING).unwrap();
    assert!(lagging.store().contains_vertex(&qc4.proposed().vertex_id));
    assert!(lagging.bft_sync().counters().responses_processed >= 1);

    run_views(&mut runner, 5..=6);
    assert_eq!(runner.root_id(LAGGING), runner.root_id(0));
}
