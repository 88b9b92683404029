//! Committed sync of a replica whose ledger fell behind.

use quorum_simulation::{NetworkConfig, NodeIndex, SimulationRunner};
use quorum_sync::SyncConfig;
use std::time::Duration;
use tracing_test::traced_test;

const BEHIND: NodeIndex = 3;

fn leader(view: u64) -> NodeIndex {
    (view % 3) as NodeIndex
}

#[traced_test]
#[test]
fn test_parked_sync_resumes_after_ledger_catches_up() {
    let config = SyncConfig::default().with_ledger_sync_batch_size(3);
    let mut runner = SimulationRunner::with_sync_config(NetworkConfig::default(), config, 5);

    runner.network_mut().isolate_node(BEHIND);
    for view in 1..=6 {
        assert!(runner.run_view(leader(view), view, 2).is_some());
    }
    assert_eq!(
        runner.node(BEHIND).unwrap().committed_proof().state_version(),
        0
    );
    runner.network_mut().heal_all();

    // The proposal's committed QC sits far above the replica's ledger.
    let high_qc = runner.node(0).unwrap().store().high_qc();
    let target_version = runner.node(0).unwrap().committed_proof().state_version();
    assert_eq!(target_version, 8);

    let vertex = runner.propose(leader(7), 7, 2).unwrap();
    runner.run_for(Duration::from_secs(3));

    let node = runner.node(BEHIND).unwrap();
    assert_eq!(node.committed_proof().state_version(), target_version);
    assert!(node.ledger_sync().counters().batches_applied >= 2);
    assert!(!node.ledger_sync().is_syncing());
    assert_eq!(node.bft_sync().counters().ledger_sync_requests, 1);
    assert_eq!(node.bft_sync().counters().rebuilds, 1);
    assert!(node
        .store()
        .contains_vertex(&high_qc.highest_qc().proposed().vertex_id));
    assert_eq!(node.bft_sync().pending_requests().count(), 0);
    assert_eq!(runner.root_id(BEHIND), runner.root_id(0));

    // From here the replica follows consensus like any other.
    assert!(runner.form_qc(leader(7), &vertex).is_some());
    runner.run_for(Duration::from_secs(1));
    for view in 8..=9 {
        assert!(runner.run_view(leader(view), view, 2).is_some());
    }
    assert_eq!(runner.root_id(BEHIND), runner.root_id(0));
    assert_eq!(
        runner.node(BEHIND).unwrap().committed_proof().state_version(),
        runner.node(0).unwrap().committed_proof().state_version()
    );
    assert_eq!(runner.stats().halts, 0);
}
