//! Simulated network with deterministic latency, packet loss, partitions and
//! withheld message kinds.

use crate::NodeIndex;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::time::Duration;

/// Configuration for simulated network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Number of validators. Node `i` is `ValidatorId(i)`.
    pub num_validators: u32,
    /// Base one-way latency.
    pub latency: Duration,
    /// Jitter as a fraction of base latency (0.0 - 1.0).
    pub jitter_fraction: f64,
    /// Packet loss rate (0.0 - 1.0). Messages are dropped with this probability.
    pub packet_loss_rate: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            num_validators: 4,
            latency: Duration::from_millis(50),
            jitter_fraction: 0.1,
            packet_loss_rate: 0.0,
        }
    }
}

/// Why a message was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dropped {
    Partition,
    Withheld,
    Loss,
}

/// Simulated network for deterministic message delivery.
///
/// Supports:
/// - Configurable latency with jitter
/// - Packet loss (probabilistic message drops)
/// - Network partitions (blocking communication between node pairs)
/// - Withholding one kind of inbound event from a node
#[derive(Debug)]
pub struct SimulatedNetwork {
    config: NetworkConfig,
    /// Partitioned node pairs. If (a, b) is in this set, messages from a to b are dropped.
    /// Partitions are directional - add both (a, b) and (b, a) for bidirectional partition.
    partitions: HashSet<(NodeIndex, NodeIndex)>,
    /// Event kinds (by `Event::type_name`) never delivered to a node.
    withheld: HashSet<(NodeIndex, &'static str)>,
}

impl SimulatedNetwork {
    /// Create a new simulated network.
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            partitions: HashSet::new(),
            withheld: HashSet::new(),
        }
    }

    // ─── Partition Management ───

    /// Check if two nodes are partitioned (message from `from` to `to` would be dropped).
    pub fn is_partitioned(&self, from: NodeIndex, to: NodeIndex) -> bool {
        self.partitions.contains(&(from, to))
    }

    /// Create a unidirectional partition: messages from `from` to `to` are dropped.
    pub fn partition_unidirectional(&mut self, from: NodeIndex, to: NodeIndex) {
        self.partitions.insert((from, to));
    }

    /// Create a bidirectional partition between two nodes.
    pub fn partition_bidirectional(&mut self, a: NodeIndex, b: NodeIndex) {
        self.partitions.insert((a, b));
        self.partitions.insert((b, a));
    }

    /// Isolate a node from all other nodes in the network.
    pub fn isolate_node(&mut self, node: NodeIndex) {
        for other in self.all_nodes() {
            if other != node {
                self.partitions.insert((node, other));
                self.partitions.insert((other, node));
            }
        }
    }

    /// Heal all partitions - restore full network connectivity.
    pub fn heal_all(&mut self) {
        self.partitions.clear();
    }

    /// Get the number of active partition pairs.
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    // ─── Withheld Events ───

    /// Stop delivering events of kind `event_type` to `node`.
    pub fn withhold(&mut self, node: NodeIndex, event_type: &'static str) {
        self.withheld.insert((node, event_type));
    }

    /// Resume delivering events of kind `event_type` to `node`.
    pub fn release(&mut self, node: NodeIndex, event_type: &'static str) {
        self.withheld.remove(&(node, event_type));
    }

    /// Resume delivering every withheld event kind.
    pub fn release_all(&mut self) {
        self.withheld.clear();
    }

    pub fn is_withheld(&self, node: NodeIndex, event_type: &str) -> bool {
        self.withheld
            .iter()
            .any(|(n, kind)| *n == node && *kind == event_type)
    }

    // ─── Packet Loss ───

    /// Check if a packet should be dropped based on the configured loss rate.
    /// Returns true if the packet should be dropped.
    pub fn should_drop_packet(&self, rng: &mut ChaCha8Rng) -> bool {
        self.config.packet_loss_rate > 0.0 && rng.gen::<f64>() < self.config.packet_loss_rate
    }

    /// Set the packet loss rate (0.0 - 1.0).
    pub fn set_packet_loss_rate(&mut self, rate: f64) {
        self.config.packet_loss_rate = rate.clamp(0.0, 1.0);
    }

    // ─── Message Delivery Decision ───

    /// Decide the fate of an event of kind `event_type` sent from `from` to
    /// `to`: the latency it arrives after, or why it is dropped.
    ///
    /// Partitions and withheld kinds are checked before the RNG is used, so
    /// blocked messages do not perturb the random sequence.
    pub fn deliver(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        event_type: &str,
        rng: &mut ChaCha8Rng,
    ) -> Result<Duration, Dropped> {
        if self.is_partitioned(from, to) {
            return Err(Dropped::Partition);
        }
        if self.is_withheld(to, event_type) {
            return Err(Dropped::Withheld);
        }
        if self.should_drop_packet(rng) {
            return Err(Dropped::Loss);
        }
        Ok(self.sample_latency(rng))
    }

    /// Sample the latency of one message.
    pub fn sample_latency(&self, rng: &mut ChaCha8Rng) -> Duration {
        let base = self.config.latency;

        let jitter_range = base.as_secs_f64() * self.config.jitter_fraction;
        let jitter = if jitter_range > 0.0 {
            rng.gen_range(-jitter_range..jitter_range)
        } else {
            0.0
        };
        let latency_secs = (base.as_secs_f64() + jitter).max(0.001);

        Duration::from_secs_f64(latency_secs)
    }

    /// Get all nodes in the network.
    pub fn all_nodes(&self) -> Vec<NodeIndex> {
        (0..self.config.num_validators).collect()
    }

    /// Get network configuration.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_latency_is_deterministic() {
        let network = SimulatedNetwork::new(NetworkConfig::default());
        let mut rng1 = ChaCha8Rng::seed_from_u64(42);
        let mut rng2 = ChaCha8Rng::seed_from_u64(42);

        let latency1 = network.sample_latency(&mut rng1);
        let latency2 = network.sample_latency(&mut rng2);

        assert_eq!(latency1, latency2, "Same seed should produce same latency");
    }

    #[test]
    fn test_unidirectional_partition() {
        let mut network = SimulatedNetwork::new(NetworkConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        network.partition_unidirectional(0, 1);

        assert_eq!(
            network.deliver(0, 1, "ProposalReceived", &mut rng),
            Err(Dropped::Partition)
        );
        assert!(network.deliver(1, 0, "ProposalReceived", &mut rng).is_ok());
    }

    #[test]
    fn test_isolate_node() {
        let mut network = SimulatedNetwork::new(NetworkConfig::default());

        network.isolate_node(2);

        for other in [0, 1, 3] {
            assert!(network.is_partitioned(2, other));
            assert!(network.is_partitioned(other, 2));
        }
        assert!(!network.is_partitioned(0, 1));

        network.heal_all();
        assert_eq!(network.partition_count(), 0);
    }

    #[test]
    fn test_withheld_kind_only_affects_target_node() {
        let mut network = SimulatedNetwork::new(NetworkConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        network.withhold(3, "GetVerticesResponseReceived");

        assert_eq!(
            network.deliver(0, 3, "GetVerticesResponseReceived", &mut rng),
            Err(Dropped::Withheld)
        );
        assert!(network
            .deliver(0, 3, "GetVerticesRequestReceived", &mut rng)
            .is_ok());
        assert!(network
            .deliver(0, 2, "GetVerticesResponseReceived", &mut rng)
            .is_ok());

        network.release(3, "GetVerticesResponseReceived");
        assert!(network
            .deliver(0, 3, "GetVerticesResponseReceived", &mut rng)
            .is_ok());
    }

    #[test]
    fn test_full_packet_loss_drops_everything() {
        let mut network = SimulatedNetwork::new(NetworkConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        network.set_packet_loss_rate(1.0);

        for _ in 0..10 {
            assert_eq!(
                network.deliver(0, 1, "ProposalReceived", &mut rng),
                Err(Dropped::Loss)
            );
        }
    }
}
