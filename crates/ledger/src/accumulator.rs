//! Linear hash-chain accumulator over committed commands.
//!
//! Each committed command advances the state version by one and folds the
//! command hash into the running accumulator hash:
//!
//! ```text
//! state'.version = state.version + 1
//! state'.hash    = H(state.hash || command_hash)
//! ```
//!
//! The chain is order-sensitive, so a proof of the tail state commits to the
//! exact sequence of commands that produced it.

use quorum_types::{AccumulatorState, Hash};

/// Fold one command hash into `parent`.
pub fn accumulate(parent: &AccumulatorState, command_hash: &Hash) -> AccumulatorState {
    let hash = Hash::from_parts(&[
        parent.accumulator_hash.as_bytes(),
        command_hash.as_bytes(),
    ]);
    AccumulatorState::new(parent.state_version + 1, hash)
}

/// Fold a sequence of command hashes into `head`, in order.
pub fn accumulate_all<'a>(
    head: &AccumulatorState,
    command_hashes: impl IntoIterator<Item = &'a Hash>,
) -> AccumulatorState {
    command_hashes
        .into_iter()
        .fold(*head, |state, hash| accumulate(&state, hash))
}

/// Check that accumulating `command_hashes` onto `head` yields `tail`.
pub fn verify(head: &AccumulatorState, command_hashes: &[Hash], tail: &AccumulatorState) -> bool {
    accumulate_all(head, command_hashes) == *tail
}

/// Isolate the part of `commands` that carries `current` to `tail`.
///
/// `commands` is a run of commands whose last element ends at `tail`; it may
/// start before `current`. The first version in the run is
/// `tail.version - commands.len() + 1`, which locates the slice offset. Only
/// the returned suffix is hashed.
///
/// Returns `None` when no such extension exists: the run starts after
/// `current + 1` (a gap), `tail` is behind `current`, the run is empty while
/// `current != tail`, or the suffix does not accumulate to `tail`.
pub fn verify_and_get_extension<'a, T>(
    current: &AccumulatorState,
    commands: &'a [T],
    hash_of: impl Fn(&T) -> Hash,
    tail: &AccumulatorState,
) -> Option<&'a [T]> {
    if tail.state_version < current.state_version {
        return None;
    }

    let first_version = (tail.state_version + 1).checked_sub(commands.len() as u64)?;
    if first_version > current.state_version + 1 {
        return None;
    }

    let start = usize::try_from(current.state_version + 1 - first_version).ok()?;
    let extension = &commands[start..];
    let hashes: Vec<Hash> = extension.iter().map(&hash_of).collect();

    verify(current, &hashes, tail).then_some(extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hashes(seeds: &[u8]) -> Vec<Hash> {
        seeds.iter().map(|s| Hash::from_bytes(&[*s])).collect()
    }

    #[test]
    fn test_accumulate_advances_version() {
        let genesis = AccumulatorState::genesis();
        let next = accumulate(&genesis, &Hash::from_bytes(b"cmd"));
        assert_eq!(next.state_version, 1);
        assert_ne!(next.accumulator_hash, genesis.accumulator_hash);
    }

    #[test]
    fn test_empty_extension_of_same_state() {
        let state = AccumulatorState::new(3, Hash::from_bytes(b"head"));
        let empty: [Hash; 0] = [];
        assert_eq!(
            verify_and_get_extension(&state, &empty, |h| *h, &state),
            Some(&empty[..])
        );
    }

    #[test]
    fn test_empty_commands_cannot_reach_other_tail() {
        let current = AccumulatorState::genesis();
        let tail = accumulate(&current, &Hash::from_bytes(b"cmd"));
        let empty: [Hash; 0] = [];
        assert_eq!(verify_and_get_extension(&current, &empty, |h| *h, &tail), None);
    }

    #[test]
    fn test_gap_before_commands_is_rejected() {
        let commands = hashes(&[1, 2, 3, 4]);
        let genesis = AccumulatorState::genesis();
        let tail = accumulate_all(&genesis, &commands);

        // Only the last two commands are offered: versions 3 and 4 cannot
        // extend version 0.
        assert_eq!(
            verify_and_get_extension(&genesis, &commands[2..], |h| *h, &tail),
            None
        );
    }

    #[test]
    fn test_overlong_commands_are_sliced() {
        let commands = hashes(&[1, 2, 3, 4, 5]);
        let genesis = AccumulatorState::genesis();
        let current = accumulate_all(&genesis, &commands[..2]);
        let tail = accumulate_all(&genesis, &commands);

        let extension = verify_and_get_extension(&current, &commands, |h| *h, &tail);
        assert_eq!(extension, Some(&commands[2..]));
    }

    #[test]
    fn test_inconsistent_tail_is_rejected() {
        let commands = hashes(&[1, 2]);
        let genesis = AccumulatorState::genesis();
        let forged = AccumulatorState::new(2, Hash::from_bytes(b"forged"));
        assert_eq!(
            verify_and_get_extension(&genesis, &commands, |h| *h, &forged),
            None
        );
    }

    #[test]
    fn test_tail_behind_current_is_rejected() {
        let commands = hashes(&[1]);
        let genesis = AccumulatorState::genesis();
        let tail = accumulate_all(&genesis, &commands);
        let ahead = accumulate_all(&tail, &hashes(&[2]));
        assert_eq!(verify_and_get_extension(&ahead, &commands, |h| *h, &tail), None);
    }

    proptest! {
        #[test]
        fn prop_accumulate_is_deterministic(seeds in proptest::collection::vec(any::<u8>(), 0..32)) {
            let commands = hashes(&seeds);
            let head = AccumulatorState::genesis();
            prop_assert_eq!(accumulate_all(&head, &commands), accumulate_all(&head, &commands));
        }

        #[test]
        fn prop_verify_accepts_own_accumulation(
            version in 0u64..1_000,
            seeds in proptest::collection::vec(any::<u8>(), 0..32),
        ) {
            let head = AccumulatorState::new(version, Hash::from_bytes(&version.to_le_bytes()));
            let commands = hashes(&seeds);
            let tail = accumulate_all(&head, &commands);
            prop_assert!(verify(&head, &commands, &tail));
            prop_assert_eq!(tail.state_version, version + commands.len() as u64);
        }

        #[test]
        fn prop_swapping_distinct_commands_changes_hash(
            seeds in proptest::collection::vec(any::<u8>(), 2..16),
            i in 0usize..16,
            j in 0usize..16,
        ) {
            let i = i % seeds.len();
            let j = j % seeds.len();
            prop_assume!(seeds[i] != seeds[j]);

            let commands = hashes(&seeds);
            let mut permuted = commands.clone();
            permuted.swap(i, j);

            let head = AccumulatorState::genesis();
            prop_assert_ne!(accumulate_all(&head, &commands), accumulate_all(&head, &permuted));
        }

        #[test]
        fn prop_extension_of_full_run_is_the_run(
            seeds in proptest::collection::vec(any::<u8>(), 0..32),
        ) {
            let commands = hashes(&seeds);
            let head = AccumulatorState::genesis();
            let tail = accumulate_all(&head, &commands);
            prop_assert_eq!(
                verify_and_get_extension(&head, &commands, |h| *h, &tail),
                Some(&commands[..])
            );
        }

        #[test]
        fn prop_extension_skips_known_prefix(
            seeds in proptest::collection::vec(any::<u8>(), 1..32),
            split in 0usize..32,
        ) {
            let split = split % (seeds.len() + 1);
            let commands = hashes(&seeds);
            let head = AccumulatorState::genesis();
            let current = accumulate_all(&head, &commands[..split]);
            let tail = accumulate_all(&head, &commands);
            prop_assert_eq!(
                verify_and_get_extension(&current, &commands, |h| *h, &tail),
                Some(&commands[split..])
            );
        }
    }
}
