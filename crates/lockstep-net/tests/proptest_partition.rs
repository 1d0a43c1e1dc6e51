use std::collections::BTreeSet;

use lockstep_net::partition::{degradation_tier, pick_partition_senders, DegradationTier};
use proptest::prelude::*;

fn clients_strategy() -> impl Strategy<Value = Vec<(String, u8)>> {
    prop::collection::vec(("[a-z]{1,4}", any::<u8>()), 1..8).prop_map(|mut v| {
        v.sort_by(|a, b| a.0.cmp(&b.0));
        v.dedup_by(|a, b| a.0 == b.0);
        v
    })
}

proptest! {
    #[test]
    fn every_partition_gets_at_least_one_sender(
        clients in clients_strategy(),
        frame in 0u64..10_000,
        num_partitions in 1u32..8,
        senders_per_partition in 1u32..4,
    ) {
        for partition in 0..num_partitions {
            let picked = pick_partition_senders(&clients, frame, partition, senders_per_partition);
            prop_assert!(!picked.is_empty());
            prop_assert_eq!(picked.len(), senders_per_partition.min(clients.len() as u32) as usize);

            let unique: BTreeSet<&String> = picked.iter().collect();
            prop_assert_eq!(unique.len(), picked.len(), "sampling without replacement must not repeat a client");
        }
    }

    #[test]
    fn selection_is_a_pure_function_of_its_inputs(
        clients in clients_strategy(),
        frame in 0u64..10_000,
        partition in 0u32..8,
        senders_per_partition in 1u32..4,
    ) {
        let a = pick_partition_senders(&clients, frame, partition, senders_per_partition);
        let b = pick_partition_senders(&clients, frame, partition, senders_per_partition);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn degradation_tier_is_total_and_monotone_in_received_ratio(
        total_partitions in 1u32..20,
        received_partitions in 0u32..20,
        total_senders in 0u32..10,
        trusted_senders in 0u32..10,
    ) {
        let received_partitions = received_partitions.min(total_partitions);
        let trusted_senders = trusted_senders.min(total_senders);
        let tier = degradation_tier(received_partitions, total_partitions, trusted_senders, total_senders);
        if received_partitions == total_partitions && (total_senders == 0 || trusted_senders == total_senders) {
            prop_assert_eq!(tier, DegradationTier::Normal);
        }
    }
}
