//! Deterministic delta-partition sender assignment: for every partition of
//! a frame, weighted-sample a handful of clients to carry that partition's
//! delta, biased toward clients the server currently trusts more.

use lockstep_math::hash::xxhash32_combine;

pub const DEFAULT_SENDERS_PER_PARTITION: u32 = 2;

/// Degradation tier derived from how much delta data and how many trusted
/// senders actually arrived this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradationTier {
    Normal,
    Degraded,
    Minimal,
    Skip,
}

pub fn degradation_tier(received_partitions: u32, total_partitions: u32, trusted_senders: u32, total_senders: u32) -> DegradationTier {
    if total_partitions == 0 {
        return DegradationTier::Skip;
    }
    let all_received = received_partitions == total_partitions;
    let all_trusted = total_senders == 0 || trusted_senders == total_senders;
    if all_received && all_trusted {
        return DegradationTier::Normal;
    }
    let received_ratio = received_partitions as f64 / total_partitions as f64;
    if received_ratio > 0.75 {
        DegradationTier::Degraded
    } else if received_ratio > 0.25 {
        DegradationTier::Minimal
    } else {
        DegradationTier::Skip
    }
}

fn xorshift32_step(seed: u32) -> u32 {
    let mut x = seed;
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    x
}

fn weight_of(reliability: u8) -> u64 {
    (reliability.clamp(0, 100) as u64 + 1) * (1u64 << 16)
}

/// Picks up to `senders_per_partition` distinct clients (already sorted
/// lexicographically) for partition `p` of `frame`, weighted by
/// `reliability[c]`.
pub fn pick_partition_senders(
    clients_sorted: &[(String, u8)],
    frame: u64,
    partition: u32,
    senders_per_partition: u32,
) -> Vec<String> {
    let n = clients_sorted.len();
    if n == 0 {
        return Vec::new();
    }
    let want = (senders_per_partition as usize).min(n);

    let mut seed = xxhash32_combine(xxhash32_combine(0x1234_5678, frame as u32), partition);
    let mut remaining: Vec<usize> = (0..n).collect();
    let mut picked = Vec::with_capacity(want);

    for _ in 0..want {
        let total_weight: u64 = remaining.iter().map(|&i| weight_of(clients_sorted[i].1)).sum();
        let threshold = ((seed as u64 & 0xFFFF) * total_weight) / 0x1_0000;

        let mut cumulative = 0u64;
        let mut chosen_pos = remaining.len() - 1;
        for (pos, &i) in remaining.iter().enumerate() {
            cumulative += weight_of(clients_sorted[i].1);
            if cumulative > threshold {
                chosen_pos = pos;
                break;
            }
        }

        let client_index = remaining.remove(chosen_pos);
        picked.push(clients_sorted[client_index].0.clone());
        seed = xorshift32_step(seed);
    }

    picked
}

pub fn num_partitions_for(entity_count: usize, client_count: usize) -> u32 {
    lockstep_codec::delta::num_partitions(entity_count, client_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_is_deterministic_across_calls() {
        let clients = vec![
            ("a".to_owned(), 80),
            ("b".to_owned(), 50),
            ("c".to_owned(), 20),
            ("d".to_owned(), 90),
        ];
        let first = pick_partition_senders(&clients, 100, 0, 2);
        let second = pick_partition_senders(&clients, 100, 0, 2);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn distinct_partitions_can_pick_different_senders() {
        let clients = vec![
            ("a".to_owned(), 80),
            ("b".to_owned(), 50),
            ("c".to_owned(), 20),
            ("d".to_owned(), 90),
        ];
        let p0 = pick_partition_senders(&clients, 100, 0, 2);
        let p1 = pick_partition_senders(&clients, 100, 1, 2);
        let p2 = pick_partition_senders(&clients, 100, 2, 2);
        assert!(p0 != p1 || p1 != p2, "partitions should not always collapse to the same pair");
    }

    #[test]
    fn picks_are_always_distinct_clients() {
        let clients = vec![("a".to_owned(), 1), ("b".to_owned(), 1), ("c".to_owned(), 1)];
        let picks = pick_partition_senders(&clients, 5, 0, 3);
        let mut sorted = picks.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), picks.len());
    }

    #[test]
    fn degradation_tiers_follow_thresholds() {
        assert_eq!(degradation_tier(4, 4, 2, 2), DegradationTier::Normal);
        assert_eq!(degradation_tier(4, 4, 1, 2), DegradationTier::Degraded);
        assert_eq!(degradation_tier(3, 4, 2, 2), DegradationTier::Minimal);
        assert_eq!(degradation_tier(2, 4, 2, 2), DegradationTier::Minimal);
        assert_eq!(degradation_tier(0, 4, 0, 2), DegradationTier::Skip);
    }
}
