//! Metric aggregation across multiple screenshots.
//!
//! Combines per-image metric maps into one consolidated map. Screenshots
//! the caller has grouped together are treated as duplicate views of the
//! same story: within a group the per-metric maximum stands in for the
//! group, approximating the true cumulative count instead of
//! double-counting it. Group representatives and ungrouped sources are
//! then summed per key.

use crate::models::MetricMap;
use std::collections::HashSet;

/// Combine a batch of per-image metric maps into one map.
///
/// `batch` is indexed in upload order; `partition` holds groups of indices
/// the caller declared as duplicates of the same story. With an empty
/// partition the result is the per-key sum of observed values across the
/// whole batch. Sources not reporting a key contribute nothing to its sum;
/// a key reported by no source is absent from the output.
///
/// Malformed partitions never fail: out-of-range indices are ignored, a
/// group with no valid index contributes nothing, and a singleton group
/// behaves exactly like leaving the index ungrouped. An index listed in
/// two groups feeds both group maxima independently.
pub fn aggregate(batch: &[MetricMap], partition: &[Vec<usize>]) -> MetricMap {
    if partition.is_empty() {
        return sum_all(batch.iter());
    }

    // Explicit partition completion: indices not consumed by any group
    // fall through as singleton contributions.
    let consumed: HashSet<usize> = partition
        .iter()
        .flatten()
        .copied()
        .filter(|&i| i < batch.len())
        .collect();

    let representatives = partition.iter().map(|group| group_representative(batch, group));

    let ungrouped = batch
        .iter()
        .enumerate()
        .filter(|(i, _)| !consumed.contains(i))
        .map(|(_, metrics)| metrics.clone());

    sum_owned(representatives.chain(ungrouped))
}

/// Per-key maximum across the group's valid sources.
fn group_representative(batch: &[MetricMap], group: &[usize]) -> MetricMap {
    let mut representative = MetricMap::new();

    for &index in group {
        let Some(metrics) = batch.get(index) else {
            continue;
        };
        for (key, &value) in metrics {
            representative
                .entry(key.clone())
                .and_modify(|current| {
                    if value > *current {
                        *current = value;
                    }
                })
                .or_insert(value);
        }
    }

    representative
}

fn sum_all<'a>(maps: impl Iterator<Item = &'a MetricMap>) -> MetricMap {
    sum_owned(maps.cloned())
}

/// Per-key sum of observed values; keys observed nowhere stay absent.
fn sum_owned(maps: impl Iterator<Item = MetricMap>) -> MetricMap {
    let mut combined = MetricMap::new();

    for metrics in maps {
        for (key, value) in metrics {
            *combined.entry(key).or_insert(0.0) += value;
        }
    }

    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, f64)]) -> MetricMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    #[test]
    fn test_no_groups_sums_observed_values() {
        let batch = vec![map(&[("a", 10.0), ("b", 5.0)]), map(&[("a", 3.0)])];

        let combined = aggregate(&batch, &[]);

        assert_eq!(combined, map(&[("a", 13.0), ("b", 5.0)]));
    }

    #[test]
    fn test_group_takes_max_then_sums_with_ungrouped() {
        let batch = vec![map(&[("a", 10.0)]), map(&[("a", 15.0)]), map(&[("a", 2.0)])];

        let combined = aggregate(&batch, &[vec![0, 1]]);

        assert_eq!(combined, map(&[("a", 17.0)]));
    }

    #[test]
    fn test_singleton_group_is_noop() {
        let batch = vec![map(&[("a", 10.0), ("b", 5.0)]), map(&[("a", 3.0)])];

        for i in 0..batch.len() {
            assert_eq!(aggregate(&batch, &[vec![i]]), aggregate(&batch, &[]));
        }
    }

    #[test]
    fn test_out_of_range_index_ignored() {
        let batch = vec![map(&[("a", 10.0)]), map(&[("a", 15.0)])];

        let combined = aggregate(&batch, &[vec![0, 1, 99]]);

        assert_eq!(combined, aggregate(&batch, &[vec![0, 1]]));
    }

    #[test]
    fn test_group_of_only_invalid_indices_contributes_nothing() {
        let batch = vec![map(&[("a", 10.0)])];

        let combined = aggregate(&batch, &[vec![5, 6]]);

        // The phantom group is dropped; index 0 stays ungrouped.
        assert_eq!(combined, map(&[("a", 10.0)]));
    }

    #[test]
    fn test_unreported_key_stays_absent() {
        let batch = vec![map(&[("a", 10.0)]), map(&[("b", 5.0)])];

        let combined = aggregate(&batch, &[]);

        assert!(!combined.contains_key("c"));
        assert_eq!(combined.get("a"), Some(&10.0));
    }

    #[test]
    fn test_empty_batch_yields_empty_map() {
        assert!(aggregate(&[], &[]).is_empty());
        assert!(aggregate(&[], &[vec![0, 1]]).is_empty());
    }

    #[test]
    fn test_empty_source_is_identity() {
        // A failed extraction occupies its slot as an empty map and must not
        // disturb grouping of its neighbors.
        let batch = vec![map(&[("a", 10.0)]), MetricMap::new(), map(&[("a", 15.0)])];

        let combined = aggregate(&batch, &[vec![0, 2]]);

        assert_eq!(combined, map(&[("a", 15.0)]));
    }

    #[test]
    fn test_overlapping_groups_draw_independently() {
        // An index listed in two groups feeds both maxima.
        let batch = vec![map(&[("a", 10.0)]), map(&[("a", 4.0)]), map(&[("a", 6.0)])];

        let combined = aggregate(&batch, &[vec![0, 1], vec![0, 2]]);

        // max(10,4) + max(10,6) = 20
        assert_eq!(combined, map(&[("a", 20.0)]));
    }

    #[test]
    fn test_partial_key_coverage_within_group() {
        let batch = vec![
            map(&[("impressions", 100.0), ("reach", 80.0)]),
            map(&[("impressions", 120.0)]),
        ];

        let combined = aggregate(&batch, &[vec![0, 1]]);

        // reach is observed in only one group member and survives as-is.
        assert_eq!(combined, map(&[("impressions", 120.0), ("reach", 80.0)]));
    }

    #[test]
    fn test_end_to_end_scenario() {
        let batch = vec![
            map(&[("impressions", 100.0), ("reach", 80.0)]),
            map(&[("impressions", 120.0), ("reach", 85.0)]),
            map(&[("impressions", 30.0), ("follows", 5.0)]),
        ];

        let combined = aggregate(&batch, &[vec![0, 1]]);

        assert_eq!(
            combined,
            map(&[("impressions", 150.0), ("reach", 85.0), ("follows", 5.0)])
        );
    }

    #[test]
    fn test_values_taken_as_is() {
        let batch = vec![map(&[("rate", 87.5)]), map(&[("rate", 12.25)])];

        let combined = aggregate(&batch, &[]);

        assert_eq!(combined.get("rate"), Some(&99.75));
    }
}
