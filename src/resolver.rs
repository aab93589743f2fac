//! Resolves which metrics to display for a client, and in what order.
//!
//! The catalog of metric definitions is global; each client may carry a set
//! of preference rows controlling visibility and display order. With no
//! preference rows the whole catalog is shown alphabetically.

use std::collections::{HashMap, HashSet};

use crate::models::metrics::{MetricDefinition, MetricPreference};

/// Display order assigned to a metric with no recorded preference. Sorts
/// after every explicitly ranked metric.
pub const UNRANKED_ORDER_SENTINEL: i64 = 999;

/// A catalog definition paired with its resolved display order.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedMetric {
    pub id: i64,
    pub name: String,
    pub unit: Option<String>,
    pub display_order: i64,
}

/// Merge the metric catalog with a client's preference rows.
///
/// With preferences: only metrics marked visible survive, ordered by their
/// `display_order`. Preference rows pointing at metrics no longer in the
/// catalog drop silently. Without preferences: the full catalog, sorted
/// case-insensitively by name (ties keep catalog order).
pub fn resolve_metrics(
    definitions: &[MetricDefinition],
    preferences: &[MetricPreference],
) -> Vec<RankedMetric> {
    if preferences.is_empty() {
        let mut resolved: Vec<RankedMetric> = definitions
            .iter()
            .map(|def| RankedMetric {
                id: def.id,
                name: def.name.clone(),
                unit: def.unit.clone(),
                display_order: UNRANKED_ORDER_SENTINEL,
            })
            .collect();
        // sort_by is stable, so equal names keep their catalog order
        resolved.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        return resolved;
    }

    let visible: HashSet<i64> = preferences
        .iter()
        .filter(|pref| pref.is_visible)
        .map(|pref| pref.metric_id)
        .collect();
    let order: HashMap<i64, i64> = preferences
        .iter()
        .map(|pref| (pref.metric_id, pref.display_order))
        .collect();

    let mut resolved: Vec<RankedMetric> = definitions
        .iter()
        .filter(|def| visible.contains(&def.id))
        .map(|def| RankedMetric {
            id: def.id,
            name: def.name.clone(),
            unit: def.unit.clone(),
            display_order: *order.get(&def.id).unwrap_or(&UNRANKED_ORDER_SENTINEL),
        })
        .collect();
    resolved.sort_by_key(|metric| metric.display_order);
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(id: i64, name: &str) -> MetricDefinition {
        MetricDefinition {
            id,
            name: name.to_string(),
            unit: None,
        }
    }

    fn pref(metric_id: i64, display_order: i64, is_visible: bool) -> MetricPreference {
        MetricPreference {
            metric_id,
            display_order,
            is_visible,
        }
    }

    #[test]
    fn no_preferences_sorts_by_name_case_insensitive() {
        let defs = vec![def(1, "Weight"), def(2, "Body Fat %"), def(3, "waist")];
        let resolved = resolve_metrics(&defs, &[]);
        let names: Vec<&str> = resolved.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Body Fat %", "waist", "Weight"]);
    }

    #[test]
    fn no_preferences_is_stable_across_calls() {
        let defs = vec![def(1, "Weight"), def(2, "weight"), def(3, "Body Fat %")];
        let first = resolve_metrics(&defs, &[]);
        let second = resolve_metrics(&defs, &[]);
        assert_eq!(first, second);
        // equal names keep catalog order
        assert_eq!(first[1].id, 1);
        assert_eq!(first[2].id, 2);
    }

    #[test]
    fn no_preferences_carries_sentinel_order() {
        let defs = vec![def(1, "Weight")];
        let resolved = resolve_metrics(&defs, &[]);
        assert_eq!(resolved[0].display_order, UNRANKED_ORDER_SENTINEL);
    }

    #[test]
    fn preferences_filter_hidden_metrics() {
        let defs = vec![def(1, "Weight"), def(2, "Body Fat %")];
        let prefs = vec![pref(1, 0, true), pref(2, 1, false)];
        let resolved = resolve_metrics(&defs, &prefs);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "Weight");
    }

    #[test]
    fn preferences_order_by_display_order() {
        let defs = vec![def(1, "Weight"), def(2, "Body Fat %"), def(3, "Waist")];
        let prefs = vec![pref(1, 2, true), pref(2, 0, true), pref(3, 1, true)];
        let resolved = resolve_metrics(&defs, &prefs);
        let ids: Vec<i64> = resolved.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(resolved[0].display_order, 0);
    }

    #[test]
    fn stale_preference_rows_drop_silently() {
        let defs = vec![def(1, "Weight")];
        let prefs = vec![pref(1, 1, true), pref(42, 0, true)];
        let resolved = resolve_metrics(&defs, &prefs);
        let ids: Vec<i64> = resolved.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn empty_catalog_yields_empty_result() {
        assert!(resolve_metrics(&[], &[]).is_empty());
        assert!(resolve_metrics(&[], &[pref(1, 0, true)]).is_empty());
    }

    #[test]
    fn gaps_in_display_order_are_fine() {
        let defs = vec![def(1, "A"), def(2, "B")];
        let prefs = vec![pref(1, 10, true), pref(2, 3, true)];
        let resolved = resolve_metrics(&defs, &prefs);
        let ids: Vec<i64> = resolved.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }
}
