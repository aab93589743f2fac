//! Builds the per-client dashboard payload: for every resolved metric, the
//! latest observation, the full chronological series, and the first-to-last
//! percent change.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use futures_util::future::join_all;

use crate::models::metrics::{MetricHistory, MetricSummary, SeriesPoint, ValuePoint};
use crate::resolver::RankedMetric;

/// Read side of the observation store, one client+metric at a time. The
/// store implements this; tests substitute an in-memory fake.
#[async_trait]
pub trait ValueSource: Send + Sync {
    /// Most recent observation for (client, metric), if any.
    async fn latest_value(
        &self,
        client_id: &str,
        metric_id: i64,
    ) -> anyhow::Result<Option<ValuePoint>>;

    /// All observations for (client, metric), oldest first.
    async fn series(&self, client_id: &str, metric_id: i64) -> anyhow::Result<Vec<ValuePoint>>;
}

/// Percent change from the first to the last observation, rendered with two
/// decimals. An empty series or a zero first value both render as "0";
/// degenerate inputs, not errors.
pub fn percent_change(points: &[ValuePoint]) -> String {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return "0".to_string();
    };
    if first.value == 0.0 {
        return "0".to_string();
    }
    format!("{:.2}", (last.value - first.value) / first.value * 100.0)
}

/// Render an f64 the way the wire format expects: no trailing ".0" on
/// whole numbers.
fn format_value(value: f64) -> String {
    format!("{value}")
}

/// Calendar-date form (`YYYY-MM-DD`) of a stored timestamp, time of day
/// discarded.
fn calendar_date(recorded_at: &str) -> String {
    if let Ok(ts) = DateTime::parse_from_rfc3339(recorded_at) {
        return ts.format("%Y-%m-%d").to_string();
    }
    recorded_at.get(..10).unwrap_or(recorded_at).to_string()
}

/// Short display form (`Feb 1`) for the "last update" summary field.
fn short_date(recorded_at: &str) -> String {
    if let Ok(ts) = DateTime::parse_from_rfc3339(recorded_at) {
        return ts.format("%b %-d").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(
        recorded_at.get(..10).unwrap_or(recorded_at),
        "%Y-%m-%d",
    ) {
        return date.format("%b %-d").to_string();
    }
    recorded_at.to_string()
}

/// Fetch observations for every resolved metric concurrently and fold them
/// into the summary strip and the historical series list.
///
/// The per-metric fetches are independent, so they fan out; a failed fetch
/// degrades that one metric to "no data" instead of failing the whole
/// dashboard. Both outputs are re-sorted by display order before returning
/// since completion order is arbitrary.
pub async fn aggregate(
    client_id: &str,
    ranked: &[RankedMetric],
    source: &dyn ValueSource,
) -> (Vec<MetricSummary>, Vec<MetricHistory>) {
    let fetches = ranked.iter().map(|metric| async move {
        let latest = match source.latest_value(client_id, metric.id).await {
            Ok(latest) => latest,
            Err(e) => {
                tracing::warn!(metric_id = metric.id, "latest-value fetch failed: {e}");
                None
            }
        };
        let points = match source.series(client_id, metric.id).await {
            Ok(points) => points,
            Err(e) => {
                tracing::warn!(metric_id = metric.id, "series fetch failed: {e}");
                Vec::new()
            }
        };
        (metric, latest, points)
    });

    let mut summaries = Vec::with_capacity(ranked.len());
    let mut histories = Vec::with_capacity(ranked.len());
    for (metric, latest, points) in join_all(fetches).await {
        summaries.push(MetricSummary {
            id: metric.id,
            name: metric.name.clone(),
            value: latest.as_ref().map(|point| format_value(point.value)),
            last_update: latest.as_ref().map(|point| short_date(&point.recorded_at)),
            unit: metric.unit.clone(),
            display_order: metric.display_order,
        });
        histories.push(MetricHistory {
            id: metric.id,
            name: metric.name.clone(),
            unit: metric.unit.clone(),
            percent_change: percent_change(&points),
            data: points
                .into_iter()
                .map(|point| SeriesPoint {
                    date: calendar_date(&point.recorded_at),
                    value: point.value,
                })
                .collect(),
            display_order: metric.display_order,
        });
    }

    summaries.sort_by_key(|summary| summary.display_order);
    histories.sort_by_key(|history| history.display_order);
    (summaries, histories)
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use super::*;

    fn point(value: f64, recorded_at: &str) -> ValuePoint {
        ValuePoint {
            value,
            recorded_at: recorded_at.to_string(),
        }
    }

    fn ranked(id: i64, name: &str, display_order: i64) -> RankedMetric {
        RankedMetric {
            id,
            name: name.to_string(),
            unit: None,
            display_order,
        }
    }

    /// In-memory source: series keyed by metric id, with an optional set of
    /// metric ids whose fetches fail.
    struct FakeSource {
        series: HashMap<i64, Vec<ValuePoint>>,
        failing: HashSet<i64>,
    }

    impl FakeSource {
        fn new(series: HashMap<i64, Vec<ValuePoint>>) -> Self {
            Self {
                series,
                failing: HashSet::new(),
            }
        }
    }

    #[async_trait]
    impl ValueSource for FakeSource {
        async fn latest_value(
            &self,
            _client_id: &str,
            metric_id: i64,
        ) -> anyhow::Result<Option<ValuePoint>> {
            if self.failing.contains(&metric_id) {
                anyhow::bail!("fetch failed");
            }
            Ok(self
                .series
                .get(&metric_id)
                .and_then(|points| points.last().cloned()))
        }

        async fn series(&self, _client_id: &str, metric_id: i64) -> anyhow::Result<Vec<ValuePoint>> {
            if self.failing.contains(&metric_id) {
                anyhow::bail!("fetch failed");
            }
            Ok(self.series.get(&metric_id).cloned().unwrap_or_default())
        }
    }

    #[test]
    fn percent_change_two_decimals() {
        let points = vec![point(150.0, "2024-01-01"), point(140.0, "2024-02-01")];
        assert_eq!(percent_change(&points), "-6.67");
    }

    #[test]
    fn percent_change_empty_series_is_zero() {
        assert_eq!(percent_change(&[]), "0");
    }

    #[test]
    fn percent_change_zero_first_value_is_zero() {
        let points = vec![point(0.0, "2024-01-01"), point(55.0, "2024-02-01")];
        assert_eq!(percent_change(&points), "0");
    }

    #[test]
    fn percent_change_single_point_is_flat() {
        let points = vec![point(80.0, "2024-01-01")];
        assert_eq!(percent_change(&points), "0.00");
    }

    #[test]
    fn whole_values_render_without_fraction() {
        assert_eq!(format_value(140.0), "140");
        assert_eq!(format_value(140.5), "140.5");
    }

    #[test]
    fn dates_render_in_both_granularities() {
        assert_eq!(calendar_date("2024-02-01T08:30:00Z"), "2024-02-01");
        assert_eq!(short_date("2024-02-01T08:30:00Z"), "Feb 1");
        assert_eq!(short_date("2024-11-23"), "Nov 23");
    }

    #[tokio::test]
    async fn aggregate_builds_summary_and_history() {
        let mut series = HashMap::new();
        series.insert(
            1,
            vec![
                point(150.0, "2024-01-01T00:00:00Z"),
                point(140.0, "2024-02-01T00:00:00Z"),
            ],
        );
        let source = FakeSource::new(series);
        let metrics = vec![ranked(1, "Weight", 0)];

        let (summaries, histories) = aggregate("c1", &metrics, &source).await;

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].value.as_deref(), Some("140"));
        assert_eq!(summaries[0].last_update.as_deref(), Some("Feb 1"));

        assert_eq!(histories.len(), 1);
        assert_eq!(histories[0].percent_change, "-6.67");
        assert_eq!(histories[0].data.len(), 2);
        assert_eq!(histories[0].data[0].date, "2024-01-01");
    }

    #[tokio::test]
    async fn aggregate_empty_series_yields_no_data() {
        let source = FakeSource::new(HashMap::new());
        let metrics = vec![ranked(1, "Weight", 0)];

        let (summaries, histories) = aggregate("c1", &metrics, &source).await;

        assert_eq!(summaries[0].value, None);
        assert_eq!(summaries[0].last_update, None);
        assert!(histories[0].data.is_empty());
        assert_eq!(histories[0].percent_change, "0");
    }

    #[tokio::test]
    async fn aggregate_failed_fetch_degrades_to_no_data() {
        let mut series = HashMap::new();
        series.insert(1, vec![point(80.0, "2024-01-01T00:00:00Z")]);
        series.insert(2, vec![point(20.0, "2024-01-01T00:00:00Z")]);
        let mut source = FakeSource::new(series);
        source.failing.insert(1);
        let metrics = vec![ranked(1, "Weight", 0), ranked(2, "Body Fat %", 1)];

        let (summaries, histories) = aggregate("c1", &metrics, &source).await;

        // broken metric is blanked, the other still renders
        assert_eq!(summaries[0].value, None);
        assert_eq!(histories[0].percent_change, "0");
        assert_eq!(summaries[1].value.as_deref(), Some("20"));
    }

    #[tokio::test]
    async fn aggregate_output_sorted_by_display_order() {
        let mut series = HashMap::new();
        series.insert(1, vec![point(1.0, "2024-01-01T00:00:00Z")]);
        series.insert(2, vec![point(2.0, "2024-01-01T00:00:00Z")]);
        let source = FakeSource::new(series);
        // input deliberately out of order
        let metrics = vec![ranked(1, "Weight", 5), ranked(2, "Waist", 2)];

        let (summaries, histories) = aggregate("c1", &metrics, &source).await;

        assert_eq!(summaries[0].id, 2);
        assert_eq!(summaries[1].id, 1);
        assert_eq!(histories[0].id, 2);
    }
}
