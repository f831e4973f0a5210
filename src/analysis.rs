//! Segment and cluster filtering plus the aggregates behind each dashboard view
//!
//! Every function here is pure: it borrows records from an immutable
//! [`SegmentTable`] and returns freshly computed values. Nothing is cached,
//! so a selection change is handled by calling [`snapshot`] again.

use crate::data::{CustomerRecord, SegmentTable};
use crate::error::SelectionError;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Segment labels shown in the composition view, in display order
pub const DEFAULT_SEGMENTS: [&str; 4] = [
    "At-Risk Customers",
    "Loyal Customers",
    "Lost Customers",
    "Best Customers",
];

/// Number of rows in the top-customers view
pub const DEFAULT_TOP_N: usize = 10;

/// Selected segment labels and cluster ids
///
/// An empty set selects nothing; use [`FilterSelection::all`] for the
/// default of everything selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSelection {
    pub segments: BTreeSet<String>,
    pub clusters: BTreeSet<i64>,
}

impl FilterSelection {
    pub fn new<S: Into<String>>(
        segments: impl IntoIterator<Item = S>,
        clusters: impl IntoIterator<Item = i64>,
    ) -> Self {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            clusters: clusters.into_iter().collect(),
        }
    }

    /// Every segment and cluster present in the table
    pub fn all(table: &SegmentTable) -> Self {
        Self::new(table.segment_labels(), table.cluster_labels())
    }

    pub fn matches(&self, record: &CustomerRecord) -> bool {
        self.segments.contains(&record.segment) && self.clusters.contains(&record.cluster)
    }

    /// Reject labels that do not occur in the table
    pub fn validate(&self, table: &SegmentTable) -> Result<(), SelectionError> {
        let known_segments = table.segment_labels();
        if let Some(unknown) = self
            .segments
            .iter()
            .find(|s| !known_segments.contains(s))
        {
            return Err(SelectionError::UnknownSegment(unknown.clone()));
        }

        let known_clusters = table.cluster_labels();
        if let Some(&unknown) = self.clusters.iter().find(|c| !known_clusters.contains(c)) {
            return Err(SelectionError::UnknownCluster(unknown));
        }

        Ok(())
    }
}

/// Aggregation settings that do not change with the selection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardConfig {
    /// Full segment label set for the composition view
    pub segment_universe: Vec<String>,
    pub top_n: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            segment_universe: DEFAULT_SEGMENTS.iter().map(|s| s.to_string()).collect(),
            top_n: DEFAULT_TOP_N,
        }
    }
}

/// Headline figures for the filtered customers
///
/// Means are NaN when `count` is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryStats {
    pub count: usize,
    pub mean_recency: f64,
    pub mean_frequency: f64,
    pub mean_monetary: f64,
}

/// One row of the segment composition view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentAggregate {
    pub segment: String,
    pub customer_count: usize,
    pub total_monetary: f64,
    /// Share of customers across all composition rows, one decimal
    pub percent_of_customers: f64,
    /// Share of monetary value across all composition rows, one decimal
    pub percent_of_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClusterCount {
    pub cluster: i64,
    pub customer_count: usize,
}

/// One stage of the segment value funnel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStage {
    pub segment: String,
    pub mean_monetary: f64,
    /// Mean monetary relative to the first (largest) stage, one decimal
    pub percent_of_initial: f64,
}

/// Segment share of the filtered customers (lifecycle view)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentShare {
    pub segment: String,
    pub customer_count: usize,
    pub share_percent: f64,
}

/// Mean recency, frequency and monetary of one segment (RFM heat table)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RfmProfile {
    pub segment: String,
    pub customer_count: usize,
    pub mean_recency: f64,
    pub mean_frequency: f64,
    pub mean_monetary: f64,
}

/// Everything the dashboard renders for one selection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub selection: FilterSelection,
    pub summary: SummaryStats,
    pub cluster_sizes: Vec<ClusterCount>,
    pub funnel: Vec<FunnelStage>,
    pub segment_distribution: Vec<SegmentShare>,
    pub segment_composition: Vec<SegmentAggregate>,
    pub rfm_profile: Vec<RfmProfile>,
    pub top_customers: Vec<CustomerRecord>,
}

/// Records whose segment and cluster are both selected, in table order
pub fn filter<'a>(
    records: &'a [CustomerRecord],
    selection: &FilterSelection,
) -> Vec<&'a CustomerRecord> {
    records.iter().filter(|r| selection.matches(r)).collect()
}

pub fn summarize(records: &[&CustomerRecord]) -> SummaryStats {
    SummaryStats {
        count: records.len(),
        mean_recency: mean(records.iter().map(|r| r.recency)),
        mean_frequency: mean(records.iter().map(|r| r.frequency as f64)),
        mean_monetary: mean(records.iter().map(|r| r.monetary)),
    }
}

/// Customer count and total spend for every label of `segment_universe`
///
/// Labels with no filtered customers are kept with zero counts so the view
/// always has one row per label. Percentages are 0.0 when their column sums
/// to zero.
pub fn aggregate_by_segment(
    records: &[&CustomerRecord],
    segment_universe: &[String],
) -> Vec<SegmentAggregate> {
    let mut totals: HashMap<&str, (usize, f64)> = HashMap::new();
    for record in records {
        let entry = totals.entry(record.segment.as_str()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += record.monetary;
    }

    let rows: Vec<(&String, usize, f64)> = segment_universe
        .iter()
        .map(|label| {
            let (count, monetary) = totals.get(label.as_str()).copied().unwrap_or((0, 0.0));
            (label, count, monetary)
        })
        .collect();

    let customer_sum: usize = rows.iter().map(|(_, count, _)| count).sum();
    let monetary_sum: f64 = rows.iter().map(|(_, _, monetary)| monetary).sum();

    rows.into_iter()
        .map(|(label, count, monetary)| SegmentAggregate {
            segment: label.clone(),
            customer_count: count,
            total_monetary: monetary,
            percent_of_customers: percent(count as f64, customer_sum as f64),
            percent_of_value: percent(monetary, monetary_sum),
        })
        .collect()
}

/// Customer count per cluster present in `records`, ascending by cluster id
pub fn aggregate_by_cluster(records: &[&CustomerRecord]) -> Vec<ClusterCount> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for record in records {
        *counts.entry(record.cluster).or_default() += 1;
    }

    counts
        .into_iter()
        .map(|(cluster, customer_count)| ClusterCount {
            cluster,
            customer_count,
        })
        .collect()
}

/// Highest spenders first; equal spend keeps table order
pub fn top_n_by_monetary<'a>(records: &[&'a CustomerRecord], n: usize) -> Vec<&'a CustomerRecord> {
    let mut ranked = records.to_vec();
    ranked.sort_by(|a, b| b.monetary.total_cmp(&a.monetary));
    ranked.truncate(n);
    ranked
}

/// Mean spend per present segment, largest first
pub fn funnel_by_segment(records: &[&CustomerRecord]) -> Vec<FunnelStage> {
    let mut stages: Vec<(String, f64)> = group_by_segment(records)
        .into_iter()
        .map(|(segment, members)| {
            let mean_monetary = mean(members.iter().map(|r| r.monetary));
            (segment.to_string(), mean_monetary)
        })
        .collect();
    stages.sort_by(|a, b| b.1.total_cmp(&a.1));

    let initial = stages.first().map(|(_, m)| *m).unwrap_or(0.0);
    stages
        .into_iter()
        .map(|(segment, mean_monetary)| FunnelStage {
            segment,
            mean_monetary,
            percent_of_initial: percent(mean_monetary, initial),
        })
        .collect()
}

/// Customer count and share per present segment, most common first
pub fn segment_distribution(records: &[&CustomerRecord]) -> Vec<SegmentShare> {
    let mut shares: Vec<SegmentShare> = group_by_segment(records)
        .into_iter()
        .map(|(segment, members)| SegmentShare {
            segment: segment.to_string(),
            customer_count: members.len(),
            share_percent: percent(members.len() as f64, records.len() as f64),
        })
        .collect();
    shares.sort_by(|a, b| b.customer_count.cmp(&a.customer_count));
    shares
}

/// Mean R, F and M for each present segment, sorted by segment label
pub fn rfm_profile_by_segment(records: &[&CustomerRecord]) -> Vec<RfmProfile> {
    let mut profiles: Vec<RfmProfile> = group_by_segment(records)
        .into_iter()
        .map(|(segment, members)| {
            let stats = summarize(&members);
            RfmProfile {
                segment: segment.to_string(),
                customer_count: stats.count,
                mean_recency: stats.mean_recency,
                mean_frequency: stats.mean_frequency,
                mean_monetary: stats.mean_monetary,
            }
        })
        .collect();
    profiles.sort_by(|a, b| a.segment.cmp(&b.segment));
    profiles
}

/// Segment labels in the table that the composition view will not show
pub fn segments_outside_universe(table: &SegmentTable, segment_universe: &[String]) -> Vec<String> {
    table
        .segment_labels()
        .into_iter()
        .filter(|label| !segment_universe.contains(label))
        .collect()
}

/// Filter the table and compute every dashboard aggregate from scratch
pub fn snapshot(
    table: &SegmentTable,
    selection: &FilterSelection,
    config: &DashboardConfig,
) -> DashboardSnapshot {
    let filtered = filter(table.records(), selection);
    debug!(
        selected = filtered.len(),
        total = table.len(),
        segments = selection.segments.len(),
        clusters = selection.clusters.len(),
        "recomputing dashboard"
    );

    DashboardSnapshot {
        selection: selection.clone(),
        summary: summarize(&filtered),
        cluster_sizes: aggregate_by_cluster(&filtered),
        funnel: funnel_by_segment(&filtered),
        segment_distribution: segment_distribution(&filtered),
        segment_composition: aggregate_by_segment(&filtered, &config.segment_universe),
        rfm_profile: rfm_profile_by_segment(&filtered),
        top_customers: top_n_by_monetary(&filtered, config.top_n)
            .into_iter()
            .cloned()
            .collect(),
    }
}

/// Group records by segment in order of first appearance
fn group_by_segment<'a, 'r>(
    records: &'r [&'a CustomerRecord],
) -> Vec<(&'a str, Vec<&'a CustomerRecord>)> {
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut groups: Vec<(&'a str, Vec<&'a CustomerRecord>)> = Vec::new();
    for &record in records {
        let segment = record.segment.as_str();
        let slot = *index.entry(segment).or_insert_with(|| {
            groups.push((segment, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(record);
    }
    groups
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// `part / whole` as a percentage rounded to one decimal; 0.0 when `whole` is zero
fn percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    (part / whole * 1000.0).round() / 10.0
}
