//! rfm-dashboard: customer segmentation dashboard over a precomputed RFM table
//!
//! The library loads a segmentation table (Recency, Frequency, Monetary,
//! segment and cluster per customer), filters it by segment and cluster, and
//! computes the summary statistics and per-segment / per-cluster aggregates
//! that the dashboard views render.

pub mod analysis;
pub mod cli;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod report;
pub mod viz;

// Re-export public items for easier access
pub use analysis::{
    aggregate_by_cluster, aggregate_by_segment, filter, funnel_by_segment, segment_distribution,
    segments_outside_universe, snapshot, summarize, top_n_by_monetary, DashboardConfig,
    DashboardSnapshot, FilterSelection, SummaryStats,
};
pub use cli::Args;
pub use dashboard::{run_session, Dashboard, DashboardEvent, View, ViewToggles};
pub use data::{load_segment_table, CustomerRecord, SegmentTable};
pub use error::{CommandError, InputError, SelectionError};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
