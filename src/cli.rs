//! Command-line interface definitions and argument parsing

use crate::analysis::{DashboardConfig, FilterSelection, DEFAULT_TOP_N};
use crate::dashboard::{View, ViewToggles};
use crate::data::SegmentTable;
use crate::error::SelectionError;
use clap::Parser;

/// RFM segmentation dashboard: filter customers by segment and cluster and
/// report summary statistics, tables and charts
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the segmentation CSV
    /// (columns: CustomerID, Recency, Frequency, Monetary, Segment, Cluster)
    #[arg(short, long, default_value = "rfm_analysis.csv")]
    pub input: String,

    /// Segments to include, separated by ';' (default: all)
    /// Example: --segments "Best Customers;Loyal Customers"
    #[arg(short, long, value_delimiter = ';')]
    pub segments: Vec<String>,

    /// Clusters to include, separated by ',' (default: all)
    #[arg(short, long, value_delimiter = ',', allow_negative_numbers = true)]
    pub clusters: Vec<i64>,

    /// Hide a dashboard view (repeatable)
    #[arg(long = "hide", value_enum)]
    pub hidden_views: Vec<View>,

    /// Number of customers in the top-customers view
    #[arg(short = 'n', long, default_value_t = DEFAULT_TOP_N)]
    pub top: usize,

    /// Full segment label set for the composition view, separated by ';'
    #[arg(long, value_delimiter = ';')]
    pub segment_universe: Vec<String>,

    /// Directory to write PNG charts into
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Write the computed snapshot as JSON to this path
    #[arg(long)]
    pub json: Option<String>,

    /// Read filter and toggle commands from stdin and re-render after each one
    #[arg(long)]
    pub interactive: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Segment universe and top-N settings, with duplicate labels dropped
    pub fn dashboard_config(&self) -> DashboardConfig {
        let mut config = DashboardConfig {
            top_n: self.top,
            ..DashboardConfig::default()
        };

        if !self.segment_universe.is_empty() {
            let mut universe: Vec<String> = Vec::with_capacity(self.segment_universe.len());
            for label in self.segment_universe.iter().map(|s| s.trim()) {
                if !label.is_empty() && !universe.iter().any(|u| u == label) {
                    universe.push(label.to_string());
                }
            }
            config.segment_universe = universe;
        }

        config
    }

    /// Initial selection: the requested labels, or everything in the table
    pub fn selection(&self, table: &SegmentTable) -> Result<FilterSelection, SelectionError> {
        let segments: Vec<String> = self
            .segments
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let segments = if segments.is_empty() {
            table.segment_labels()
        } else {
            segments
        };
        let clusters = if self.clusters.is_empty() {
            table.cluster_labels()
        } else {
            self.clusters.clone()
        };

        let selection = FilterSelection::new(segments, clusters);
        selection.validate(table)?;
        Ok(selection)
    }

    pub fn view_toggles(&self) -> ViewToggles {
        ViewToggles::with_hidden(self.hidden_views.iter().copied())
    }
}
