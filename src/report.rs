//! Plain-text dashboard report and JSON export

use crate::analysis::DashboardSnapshot;
use crate::dashboard::{View, ViewToggles};
use anyhow::Context;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Profile and suggested action for the standard segment labels
pub fn segment_guide(segment: &str) -> Option<(&'static str, &'static str)> {
    match segment {
        "Best Customers" => Some((
            "Recent, frequent and high-spending",
            "Reward with loyalty perks and early access",
        )),
        "Loyal Customers" => Some((
            "Buy regularly with solid spend",
            "Upsell and invite to referral programs",
        )),
        "At-Risk Customers" => Some((
            "Used to buy often but have gone quiet",
            "Send win-back offers before they lapse",
        )),
        "Lost Customers" => Some((
            "Long inactive with low engagement",
            "Run low-cost reactivation or suppress",
        )),
        _ => None,
    }
}

/// Format a dollar amount with thousands separators, e.g. `$12,345.68`
pub fn format_currency(amount: f64) -> String {
    if !amount.is_finite() {
        return "n/a".to_string();
    }

    let cents = format!("{:.2}", amount.abs());
    let (whole, fraction) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, digit) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{fraction}")
}

/// Format a mean with fixed precision, or `n/a` for an empty selection
pub fn format_mean(value: f64, precision: usize) -> String {
    if value.is_nan() {
        "n/a".to_string()
    } else {
        format!("{:.*}", precision, value)
    }
}

/// Write the KPI snapshot followed by every enabled view
pub fn render_report<W: Write>(
    snapshot: &DashboardSnapshot,
    toggles: &ViewToggles,
    out: &mut W,
) -> std::io::Result<()> {
    let summary = &snapshot.summary;
    writeln!(out, "\n### Customer Snapshot")?;
    writeln!(out, "  Total Customers: {}", summary.count)?;
    writeln!(out, "  Avg. Recency:    {} days", format_mean(summary.mean_recency, 0))?;
    writeln!(
        out,
        "  Avg. Frequency:  {} transactions",
        format_mean(summary.mean_frequency, 1)
    )?;
    writeln!(out, "  Avg. Monetary:   {}", format_currency(summary.mean_monetary))?;

    for view in toggles.enabled() {
        writeln!(out, "\n### {}", view.title())?;
        match view {
            View::ClusterSizes => write_cluster_sizes(snapshot, out)?,
            View::SegmentFunnel => write_funnel(snapshot, out)?,
            View::RfmMatrix => write_rfm_matrix(snapshot, out)?,
            View::SegmentInfo => write_segment_info(snapshot, out)?,
            View::LifecyclePie => write_distribution(snapshot, out)?,
            View::SegmentComposition => write_composition(snapshot, out)?,
            View::TopCustomers => write_top_customers(snapshot, out)?,
        }
    }

    Ok(())
}

fn write_empty<W: Write>(out: &mut W) -> std::io::Result<()> {
    writeln!(out, "  (no customers match the current filters)")
}

fn write_cluster_sizes<W: Write>(snapshot: &DashboardSnapshot, out: &mut W) -> std::io::Result<()> {
    if snapshot.cluster_sizes.is_empty() {
        return write_empty(out);
    }
    writeln!(out, "  Cluster | Customers")?;
    writeln!(out, "  --------|----------")?;
    for row in &snapshot.cluster_sizes {
        writeln!(out, "  {:7} | {:9}", row.cluster, row.customer_count)?;
    }
    Ok(())
}

fn write_funnel<W: Write>(snapshot: &DashboardSnapshot, out: &mut W) -> std::io::Result<()> {
    if snapshot.funnel.is_empty() {
        return write_empty(out);
    }
    writeln!(out, "  {:<20} | {:>14} | {:>9}", "Segment", "Avg. Monetary", "% Initial")?;
    for stage in &snapshot.funnel {
        writeln!(
            out,
            "  {:<20} | {:>14} | {:>8.1}%",
            stage.segment,
            format_currency(stage.mean_monetary),
            stage.percent_of_initial
        )?;
    }
    Ok(())
}

fn write_rfm_matrix<W: Write>(snapshot: &DashboardSnapshot, out: &mut W) -> std::io::Result<()> {
    if snapshot.rfm_profile.is_empty() {
        return write_empty(out);
    }
    writeln!(
        out,
        "  {:<20} | {:>9} | {:>7} | {:>9} | {:>14}",
        "Segment", "Customers", "Recency", "Frequency", "Monetary"
    )?;
    for row in &snapshot.rfm_profile {
        writeln!(
            out,
            "  {:<20} | {:>9} | {:>7} | {:>9} | {:>14}",
            row.segment,
            row.customer_count,
            format_mean(row.mean_recency, 0),
            format_mean(row.mean_frequency, 1),
            format_currency(row.mean_monetary)
        )?;
    }
    Ok(())
}

fn write_segment_info<W: Write>(snapshot: &DashboardSnapshot, out: &mut W) -> std::io::Result<()> {
    for row in &snapshot.segment_composition {
        let (profile, action) = segment_guide(&row.segment).unwrap_or(("-", "-"));
        writeln!(out, "  {} ({} customers)", row.segment, row.customer_count)?;
        writeln!(out, "    profile: {}", profile)?;
        writeln!(out, "    action:  {}", action)?;
    }
    Ok(())
}

fn write_distribution<W: Write>(snapshot: &DashboardSnapshot, out: &mut W) -> std::io::Result<()> {
    if snapshot.segment_distribution.is_empty() {
        return write_empty(out);
    }
    writeln!(out, "  {:<20} | {:>9} | {:>6}", "Segment", "Customers", "Share")?;
    for row in &snapshot.segment_distribution {
        writeln!(
            out,
            "  {:<20} | {:>9} | {:>5.1}%",
            row.segment, row.customer_count, row.share_percent
        )?;
    }
    Ok(())
}

fn write_composition<W: Write>(snapshot: &DashboardSnapshot, out: &mut W) -> std::io::Result<()> {
    writeln!(
        out,
        "  {:<20} | {:>9} | {:>14} | {:>12} | {:>10}",
        "Segment", "Customers", "Total Monetary", "% Customers", "% Value"
    )?;
    for row in &snapshot.segment_composition {
        writeln!(
            out,
            "  {:<20} | {:>9} | {:>14} | {:>11.1}% | {:>9.1}%",
            row.segment,
            row.customer_count,
            format_currency(row.total_monetary),
            row.percent_of_customers,
            row.percent_of_value
        )?;
    }
    Ok(())
}

fn write_top_customers<W: Write>(snapshot: &DashboardSnapshot, out: &mut W) -> std::io::Result<()> {
    if snapshot.top_customers.is_empty() {
        return write_empty(out);
    }
    writeln!(
        out,
        "  {:<10} | {:>14} | {:<20} | {:>7} | {:>9} | {:>7}",
        "Customer", "Monetary", "Segment", "Recency", "Frequency", "Cluster"
    )?;
    for customer in &snapshot.top_customers {
        writeln!(
            out,
            "  {:<10} | {:>14} | {:<20} | {:>7.0} | {:>9} | {:>7}",
            customer.customer_id,
            format_currency(customer.monetary),
            customer.segment,
            customer.recency,
            customer.frequency,
            customer.cluster
        )?;
    }
    Ok(())
}

/// Save the snapshot as pretty-printed JSON; NaN means become `null`
pub fn write_json(snapshot: &DashboardSnapshot, path: impl AsRef<Path>) -> crate::Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, snapshot)?;
    writer.flush()?;

    info!(path = %path.display(), "snapshot written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{snapshot, DashboardConfig, FilterSelection};
    use crate::data::{CustomerRecord, SegmentTable};
    use tempfile::tempdir;

    fn sample_table() -> SegmentTable {
        let rows = [
            ("1", "Best Customers", 1, 1250.5),
            ("2", "Lost Customers", 3, 40.0),
            ("3", "Loyal Customers", 0, 640.25),
        ];
        SegmentTable::new(
            rows.iter()
                .map(|&(id, segment, cluster, monetary)| CustomerRecord {
                    customer_id: id.to_string(),
                    recency: 12.0,
                    frequency: 3,
                    monetary,
                    segment: segment.to_string(),
                    cluster,
                })
                .collect(),
        )
        .unwrap()
    }

    fn render(selection: &FilterSelection, table: &SegmentTable, toggles: &ViewToggles) -> String {
        let snap = snapshot(table, selection, &DashboardConfig::default());
        let mut out = Vec::new();
        render_report(&snap, toggles, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(999.999), "$1,000.00");
        assert_eq!(format_currency(1234567.891), "$1,234,567.89");
        assert_eq!(format_currency(-42.5), "-$42.50");
        assert_eq!(format_currency(f64::NAN), "n/a");
    }

    #[test]
    fn test_format_mean() {
        assert_eq!(format_mean(12.345, 1), "12.3");
        assert_eq!(format_mean(f64::NAN, 0), "n/a");
    }

    #[test]
    fn test_report_lists_enabled_views() {
        let table = sample_table();
        let text = render(
            &FilterSelection::all(&table),
            &table,
            &ViewToggles::with_hidden([View::RfmMatrix]),
        );

        assert!(text.contains("Total Customers: 3"));
        assert!(text.contains("Avg. Monetary:   $643.58"));
        assert!(text.contains("### Segment Composition Overview"));
        assert!(text.contains("### Top High-Value Customers"));
        assert!(!text.contains("### RFM Heat Table"));
        assert!(text.contains("Send win-back offers"));
    }

    #[test]
    fn test_report_for_empty_selection() {
        let table = sample_table();
        let selection = FilterSelection::new(["Best Customers"], [3]);
        let text = render(&selection, &table, &ViewToggles::default());

        assert!(text.contains("Total Customers: 0"));
        assert!(text.contains("Avg. Recency:    n/a days"));
        assert!(text.contains("no customers match"));
        // composition keeps every label even when nothing matches
        assert!(text.contains("At-Risk Customers"));
    }

    #[test]
    fn test_write_json() {
        let table = sample_table();
        let snap = snapshot(&table, &FilterSelection::all(&table), &DashboardConfig::default());
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        write_json(&snap, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["summary"]["count"], 3);
        assert_eq!(value["top_customers"][0]["customer_id"], "1");
        assert_eq!(value["segment_composition"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_write_json_serializes_nan_as_null() {
        let table = sample_table();
        let selection = FilterSelection::new(Vec::<String>::new(), []);
        let snap = snapshot(&table, &selection, &DashboardConfig::default());
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.json");

        write_json(&snap, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(value["summary"]["mean_monetary"].is_null());
    }
}
