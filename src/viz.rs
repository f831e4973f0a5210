//! Chart rendering using Plotters for the dashboard views

use crate::analysis::{DashboardSnapshot, SegmentAggregate};
use crate::dashboard::{View, ViewToggles};
use plotters::element::Pie;
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;

/// Color palette for segments and clusters
const SERIES_COLORS: [RGBColor; 8] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
];

fn series_color(idx: usize) -> RGBColor {
    SERIES_COLORS[idx % SERIES_COLORS.len()]
}

/// Composition rows ordered by their share of value, largest first
pub fn composition_by_value(rows: &[SegmentAggregate]) -> Vec<&SegmentAggregate> {
    let mut sorted: Vec<&SegmentAggregate> = rows.iter().collect();
    sorted.sort_by(|a, b| b.percent_of_value.total_cmp(&a.percent_of_value));
    sorted
}

/// Upper bound for a value axis, leaving headroom above the tallest bar
pub fn axis_upper_bound(values: &[f64]) -> f64 {
    let max = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max);
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

/// File name used for a view's chart, if the view has one
pub fn chart_file_name(view: View) -> Option<&'static str> {
    match view {
        View::ClusterSizes => Some("cluster_sizes.png"),
        View::SegmentFunnel => Some("segment_funnel.png"),
        View::LifecyclePie => Some("lifecycle_pie.png"),
        View::SegmentComposition => Some("segment_composition.png"),
        View::TopCustomers => Some("top_customers.png"),
        View::RfmMatrix | View::SegmentInfo => None,
    }
}

/// Draw vertical bars, one per category label
///
/// # Arguments
/// * `output_path` - Path to save the PNG chart
/// * `caption` - Chart title
/// * `axes` - X and Y axis descriptions
/// * `labels` - Category label for each bar
/// * `values` - Bar heights, same length as `labels`
pub fn create_bar_chart(
    output_path: &Path,
    caption: &str,
    axes: (&str, &str),
    labels: &[String],
    values: &[f64],
) -> crate::Result<()> {
    let root = BitMapBackend::new(output_path, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let n_bars = labels.len().max(1) as i32;
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 26))
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d((0..n_bars).into_segmented(), 0f64..axis_upper_bound(values))?;

    let label_of = |value: &SegmentValue<i32>| match value {
        SegmentValue::CenterOf(idx) => labels.get(*idx as usize).cloned().unwrap_or_default(),
        _ => String::new(),
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len().max(1))
        .x_label_formatter(&label_of)
        .x_desc(axes.0)
        .y_desc(axes.1)
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(values.iter().enumerate().map(|(idx, &value)| {
        let x = idx as i32;
        Rectangle::new(
            [
                (SegmentValue::Exact(x), 0.0),
                (SegmentValue::Exact(x + 1), value),
            ],
            series_color(idx).filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}

/// Draw horizontal bars from top to bottom in the given order (funnel view)
pub fn create_funnel_chart(
    output_path: &Path,
    caption: &str,
    labels: &[String],
    values: &[f64],
) -> crate::Result<()> {
    let root = BitMapBackend::new(output_path, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let n_bars = labels.len().max(1) as i32;
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 26))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(160)
        .build_cartesian_2d(0f64..axis_upper_bound(values), (0..n_bars).into_segmented())?;

    // Bars are drawn from the top, so the first stage sits at the highest slot
    let label_of = |value: &SegmentValue<i32>| match value {
        SegmentValue::CenterOf(slot) => labels
            .get((n_bars - 1 - *slot) as usize)
            .cloned()
            .unwrap_or_default(),
        _ => String::new(),
    };
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(labels.len().max(1))
        .y_label_formatter(&label_of)
        .x_desc("Average Monetary Value")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(values.iter().enumerate().map(|(idx, &value)| {
        let slot = n_bars - 1 - idx as i32;
        Rectangle::new(
            [
                (0.0, SegmentValue::Exact(slot)),
                (value, SegmentValue::Exact(slot + 1)),
            ],
            series_color(idx).filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}

/// Draw a donut chart of segment shares
pub fn create_donut_chart(
    output_path: &Path,
    caption: &str,
    labels: &[String],
    values: &[f64],
) -> crate::Result<()> {
    let root = BitMapBackend::new(output_path, (600, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(caption, ("sans-serif", 26))?;

    // An empty selection has nothing to divide up
    if values.iter().sum::<f64>() > 0.0 {
        let (width, height) = root.dim_in_pixel();
        let center = (width as i32 / 2, height as i32 / 2);
        let radius = f64::from(width.min(height)) * 0.35;
        let colors: Vec<RGBColor> = (0..values.len()).map(series_color).collect();

        let mut pie = Pie::new(&center, &radius, values, &colors, labels);
        pie.donut_hole(radius * 0.4);
        pie.label_style(("sans-serif", 14).into_font());
        pie.percentages(("sans-serif", 14).into_font().color(&WHITE));
        root.draw(&pie)?;
    }

    root.present()?;
    Ok(())
}

/// Render a PNG for every enabled view that has a chart
///
/// # Returns
/// * Paths of the written charts
pub fn render_charts(
    snapshot: &DashboardSnapshot,
    toggles: &ViewToggles,
    output_dir: &Path,
) -> crate::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;

    let mut written = Vec::new();
    for view in toggles.enabled() {
        let Some(file_name) = chart_file_name(view) else {
            continue;
        };
        let path = output_dir.join(file_name);

        match view {
            View::ClusterSizes => {
                let labels: Vec<String> = snapshot
                    .cluster_sizes
                    .iter()
                    .map(|c| c.cluster.to_string())
                    .collect();
                let values: Vec<f64> = snapshot
                    .cluster_sizes
                    .iter()
                    .map(|c| c.customer_count as f64)
                    .collect();
                create_bar_chart(
                    &path,
                    "Customer Count per Cluster",
                    ("Cluster", "Number of Customers"),
                    &labels,
                    &values,
                )?;
            }
            View::SegmentFunnel => {
                let labels: Vec<String> =
                    snapshot.funnel.iter().map(|s| s.segment.clone()).collect();
                let values: Vec<f64> = snapshot.funnel.iter().map(|s| s.mean_monetary).collect();
                create_funnel_chart(
                    &path,
                    "Average Monetary Value by Segment",
                    &labels,
                    &values,
                )?;
            }
            View::LifecyclePie => {
                let labels: Vec<String> = snapshot
                    .segment_distribution
                    .iter()
                    .map(|s| s.segment.clone())
                    .collect();
                let values: Vec<f64> = snapshot
                    .segment_distribution
                    .iter()
                    .map(|s| s.customer_count as f64)
                    .collect();
                create_donut_chart(&path, "Customer Lifecycle Segment Share", &labels, &values)?;
            }
            View::SegmentComposition => {
                let rows = composition_by_value(&snapshot.segment_composition);
                let labels: Vec<String> = rows.iter().map(|r| r.segment.clone()).collect();
                let values: Vec<f64> = rows.iter().map(|r| r.percent_of_value).collect();
                create_bar_chart(
                    &path,
                    "Customer Value Contribution by Segment",
                    ("Segment", "% of Value"),
                    &labels,
                    &values,
                )?;
            }
            View::TopCustomers => {
                let labels: Vec<String> = snapshot
                    .top_customers
                    .iter()
                    .map(|c| c.customer_id.clone())
                    .collect();
                let values: Vec<f64> = snapshot.top_customers.iter().map(|c| c.monetary).collect();
                create_bar_chart(
                    &path,
                    "Top Customers by Monetary Value",
                    ("CustomerID", "Monetary"),
                    &labels,
                    &values,
                )?;
            }
            View::RfmMatrix | View::SegmentInfo => continue,
        }

        info!(view = ?view, path = %path.display(), "chart saved");
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{snapshot, DashboardConfig, FilterSelection};
    use crate::data::{CustomerRecord, SegmentTable};
    use tempfile::tempdir;

    fn create_test_table() -> SegmentTable {
        let rows = [
            ("12346", "Best Customers", 1, 4310.0),
            ("12347", "Best Customers", 1, 1797.24),
            ("12348", "Loyal Customers", 0, 1757.55),
            ("12350", "At-Risk Customers", 2, 334.4),
            ("12352", "Lost Customers", 3, 77.18),
        ];
        SegmentTable::new(
            rows.iter()
                .map(|&(id, segment, cluster, monetary)| CustomerRecord {
                    customer_id: id.to_string(),
                    recency: 20.0,
                    frequency: 5,
                    monetary,
                    segment: segment.to_string(),
                    cluster,
                })
                .collect(),
        )
        .unwrap()
    }

    fn assert_all_charts_written(written: &[PathBuf], dir: &Path) {
        assert_eq!(written.len(), 5);
        for view in View::ALL {
            if let Some(file_name) = chart_file_name(view) {
                assert!(dir.join(file_name).exists(), "missing {}", file_name);
            }
        }
    }

    fn aggregate(segment: &str, percent_of_value: f64) -> SegmentAggregate {
        SegmentAggregate {
            segment: segment.to_string(),
            customer_count: 1,
            total_monetary: percent_of_value,
            percent_of_customers: 25.0,
            percent_of_value,
        }
    }

    #[test]
    fn test_composition_by_value() {
        let rows = vec![
            aggregate("At-Risk Customers", 20.0),
            aggregate("Loyal Customers", 30.0),
            aggregate("Lost Customers", 0.0),
            aggregate("Best Customers", 50.0),
        ];

        let order: Vec<&str> = composition_by_value(&rows)
            .iter()
            .map(|r| r.segment.as_str())
            .collect();
        assert_eq!(
            order,
            vec!["Best Customers", "Loyal Customers", "At-Risk Customers", "Lost Customers"]
        );
    }

    #[test]
    fn test_axis_upper_bound() {
        assert_eq!(axis_upper_bound(&[]), 1.0);
        assert_eq!(axis_upper_bound(&[0.0, 0.0]), 1.0);
        assert!((axis_upper_bound(&[10.0, 40.0]) - 44.0).abs() < 1e-9);
        assert!((axis_upper_bound(&[f64::NAN, 5.0]) - 5.5).abs() < 1e-9);
    }

    #[test]
    fn test_chart_file_names() {
        let charts: Vec<View> = View::ALL
            .into_iter()
            .filter(|v| chart_file_name(*v).is_some())
            .collect();
        assert_eq!(charts.len(), 5);
        assert!(chart_file_name(View::RfmMatrix).is_none());
    }

    #[test]
    fn test_render_charts() {
        let table = create_test_table();
        let snap = snapshot(&table, &FilterSelection::all(&table), &DashboardConfig::default());
        let temp_dir = tempdir().unwrap();

        let result = render_charts(&snap, &ViewToggles::default(), temp_dir.path());
        assert!(result.is_ok());
        assert_all_charts_written(&result.unwrap(), temp_dir.path());
    }

    #[test]
    fn test_render_charts_for_empty_selection() {
        let table = create_test_table();
        // Best customers only live in cluster 1
        let selection = FilterSelection::new(["Best Customers"], [3]);
        let snap = snapshot(&table, &selection, &DashboardConfig::default());
        assert_eq!(snap.summary.count, 0);
        let temp_dir = tempdir().unwrap();

        let result = render_charts(&snap, &ViewToggles::default(), temp_dir.path());
        assert!(result.is_ok());
        assert_all_charts_written(&result.unwrap(), temp_dir.path());
    }

    #[test]
    fn test_render_charts_skips_hidden_views() {
        let table = create_test_table();
        let snap = snapshot(&table, &FilterSelection::all(&table), &DashboardConfig::default());
        let temp_dir = tempdir().unwrap();
        let toggles = ViewToggles::with_hidden([View::LifecyclePie, View::TopCustomers]);

        let written = render_charts(&snap, &toggles, temp_dir.path()).unwrap();
        assert_eq!(written.len(), 3);
        assert!(!temp_dir.path().join("lifecycle_pie.png").exists());
        assert!(!temp_dir.path().join("top_customers.png").exists());
    }

    #[test]
    fn test_create_donut_chart_single_segment() {
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("donut.png");

        let result = create_donut_chart(
            &output_path,
            "Customer Lifecycle Segment Share",
            &["Best Customers".to_string()],
            &[3.0],
        );
        assert!(result.is_ok());
        assert!(output_path.exists());
    }
}
