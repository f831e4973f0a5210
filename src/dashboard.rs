//! Dashboard state, interaction events and the recompute-on-change session loop

use crate::analysis::{self, DashboardConfig, DashboardSnapshot, FilterSelection};
use crate::data::SegmentTable;
use crate::error::{CommandError, SelectionError};
use clap::ValueEnum;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::{BufRead, Write};
use std::str::FromStr;
use tracing::{info, warn};

/// A togglable section of the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ValueEnum)]
pub enum View {
    ClusterSizes,
    SegmentFunnel,
    RfmMatrix,
    SegmentInfo,
    LifecyclePie,
    SegmentComposition,
    TopCustomers,
}

impl View {
    pub const ALL: [View; 7] = [
        View::ClusterSizes,
        View::SegmentFunnel,
        View::RfmMatrix,
        View::SegmentInfo,
        View::LifecyclePie,
        View::SegmentComposition,
        View::TopCustomers,
    ];

    pub fn title(self) -> &'static str {
        match self {
            View::ClusterSizes => "Cluster Size Distribution",
            View::SegmentFunnel => "Segment Value Funnel",
            View::RfmMatrix => "RFM Heat Table",
            View::SegmentInfo => "Segment Info",
            View::LifecyclePie => "Customer Lifecycle Distribution",
            View::SegmentComposition => "Segment Composition Overview",
            View::TopCustomers => "Top High-Value Customers",
        }
    }
}

/// Which views are shown; everything is on by default
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewToggles {
    hidden: BTreeSet<View>,
}

impl ViewToggles {
    pub fn with_hidden(hidden: impl IntoIterator<Item = View>) -> Self {
        Self {
            hidden: hidden.into_iter().collect(),
        }
    }

    pub fn is_enabled(&self, view: View) -> bool {
        !self.hidden.contains(&view)
    }

    pub fn set(&mut self, view: View, enabled: bool) {
        if enabled {
            self.hidden.remove(&view);
        } else {
            self.hidden.insert(view);
        }
    }

    pub fn enabled(&self) -> impl Iterator<Item = View> + '_ {
        View::ALL.into_iter().filter(|v| self.is_enabled(*v))
    }
}

/// Either every label in the table or an explicit list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelChoice<T> {
    All,
    Only(Vec<T>),
}

/// One user interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardEvent {
    Segments(LabelChoice<String>),
    Clusters(LabelChoice<i64>),
    Show(View),
    Hide(View),
    Reset,
    Render,
    Quit,
}

impl FromStr for DashboardEvent {
    type Err = CommandError;

    /// Parse a command line such as `segments Best Customers;Lost Customers`,
    /// `clusters 0,2`, `hide rfm-matrix` or `quit`
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command.to_ascii_lowercase().as_str() {
            "segments" => {
                let labels = required(rest, "segments")?;
                if labels.eq_ignore_ascii_case("all") {
                    return Ok(Self::Segments(LabelChoice::All));
                }
                let labels = labels
                    .split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                Ok(Self::Segments(LabelChoice::Only(labels)))
            }
            "clusters" => {
                let ids = required(rest, "clusters")?;
                if ids.eq_ignore_ascii_case("all") {
                    return Ok(Self::Clusters(LabelChoice::All));
                }
                let ids = ids
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        s.parse::<i64>()
                            .map_err(|_| CommandError::InvalidCluster(s.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::Clusters(LabelChoice::Only(ids)))
            }
            "show" => Ok(Self::Show(parse_view(required(rest, "show")?)?)),
            "hide" => Ok(Self::Hide(parse_view(required(rest, "hide")?)?)),
            "reset" => Ok(Self::Reset),
            "render" => Ok(Self::Render),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn required<'a>(rest: &'a str, command: &'static str) -> Result<&'a str, CommandError> {
    if rest.is_empty() {
        return Err(CommandError::MissingArgument(command));
    }
    Ok(rest)
}

fn parse_view(name: &str) -> Result<View, CommandError> {
    <View as ValueEnum>::from_str(name, true).map_err(|_| CommandError::UnknownView(name.to_string()))
}

/// What the session should do after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Render,
    Quit,
}

/// Current selection and toggles over an immutable table
#[derive(Debug)]
pub struct Dashboard<'a> {
    table: &'a SegmentTable,
    config: DashboardConfig,
    selection: FilterSelection,
    toggles: ViewToggles,
}

impl<'a> Dashboard<'a> {
    pub fn new(
        table: &'a SegmentTable,
        config: DashboardConfig,
        selection: FilterSelection,
        toggles: ViewToggles,
    ) -> Self {
        let outside = analysis::segments_outside_universe(table, &config.segment_universe);
        if !outside.is_empty() {
            warn!(
                segments = ?outside,
                "segments outside the composition universe are left out of the composition view"
            );
        }

        Self {
            table,
            config,
            selection,
            toggles,
        }
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    pub fn toggles(&self) -> &ViewToggles {
        &self.toggles
    }

    /// Apply one event; the state is left unchanged when the event names unknown labels
    pub fn apply(&mut self, event: DashboardEvent) -> Result<Flow, SelectionError> {
        match event {
            DashboardEvent::Segments(choice) => {
                let segments = match choice {
                    LabelChoice::All => self.table.segment_labels(),
                    LabelChoice::Only(labels) => labels,
                };
                let selection = FilterSelection::new(segments, self.selection.clusters.clone());
                self.select(selection)?;
            }
            DashboardEvent::Clusters(choice) => {
                let clusters = match choice {
                    LabelChoice::All => self.table.cluster_labels(),
                    LabelChoice::Only(ids) => ids,
                };
                let selection = FilterSelection::new(self.selection.segments.clone(), clusters);
                self.select(selection)?;
            }
            DashboardEvent::Show(view) => self.toggles.set(view, true),
            DashboardEvent::Hide(view) => self.toggles.set(view, false),
            DashboardEvent::Reset => {
                self.selection = FilterSelection::all(self.table);
                self.toggles = ViewToggles::default();
                info!("dashboard reset");
            }
            DashboardEvent::Render => {}
            DashboardEvent::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Render)
    }

    fn select(&mut self, selection: FilterSelection) -> Result<(), SelectionError> {
        selection.validate(self.table)?;
        if selection.segments.is_empty() || selection.clusters.is_empty() {
            warn!("selection is empty; every view will be empty");
        }
        info!(
            segments = selection.segments.len(),
            clusters = selection.clusters.len(),
            "selection changed"
        );
        self.selection = selection;
        Ok(())
    }

    /// Recompute every aggregate for the current selection
    pub fn snapshot(&self) -> DashboardSnapshot {
        analysis::snapshot(self.table, &self.selection, &self.config)
    }
}

/// Run an interactive session: render, then re-render after every event
///
/// Bad commands and unknown labels are reported on `out` and the session
/// continues. Ends on `quit` or end of input.
pub fn run_session<R, W, F>(
    dashboard: &mut Dashboard<'_>,
    input: R,
    out: &mut W,
    mut render: F,
) -> crate::Result<()>
where
    R: BufRead,
    W: Write,
    F: FnMut(&Dashboard<'_>, &mut W) -> crate::Result<()>,
{
    render(dashboard, out)?;
    prompt(out)?;

    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            prompt(out)?;
            continue;
        }

        let flow = line
            .parse::<DashboardEvent>()
            .map_err(anyhow::Error::from)
            .and_then(|event| dashboard.apply(event).map_err(anyhow::Error::from));
        match flow {
            Ok(Flow::Quit) => break,
            Ok(Flow::Render) => render(dashboard, out)?,
            Err(err) => {
                warn!(command = %line.trim(), "rejected: {err}");
                writeln!(out, "error: {err}")?;
            }
        }
        prompt(out)?;
    }

    Ok(())
}

fn prompt<W: Write>(out: &mut W) -> std::io::Result<()> {
    write!(out, "> ")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CustomerRecord;
    use std::io::Cursor;

    fn record(id: &str, segment: &str, cluster: i64, monetary: f64) -> CustomerRecord {
        CustomerRecord {
            customer_id: id.to_string(),
            recency: 30.0,
            frequency: 4,
            monetary,
            segment: segment.to_string(),
            cluster,
        }
    }

    fn sample_table() -> SegmentTable {
        SegmentTable::new(vec![
            record("1", "Best Customers", 0, 900.0),
            record("2", "Lost Customers", 1, 50.0),
            record("3", "Loyal Customers", 0, 400.0),
            record("4", "Lost Customers", 2, 20.0),
        ])
        .unwrap()
    }

    fn dashboard(table: &SegmentTable) -> Dashboard<'_> {
        Dashboard::new(
            table,
            DashboardConfig::default(),
            FilterSelection::all(table),
            ViewToggles::default(),
        )
    }

    #[test]
    fn test_parse_events() {
        assert_eq!(
            "segments Best Customers; Lost Customers".parse::<DashboardEvent>(),
            Ok(DashboardEvent::Segments(LabelChoice::Only(vec![
                "Best Customers".to_string(),
                "Lost Customers".to_string()
            ])))
        );
        assert_eq!(
            "clusters 0, 2".parse::<DashboardEvent>(),
            Ok(DashboardEvent::Clusters(LabelChoice::Only(vec![0, 2])))
        );
        assert_eq!(
            "segments all".parse::<DashboardEvent>(),
            Ok(DashboardEvent::Segments(LabelChoice::All))
        );
        assert_eq!(
            "hide rfm-matrix".parse::<DashboardEvent>(),
            Ok(DashboardEvent::Hide(View::RfmMatrix))
        );
        assert_eq!("QUIT".parse::<DashboardEvent>(), Ok(DashboardEvent::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "clusters 0,x".parse::<DashboardEvent>(),
            Err(CommandError::InvalidCluster("x".to_string()))
        );
        assert_eq!(
            "show".parse::<DashboardEvent>(),
            Err(CommandError::MissingArgument("show"))
        );
        assert_eq!(
            "hide sparkline".parse::<DashboardEvent>(),
            Err(CommandError::UnknownView("sparkline".to_string()))
        );
        assert!(matches!(
            "zoom 2".parse::<DashboardEvent>(),
            Err(CommandError::Unknown(_))
        ));
    }

    #[test]
    fn test_view_toggles() {
        let mut toggles = ViewToggles::with_hidden([View::TopCustomers]);
        assert!(!toggles.is_enabled(View::TopCustomers));
        assert_eq!(toggles.enabled().count(), 6);

        toggles.set(View::TopCustomers, true);
        toggles.set(View::LifecyclePie, false);
        assert!(toggles.is_enabled(View::TopCustomers));
        assert!(!toggles.is_enabled(View::LifecyclePie));
    }

    #[test]
    fn test_apply_selection_changes() {
        let table = sample_table();
        let mut dash = dashboard(&table);
        assert_eq!(dash.snapshot().summary.count, 4);

        let flow = dash
            .apply(DashboardEvent::Segments(LabelChoice::Only(vec![
                "Lost Customers".to_string(),
            ])))
            .unwrap();
        assert_eq!(flow, Flow::Render);
        assert_eq!(dash.snapshot().summary.count, 2);

        dash.apply(DashboardEvent::Clusters(LabelChoice::Only(vec![2])))
            .unwrap();
        let snap = dash.snapshot();
        assert_eq!(snap.summary.count, 1);
        assert_eq!(snap.top_customers[0].customer_id, "4");

        dash.apply(DashboardEvent::Reset).unwrap();
        assert_eq!(dash.selection(), &FilterSelection::all(&table));
    }

    #[test]
    fn test_unknown_label_keeps_previous_selection() {
        let table = sample_table();
        let mut dash = dashboard(&table);
        let before = dash.selection().clone();

        let result = dash.apply(DashboardEvent::Clusters(LabelChoice::Only(vec![7])));
        assert_eq!(result, Err(SelectionError::UnknownCluster(7)));
        assert_eq!(dash.selection(), &before);
    }

    #[test]
    fn test_empty_selection_is_allowed() {
        let table = sample_table();
        let mut dash = dashboard(&table);

        dash.apply(DashboardEvent::Clusters(LabelChoice::Only(vec![])))
            .unwrap();
        let snap = dash.snapshot();
        assert_eq!(snap.summary.count, 0);
        assert!(snap.summary.mean_monetary.is_nan());
    }

    #[test]
    fn test_run_session_renders_after_each_event() {
        let table = sample_table();
        let mut dash = dashboard(&table);
        let input = Cursor::new("clusters 0\nbogus\n\nsegments Nobody\nhide top-customers\nquit\nclusters 1\n");
        let mut out = Vec::new();
        let mut counts = Vec::new();

        run_session(&mut dash, input, &mut out, |d, out| {
            counts.push(d.snapshot().summary.count);
            writeln!(out, "rendered")?;
            Ok(())
        })
        .unwrap();

        // initial render, clusters 0, hide top-customers; quit stops before "clusters 1"
        assert_eq!(counts, vec![4, 2, 2]);
        assert!(!dash.toggles().is_enabled(View::TopCustomers));

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("error: unknown command 'bogus'"));
        assert!(text.contains("error: unknown segment 'Nobody'"));
    }
}
