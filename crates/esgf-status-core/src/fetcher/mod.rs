//! ESGF node status scraper
//!
//! The status page is a client-side rendered Ant Design table, so fetching is
//! split in two:
//! 1. a [`PageRenderer`] loads the page in a real browser and returns the
//!    inner text of every cell of every table row
//! 2. [`collect_node_status`] turns those rows into a [`NodeStatus`]
//!
//! Row layout: first cell is the node name, second cell is "Yes" when the
//! node is up. Rows with fewer than two cells are skipped.

pub mod browser;

pub use browser::ChromeRenderer;

use crate::config::StatusConfig;
use crate::error::StatusFetchError;
use crate::models::NodeStatus;
use std::time::Duration;
use tracing::{debug, info};

/// Inner text of each cell in one table row
pub type TableRow = Vec<String>;

/// What to load and which elements make up the status table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeTarget {
    pub url: String,
    pub table_selector: String,
    pub row_selector: String,
    pub cell_selector: String,
    pub navigation_timeout: Duration,
    pub render_timeout: Duration,
}

impl ScrapeTarget {
    pub fn from_config(config: &StatusConfig) -> Self {
        Self {
            url: config.url.clone(),
            table_selector: config.table_selector.clone(),
            row_selector: config.row_selector.clone(),
            cell_selector: config.cell_selector.clone(),
            navigation_timeout: config.navigation_timeout,
            render_timeout: config.render_timeout,
        }
    }
}

/// Loads the status page and reads the table rows out of the rendered DOM
pub trait PageRenderer {
    /// Returns `Ok(None)` when the page rendered but has no table container.
    ///
    /// Implementations own any browser resources for the duration of the call
    /// and must release them before returning, on every path.
    fn render_rows(&self, target: &ScrapeTarget)
        -> Result<Option<Vec<TableRow>>, StatusFetchError>;
}

/// Source of fresh node status, the provider's view of the fetcher
pub trait FetchNodeStatus {
    fn fetch(&self) -> Result<NodeStatus, StatusFetchError>;
}

/// Scrapes node availability from the status page. One attempt per call.
#[derive(Debug, Clone)]
pub struct StatusFetcher<R = ChromeRenderer> {
    renderer: R,
    target: ScrapeTarget,
}

impl StatusFetcher<ChromeRenderer> {
    /// Headless Chrome fetcher for `config`
    pub fn from_config(config: &StatusConfig) -> Self {
        Self::new(ChromeRenderer::from_config(config), ScrapeTarget::from_config(config))
    }
}

impl<R: PageRenderer> StatusFetcher<R> {
    pub fn new(renderer: R, target: ScrapeTarget) -> Self {
        Self { renderer, target }
    }
}

impl<R: PageRenderer> FetchNodeStatus for StatusFetcher<R> {
    fn fetch(&self) -> Result<NodeStatus, StatusFetchError> {
        info!(url = %self.target.url, "Fetching ESGF node status");

        let rows = self
            .renderer
            .render_rows(&self.target)?
            .ok_or_else(|| StatusFetchError::TableNotFound {
                url: self.target.url.clone(),
                selector: self.target.table_selector.clone(),
            })?;

        let status = collect_node_status(rows);

        info!(
            nodes = status.len(),
            available = status.available_count(),
            "Fetched ESGF node status"
        );
        Ok(status)
    }
}

/// Build the node mapping from table rows.
///
/// Node names are trimmed; a repeated node keeps its last value.
pub fn collect_node_status<I>(rows: I) -> NodeStatus
where
    I: IntoIterator<Item = TableRow>,
{
    let mut status = NodeStatus::new();
    for cells in rows {
        match cells.as_slice() {
            [node, availability, ..] => {
                status.insert(node.trim(), parse_availability(availability));
            }
            _ => debug!(cells = ?cells, "Expected cells not found in row, skipping"),
        }
    }
    status
}

/// "yes" in any case means available; anything else means down
pub fn parse_availability(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn row(cells: &[&str]) -> TableRow {
        cells.iter().map(|c| c.to_string()).collect()
    }

    struct FakeRenderer {
        rows: Option<Vec<TableRow>>,
        calls: Cell<usize>,
    }

    impl FakeRenderer {
        fn with_rows(rows: Vec<TableRow>) -> Self {
            Self {
                rows: Some(rows),
                calls: Cell::new(0),
            }
        }

        fn without_table() -> Self {
            Self {
                rows: None,
                calls: Cell::new(0),
            }
        }
    }

    impl PageRenderer for FakeRenderer {
        fn render_rows(
            &self,
            _target: &ScrapeTarget,
        ) -> Result<Option<Vec<TableRow>>, StatusFetchError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.rows.clone())
        }
    }

    struct TimingOutRenderer;

    impl PageRenderer for TimingOutRenderer {
        fn render_rows(
            &self,
            target: &ScrapeTarget,
        ) -> Result<Option<Vec<TableRow>>, StatusFetchError> {
            Err(StatusFetchError::Timeout {
                operation: format!("waiting for {}", target.table_selector),
                timeout_secs: target.render_timeout.as_secs(),
            })
        }
    }

    fn target() -> ScrapeTarget {
        ScrapeTarget::from_config(&StatusConfig::new("/tmp/unused.json"))
    }

    #[test]
    fn test_parse_availability_is_case_insensitive() {
        assert!(parse_availability("Yes"));
        assert!(parse_availability("yes"));
        assert!(parse_availability("YES"));
        assert!(parse_availability("  yes\n"));
    }

    #[test]
    fn test_parse_availability_rejects_everything_else() {
        assert!(!parse_availability("No"));
        assert!(!parse_availability(""));
        assert!(!parse_availability("y"));
        assert!(!parse_availability("yes!"));
        assert!(!parse_availability("true"));
    }

    #[test]
    fn test_collect_trims_node_names() {
        let status = collect_node_status(vec![row(&["  esgf-node.llnl.gov \n", "Yes"])]);
        assert_eq!(status.get("esgf-node.llnl.gov"), Some(true));
    }

    #[test]
    fn test_collect_skips_short_rows() {
        let status = collect_node_status(vec![
            row(&["nodeA", "Yes"]),
            row(&["lonely-cell"]),
            row(&[]),
            row(&["nodeB", "No", "extra column"]),
        ]);

        assert_eq!(status.len(), 2);
        assert_eq!(status.get("nodeA"), Some(true));
        assert_eq!(status.get("nodeB"), Some(false));
        assert_eq!(status.get("lonely-cell"), None);
    }

    #[test]
    fn test_collect_last_row_wins_for_duplicates() {
        let status = collect_node_status(vec![row(&["nodeA", "Yes"]), row(&["nodeA", "no"])]);
        assert_eq!(status.get("nodeA"), Some(false));
    }

    #[test]
    fn test_fetch_builds_mapping() {
        let renderer = FakeRenderer::with_rows(vec![
            row(&["nodeA", "Yes"]),
            row(&["nodeB", "No"]),
            row(&["broken"]),
        ]);
        let fetcher = StatusFetcher::new(renderer, target());

        let status = fetcher.fetch().unwrap();

        let expected: NodeStatus = [("nodeA", true), ("nodeB", false)].into_iter().collect();
        assert_eq!(status, expected);
        assert_eq!(fetcher.renderer.calls.get(), 1);
    }

    #[test]
    fn test_fetch_empty_table_is_empty_mapping() {
        let fetcher = StatusFetcher::new(FakeRenderer::with_rows(vec![]), target());
        assert!(fetcher.fetch().unwrap().is_empty());
    }

    #[test]
    fn test_fetch_missing_table_is_structural_error() {
        let fetcher = StatusFetcher::new(FakeRenderer::without_table(), target());

        let err = fetcher.fetch().unwrap_err();

        assert!(err.is_structural());
        match err {
            StatusFetchError::TableNotFound { url, selector } => {
                assert_eq!(url, "https://aims2.llnl.gov/nodes");
                assert_eq!(selector, "tbody.ant-table-tbody");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_fetch_propagates_timeout_unchanged() {
        let fetcher = StatusFetcher::new(TimingOutRenderer, target());

        let err = fetcher.fetch().unwrap_err();

        assert!(!err.is_structural());
        assert!(matches!(
            err,
            StatusFetchError::Timeout {
                timeout_secs: 60,
                ..
            }
        ));
    }
}
