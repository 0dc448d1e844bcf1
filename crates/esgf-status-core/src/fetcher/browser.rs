//! Headless Chrome renderer
//!
//! Each call launches its own browser, loads the page, waits for the network
//! to settle and for the table, then reads all cells in one script
//! evaluation. The browser is owned by a [`RenderSession`] and shut down when
//! it drops, whichever way the call exits.

use super::{PageRenderer, ScrapeTarget, TableRow};
use crate::config::StatusConfig;
use crate::error::StatusFetchError;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::Network;
use headless_chrome::util::Timeout;
use headless_chrome::{Browser, LaunchOptions, Tab};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// How long the page must go without an open request to count as idle
pub const NETWORK_QUIET_PERIOD: Duration = Duration::from_millis(500);

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// [`PageRenderer`] backed by a local Chrome/Chromium install
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    chrome_path: Option<PathBuf>,
    sandbox: bool,
}

impl ChromeRenderer {
    pub fn from_config(config: &StatusConfig) -> Self {
        Self {
            chrome_path: config.chrome_path.clone(),
            sandbox: config.sandbox,
        }
    }
}

impl PageRenderer for ChromeRenderer {
    fn render_rows(
        &self,
        target: &ScrapeTarget,
    ) -> Result<Option<Vec<TableRow>>, StatusFetchError> {
        let session = RenderSession::launch(self, target)?;
        render_page(&session, target)
    }
}

/// One page load, split into the steps [`render_page`] runs in order
trait PageSession {
    fn navigate(&self, target: &ScrapeTarget) -> Result<(), StatusFetchError>;
    fn wait_for_network_idle(&self, target: &ScrapeTarget) -> Result<(), StatusFetchError>;
    fn wait_for_table(&self, target: &ScrapeTarget) -> Result<(), StatusFetchError>;
    fn read_rows(&self, target: &ScrapeTarget)
        -> Result<Option<Vec<TableRow>>, StatusFetchError>;
}

/// Load the page and read the table rows.
///
/// The table body is mounted with a placeholder row before the node data
/// request completes, so the table wait alone can succeed on an empty table.
/// Rows are only read once the network has been idle.
fn render_page<S: PageSession>(
    session: &S,
    target: &ScrapeTarget,
) -> Result<Option<Vec<TableRow>>, StatusFetchError> {
    session.navigate(target)?;
    session.wait_for_network_idle(target)?;
    session.wait_for_table(target)?;
    session.read_rows(target)
}

/// Requests the page has sent but not yet finished or failed
#[derive(Debug)]
struct NetworkActivity {
    in_flight: HashSet<String>,
    last_change: Instant,
}

impl NetworkActivity {
    fn new(now: Instant) -> Self {
        Self {
            in_flight: HashSet::new(),
            last_change: now,
        }
    }

    /// A redirect re-sends under the same id and stays one request
    fn request_sent(&mut self, request_id: &str, now: Instant) {
        self.in_flight.insert(request_id.to_string());
        self.last_change = now;
    }

    fn request_settled(&mut self, request_id: &str, now: Instant) {
        if self.in_flight.remove(request_id) {
            self.last_change = now;
        }
    }

    fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn is_idle_at(&self, now: Instant, quiet: Duration) -> bool {
        self.in_flight.is_empty() && now.saturating_duration_since(self.last_change) >= quiet
    }

    fn record(&mut self, event: &Event, now: Instant) {
        match event {
            Event::NetworkRequestWillBeSent(e) => self.request_sent(&e.params.request_id, now),
            Event::NetworkLoadingFinished(e) => self.request_settled(&e.params.request_id, now),
            Event::NetworkLoadingFailed(e) => self.request_settled(&e.params.request_id, now),
            _ => {}
        }
    }
}

/// One browser process and tab, released on drop
struct RenderSession {
    tab: Arc<Tab>,
    activity: Arc<Mutex<NetworkActivity>>,
    // Dropping `Browser` terminates the Chrome process
    _browser: Browser,
}

impl RenderSession {
    fn launch(renderer: &ChromeRenderer, target: &ScrapeTarget) -> Result<Self, StatusFetchError> {
        let options = LaunchOptions {
            headless: true,
            sandbox: renderer.sandbox,
            path: renderer.chrome_path.clone(),
            // Must outlast the longest wait or the connection is dropped mid-render
            idle_browser_timeout: target.navigation_timeout * 2
                + target.render_timeout
                + Duration::from_secs(10),
            ..Default::default()
        };

        let browser = Browser::new(options).map_err(|e| StatusFetchError::BrowserLaunch {
            message: format!("{e:#}"),
        })?;
        let tab = browser
            .new_tab()
            .map_err(|e| StatusFetchError::BrowserLaunch {
                message: format!("could not open tab: {e:#}"),
            })?;

        let activity = Arc::new(Mutex::new(NetworkActivity::new(Instant::now())));
        let listener_activity = Arc::clone(&activity);
        tab.add_event_listener(Arc::new(move |event: &Event| {
            listener_activity.lock().record(event, Instant::now());
        }))
        .map_err(|e| StatusFetchError::BrowserLaunch {
            message: format!("could not watch network events: {e:#}"),
        })?;
        tab.call_method(Network::Enable {
            max_total_buffer_size: None,
            max_resource_buffer_size: None,
            max_post_data_size: None,
            report_direct_socket_traffic: None,
            enable_durable_messages: None,
        })
        .map_err(|e| StatusFetchError::BrowserLaunch {
            message: format!("could not enable network events: {e:#}"),
        })?;

        debug!("Launched headless browser session");
        Ok(Self {
            tab,
            activity,
            _browser: browser,
        })
    }
}

impl PageSession for RenderSession {
    /// Navigate and wait until the main document has loaded
    fn navigate(&self, target: &ScrapeTarget) -> Result<(), StatusFetchError> {
        self.tab.set_default_timeout(target.navigation_timeout);
        self.tab
            .navigate_to(&target.url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| StatusFetchError::Navigation {
                url: target.url.clone(),
                message: format!("{e:#}"),
            })?;
        debug!(url = %target.url, "Status page loaded");
        Ok(())
    }

    /// Wait until no request has been open for [`NETWORK_QUIET_PERIOD`]
    fn wait_for_network_idle(&self, target: &ScrapeTarget) -> Result<(), StatusFetchError> {
        let started = Instant::now();
        loop {
            let now = Instant::now();
            let in_flight = {
                let activity = self.activity.lock();
                if activity.is_idle_at(now, NETWORK_QUIET_PERIOD) {
                    debug!(
                        waited_ms = now.duration_since(started).as_millis() as u64,
                        "Network idle"
                    );
                    return Ok(());
                }
                activity.in_flight()
            };

            if now.duration_since(started) >= target.navigation_timeout {
                return Err(StatusFetchError::Navigation {
                    url: target.url.clone(),
                    message: format!(
                        "network not idle after {}s ({in_flight} requests in flight)",
                        target.navigation_timeout.as_secs()
                    ),
                });
            }
            trace!(in_flight, "Waiting for network idle");
            thread::sleep(IDLE_POLL_INTERVAL);
        }
    }

    /// Wait for the table body to be rendered by the page's scripts
    fn wait_for_table(&self, target: &ScrapeTarget) -> Result<(), StatusFetchError> {
        self.tab
            .wait_for_element_with_custom_timeout(&target.table_selector, target.render_timeout)
            .map_err(|e| table_wait_error(e, target))?;
        Ok(())
    }

    fn read_rows(&self, target: &ScrapeTarget) -> Result<Option<Vec<TableRow>>, StatusFetchError> {
        let extraction_error = |message: String| StatusFetchError::Extraction {
            url: target.url.clone(),
            message,
        };

        let script = extraction_script(target).map_err(|e| extraction_error(e.to_string()))?;
        let result = self
            .tab
            .evaluate(&script, false)
            .map_err(|e| extraction_error(format!("{e:#}")))?;

        match result.value {
            Some(serde_json::Value::String(json)) => {
                serde_json::from_str(&json).map_err(|e| extraction_error(e.to_string()))
            }
            other => Err(extraction_error(format!(
                "unexpected script result: {other:?}"
            ))),
        }
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(false) {
            warn!(error = %e, "Failed to close status page tab");
        }
        debug!("Released headless browser session");
    }
}

/// Only running out of time is a `Timeout`; a lost connection or crashed tab
/// during the wait is an extraction failure
fn table_wait_error(error: anyhow::Error, target: &ScrapeTarget) -> StatusFetchError {
    debug!(error = %error, selector = %target.table_selector, "Table wait failed");
    if error.downcast_ref::<Timeout>().is_some() {
        StatusFetchError::Timeout {
            operation: format!("waiting for {} at {}", target.table_selector, target.url),
            timeout_secs: target.render_timeout.as_secs(),
        }
    } else {
        StatusFetchError::Extraction {
            url: target.url.clone(),
            message: format!("waiting for {}: {error:#}", target.table_selector),
        }
    }
}

/// Script returning the rows as a JSON string, or `"null"` without a table
fn extraction_script(target: &ScrapeTarget) -> Result<String, serde_json::Error> {
    let table = serde_json::to_string(&target.table_selector)?;
    let row = serde_json::to_string(&target.row_selector)?;
    let cell = serde_json::to_string(&target.cell_selector)?;

    Ok(format!(
        r#"(() => {{
    const body = document.querySelector({table});
    if (!body) {{
        return JSON.stringify(null);
    }}
    const rows = Array.from(body.querySelectorAll({row})).map(
        (row) => Array.from(row.querySelectorAll({cell})).map((td) => td.innerText)
    );
    return JSON.stringify(rows);
}})()"#
    ))
}
