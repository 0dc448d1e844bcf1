//! Output formatting for esgf-status commands
//!
//! Every formatter returns a `String` so commands stay testable without a TTY.

use chrono::{DateTime, Local};
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use esgf_status_core::{NodeStatus, StatusCache};
use serde_json::json;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

// ============================================================================
// Node Status
// ============================================================================

/// Format node status as table (human) or JSON object
pub fn format_status_table(
    status: &NodeStatus,
    available_only: bool,
    json: bool,
    no_color: bool,
) -> String {
    let rows: Vec<(&str, bool)> = status
        .iter()
        .filter(|(_, available)| !available_only || *available)
        .collect();

    if json {
        let object: serde_json::Map<String, serde_json::Value> = rows
            .iter()
            .map(|(node, available)| (node.to_string(), json!(available)))
            .collect();
        return serde_json::to_string_pretty(&object).unwrap_or_else(|_| "{}".to_string());
    }

    if rows.is_empty() {
        return "No nodes found.".to_string();
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    if no_color {
        table.set_header(vec!["Node", "Available"]);
    } else {
        table.set_header(vec![
            Cell::new("Node").fg(Color::Cyan),
            Cell::new("Available").fg(Color::Cyan),
        ]);
    }

    for (node, available) in &rows {
        let label = availability_label(*available);
        if no_color {
            table.add_row(Row::from(vec![Cell::new(node), Cell::new(label)]));
        } else {
            let color = if *available { Color::Green } else { Color::Red };
            table.add_row(Row::from(vec![
                Cell::new(node),
                Cell::new(label).fg(color),
            ]));
        }
    }

    format!(
        "{table}\n{} of {} nodes available",
        status.available_count(),
        status.len()
    )
}

// ============================================================================
// Check
// ============================================================================

/// Result of checking one requested node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCheck {
    Available,
    Unavailable,
    Unknown,
}

impl NodeCheck {
    pub fn from_lookup(lookup: Option<bool>) -> Self {
        match lookup {
            Some(true) => NodeCheck::Available,
            Some(false) => NodeCheck::Unavailable,
            None => NodeCheck::Unknown,
        }
    }

    fn label(self) -> &'static str {
        match self {
            NodeCheck::Available => "available",
            NodeCheck::Unavailable => "unavailable",
            NodeCheck::Unknown => "unknown",
        }
    }
}

/// Look up each requested node; the bool is true when all of them are up
pub fn check_nodes<'a>(
    status: &NodeStatus,
    nodes: &'a [String],
) -> (Vec<(&'a str, NodeCheck)>, bool) {
    let results: Vec<_> = nodes
        .iter()
        .map(|node| (node.as_str(), NodeCheck::from_lookup(status.get(node))))
        .collect();
    let all_up = results
        .iter()
        .all(|(_, check)| *check == NodeCheck::Available);
    (results, all_up)
}

pub fn format_check(results: &[(&str, NodeCheck)], json: bool) -> String {
    if json {
        let object: serde_json::Map<String, serde_json::Value> = results
            .iter()
            .map(|(node, check)| (node.to_string(), json!(check.label())))
            .collect();
        return serde_json::to_string_pretty(&object).unwrap_or_else(|_| "{}".to_string());
    }

    let width = results.iter().map(|(node, _)| node.len()).max().unwrap_or(0);
    results
        .iter()
        .map(|(node, check)| format!("{node:<width$}  {}", check.label()))
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Cache Info
// ============================================================================

/// Snapshot of the cache file state
#[derive(Debug, Clone)]
pub struct CacheInfo {
    pub path: PathBuf,
    pub ttl: Duration,
    pub modified: Option<DateTime<Local>>,
    pub age: Option<Duration>,
    pub valid: bool,
}

impl CacheInfo {
    pub fn collect(cache: &StatusCache, now: SystemTime) -> Self {
        Self {
            path: cache.path().to_path_buf(),
            ttl: cache.ttl(),
            modified: cache.modified().map(DateTime::<Local>::from),
            age: cache.age_at(now),
            valid: cache.is_valid_at(now),
        }
    }
}

pub fn format_cache_info(info: &CacheInfo, json: bool) -> String {
    if json {
        let value = json!({
            "path": info.path.display().to_string(),
            "ttl_secs": info.ttl.as_secs(),
            "exists": info.modified.is_some(),
            "modified": info.modified.map(|t| t.to_rfc3339()),
            "age_secs": info.age.map(|a| a.as_secs()),
            "valid": info.valid,
        });
        return serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string());
    }

    let mut lines = vec![];
    lines.push(format!("Cache file:       {}", info.path.display()));
    lines.push(format!("TTL:              {}", format_duration(info.ttl)));
    lines.push(format!(
        "Modified:         {}",
        info.modified
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string())
    ));
    lines.push(format!(
        "Age:              {}",
        info.age.map(format_duration).unwrap_or_else(|| "-".to_string())
    ));
    lines.push(format!(
        "Status:           {}",
        match (info.modified.is_some(), info.valid) {
            (false, _) => "missing",
            (true, true) => "fresh",
            (true, false) => "expired",
        }
    ));
    lines.join("\n")
}

// ============================================================================
// Utilities
// ============================================================================

fn availability_label(available: bool) -> &'static str {
    if available {
        "yes"
    } else {
        "no"
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

// ============================================================================
// Tests
// ============================================================================
