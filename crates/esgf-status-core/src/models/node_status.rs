//! Node availability mapping

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Availability of ESGF nodes keyed by node name as shown on the status page
///
/// Serializes as a plain JSON object (`{"esgf-node.llnl.gov": true, ...}`),
/// which is also the on-disk cache format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeStatus(BTreeMap<String, bool>);

impl NodeStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a node's availability; a repeated node overwrites the earlier value
    pub fn insert(&mut self, node: impl Into<String>, available: bool) -> Option<bool> {
        self.0.insert(node.into(), available)
    }

    /// Availability of `node`, `None` if the page does not list it
    pub fn get(&self, node: &str) -> Option<bool> {
        self.0.get(node).copied()
    }

    /// True only for nodes listed as available
    pub fn is_available(&self, node: &str) -> bool {
        self.get(node).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(node, available)| (node.as_str(), *available))
    }

    /// Names of available nodes
    pub fn available_nodes(&self) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(|(_, available)| *available)
            .map(|(node, _)| node)
    }

    /// Names of nodes listed as down
    pub fn unavailable_nodes(&self) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(|(_, available)| !*available)
            .map(|(node, _)| node)
    }

    pub fn available_count(&self) -> usize {
        self.available_nodes().count()
    }
}

impl FromIterator<(String, bool)> for NodeStatus {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, bool)> for NodeStatus {
    fn from_iter<I: IntoIterator<Item = (&'a str, bool)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(node, available)| (node.to_string(), available))
                .collect(),
        )
    }
}
