//! Data models for esgf-status

pub mod node_status;

pub use node_status::NodeStatus;
