//! Types shared between the collectors, the Graphite sender and the agent.

pub mod metric_name;
pub mod types;
