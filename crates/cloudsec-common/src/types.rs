use serde::{Deserialize, Serialize};
use std::fmt;

/// Assets compliance information for a single compliance standard.
///
/// Field names on the wire follow the Prisma Cloud posture API. `total_assets`
/// is the server-reported `totalResources`; it is never recomputed from the
/// passed and failed counts, which do not always add up to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "assignedPolicies", default)]
    pub policies_count: u64,
    #[serde(rename = "passedResources")]
    pub passed_assets: u64,
    #[serde(rename = "failedResources")]
    pub failed_assets: u64,
    #[serde(rename = "totalResources")]
    pub total_assets: u64,
}

/// Value carried by a single metric point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// Rendered as a plain integer.
    Count(u64),
    /// Rendered with six decimal places.
    Seconds(f64),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Count(v) => write!(f, "{v}"),
            MetricValue::Seconds(v) => write!(f, "{v:.6}"),
        }
    }
}

/// A named time-series point ready to be handed to a sender.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub name: String,
    pub value: MetricValue,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
}

impl MetricPoint {
    pub fn new(name: impl Into<String>, value: MetricValue, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_decode_posture_entry_with_server_total() {
        let info: ComplianceInfo = serde_json::from_value(serde_json::json!({
            "name": "x",
            "description": "test description",
            "assignedPolicies": 66,
            "passedResources": 69,
            "failedResources": 99,
            "totalResources": 200,
            "highSeverityFailedResources": 3
        }))
        .expect("entry should parse");

        assert_eq!(info.policies_count, 66);
        assert_eq!(info.passed_assets, 69);
        assert_eq!(info.failed_assets, 99);
        assert_eq!(info.total_assets, 200);
    }

    #[test]
    fn should_reject_entry_without_total() {
        let res: Result<ComplianceInfo, _> = serde_json::from_value(serde_json::json!({
            "name": "x",
            "passedResources": 1,
            "failedResources": 2
        }));
        assert!(res.is_err());
    }

    #[test]
    fn should_render_metric_values() {
        assert_eq!(MetricValue::Count(168).to_string(), "168");
        assert_eq!(MetricValue::Seconds(0.065).to_string(), "0.065000");
    }
}
