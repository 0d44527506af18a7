use cloudsec_common::metric_name::escape_metric_name;
use cloudsec_common::types::{ComplianceInfo, MetricPoint, MetricValue};
use std::collections::BTreeMap;
use std::time::Duration;

/// Four points per compliance standard: policies, passed, failed and total assets.
pub fn compliance_points(timestamp: i64, prefix: &str, info: &[ComplianceInfo]) -> Vec<MetricPoint> {
    let mut points = Vec::with_capacity(info.len() * 4);
    for standard in info {
        let base = escape_metric_name(&format!("{prefix}{}", standard.name));
        let counts = [
            ("policies_total", standard.policies_count),
            ("assets_passed", standard.passed_assets),
            ("assets_failed", standard.failed_assets),
            ("assets_total", standard.total_assets),
        ];
        for (suffix, value) in counts {
            points.push(MetricPoint::new(
                format!("{base}.{suffix}"),
                MetricValue::Count(value),
                timestamp,
            ));
        }
    }
    points
}

/// One point per SCC source with the seconds since its newest finding.
pub fn sources_delay_points(
    timestamp: i64,
    prefix: &str,
    delays: &BTreeMap<String, Duration>,
) -> Vec<MetricPoint> {
    delays
        .iter()
        .map(|(source, delay)| {
            let base = escape_metric_name(&format!("{prefix}{source}"));
            MetricPoint::new(
                format!("{base}.delay_seconds"),
                MetricValue::Seconds(delay.as_secs_f64()),
                timestamp,
            )
        })
        .collect()
}

/// A single 0/1 health flag.
pub fn health_point(timestamp: i64, prefix: &str, service: &str, healthy: u8) -> MetricPoint {
    MetricPoint::new(
        escape_metric_name(&format!("{prefix}{service}")),
        MetricValue::Count(u64::from(healthy)),
        timestamp,
    )
}
