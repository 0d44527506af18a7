use crate::collect::Snapshot;
use crate::config::AgentConfig;
use anyhow::{Context, Result};
use cloudsec_common::types::MetricPoint;
use cloudsec_graphite::metrics::{compliance_points, health_point, sources_delay_points};
use cloudsec_graphite::GraphiteSender;

const PRISMA_SERVICE: &str = "prisma";
const GOOGLE_SCC_SERVICE: &str = "google_scc";

/// Per-family metric name prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricPrefixes {
    pub compliance: String,
    pub health: String,
    pub scc_delay: String,
}

impl From<&AgentConfig> for MetricPrefixes {
    fn from(config: &AgentConfig) -> Self {
        Self {
            compliance: config.compliance_prefix.clone(),
            health: config.health_prefix.clone(),
            scc_delay: config.scc_delay_prefix.clone(),
        }
    }
}

/// Turn a snapshot into metric points stamped with `timestamp`.
pub fn snapshot_points(
    snapshot: &Snapshot,
    prefixes: &MetricPrefixes,
    timestamp: i64,
) -> Vec<MetricPoint> {
    let mut points = Vec::new();
    if let Some(info) = &snapshot.compliance {
        points.extend(compliance_points(timestamp, &prefixes.compliance, info));
    }
    if let Some(healthy) = snapshot.prisma_health {
        points.push(health_point(timestamp, &prefixes.health, PRISMA_SERVICE, healthy));
    }
    if let Some(healthy) = snapshot.scc_health {
        points.push(health_point(timestamp, &prefixes.health, GOOGLE_SCC_SERVICE, healthy));
    }
    if let Some(delays) = &snapshot.sources_delay {
        points.extend(sources_delay_points(timestamp, &prefixes.scc_delay, delays));
    }
    points
}

/// Metric sinks enabled at startup.
pub struct Senders {
    graphite: Option<GraphiteSender>,
    prefixes: MetricPrefixes,
}

impl Senders {
    pub async fn prepare(config: &AgentConfig) -> Result<Self> {
        let mut senders = Senders {
            graphite: None,
            prefixes: MetricPrefixes::from(config),
        };
        if let Some(host) = config.graphite_host() {
            let sender = GraphiteSender::connect(host, config.graphite_port, &config.graphite_prefix)
                .await
                .context("can't connect to Graphite")?;
            tracing::info!(address = %sender.address(), "Graphite sender enabled");
            senders.graphite = Some(sender);
        }
        Ok(senders)
    }

    pub fn is_empty(&self) -> bool {
        self.graphite.is_none()
    }

    /// Send the snapshot to every enabled sink. Failures are logged.
    pub async fn send(&mut self, snapshot: &Snapshot, timestamp: i64) {
        let Some(graphite) = self.graphite.as_mut() else {
            return;
        };
        let points = snapshot_points(snapshot, &self.prefixes, timestamp);
        if let Err(e) = graphite.send_metrics(&points).await {
            tracing::error!(error = %e, count = points.len(), "Error sending metrics to Graphite");
        }
    }
}
