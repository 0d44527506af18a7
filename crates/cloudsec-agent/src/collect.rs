use crate::config::AgentConfig;
use anyhow::{Context, Result};
use cloudsec_api::scc::{latest_event_delay, sources_by_name};
use cloudsec_api::{IncidentFeed, PrismaClient, SecurityCenter, SecurityCenterClient, SourceMap};
use cloudsec_common::types::ComplianceInfo;
use std::collections::BTreeMap;
use std::time::Duration;

/// Values gathered in one collection cycle. `None` means the collector is
/// disabled or failed this cycle.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Snapshot {
    pub compliance: Option<Vec<ComplianceInfo>>,
    pub prisma_health: Option<u8>,
    pub scc_health: Option<u8>,
    pub sources_delay: Option<BTreeMap<String, Duration>>,
}

/// SCC client together with the sources resolved at startup.
pub struct SccSources {
    api: Box<dyn SecurityCenter>,
    sources: SourceMap,
}

impl SccSources {
    pub async fn resolve(
        mut api: Box<dyn SecurityCenter>,
        org_id: &str,
        name_pattern: &str,
    ) -> Result<Self> {
        let sources = sources_by_name(api.as_mut(), org_id, name_pattern).await?;
        Ok(Self { api, sources })
    }

    pub fn sources(&self) -> &SourceMap {
        &self.sources
    }
}

/// Data sources enabled at startup.
#[derive(Default)]
pub struct Collectors {
    prisma: Option<PrismaClient>,
    incident_feed: Option<IncidentFeed>,
    scc: Option<SccSources>,
}

impl Collectors {
    pub async fn prepare(config: &AgentConfig) -> Result<Self> {
        let mut collectors = Collectors::default();

        if let Some(credentials) = config.prisma_credentials() {
            let client = PrismaClient::connect(credentials)
                .await
                .context("can't connect to Prisma")?;
            tracing::info!(api_url = %client.credentials().api_url(), "Prisma collector enabled");
            collectors.prisma = Some(client);
        }

        if let Some(url) = config.google_status_url() {
            collectors.incident_feed =
                Some(IncidentFeed::new(url).context("can't create Google status client")?);
            tracing::info!(url, "Google SCC health collector enabled");
        }

        if let Some(org_id) = config.scc_org_id() {
            let api = SecurityCenterClient::new(&config.scc_api_url, config.scc_token_source())
                .context("can't create SCC client")?;
            let scc = SccSources::resolve(Box::new(api), org_id, &config.scc_sources_regex)
                .await
                .context("can't get SCC sources information")?;
            tracing::info!(org_id, sources = scc.sources().len(), "SCC delay collector enabled");
            collectors.scc = Some(scc);
        }

        Ok(collectors)
    }

    pub fn is_empty(&self) -> bool {
        self.prisma.is_none() && self.incident_feed.is_none() && self.scc.is_none()
    }

    /// Run every enabled collector once. Failures are logged and leave their
    /// part of the snapshot empty.
    pub async fn collect(&mut self) -> Snapshot {
        let mut snapshot = Snapshot::default();

        if let Some(prisma) = self.prisma.as_mut() {
            match prisma.gather_compliance_info().await {
                Ok(info) => snapshot.compliance = Some(info),
                Err(e) => tracing::error!(error = %e, "Error getting Prisma compliance information"),
            }
            snapshot.prisma_health = Some(prisma.health_status().await);
        }

        if let Some(feed) = self.incident_feed.as_ref() {
            snapshot.scc_health = Some(feed.scc_health_status().await);
        }

        if let Some(scc) = self.scc.as_mut() {
            match latest_event_delay(scc.api.as_mut(), &scc.sources).await {
                Ok(delays) => snapshot.sources_delay = Some(delays),
                Err(e) => tracing::error!(error = %e, "Error getting SCC sources delay"),
            }
        }

        tracing::debug!(?snapshot, "Collected metrics");
        snapshot
    }
}
