use crate::error::{ApiError, Result};
use crate::http;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub const DEFAULT_SCC_API_URL: &str = "https://securitycenter.googleapis.com/v1";

/// GCE metadata endpoint handing out access tokens for the default service account.
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Metadata tokens are refreshed this long before they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// SCC source resource name (`organizations/<org>/sources/<id>`) to display name.
pub type SourceMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcesPage {
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindingsPage {
    #[serde(default)]
    list_findings_results: Vec<FindingResult>,
}

#[derive(Deserialize)]
struct FindingResult {
    finding: Finding,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Finding {
    #[serde(default)]
    event_time: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

/// Security Command Center operations used by the collectors.
#[async_trait]
pub trait SecurityCenter: Send {
    /// One page of sources registered under the organisation.
    async fn list_sources_page(
        &mut self,
        org_id: &str,
        page_token: Option<&str>,
    ) -> Result<SourcesPage>;

    /// Event time of the newest finding of `source`, `None` if it has none.
    async fn latest_finding_time(&mut self, source: &str) -> Result<Option<DateTime<Utc>>>;
}

/// How the SCC client obtains its OAuth bearer token.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// A token supplied through configuration, used as is.
    Static(String),
    /// Tokens fetched from the GCE metadata server and cached until near expiry.
    Metadata { url: String },
}

impl TokenSource {
    pub fn metadata_server() -> Self {
        TokenSource::Metadata {
            url: METADATA_TOKEN_URL.to_string(),
        }
    }
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// REST client for the Security Command Center v1 API.
pub struct SecurityCenterClient {
    base_url: String,
    client: Client,
    token_source: TokenSource,
    cached: Option<CachedToken>,
}

impl SecurityCenterClient {
    pub fn new(base_url: impl Into<String>, token_source: TokenSource) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: http::build_client(http::LISTING_TIMEOUT)?,
            token_source,
            cached: None,
        })
    }

    async fn bearer(&mut self) -> Result<String> {
        let url = match &self.token_source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Metadata { url } => url.clone(),
        };
        if let Some(cached) = &self.cached {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.value.clone());
            }
        }

        let data = http::send(self.client.get(url).header("Metadata-Flavor", "Google"))
            .await
            .map_err(ApiError::request("error fetching access token from metadata server"))?;
        let token: MetadataToken = serde_json::from_slice(&data)
            .map_err(ApiError::decode("error decoding metadata server token"))?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        // An expiry beyond what `Instant` can hold is not cached; the next call refetches.
        self.cached = Instant::now()
            .checked_add(lifetime)
            .map(|refresh_at| CachedToken {
                value: token.access_token.clone(),
                refresh_at,
            });
        tracing::debug!(expires_in = token.expires_in, "Fetched SCC access token");
        Ok(token.access_token)
    }

    async fn get(&mut self, url: String, query: &[(&str, &str)]) -> Result<Vec<u8>> {
        let token = self.bearer().await?;
        let request = self
            .client
            .get(url)
            .query(query)
            .header(AUTHORIZATION, format!("Bearer {token}"));
        http::send(request).await
    }
}

#[async_trait]
impl SecurityCenter for SecurityCenterClient {
    async fn list_sources_page(
        &mut self,
        org_id: &str,
        page_token: Option<&str>,
    ) -> Result<SourcesPage> {
        let url = format!("{}/organizations/{}/sources", self.base_url, org_id);
        let query: Vec<(&str, &str)> = page_token
            .map(|token| vec![("pageToken", token)])
            .unwrap_or_default();
        let data = self.get(url, &query).await?;
        serde_json::from_slice(&data).map_err(ApiError::decode("error decoding SCC sources page"))
    }

    async fn latest_finding_time(&mut self, source: &str) -> Result<Option<DateTime<Utc>>> {
        let url = format!("{}/{}/findings", self.base_url, source);
        let data = self
            .get(url, &[("orderBy", "event_time desc"), ("pageSize", "1")])
            .await?;
        let page: FindingsPage = serde_json::from_slice(&data)
            .map_err(ApiError::decode("error decoding SCC findings page"))?;
        Ok(page
            .list_findings_results
            .into_iter()
            .next()
            .and_then(|result| result.finding.event_time))
    }
}

/// Numeric organisation IDs only; anything else is a configuration mistake.
pub fn validate_org_id(org_id: &str) -> Result<()> {
    if org_id.is_empty() || !org_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::Config(format!(
            "SCC organisation ID must be numeric, got {org_id:?}"
        )));
    }
    Ok(())
}

/// All sources of the organisation whose display name matches `name_pattern`.
pub async fn sources_by_name<S>(api: &mut S, org_id: &str, name_pattern: &str) -> Result<SourceMap>
where
    S: SecurityCenter + ?Sized,
{
    let regex = Regex::new(name_pattern)
        .map_err(|e| ApiError::Config(format!("error compiling sources regex: {e}")))?;
    validate_org_id(org_id)?;

    let mut result = SourceMap::new();
    let mut page_token: Option<String> = None;
    loop {
        let page = api
            .list_sources_page(org_id, page_token.as_deref())
            .await
            .map_err(ApiError::request("error listing SCC sources"))?;
        for source in page.sources {
            if regex.is_match(&source.display_name) {
                result.insert(source.name, source.display_name);
            }
        }
        match page.next_page_token.filter(|token| !token.is_empty()) {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    tracing::debug!(org_id, count = result.len(), "Listed SCC sources");
    Ok(result)
}

/// Time elapsed since the newest finding of every source, keyed by display name.
///
/// Sources without findings are skipped. Sources are queried one after another.
pub async fn latest_event_delay<S>(
    api: &mut S,
    sources: &SourceMap,
) -> Result<BTreeMap<String, Duration>>
where
    S: SecurityCenter + ?Sized,
{
    let mut result = BTreeMap::new();
    for (id, name) in sources {
        let latest = api
            .latest_finding_time(id)
            .await
            .map_err(ApiError::request("error fetching latest SCC finding"))?;
        let Some(event_time) = latest else {
            tracing::debug!(source = %name, "SCC source has no findings");
            continue;
        };
        let delay = (Utc::now() - event_time).to_std().unwrap_or(Duration::ZERO);
        result.insert(name.clone(), delay);
    }
    Ok(result)
}
