use crate::error::{ApiError, Result};
use crate::http;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

/// Public Google Cloud incident feed.
pub const GOOGLE_STATUS_URL: &str = "https://status.cloud.google.com/incidents.json";

const SCC_SERVICE_KEY: &str = "cloud-security-command-center";

#[derive(Debug, Deserialize)]
struct StatusEntry {
    #[serde(rename = "service_key", default)]
    service: String,
    #[serde(rename = "external_desc", default)]
    description: String,
    #[serde(default)]
    begin: Option<DateTime<Utc>>,
    #[serde(default)]
    end: Option<DateTime<Utc>>,
}

impl StatusEntry {
    /// Started and not yet ended. A missing `begin` counts as started.
    fn is_ongoing(&self, now: DateTime<Utc>) -> bool {
        let started = self.begin.map_or(true, |begin| begin < now);
        let open = self.end.map_or(true, |end| end > now);
        started && open
    }
}

/// Health probe for Google Security Command Center based on the public
/// Google Cloud incident feed.
pub struct IncidentFeed {
    url: String,
    client: Client,
}

impl IncidentFeed {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            client: http::build_client(http::REQUEST_TIMEOUT)?,
        })
    }

    /// 0 while an SCC incident is in progress or the feed cannot be read, 1 otherwise.
    pub async fn scc_health_status(&self) -> u8 {
        match self.fetch().await {
            Ok(entries) => health_from_incidents(&entries, Utc::now()),
            Err(e) => {
                tracing::debug!(url = %self.url, error = %e, "Google status feed unavailable");
                0
            }
        }
    }

    async fn fetch(&self) -> Result<Vec<StatusEntry>> {
        let data = http::send(self.client.get(&self.url)).await?;
        serde_json::from_slice(&data).map_err(ApiError::decode("error decoding incident feed"))
    }
}

fn health_from_incidents(entries: &[StatusEntry], now: DateTime<Utc>) -> u8 {
    let ongoing = entries
        .iter()
        .find(|entry| entry.service == SCC_SERVICE_KEY && entry.is_ongoing(now));
    match ongoing {
        Some(entry) => {
            tracing::info!(
                since = ?entry.begin,
                description = %entry.description,
                "Google Security Command Center incident in process"
            );
            0
        }
        None => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn entries(raw: &str) -> Vec<StatusEntry> {
        serde_json::from_str(raw).expect("feed should parse")
    }

    #[test]
    fn should_be_healthy_for_empty_feed() {
        assert_eq!(health_from_incidents(&[], Utc::now()), 1);
    }

    #[test]
    fn should_be_unhealthy_while_incident_is_open() {
        let open = entries(
            r#"[{"service_key":"cloud-security-command-center","external_desc":"ongoing",
                 "begin":"1999-01-01T00:00:00Z"}]"#,
        );
        assert_eq!(health_from_incidents(&open, Utc::now()), 0);

        let null_end = entries(
            r#"[{"service_key":"cloud-security-command-center",
                 "begin":"1999-01-01T00:00:00Z","end":null}]"#,
        );
        assert_eq!(health_from_incidents(&null_end, Utc::now()), 0);

        let future_end = entries(
            r#"[{"service_key":"cloud-security-command-center",
                 "begin":"1999-01-01T00:00:00Z","end":"2999-01-01T00:01:00Z"}]"#,
        );
        assert_eq!(health_from_incidents(&future_end, Utc::now()), 0);
    }

    #[test]
    fn should_be_healthy_once_incident_ended() {
        let ended = entries(
            r#"[{"service_key":"cloud-security-command-center",
                 "begin":"1999-01-01T00:00:00Z","end":"1999-01-01T00:01:00Z"}]"#,
        );
        assert_eq!(health_from_incidents(&ended, Utc::now()), 1);
    }

    #[test]
    fn should_ignore_other_services_and_future_incidents() {
        let feed = entries(
            r#"[{"service_key":"compute-engine","begin":"1999-01-01T00:00:00Z"},
                {"service_key":"cloud-security-command-center","begin":"2999-01-01T00:00:00Z"}]"#,
        );
        assert_eq!(health_from_incidents(&feed, Utc::now()), 1);
    }

    #[tokio::test]
    async fn should_fetch_feed_over_http() {
        let mut server = Server::new_async().await;
        let ended = server
            .mock("GET", "/incidents.json")
            .with_body(
                r#"[{"service_key":"cloud-security-command-center","description":"ended incident",
                     "begin":"1999-01-01T00:00:00Z","end":"1999-01-01T00:01:00Z"}]"#,
            )
            .expect(1)
            .create_async()
            .await;
        let ongoing = server
            .mock("GET", "/ongoing.json")
            .with_body(
                r#"[{"service_key":"cloud-security-command-center","description":"ongoing incident",
                     "begin":"1999-01-01T00:00:00Z","end":"2999-01-01T00:01:00Z"}]"#,
            )
            .create_async()
            .await;
        let missing = server
            .mock("GET", "/missing.json")
            .with_status(404)
            .create_async()
            .await;
        let garbage = server
            .mock("GET", "/garbage.json")
            .with_body("not_json")
            .create_async()
            .await;

        let feed = IncidentFeed::new(format!("{}/incidents.json", server.url())).unwrap();
        assert_eq!(feed.scc_health_status().await, 1);
        let feed = IncidentFeed::new(format!("{}/ongoing.json", server.url())).unwrap();
        assert_eq!(feed.scc_health_status().await, 0);
        let feed = IncidentFeed::new(format!("{}/missing.json", server.url())).unwrap();
        assert_eq!(feed.scc_health_status().await, 0);
        let feed = IncidentFeed::new(format!("{}/garbage.json", server.url())).unwrap();
        assert_eq!(feed.scc_health_status().await, 0);
        let feed = IncidentFeed::new("nonexistent_url").unwrap();
        assert_eq!(feed.scc_health_status().await, 0);

        ended.assert_async().await;
        drop((ongoing, missing, garbage));
    }
}
