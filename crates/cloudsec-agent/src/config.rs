use clap::Parser;
use cloudsec_api::prisma::DEFAULT_API_URL;
use cloudsec_api::scc::DEFAULT_SCC_API_URL;
use cloudsec_api::google::GOOGLE_STATUS_URL;
use cloudsec_api::{Credentials, TokenSource};
use std::time::Duration;

/// Agent configuration. Every option can be given as a flag or through the
/// environment variable named next to it.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "cloudsec-agent",
    version,
    about = "Collects cloud security metrics and forwards them to Graphite"
)]
pub struct AgentConfig {
    #[arg(
        long,
        env = "COLLECT_PERIOD_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds between metrics collections"
    )]
    pub collect_period_secs: u64,

    #[arg(long, env = "PRISMA_API_URL", default_value = DEFAULT_API_URL, help = "Prisma API URL")]
    pub prisma_api_url: String,

    #[arg(long, env = "PRISMA_API_KEY", help = "Prisma API key")]
    pub prisma_api_key: Option<String>,

    #[arg(
        long,
        env = "PRISMA_API_PASSWORD",
        hide_env_values = true,
        help = "Prisma API password"
    )]
    pub prisma_api_password: Option<String>,

    #[arg(long, env = "GRAPHITE_HOST", help = "Graphite hostname")]
    pub graphite_host: Option<String>,

    #[arg(
        long,
        env = "GRAPHITE_PORT",
        default_value_t = cloudsec_graphite::sender::DEFAULT_PORT,
        help = "Graphite port"
    )]
    pub graphite_port: u16,

    #[arg(long, env = "GRAPHITE_PREFIX", default_value = "", help = "Graphite global prefix")]
    pub graphite_prefix: String,

    #[arg(
        long,
        env = "COMPLIANCE_PREFIX",
        default_value = "compliance.",
        help = "Graphite compliance metrics prefix"
    )]
    pub compliance_prefix: String,

    #[arg(
        long,
        env = "HEALTH_PREFIX",
        default_value = "health.",
        help = "Graphite API health metrics prefix"
    )]
    pub health_prefix: String,

    #[arg(
        long,
        env = "SCC_DELAY_PREFIX",
        default_value = "scc_delay.",
        help = "Graphite SCC source delay metrics prefix"
    )]
    pub scc_delay_prefix: String,

    #[arg(long, env = "SCC_ORG_ID", help = "Google SCC numeric organisation ID")]
    pub scc_org_id: Option<String>,

    #[arg(
        long,
        env = "SCC_SOURCES_REGEX",
        default_value = ".",
        help = "Google SCC sources display name regexp"
    )]
    pub scc_sources_regex: String,

    #[arg(long, env = "SCC_API_URL", default_value = DEFAULT_SCC_API_URL, help = "Google SCC API URL")]
    pub scc_api_url: String,

    #[arg(
        long,
        env = "SCC_ACCESS_TOKEN",
        hide_env_values = true,
        help = "OAuth access token for Google SCC; the GCE metadata server is used when unset"
    )]
    pub scc_access_token: Option<String>,

    #[arg(
        long,
        env = "GOOGLE_STATUS_URL",
        default_value = GOOGLE_STATUS_URL,
        help = "Google Cloud incident feed used for the SCC health check, empty to disable"
    )]
    pub google_status_url: String,

    #[arg(long, env = "DEBUG", help = "Debug mode")]
    pub debug: bool,
}

impl AgentConfig {
    pub fn collect_period(&self) -> Duration {
        Duration::from_secs(self.collect_period_secs)
    }

    /// Prisma credentials, only when both key and password are set.
    pub fn prisma_credentials(&self) -> Option<Credentials> {
        let key = non_empty(&self.prisma_api_key)?;
        let password = non_empty(&self.prisma_api_password)?;
        Some(Credentials::new(key, password, self.prisma_api_url.as_str()))
    }

    pub fn scc_org_id(&self) -> Option<&str> {
        non_empty(&self.scc_org_id)
    }

    pub fn scc_token_source(&self) -> TokenSource {
        match non_empty(&self.scc_access_token) {
            Some(token) => TokenSource::Static(token.to_string()),
            None => TokenSource::metadata_server(),
        }
    }

    pub fn graphite_host(&self) -> Option<&str> {
        non_empty(&self.graphite_host)
    }

    pub fn google_status_url(&self) -> Option<&str> {
        let url = self.google_status_url.trim();
        (!url.is_empty()).then_some(url)
    }

    pub fn log_directive(&self) -> &'static str {
        if self.debug {
            "cloudsec=debug"
        } else {
            "cloudsec=info"
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
pub(crate) fn parse(args: &[&str]) -> AgentConfig {
    let argv = std::iter::once("cloudsec-agent").chain(args.iter().copied());
    AgentConfig::try_parse_from(argv).expect("arguments should parse")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_apply_defaults() {
        let config = parse(&[]);
        assert_eq!(config.collect_period(), Duration::from_secs(60));
        assert_eq!(config.prisma_api_url, "https://api.eu.prismacloud.io");
        assert_eq!(config.graphite_port, 2003);
        assert_eq!(config.compliance_prefix, "compliance.");
        assert_eq!(config.scc_sources_regex, ".");
        assert_eq!(
            config.google_status_url(),
            Some("https://status.cloud.google.com/incidents.json")
        );
        assert_eq!(config.log_directive(), "cloudsec=info");
    }

    #[test]
    fn should_require_both_prisma_key_and_password() {
        assert!(parse(&["--prisma-api-key", "key"]).prisma_credentials().is_none());
        assert!(parse(&["--prisma-api-password", "pass"])
            .prisma_credentials()
            .is_none());
        assert!(parse(&["--prisma-api-key", "", "--prisma-api-password", "pass"])
            .prisma_credentials()
            .is_none());

        let creds = parse(&["--prisma-api-key", "key", "--prisma-api-password", "pass"])
            .prisma_credentials()
            .unwrap();
        assert_eq!(creds.login(), "key");
        assert_eq!(creds.api_url(), "https://api.eu.prismacloud.io");
    }

    #[test]
    fn should_disable_optional_features_when_blank() {
        let config = parse(&["--google-status-url", "", "--scc-org-id", " "]);
        assert_eq!(config.google_status_url(), None);
        assert_eq!(config.scc_org_id(), None);
        assert_eq!(config.graphite_host(), None);
    }

    #[test]
    fn should_pick_scc_token_source() {
        assert!(matches!(
            parse(&[]).scc_token_source(),
            TokenSource::Metadata { .. }
        ));
        assert!(matches!(
            parse(&["--scc-access-token", "ya29.token"]).scc_token_source(),
            TokenSource::Static(token) if token == "ya29.token"
        ));
    }

    #[test]
    fn should_reject_zero_period_and_enable_debug() {
        let argv = ["cloudsec-agent", "--collect-period-secs", "0"];
        assert!(AgentConfig::try_parse_from(argv).is_err());

        let config = parse(&["--debug", "--collect-period-secs", "300"]);
        assert_eq!(config.log_directive(), "cloudsec=debug");
        assert_eq!(config.collect_period(), Duration::from_secs(300));
    }
}
