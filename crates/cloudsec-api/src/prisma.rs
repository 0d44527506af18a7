use crate::error::{ApiError, Result};
use crate::http;
use cloudsec_common::types::ComplianceInfo;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

pub const DEFAULT_API_URL: &str = "https://api.eu.prismacloud.io";

/// How long a token is used before it is extended. The server invalidates it
/// after 10 minutes, at which point only a full login works.
pub const RENEW_AFTER: Duration = Duration::from_secs(3 * 60);

const AUTH_HEADER: &str = "x-redlock-auth";
const LOGIN_PATH: &str = "/login";
const EXTEND_PATH: &str = "/auth_token/extend";
const HEALTH_PATH: &str = "/check";
const POSTURE_PATH: &str = "/compliance/posture?timeType=to_now&timeUnit=day";

/// Prisma Cloud API credentials. Immutable once handed to a [`PrismaClient`].
#[derive(Clone)]
pub struct Credentials {
    login: String,
    password: String,
    api_url: String,
}

impl Credentials {
    pub fn new(
        login: impl Into<String>,
        password: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Where the client stands with respect to its bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    NoToken,
    Valid,
    Stale,
}

enum TokenState {
    NoToken,
    Held { token: String, renewed_at: Instant },
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostureResponse {
    compliance_details: Vec<ComplianceInfo>,
}

/// Client for the Prisma Cloud API that manages its own auth token.
///
/// The token is obtained lazily on the first request and extended once it is
/// older than [`RENEW_AFTER`]. If extending fails the client falls back to a
/// single full login. The client is meant to be owned by one task; mutation
/// goes through `&mut self`.
pub struct PrismaClient {
    credentials: Credentials,
    client: Client,
    token: TokenState,
    renew_after: Duration,
}

impl PrismaClient {
    /// Build a client without contacting the API.
    pub fn new(credentials: Credentials) -> Result<Self> {
        Ok(Self {
            credentials,
            client: http::build_client(http::REQUEST_TIMEOUT)?,
            token: TokenState::NoToken,
            renew_after: RENEW_AFTER,
        })
    }

    /// Build a client and log in right away.
    pub async fn connect(credentials: Credentials) -> Result<Self> {
        let mut client = Self::new(credentials)?;
        client.login().await?;
        Ok(client)
    }

    pub fn with_renew_after(mut self, renew_after: Duration) -> Self {
        self.renew_after = renew_after;
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn token_status(&self) -> TokenStatus {
        match &self.token {
            TokenState::NoToken => TokenStatus::NoToken,
            TokenState::Held { renewed_at, .. } if renewed_at.elapsed() >= self.renew_after => {
                TokenStatus::Stale
            }
            TokenState::Held { .. } => TokenStatus::Valid,
        }
    }

    fn current_token(&self) -> Option<String> {
        match &self.token {
            TokenState::NoToken => None,
            TokenState::Held { token, .. } => Some(token.clone()),
        }
    }

    /// Perform an authenticated request and return the body of a 200 response.
    pub async fn request(
        &mut self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        self.ensure_token()
            .await
            .map_err(|source| ApiError::TokenAcquisition {
                source: Box::new(source),
            })?;
        let token = self.current_token();
        self.execute(method, path, body, token.as_deref()).await
    }

    /// Assets compliance information for the last day, one entry per standard.
    pub async fn gather_compliance_info(&mut self) -> Result<Vec<ComplianceInfo>> {
        let data = self
            .request(Method::GET, POSTURE_PATH, None)
            .await
            .map_err(ApiError::request("error requesting assets information"))?;
        let posture: PostureResponse = serde_json::from_slice(&data)
            .map_err(ApiError::decode("error unmarshaling assets information"))?;
        Ok(posture.compliance_details)
    }

    /// 1 if the API health check succeeds, 0 on any error.
    pub async fn health_status(&mut self) -> u8 {
        match self.request(Method::GET, HEALTH_PATH, None).await {
            Ok(_) => 1,
            Err(e) => {
                tracing::debug!(error = %e, "Prisma health check failed");
                0
            }
        }
    }

    async fn ensure_token(&mut self) -> Result<()> {
        match self.token_status() {
            TokenStatus::Valid => Ok(()),
            TokenStatus::NoToken => self.login().await,
            TokenStatus::Stale => match self.try_renew().await {
                Ok(()) => Ok(()),
                Err(e) => {
                    tracing::info!(error = %e, "Error extending token, will re-login");
                    self.token = TokenState::NoToken;
                    self.login().await
                }
            },
        }
    }

    async fn try_renew(&mut self) -> Result<()> {
        let token = self.current_token();
        let data = self
            .execute(Method::GET, EXTEND_PATH, None, token.as_deref())
            .await?;
        let renewed: TokenResponse = serde_json::from_slice(&data)
            .map_err(ApiError::decode("error obtaining token from extend token response"))?;
        self.store_token(renewed.token);
        tracing::debug!("Prisma auth token extended");
        Ok(())
    }

    async fn login(&mut self) -> Result<()> {
        let payload = LoginRequest {
            username: &self.credentials.login,
            password: &self.credentials.password,
        };
        let body = serde_json::to_vec(&payload)
            .map_err(ApiError::decode("error marshaling login data"))?;
        let data = self
            .execute(Method::POST, LOGIN_PATH, Some(body), None)
            .await
            .map_err(|source| ApiError::Login {
                login: self.credentials.login.clone(),
                source: Box::new(source),
            })?;
        let issued: TokenResponse = serde_json::from_slice(&data)
            .map_err(ApiError::decode("error obtaining token from login response"))?;
        self.store_token(issued.token);
        tracing::debug!(login = %self.credentials.login, "Logged in to Prisma API");
        Ok(())
    }

    fn store_token(&mut self, token: String) {
        self.token = TokenState::Held {
            token,
            renewed_at: Instant::now(),
        };
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        token: Option<&str>,
    ) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.credentials.api_url, path);
        let mut request = self
            .client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            request = request.header(AUTH_HEADER, token);
        }
        if let Some(body) = body {
            request = request.body(body);
        }
        http::send(request).await
    }
}
