use crate::error::{ApiError, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;

/// Timeout for single, low-volume calls (Prisma API, status feed).
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for the higher-volume SCC listing calls.
pub const LISTING_TIMEOUT: Duration = Duration::from_secs(20);

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .use_rustls_tls()
        .timeout(timeout)
        .build()
        .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {e}")))
}

/// Send the request, read the full body and classify the status.
///
/// Transport failures short-circuit before the body is read; the body is read
/// before classification so error variants can carry it.
pub(crate) async fn send(request: RequestBuilder) -> Result<Vec<u8>> {
    let response = request.send().await.map_err(ApiError::Transport)?;
    let status = response.status();
    let body = response.bytes().await.map_err(ApiError::BodyRead)?;
    classify(status, body.to_vec())
}

pub(crate) fn classify(status: StatusCode, body: Vec<u8>) -> Result<Vec<u8>> {
    match status {
        StatusCode::OK => Ok(body),
        StatusCode::UNAUTHORIZED => Err(ApiError::Authentication {
            body: body_text(&body),
        }),
        StatusCode::BAD_REQUEST => Err(ApiError::BadRequest {
            body: body_text(&body),
        }),
        StatusCode::INTERNAL_SERVER_ERROR => Err(ApiError::Server {
            body: body_text(&body),
        }),
        status => Err(ApiError::UnexpectedStatus {
            status,
            body: body_text(&body),
        }),
    }
}

fn body_text(body: &[u8]) -> String {
    String::from_utf8_lossy(body).into_owned()
}
