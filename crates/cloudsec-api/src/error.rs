/// Errors that can occur when talking to the Prisma, Google status or SCC APIs.
///
/// Status-derived variants carry the response body as text so callers can log
/// what the provider said. None of them carry request credentials: the login
/// identifier may appear in [`ApiError::Login`], the password never does.
///
/// # Examples
///
/// ```rust
/// use cloudsec_api::error::ApiError;
///
/// let err = ApiError::Authentication { body: "token expired".to_string() };
/// assert!(err.to_string().contains("token expired"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a status line (DNS, refused connection, bad URL).
    #[error("error making request: {0}")]
    Transport(#[source] reqwest::Error),

    /// The status line arrived but the body could not be read.
    #[error("error reading response body: {0}")]
    BodyRead(#[source] reqwest::Error),

    /// HTTP 401.
    #[error("authentication error on request, response body: {body:?}")]
    Authentication { body: String },

    /// HTTP 400.
    #[error("bad request parameters, check your request body, response body: {body:?}")]
    BadRequest { body: String },

    /// HTTP 500.
    #[error("server internal error during request processing, response body: {body:?}")]
    Server { body: String },

    /// Any other non-200 status.
    #[error("{status}, response body: {body:?}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    /// A 200 response whose payload did not have the expected shape.
    #[error("{context}: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Invalid configuration detected before any request was made.
    #[error("configuration error: {0}")]
    Config(String),

    /// Full login with username and password failed.
    #[error("error logging in with user {login:?}: {source}")]
    Login {
        login: String,
        #[source]
        source: Box<ApiError>,
    },

    /// No usable token could be obtained before an authenticated request.
    #[error("error getting auth token: {source}")]
    TokenAcquisition {
        #[source]
        source: Box<ApiError>,
    },

    /// A higher level operation failed while issuing one of its requests.
    #[error("{context}: {source}")]
    Request {
        context: &'static str,
        #[source]
        source: Box<ApiError>,
    },
}

impl ApiError {
    pub(crate) fn decode(context: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| ApiError::Decode { context, source }
    }

    pub(crate) fn request(context: &'static str) -> impl FnOnce(ApiError) -> Self {
        move |source| ApiError::Request {
            context,
            source: Box::new(source),
        }
    }

    /// Walk wrapping variants down to the error that actually happened.
    pub fn root(&self) -> &ApiError {
        match self {
            ApiError::Login { source, .. }
            | ApiError::TokenAcquisition { source }
            | ApiError::Request { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_quote_body_in_status_errors() {
        let err = ApiError::BadRequest {
            body: "missing \"timeType\"".to_string(),
        };
        assert_eq!(
            err.to_string(),
            r#"bad request parameters, check your request body, response body: "missing \"timeType\"""#
        );

        let err = ApiError::UnexpectedStatus {
            status: reqwest::StatusCode::NOT_FOUND,
            body: String::new(),
        };
        assert_eq!(err.to_string(), "404 Not Found, response body: \"\"");
    }

    #[test]
    fn should_chain_wrapped_messages_and_find_root() {
        let err = ApiError::TokenAcquisition {
            source: Box::new(ApiError::Login {
                login: "api-key".to_string(),
                source: Box::new(ApiError::Authentication {
                    body: "denied".to_string(),
                }),
            }),
        };
        assert_eq!(
            err.to_string(),
            "error getting auth token: error logging in with user \"api-key\": \
             authentication error on request, response body: \"denied\""
        );
        assert!(matches!(err.root(), ApiError::Authentication { .. }));
    }
}
