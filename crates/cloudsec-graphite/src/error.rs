/// Errors raised while talking to Graphite.
#[derive(Debug, thiserror::Error)]
pub enum GraphiteError {
    #[error("can't connect to Graphite at {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("can't write metrics to Graphite at {address}: {source}")]
    Write {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Graphite configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, GraphiteError>;
