use thiserror::Error;

pub type Result<T> = std::result::Result<T, WardenErr>;

#[derive(Error, Debug)]
pub enum WardenErr {
    /// Startup refuses to run without these; the binary exits with status 2.
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),

    #[error("invalid request id: {0}")]
    InvalidRequestId(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The chat API answered with `ok: false`.
    #[error("telegram api error: {0}")]
    Telegram(String),
}

impl WardenErr {
    /// Transport-shaped failures get the longer retry pause in the update
    /// loop; anything else is unexpected and retried sooner.
    pub fn is_transport(&self) -> bool {
        matches!(self, WardenErr::Http(_) | WardenErr::Telegram(_))
    }
}
