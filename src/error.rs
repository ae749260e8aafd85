use thiserror::Error;

/// Classification of request failures, surfaced externally as the `error`
/// label on the requests counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorGroup {
    /// The client connection failed mid-exchange.
    Communication,
    /// The client sent something that is not valid HTTP/1.x.
    Protocol,
    /// The request exceeded the frontend's request timeout.
    FrontendTimeout,
    /// Anything a backend surfaced without a more specific group.
    Unknown,
}

impl ErrorGroup {
    pub fn as_label(&self) -> &'static str {
        match self {
            ErrorGroup::Communication => "communication",
            ErrorGroup::Protocol => "protocol",
            ErrorGroup::FrontendTimeout => "frontend timeout",
            ErrorGroup::Unknown => "unknown",
        }
    }
}

/// A grouped request error. `site` names the originating call site and is
/// only ever used for debug logging; the metric system sees the group.
#[derive(Debug, Error)]
#[error("{site}: {message}")]
pub struct HttpError {
    group: ErrorGroup,
    site: &'static str,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HttpError {
    pub fn communication(site: &'static str, source: std::io::Error) -> Self {
        Self {
            group: ErrorGroup::Communication,
            site,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    pub fn protocol(site: &'static str, message: impl Into<String>) -> Self {
        Self { group: ErrorGroup::Protocol, site, message: message.into(), source: None }
    }

    pub fn frontend_timeout(site: &'static str) -> Self {
        Self {
            group: ErrorGroup::FrontendTimeout,
            site,
            message: "request timed out".to_string(),
            source: None,
        }
    }

    pub fn unknown(
        site: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        let source = source.into();
        Self { group: ErrorGroup::Unknown, site, message: source.to_string(), source: Some(source) }
    }

    pub fn group(&self) -> ErrorGroup {
        self.group
    }

    pub fn site(&self) -> &'static str {
        self.site
    }
}

/// Terminating cause of one request pipeline pass.
///
/// The first two variants are clean sentinels: they end the connection
/// without contributing an `error`-labeled counter increment.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The peer or an access restriction ended the exchange cleanly.
    #[error("graceful termination")]
    GracefulTermination,
    /// The upstream closed cleanly after a complete response.
    #[error("expected eof")]
    ExpectedEof,
    #[error(transparent)]
    Http(#[from] HttpError),
}

impl ServeError {
    /// Value of the `error` metric label; empty for the clean sentinels.
    pub fn error_label(&self) -> &'static str {
        match self {
            ServeError::GracefulTermination | ServeError::ExpectedEof => "",
            ServeError::Http(e) => e.group().as_label(),
        }
    }
}

/// Errors raised while building or configuring a frontend.
#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    #[error("metric registration failed: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrontendError>;
