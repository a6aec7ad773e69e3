use thiserror::Error;

/// Errors surfaced by the analytics client.
///
/// Only transport failures are retried (inside [`crate::RetryingHttpClient`]);
/// everything else is returned to the caller as-is.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Invalid API token, please get one at https://discordanalytics.xyz and try again.")]
    InvalidApiToken,

    #[error("Your bot has been suspended, please check your mailbox for more information.")]
    SuspendedBot,

    #[error("Invalid response from the API (status {status}), please try again later.")]
    InvalidResponse { status: u16 },

    #[error("Request failed after exhausting retries")]
    MaxRetriesExceeded(#[source] reqwest_middleware::Error),

    #[error("It seems that you didn't initialize your instance. Call `initialize()` first.")]
    InstanceNotReady,

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("invalid events count for event '{key}'")]
    InvalidEventsCount { key: String },

    #[error("invalid event key '{0}'")]
    InvalidEventKey(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot serialize to JSON")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error")]
    Http(#[from] reqwest::Error),

    #[error("failed to read configuration file")]
    ConfigRead(#[from] std::io::Error),

    #[error("failed to parse configuration file")]
    ConfigParse(#[from] toml::de::Error),
}

impl AnalyticsError {
    /// Errors caused by incorrect usage of the SDK rather than by the network
    /// or the remote API.
    pub fn is_caller_bug(&self) -> bool {
        matches!(
            self,
            Self::InstanceNotReady
                | Self::InvalidValue(_)
                | Self::InvalidEventsCount { .. }
                | Self::InvalidConfig(_)
        )
    }
}

pub type Result<T, E = AnalyticsError> = std::result::Result<T, E>;
