use serde::{Deserialize, Serialize};

/// How recursive enumeration talks to the remote host
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumerationStrategy {
    /// One directory listing for flat requests, one bulk `find` for recursive ones
    #[default]
    Auto,
    /// Always walk with directory listings, for hosts without a usable `find`
    Simple,
    /// Bulk `find` whenever the request is recursive
    Fast,
}

/// Options of a [`RemoteFileSystem`](crate::RemoteFileSystem)
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteFsOptions {
    pub strategy: EnumerationStrategy,
    /// Maximum response time of the transfer session in seconds.
    /// Backends fall back to their own default when unset.
    pub timeout_secs: Option<u64>,
}

impl RemoteFsOptions {
    #[must_use]
    pub fn with_strategy(mut self, strategy: EnumerationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}
