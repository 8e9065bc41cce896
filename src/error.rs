//! Error taxonomy shared by extraction, integrity checks and the
//! enhancement tiers.
//!
//! None of these reach a caller as a hard failure: extraction turns them
//! into fallback text, the orchestrator turns remote ones into tier
//! fallthrough, and integrity issues become recommendations.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("empty or corrupt content: {0}")]
    EmptyOrCorruptContent(String),

    #[error("decoder library unavailable: {0}")]
    DecoderLibraryUnavailable(String),

    #[error("remote service rate limited{}", retry_hint(.retry_after_secs))]
    RemoteRateLimited { retry_after_secs: Option<u64> },

    #[error("remote quota exceeded: {0}")]
    RemoteQuotaExceeded(String),

    #[error("remote infrastructure outage: {0}")]
    RemoteInfrastructureOutage(String),

    #[error("remote transport error: {0}")]
    RemoteTransport(String),

    #[error("remote returned an invalid response: {0}")]
    RemoteInvalidResponse(String),

    #[error("storage integrity failure: {0}")]
    StorageIntegrityFailure(String),
}

fn retry_hint(secs: &Option<u64>) -> String {
    match secs {
        Some(s) => format!(" (retry after {s}s)"),
        None => String::new(),
    }
}

impl PlanError {
    /// Rate-limit and quota errors trigger the cool-down and a retry on
    /// an alternate model.
    pub fn is_throttle(&self) -> bool {
        matches!(
            self,
            Self::RemoteRateLimited { .. } | Self::RemoteQuotaExceeded(_)
        )
    }

    /// Errors produced by the remote tier.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::RemoteRateLimited { .. }
                | Self::RemoteQuotaExceeded(_)
                | Self::RemoteInfrastructureOutage(_)
                | Self::RemoteTransport(_)
                | Self::RemoteInvalidResponse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(
            PlanError::RemoteRateLimited {
                retry_after_secs: Some(30)
            }
            .to_string(),
            "remote service rate limited (retry after 30s)"
        );
        assert_eq!(
            PlanError::UnsupportedFormat("image/png".into()).to_string(),
            "unsupported format: image/png"
        );
    }

    #[test]
    fn classification() {
        assert!(PlanError::RemoteQuotaExceeded("monthly".into()).is_throttle());
        assert!(!PlanError::RemoteInfrastructureOutage("503".into()).is_throttle());
        assert!(PlanError::RemoteTransport("reset".into()).is_remote());
        assert!(!PlanError::StorageIntegrityFailure("x".into()).is_remote());
    }
}
