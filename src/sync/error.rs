use crate::catalog::StoreError;
use crate::mekari::MekariError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncErrorKind {
    Network,
    RemoteRejected,
    Parse,
    Persistence,
    Unconfigured,
}

impl SyncErrorKind {
    pub fn tag(&self) -> &'static str {
        match self {
            SyncErrorKind::Network => "network",
            SyncErrorKind::RemoteRejected => "remote-rejected",
            SyncErrorKind::Parse => "parse",
            SyncErrorKind::Persistence => "persistence",
            SyncErrorKind::Unconfigured => "unconfigured",
        }
    }
}

/// Failure of one pass, tagged with the step that produced it.
#[derive(Debug, Clone, Error)]
#[error("{stage} failed ({}): {message}", .kind.tag())]
pub struct SyncError {
    stage: &'static str,
    kind: SyncErrorKind,
    message: String,
}

impl SyncError {
    pub fn new(stage: &'static str, kind: SyncErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }

    pub fn unconfigured() -> Self {
        Self::new(
            "preflight",
            SyncErrorKind::Unconfigured,
            "Mekari integration is not configured",
        )
    }

    pub fn persistence(stage: &'static str, err: StoreError) -> Self {
        Self::new(stage, SyncErrorKind::Persistence, err.to_string())
    }

    pub fn remote(stage: &'static str, err: MekariError) -> Self {
        let kind = match &err {
            MekariError::Network { .. } => SyncErrorKind::Network,
            MekariError::Rejected { .. } => SyncErrorKind::RemoteRejected,
            MekariError::Parse { .. } => SyncErrorKind::Parse,
            MekariError::Unconfigured => SyncErrorKind::Unconfigured,
        };
        Self::new(stage, kind, err.to_string())
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> SyncErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_keep_their_taxonomy() {
        let err = SyncError::remote(
            "fetch",
            MekariError::Rejected {
                context: "page 3".into(),
                status: 401,
                message: "token expired".into(),
            },
        );
        assert_eq!(err.kind(), SyncErrorKind::RemoteRejected);
        assert_eq!(
            err.to_string(),
            "fetch failed (remote-rejected): remote-rejected: page 3: HTTP 401: token expired"
        );
        assert_eq!(
            serde_json::to_value(err.kind()).expect("json"),
            serde_json::json!("remote-rejected")
        );
    }
}
