use common::error::DiagnosticMessage;
use common::traits::ConnectorError;
use common::types::OptionIssue;
use registry::RegistryError;
use std::fmt;
use thiserror::Error;

/// Which clause of the statement an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseRole {
    Source,
    Sink,
}

impl fmt::Display for ClauseRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClauseRole::Source => write!(f, "SOURCE"),
            ClauseRole::Sink => write!(f, "SINK"),
        }
    }
}

fn issues_summary(issues: &[OptionIssue]) -> String {
    issues
        .iter()
        .map(OptionIssue::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Plan-time failure. Every variant rejects the whole statement before a
/// single unit runs.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("unknown connector: {context}")]
    UnknownConnector { context: DiagnosticMessage },
    #[error("role mismatch: {context}")]
    RoleMismatch { context: DiagnosticMessage },
    #[error("invalid {clause} options: {}", issues_summary(.issues))]
    OptionValidation {
        clause: ClauseRole,
        issues: Vec<OptionIssue>,
    },
    #[error("invalid write mode: {context}")]
    InvalidWriteMode { context: DiagnosticMessage },
    #[error("no matching entities: {context}")]
    NoMatch { context: DiagnosticMessage },
    #[error("cardinality mismatch: {context}")]
    Cardinality { context: DiagnosticMessage },
    #[error("catalog call failed: {source}")]
    Catalog {
        #[source]
        source: ConnectorError,
    },
    #[error("internal planner failure: {context}")]
    Internal { context: DiagnosticMessage },
}

impl PlanError {
    #[track_caller]
    pub fn unknown_connector(message: impl Into<String>) -> Self {
        Self::UnknownConnector {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn role_mismatch(message: impl Into<String>) -> Self {
        Self::RoleMismatch {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    pub fn option_validation(clause: ClauseRole, issues: Vec<OptionIssue>) -> Self {
        Self::OptionValidation { clause, issues }
    }

    #[track_caller]
    pub fn invalid_write_mode(message: impl Into<String>) -> Self {
        Self::InvalidWriteMode {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn no_match(message: impl Into<String>) -> Self {
        Self::NoMatch {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn cardinality(message: impl Into<String>) -> Self {
        Self::Cardinality {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            context: DiagnosticMessage::new(message.into()),
        }
    }
}

impl From<RegistryError> for PlanError {
    #[track_caller]
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownConnector { context } => PlanError::UnknownConnector { context },
            RegistryError::UnsupportedCapability { context } => PlanError::RoleMismatch { context },
            RegistryError::Open { source } => PlanError::Catalog { source },
            RegistryError::Duplicate { context } => PlanError::Internal { context },
        }
    }
}
