use common::error::DiagnosticMessage;
use common::traits::ConnectorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate connector registration: {context}")]
    Duplicate { context: DiagnosticMessage },
    #[error("unknown connector: {context}")]
    UnknownConnector { context: DiagnosticMessage },
    #[error("unsupported capability: {context}")]
    UnsupportedCapability { context: DiagnosticMessage },
    #[error("connector failed to open: {source}")]
    Open {
        #[source]
        source: ConnectorError,
    },
}

impl RegistryError {
    #[track_caller]
    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::Duplicate {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn unknown_connector(message: impl Into<String>) -> Self {
        Self::UnknownConnector {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn unsupported_capability(message: impl Into<String>) -> Self {
        Self::UnsupportedCapability {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    pub fn open(source: ConnectorError) -> Self {
        Self::Open { source }
    }

    /// The connector-boundary cause, when opening a handle failed. Lets the
    /// engine see transient open failures through the registry wrapper.
    pub fn connector_cause(&self) -> Option<&ConnectorError> {
        match self {
            Self::Open { source } => Some(source),
            _ => None,
        }
    }
}
