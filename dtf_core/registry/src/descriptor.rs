use common::types::{OptionSchema, WriteMode};

/// Read role of a connector: the options its sources accept.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRole {
    pub options: OptionSchema,
}

/// Write role of a connector: accepted options plus the write modes the
/// backing system can honour.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkRole {
    pub options: OptionSchema,
    pub write_modes: Vec<WriteMode>,
}

/// What a connector is called and what it can do. Capabilities are role
/// presence; a connector carries one or both roles.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorDescriptor {
    name: String,
    source: Option<SourceRole>,
    sink: Option<SinkRole>,
}

impl ConnectorDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            sink: None,
        }
    }

    pub fn readable(mut self, options: OptionSchema) -> Self {
        self.source = Some(SourceRole { options });
        self
    }

    pub fn writable(mut self, options: OptionSchema, write_modes: Vec<WriteMode>) -> Self {
        self.sink = Some(SinkRole {
            options,
            write_modes,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn can_read(&self) -> bool {
        self.source.is_some()
    }

    pub fn can_write(&self) -> bool {
        self.sink.is_some()
    }

    pub fn source(&self) -> Option<&SourceRole> {
        self.source.as_ref()
    }

    pub fn sink(&self) -> Option<&SinkRole> {
        self.sink.as_ref()
    }

    pub fn supports_write_mode(&self, mode: WriteMode) -> bool {
        self.sink
            .as_ref()
            .is_some_and(|s| s.write_modes.contains(&mode))
    }
}
