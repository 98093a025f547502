use common::types::{is_plain_identifier, OptionValue};
use core::fmt;

/// Leading keyword identifying a transfer statement.
pub const STATEMENT_KEYWORD: &str = "DATATUNNEL";

/// One SOURCE or SINK clause: a connector name plus its raw options, in
/// parse order. Option keys are not deduplicated here; the analyzer reports
/// duplicates together with the other validation issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferClause {
    pub connector: String,
    pub options: Vec<(String, OptionValue)>,
}

impl TransferClause {
    pub fn new(connector: impl Into<String>, options: Vec<(String, OptionValue)>) -> Self {
        Self {
            connector: connector.into(),
            options,
        }
    }

    /// First value bound to `key`, if any.
    pub fn option(&self, key: &str) -> Option<&OptionValue> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

/// A parsed transfer statement: exactly one SOURCE and one SINK clause.
/// Immutable once built; `Display` renders the canonical statement syntax,
/// and parsing that rendering yields an identical AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStatement {
    pub source: TransferClause,
    pub sink: TransferClause,
}

fn fmt_key(key: &str) -> String {
    if is_plain_identifier(key) {
        key.to_string()
    } else {
        format!("\"{}\"", key.replace('"', "\\\""))
    }
}

fn fmt_clause(f: &mut fmt::Formatter<'_>, keyword: &str, clause: &TransferClause) -> fmt::Result {
    let options = clause
        .options
        .iter()
        .map(|(k, v)| format!("{} = {}", fmt_key(k), v))
        .collect::<Vec<_>>()
        .join(", ");
    write!(f, "{}(\"{}\") OPTIONS ({})", keyword, clause.connector, options)
}

impl fmt::Display for TransferStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{STATEMENT_KEYWORD} ")?;
        fmt_clause(f, "SOURCE", &self.source)?;
        write!(f, " ")?;
        fmt_clause(f, "SINK", &self.sink)
    }
}
