//! Option model for SOURCE/SINK clauses.
//!
//! Clause options arrive from the grammar as loosely typed key/value pairs.
//! Each connector publishes an [`OptionSchema`] describing the keys it
//! accepts; [`OptionSchema::resolve`] coerces values against the declared
//! kinds, fills defaults, and reports every offending key at once rather
//! than stopping at the first.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Option keys shared by every connector. Connector-specific keys (host,
/// port, credentials, ...) live in the connector's own schema.
pub mod keys {
    pub const SCHEMA_NAME: &str = "schemaName";
    pub const TABLE_NAME: &str = "tableName";
    pub const COLUMNS: &str = "columns";
    pub const CONDITION: &str = "condition";
    pub const WRITE_MODE: &str = "writeMode";
    pub const UPSERT_KEY_COLUMNS: &str = "upsertKeyColumns";
}

/// A single clause option value as written in the statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Integer(i64),
    Boolean(bool),
    StringList(Vec<String>),
    String(String),
}

impl OptionValue {
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionValue::String(_) => OptionKind::String,
            OptionValue::Integer(_) => OptionKind::Integer,
            OptionValue::Boolean(_) => OptionKind::Boolean,
            OptionValue::StringList(_) => OptionKind::StringList,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            OptionValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            OptionValue::StringList(items) => Some(items),
            _ => None,
        }
    }
}

fn quote(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Canonical statement-literal rendering, used when re-serializing an AST.
impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::String(s) => write!(f, "{}", quote(s)),
            OptionValue::Integer(i) => write!(f, "{i}"),
            OptionValue::Boolean(b) => write!(f, "{b}"),
            OptionValue::StringList(items) => {
                let rendered = items.iter().map(|i| quote(i)).collect::<Vec<_>>().join(", ");
                write!(f, "[{rendered}]")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    String,
    Integer,
    Boolean,
    StringList,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptionKind::String => "string",
            OptionKind::Integer => "integer",
            OptionKind::Boolean => "boolean",
            OptionKind::StringList => "string list",
        };
        write!(f, "{name}")
    }
}

/// Raw clause options keyed by name, after duplicate detection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionMap(BTreeMap<String, OptionValue>);

impl OptionMap {
    /// Build from parse-order pairs. Duplicate keys are reported as issues
    /// (first occurrence wins) so they surface alongside schema violations.
    pub fn from_pairs<I>(pairs: I) -> (Self, Vec<OptionIssue>)
    where
        I: IntoIterator<Item = (String, OptionValue)>,
    {
        let mut map = BTreeMap::new();
        let mut issues = Vec::new();
        for (key, value) in pairs {
            if map.contains_key(&key) {
                issues.push(OptionIssue::duplicate(&key));
            } else {
                map.insert(key, value);
            }
        }
        (Self(map), issues)
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Declared shape of one option key.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSpec {
    pub kind: OptionKind,
    pub required: bool,
    pub default: Option<OptionValue>,
}

/// One violation found while resolving an [`OptionMap`] against a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionIssue {
    pub key: String,
    pub kind: OptionIssueKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionIssueKind {
    MissingRequired,
    Unknown,
    Duplicate,
    TypeMismatch { expected: OptionKind, found: OptionKind },
    Invalid { reason: String },
}

impl OptionIssue {
    pub fn missing(key: &str) -> Self {
        Self {
            key: key.to_string(),
            kind: OptionIssueKind::MissingRequired,
        }
    }

    pub fn unknown(key: &str) -> Self {
        Self {
            key: key.to_string(),
            kind: OptionIssueKind::Unknown,
        }
    }

    pub fn duplicate(key: &str) -> Self {
        Self {
            key: key.to_string(),
            kind: OptionIssueKind::Duplicate,
        }
    }

    pub fn type_mismatch(key: &str, expected: OptionKind, found: OptionKind) -> Self {
        Self {
            key: key.to_string(),
            kind: OptionIssueKind::TypeMismatch { expected, found },
        }
    }

    pub fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            kind: OptionIssueKind::Invalid {
                reason: reason.into(),
            },
        }
    }
}

impl fmt::Display for OptionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            OptionIssueKind::MissingRequired => {
                write!(f, "option '{}' is required but missing", self.key)
            }
            OptionIssueKind::Unknown => write!(f, "option '{}' is not recognised", self.key),
            OptionIssueKind::Duplicate => write!(f, "option '{}' is set more than once", self.key),
            OptionIssueKind::TypeMismatch { expected, found } => write!(
                f,
                "option '{}' expects a {}, got a {}",
                self.key, expected, found
            ),
            OptionIssueKind::Invalid { reason } => {
                write!(f, "option '{}' is invalid: {}", self.key, reason)
            }
        }
    }
}

/// Options after schema resolution: every declared default filled, every
/// value coerced to its declared kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedOptions(BTreeMap<String, OptionValue>);

impl ResolvedOptions {
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(OptionValue::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(OptionValue::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(OptionValue::as_bool)
    }

    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        self.get(key).and_then(OptionValue::as_list)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.0.iter()
    }
}

/// Declared option keys for one connector role.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionSchema {
    specs: BTreeMap<String, OptionSpec>,
}

impl OptionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transfer-shaping keys every readable connector understands.
    pub fn source_base() -> Self {
        Self::new()
            .required(keys::SCHEMA_NAME, OptionKind::String)
            .required(keys::TABLE_NAME, OptionKind::String)
            .optional_with_default(
                keys::COLUMNS,
                OptionKind::StringList,
                OptionValue::StringList(vec!["*".to_string()]),
            )
            .optional(keys::CONDITION, OptionKind::String)
    }

    /// Transfer-shaping keys every writable connector understands.
    pub fn sink_base() -> Self {
        Self::new()
            .required(keys::SCHEMA_NAME, OptionKind::String)
            .required(keys::TABLE_NAME, OptionKind::String)
            .optional(keys::COLUMNS, OptionKind::StringList)
            .optional_with_default(
                keys::WRITE_MODE,
                OptionKind::String,
                OptionValue::String("APPEND".to_string()),
            )
            .optional(keys::UPSERT_KEY_COLUMNS, OptionKind::StringList)
    }

    /// Declare a required key. Re-declaring an existing key replaces it, so
    /// connectors can tighten or loosen the base schemas.
    pub fn required(mut self, key: &str, kind: OptionKind) -> Self {
        self.specs.insert(
            key.to_string(),
            OptionSpec {
                kind,
                required: true,
                default: None,
            },
        );
        self
    }

    pub fn optional(mut self, key: &str, kind: OptionKind) -> Self {
        self.specs.insert(
            key.to_string(),
            OptionSpec {
                kind,
                required: false,
                default: None,
            },
        );
        self
    }

    pub fn optional_with_default(mut self, key: &str, kind: OptionKind, default: OptionValue) -> Self {
        self.specs.insert(
            key.to_string(),
            OptionSpec {
                kind,
                required: false,
                default: Some(default),
            },
        );
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.specs.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionSpec)> {
        self.specs.iter()
    }

    /// Validate and coerce a raw option map.
    ///
    /// Collects every violation: unknown keys, missing required keys and
    /// type mismatches are all reported together. Coercions never lose
    /// information; a non-numeric string offered for an integer key is a
    /// mismatch, not a zero.
    pub fn resolve(&self, options: &OptionMap) -> Result<ResolvedOptions, Vec<OptionIssue>> {
        let mut issues = Vec::new();
        let mut resolved = BTreeMap::new();

        for (key, value) in options.iter() {
            match self.specs.get(key) {
                None => issues.push(OptionIssue::unknown(key)),
                Some(spec) => match coerce(value, spec.kind) {
                    Some(coerced) => {
                        resolved.insert(key.clone(), coerced);
                    }
                    None => issues.push(OptionIssue::type_mismatch(key, spec.kind, value.kind())),
                },
            }
        }

        for (key, spec) in self.specs.iter() {
            if resolved.contains_key(key) {
                continue;
            }
            if let Some(default) = &spec.default {
                resolved.insert(key.clone(), default.clone());
            } else if spec.required && options.get(key).is_none() {
                issues.push(OptionIssue::missing(key));
            }
        }

        if issues.is_empty() {
            Ok(ResolvedOptions(resolved))
        } else {
            Err(issues)
        }
    }
}

fn coerce(value: &OptionValue, kind: OptionKind) -> Option<OptionValue> {
    match (kind, value) {
        (OptionKind::String, OptionValue::String(_)) => Some(value.clone()),
        (OptionKind::String, OptionValue::Integer(i)) => Some(OptionValue::String(i.to_string())),
        (OptionKind::String, OptionValue::Boolean(b)) => Some(OptionValue::String(b.to_string())),
        (OptionKind::Integer, OptionValue::Integer(_)) => Some(value.clone()),
        (OptionKind::Integer, OptionValue::String(s)) => {
            s.trim().parse::<i64>().ok().map(OptionValue::Integer)
        }
        (OptionKind::Boolean, OptionValue::Boolean(_)) => Some(value.clone()),
        (OptionKind::Boolean, OptionValue::String(s)) => {
            if s.eq_ignore_ascii_case("true") {
                Some(OptionValue::Boolean(true))
            } else if s.eq_ignore_ascii_case("false") {
                Some(OptionValue::Boolean(false))
            } else {
                None
            }
        }
        (OptionKind::StringList, OptionValue::StringList(_)) => Some(value.clone()),
        _ => None,
    }
}
