use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One fully resolved schema/table pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConcreteEntity {
    pub schema: String,
    pub table: String,
}

impl ConcreteEntity {
    pub fn new<S: Into<String>>(schema: S, table: S) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

impl fmt::Display for ConcreteEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// A name is treated as a literal only when it is a plain identifier;
/// anything else is interpreted as a regular expression against the catalog.
pub fn is_plain_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// One side of an entity name: either a literal identifier or a regex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamePart {
    Literal(String),
    Pattern(String),
}

impl NamePart {
    pub fn parse(raw: &str) -> Self {
        if is_plain_identifier(raw) {
            NamePart::Literal(raw.to_string())
        } else {
            NamePart::Pattern(raw.to_string())
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, NamePart::Pattern(_))
    }

    pub fn raw(&self) -> &str {
        match self {
            NamePart::Literal(s) | NamePart::Pattern(s) => s,
        }
    }
}

/// Schema/table pair as written in a clause, before catalog expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityPattern {
    pub schema: NamePart,
    pub table: NamePart,
}

impl EntityPattern {
    pub fn parse(schema_raw: &str, table_raw: &str) -> Self {
        Self {
            schema: NamePart::parse(schema_raw),
            table: NamePart::parse(table_raw),
        }
    }

    pub fn is_literal(&self) -> bool {
        !self.schema.is_pattern() && !self.table.is_pattern()
    }

    /// The single entity a fully literal pattern names.
    pub fn as_literal(&self) -> Option<ConcreteEntity> {
        match (&self.schema, &self.table) {
            (NamePart::Literal(s), NamePart::Literal(t)) => Some(ConcreteEntity::new(s, t)),
            _ => None,
        }
    }
}

/// Compiled matcher for one name part. Literals compare for equality,
/// patterns match as anchored regexes over the whole name.
#[derive(Debug, Clone)]
pub enum NameMatcher {
    Literal(String),
    Regex(Regex),
}

impl NameMatcher {
    pub fn compile(raw: &str) -> Result<Self, regex::Error> {
        if is_plain_identifier(raw) {
            Ok(NameMatcher::Literal(raw.to_string()))
        } else {
            Ok(NameMatcher::Regex(Regex::new(&format!("^(?:{raw})$"))?))
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameMatcher::Literal(lit) => lit == name,
            NameMatcher::Regex(re) => re.is_match(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_identifiers() {
        assert!(is_plain_identifier("orders"));
        assert!(is_plain_identifier("_raw_2"));
        assert!(!is_plain_identifier("account_[0-9]+"));
        assert!(!is_plain_identifier("2fast"));
        assert!(!is_plain_identifier(""));
        assert!(!is_plain_identifier("a.b"));
    }

    #[test]
    fn literal_pattern_names_itself() {
        let pat = EntityPattern::parse("sales", "orders");
        assert!(pat.is_literal());
        assert_eq!(
            pat.as_literal(),
            Some(ConcreteEntity::new("sales", "orders"))
        );
    }

    #[test]
    fn regex_matcher_is_anchored() {
        let m = NameMatcher::compile("account_[0-9]+").expect("compile failed");
        assert!(m.matches("account_7"));
        assert!(!m.matches("account_7x"));
        assert!(!m.matches("xaccount_7"));
    }

    #[test]
    fn literal_matcher_is_equality() {
        let m = NameMatcher::compile("orders").expect("compile failed");
        assert!(m.matches("orders"));
        assert!(!m.matches("orders_2"));
    }
}
