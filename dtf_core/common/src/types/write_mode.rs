use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How rows are applied to the sink entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WriteMode {
    /// Insert every row, leaving existing rows untouched.
    Append,
    /// Clear the target entity before the first batch commits.
    Overwrite,
    /// Match existing rows by the configured key columns and
    /// replace-or-insert per row.
    Upsert,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{0}' is not a write mode (expected APPEND, OVERWRITE or UPSERT)")]
pub struct ParseWriteModeError(pub String);

impl FromStr for WriteMode {
    type Err = ParseWriteModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("append") {
            Ok(WriteMode::Append)
        } else if s.eq_ignore_ascii_case("overwrite") {
            Ok(WriteMode::Overwrite)
        } else if s.eq_ignore_ascii_case("upsert") {
            Ok(WriteMode::Upsert)
        } else {
            Err(ParseWriteModeError(s.to_string()))
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteMode::Append => "APPEND",
            WriteMode::Overwrite => "OVERWRITE",
            WriteMode::Upsert => "UPSERT",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitive() {
        assert_eq!("upsert".parse::<WriteMode>(), Ok(WriteMode::Upsert));
        assert_eq!("OVERWRITE".parse::<WriteMode>(), Ok(WriteMode::Overwrite));
        assert_eq!("Append".parse::<WriteMode>(), Ok(WriteMode::Append));
        assert!("merge".parse::<WriteMode>().is_err());
    }
}
