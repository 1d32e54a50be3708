use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// A `(table, column)` name pair as it appears in a data file header.
///
/// Names are opaque and case-sensitive. Ordering is by table, then column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct Identity {
    pub table: String,
    pub column: String,
}

impl Identity {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table, self.column)
    }
}

impl FromStr for Identity {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (table, column) = value
            .split_once(':')
            .ok_or_else(|| anyhow!("Identity '{value}' must use the form table:column"))?;
        if table.is_empty() || column.is_empty() {
            return Err(anyhow!(
                "Identity '{value}' must name both a table and a column"
            ));
        }
        Ok(Identity::new(table, column))
    }
}

impl From<(String, String)> for Identity {
    fn from((table, column): (String, String)) -> Self {
        Identity { table, column }
    }
}

impl From<Identity> for (String, String) {
    fn from(identity: Identity) -> Self {
        (identity.table, identity.column)
    }
}

impl From<(&str, &str)> for Identity {
    fn from((table, column): (&str, &str)) -> Self {
        Identity::new(table, column)
    }
}
