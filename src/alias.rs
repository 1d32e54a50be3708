//! Historical alias table: every `(table, column)` pair ever recorded by the
//! tower loggers, mapped to what superseded it.
//!
//! The table is built once from a list of `[table, column, target]` records
//! and never mutated afterwards. Lookups are exact-key hash lookups.
//!
//! ## YAML layout
//!
//! ```yaml
//! aliases:
//!   - ['flux', 'gps_ready', removed]
//!   - ['flux', 'WS_ms_WVc(1)', {column: '034b_ws'}]
//!   - ['CFNT_stats30', 'Met1_wnd_spd', {table: 'stats30'}]
//!   - ['stats30', 'Met1_wnd_spd', current]
//! ```
//!
//! A key listed twice keeps its first target. Later occurrences are kept
//! aside as [`DuplicateAlias`] records so the verifier can report them.

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    fs::File,
    io::BufReader,
    path::Path,
};

use anyhow::{Context, Result, anyhow, ensure};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de, ser::SerializeMap};
use serde_yaml::Value;

use crate::identity::Identity;

const BUNDLED_ALIASES: &str = include_str!("../data/aliases.yaml");

/// What a historical identity turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasTarget {
    /// The column is no longer recorded anywhere.
    Removed,
    /// Superseded by another identity. `None` carries the key's field over.
    SameAs {
        table: Option<String>,
        column: Option<String>,
    },
    /// The key is itself a column of the present schema.
    Current,
}

impl AliasTarget {
    pub fn same_as(table: Option<&str>, column: Option<&str>) -> Result<Self> {
        ensure!(
            table.is_some() || column.is_some(),
            "same_as target must replace the table, the column, or both"
        );
        ensure!(
            table.is_none_or(|value| !value.is_empty()),
            "same_as table override cannot be empty"
        );
        ensure!(
            column.is_none_or(|value| !value.is_empty()),
            "same_as column override cannot be empty"
        );
        Ok(AliasTarget::SameAs {
            table: table.map(str::to_string),
            column: column.map(str::to_string),
        })
    }

    /// Identity reached by one substitution step from `key`.
    pub fn successor(&self, key: &Identity) -> Option<Identity> {
        match self {
            AliasTarget::SameAs { table, column } => Some(Identity::new(
                table.as_deref().unwrap_or(&key.table),
                column.as_deref().unwrap_or(&key.column),
            )),
            AliasTarget::Removed | AliasTarget::Current => None,
        }
    }
}

impl fmt::Display for AliasTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AliasTarget::Removed => write!(f, "removed"),
            AliasTarget::Current => write!(f, "current"),
            AliasTarget::SameAs { table, column } => {
                write!(
                    f,
                    "same as {}:{}",
                    table.as_deref().unwrap_or("*"),
                    column.as_deref().unwrap_or("*")
                )
            }
        }
    }
}

impl Serialize for AliasTarget {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            AliasTarget::Removed => serializer.serialize_str("removed"),
            AliasTarget::Current => serializer.serialize_str("current"),
            AliasTarget::SameAs { table, column } => {
                let len = usize::from(table.is_some()) + usize::from(column.is_some());
                let mut map = serializer.serialize_map(Some(len))?;
                if let Some(table) = table {
                    map.serialize_entry("table", table)?;
                }
                if let Some(column) = column {
                    map.serialize_entry("column", column)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for AliasTarget {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        parse_target_value(&value).map_err(de::Error::custom)
    }
}

fn parse_target_value(value: &Value) -> Result<AliasTarget> {
    if let Some(token) = value.as_str() {
        return match token.trim().to_ascii_lowercase().as_str() {
            "current" => Ok(AliasTarget::Current),
            "removed" => Ok(AliasTarget::Removed),
            other => Err(anyhow!(
                "Unknown alias target '{other}'. Expected current, removed, or a table/column mapping"
            )),
        };
    }

    let mapping = value
        .as_mapping()
        .ok_or_else(|| anyhow!("Unsupported alias target representation: {value:?}"))?;
    let mut table: Option<&str> = None;
    let mut column: Option<&str> = None;
    for (key, val) in mapping {
        let key = key
            .as_str()
            .ok_or_else(|| anyhow!("Alias target keys must be strings"))?;
        let text = match val {
            Value::Null => None,
            other => Some(
                other
                    .as_str()
                    .ok_or_else(|| anyhow!("Alias target '{key}' must be a string"))?,
            ),
        };
        match key {
            "table" => table = text,
            "column" => column = text,
            other => return Err(anyhow!("Unknown alias target key '{other}'")),
        }
    }
    AliasTarget::same_as(table, column)
}

/// A key that was listed more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateAlias {
    pub key: Identity,
    pub kept: AliasTarget,
    pub ignored: AliasTarget,
}

#[derive(Debug, Deserialize)]
struct AliasRecord(String, String, AliasTarget);

#[derive(Debug, Deserialize)]
struct AliasDocument {
    aliases: Vec<AliasRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: HashMap<Identity, AliasTarget>,
    duplicates: Vec<DuplicateAlias>,
}

impl AliasTable {
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Identity, AliasTarget)>,
    {
        let mut table = AliasTable::default();
        for (key, target) in entries {
            match table.entries.get(&key) {
                Some(kept) => table.duplicates.push(DuplicateAlias {
                    key,
                    kept: kept.clone(),
                    ignored: target,
                }),
                None => {
                    table.entries.insert(key, target);
                }
            }
        }
        table
    }

    pub fn from_yaml_str(input: &str) -> Result<Self> {
        let document: AliasDocument =
            serde_yaml::from_str(input).context("Parsing alias table YAML")?;
        Ok(Self::from_document(document))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening alias file {path:?}"))?;
        let reader = BufReader::new(file);
        let document: AliasDocument = serde_yaml::from_reader(reader)
            .with_context(|| format!("Parsing alias table YAML {path:?}"))?;
        let table = Self::from_document(document);
        debug!("Loaded {} alias key(s) from {:?}", table.len(), path);
        Ok(table)
    }

    /// The reference deployment's alias table compiled into the binary.
    pub fn bundled() -> Result<Self> {
        Self::from_yaml_str(BUNDLED_ALIASES).context("Loading bundled alias table")
    }

    fn from_document(document: AliasDocument) -> Self {
        Self::from_entries(
            document
                .aliases
                .into_iter()
                .map(|AliasRecord(table, column, target)| (Identity::new(table, column), target)),
        )
    }

    pub fn lookup(&self, identity: &Identity) -> Option<&AliasTarget> {
        self.entries.get(identity)
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.entries.contains_key(identity)
    }

    pub fn all_keys(&self) -> BTreeSet<&Identity> {
        self.entries.keys().collect()
    }

    pub fn historical_table_names(&self) -> BTreeSet<&str> {
        self.entries.keys().map(|key| key.table.as_str()).collect()
    }

    pub fn duplicates(&self) -> &[DuplicateAlias] {
        &self.duplicates
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
