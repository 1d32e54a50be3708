//! Canonical table layouts: the present-day schema every record is rewritten
//! into.
//!
//! Each table is an ordered list of column names; the order is the output
//! column order. Definitions are loaded once and only read afterwards.
//!
//! ## YAML layout
//!
//! ```yaml
//! tables:
//!   - name: 'stats30'
//!     columns: ['TIMESTAMP', 'RECORD', 'L']
//!   - name: 'stats5'
//!     copy_of: 'stats30'
//! ```
//!
//! `copy_of` must name a table defined earlier in the same document.

use std::{
    collections::{HashMap, HashSet},
    fs::File,
    io::BufReader,
    path::Path,
};

use anyhow::{Context, Result, anyhow, bail};
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::identity::Identity;

const BUNDLED_TABLES: &str = include_str!("../data/tables.yaml");

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableRecord {
    name: String,
    #[serde(default)]
    columns: Option<Vec<String>>,
    #[serde(default)]
    copy_of: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TablesDocument {
    tables: Vec<TableRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaDefinitions {
    tables: Vec<TableDefinition>,
    index: HashMap<String, usize>,
    members: HashSet<Identity>,
    duplicate_columns: Vec<Identity>,
}

impl SchemaDefinitions {
    pub fn from_tables<I>(tables: I) -> Result<Self>
    where
        I: IntoIterator<Item = TableDefinition>,
    {
        let mut schema = SchemaDefinitions::default();
        for table in tables {
            if schema.index.contains_key(&table.name) {
                bail!("Table '{}' is defined more than once", table.name);
            }
            for column in &table.columns {
                let identity = Identity::new(&table.name, column);
                if !schema.members.insert(identity.clone()) {
                    schema.duplicate_columns.push(identity);
                }
            }
            schema.index.insert(table.name.clone(), schema.tables.len());
            schema.tables.push(table);
        }
        Ok(schema)
    }

    pub fn from_yaml_str(input: &str) -> Result<Self> {
        let document: TablesDocument =
            serde_yaml::from_str(input).context("Parsing table definitions YAML")?;
        Self::from_document(document)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Opening table definitions {path:?}"))?;
        let reader = BufReader::new(file);
        let document: TablesDocument = serde_yaml::from_reader(reader)
            .with_context(|| format!("Parsing table definitions YAML {path:?}"))?;
        let schema = Self::from_document(document)
            .with_context(|| format!("Building table definitions from {path:?}"))?;
        debug!(
            "Loaded {} table(s) with {} column(s) from {:?}",
            schema.tables.len(),
            schema.column_count(),
            path
        );
        Ok(schema)
    }

    /// The reference deployment's table layouts compiled into the binary.
    pub fn bundled() -> Result<Self> {
        Self::from_yaml_str(BUNDLED_TABLES).context("Loading bundled table definitions")
    }

    fn from_document(document: TablesDocument) -> Result<Self> {
        let mut resolved: Vec<TableDefinition> = Vec::with_capacity(document.tables.len());
        for record in document.tables {
            let columns = match (record.columns, record.copy_of) {
                (Some(columns), None) => columns,
                (None, Some(source)) => resolved
                    .iter()
                    .find(|table| table.name == source)
                    .map(|table| table.columns.clone())
                    .ok_or_else(|| {
                        anyhow!(
                            "Table '{}' copies '{source}', which is not defined before it",
                            record.name
                        )
                    })?,
                (Some(_), Some(_)) => bail!(
                    "Table '{}' must give either columns or copy_of, not both",
                    record.name
                ),
                (None, None) => bail!("Table '{}' must give columns or copy_of", record.name),
            };
            resolved.push(TableDefinition {
                name: record.name,
                columns,
            });
        }
        Self::from_tables(resolved)
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.members.contains(identity)
    }

    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.index
            .get(table)
            .map(|&idx| self.tables[idx].columns.as_slice())
    }

    pub fn tables(&self) -> &[TableDefinition] {
        &self.tables
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|table| table.name.as_str())
    }

    /// Every canonical pair once, in table order then column order.
    pub fn identities(&self) -> impl Iterator<Item = Identity> + '_ {
        self.tables
            .iter()
            .flat_map(|table| {
                table
                    .columns
                    .iter()
                    .map(|column| Identity::new(&table.name, column))
            })
            .unique()
    }

    pub fn duplicate_columns(&self) -> &[Identity] {
        &self.duplicate_columns
    }

    pub fn column_count(&self) -> usize {
        self.members.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, columns: &[&str]) -> TableDefinition {
        TableDefinition {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn copy_of_reuses_earlier_layout() {
        let schema = SchemaDefinitions::from_yaml_str(
            r#"
tables:
  - name: 'stats30'
    columns: ['TIMESTAMP', 'RECORD', 'L']
  - name: 'stats5'
    copy_of: 'stats30'
"#,
        )
        .expect("parse tables");
        assert_eq!(schema.columns("stats5"), schema.columns("stats30"));
        assert!(schema.contains(&Identity::new("stats5", "L")));
        assert_eq!(schema.column_count(), 6);
    }

    #[test]
    fn copy_of_must_reference_earlier_table() {
        let err = SchemaDefinitions::from_yaml_str(
            r#"
tables:
  - name: 'stats5'
    copy_of: 'stats30'
  - name: 'stats30'
    columns: ['L']
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("not defined before it"));
    }

    #[test]
    fn table_needs_exactly_one_column_source() {
        let both = "tables:\n  - name: 'a'\n    columns: ['x']\n    copy_of: 'a'\n";
        assert!(SchemaDefinitions::from_yaml_str(both).is_err());
        let neither = "tables:\n  - name: 'a'\n";
        assert!(SchemaDefinitions::from_yaml_str(neither).is_err());
    }

    #[test]
    fn repeated_table_name_is_rejected() {
        let err = SchemaDefinitions::from_tables([table("a", &["x"]), table("a", &["y"])])
            .unwrap_err();
        assert!(err.to_string().contains("defined more than once"));
    }

    #[test]
    fn duplicate_columns_are_recorded_and_listed_once() {
        let schema =
            SchemaDefinitions::from_tables([table("site_daily", &["TIMESTAMP", "RECORD", "TIMESTAMP"])])
                .expect("schema");
        assert_eq!(
            schema.duplicate_columns(),
            &[Identity::new("site_daily", "TIMESTAMP")]
        );
        let identities: Vec<Identity> = schema.identities().collect();
        assert_eq!(
            identities,
            vec![
                Identity::new("site_daily", "TIMESTAMP"),
                Identity::new("site_daily", "RECORD"),
            ]
        );
    }

    #[test]
    fn columns_preserve_declared_order() {
        let schema = SchemaDefinitions::bundled().expect("bundled tables");
        let columns = schema.columns("stats30").expect("stats30 defined");
        assert_eq!(&columns[..3], &["TIMESTAMP", "RECORD", "L"]);
        assert!(schema.columns("flux").is_none());
    }
}
