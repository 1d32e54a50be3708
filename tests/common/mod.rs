#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};
use toa5_alias::{
    alias::{AliasTable, AliasTarget},
    identity::Identity,
    schema::{SchemaDefinitions, TableDefinition},
};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

pub fn id(table: &str, column: &str) -> Identity {
    Identity::new(table, column)
}

pub fn same_as(table: Option<&str>, column: Option<&str>) -> AliasTarget {
    AliasTarget::same_as(table, column).expect("valid same_as")
}

pub fn aliases(entries: Vec<(Identity, AliasTarget)>) -> AliasTable {
    AliasTable::from_entries(entries)
}

pub fn schema(tables: &[(&str, &[&str])]) -> SchemaDefinitions {
    SchemaDefinitions::from_tables(tables.iter().map(|(name, columns)| TableDefinition {
        name: name.to_string(),
        columns: columns.iter().map(|c| c.to_string()).collect(),
    }))
    .expect("schema definitions")
}

/// Minimal TOA5 file: environment line, column names, units, processing,
/// and one data row.
pub fn toa5_contents(table: &str, columns: &[&str]) -> String {
    let quoted = |values: Vec<String>| {
        values
            .iter()
            .map(|v| format!("\"{v}\""))
            .collect::<Vec<_>>()
            .join(",")
    };
    let mut contents = String::new();
    contents.push_str(&format!(
        "\"TOA5\",\"LIND\",\"CR3000\",\"2504\",\"CR3000.Std.11\",\"CPU:tower.CR3\",\"40102\",\"{table}\"\n"
    ));
    contents.push_str(&quoted(columns.iter().map(|c| c.to_string()).collect()));
    contents.push('\n');
    contents.push_str(&quoted(columns.iter().map(|_| String::new()).collect()));
    contents.push('\n');
    contents.push_str(&quoted(columns.iter().map(|_| "Smp".to_string()).collect()));
    contents.push('\n');
    contents.push_str(&quoted(columns.iter().map(|_| "0".to_string()).collect()));
    contents.push('\n');
    contents
}
