use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::identity::Identity;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Resolve historical TOA5 table/column names to the current schema",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check that the alias table and table definitions agree
    Verify(VerifyArgs),
    /// Resolve one or more historical table:column names
    Resolve(ResolveArgs),
    /// List the current tables and their column order
    Tables(TablesArgs),
    /// Show how a TOA5 file's columns map onto the current tables
    Plan(PlanArgs),
}

#[derive(Debug, Clone, Args)]
pub struct DataArgs {
    /// Alias table YAML (defaults to the bundled table)
    #[arg(long = "aliases")]
    pub aliases: Option<PathBuf>,
    /// Table definitions YAML (defaults to the bundled definitions)
    #[arg(long = "tables")]
    pub tables: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub data: DataArgs,
    /// Report format
    #[arg(long, value_enum, default_value = "text")]
    pub format: ReportFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Args)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub data: DataArgs,
    /// Identities in the form `table:column`
    #[arg(required = true, value_parser = parse_identity)]
    pub identities: Vec<Identity>,
    /// Print every step of each alias chain
    #[arg(long)]
    pub trace: bool,
    /// Resolve even if the alias table fails verification
    #[arg(long = "skip-verify")]
    pub skip_verify: bool,
}

#[derive(Debug, Args)]
pub struct TablesArgs {
    #[command(flatten)]
    pub data: DataArgs,
    /// Only list this table
    #[arg(long)]
    pub table: Option<String>,
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub data: DataArgs,
    /// TOA5 data file whose header should be mapped
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Plan even if the alias table fails verification
    #[arg(long = "skip-verify")]
    pub skip_verify: bool,
}

pub fn parse_identity(value: &str) -> Result<Identity, String> {
    value.parse::<Identity>().map_err(|err| err.to_string())
}
