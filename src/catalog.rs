use std::path::Path;

use anyhow::{Context, Result, bail};
use log::{debug, warn};

use crate::{
    alias::AliasTable,
    resolve::Resolver,
    schema::SchemaDefinitions,
    verify::{self, VerificationReport},
};

/// An alias table together with the table definitions it resolves into.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub aliases: AliasTable,
    pub schema: SchemaDefinitions,
}

impl Catalog {
    pub fn new(aliases: AliasTable, schema: SchemaDefinitions) -> Self {
        Self { aliases, schema }
    }

    pub fn bundled() -> Result<Self> {
        Ok(Self::new(AliasTable::bundled()?, SchemaDefinitions::bundled()?))
    }

    /// Loads either data set from a file, or the bundled copy when no path
    /// is given.
    pub fn load(aliases: Option<&Path>, tables: Option<&Path>) -> Result<Self> {
        let aliases = match aliases {
            Some(path) => AliasTable::load(path)
                .with_context(|| format!("Loading alias table from {path:?}"))?,
            None => AliasTable::bundled()?,
        };
        let schema = match tables {
            Some(path) => SchemaDefinitions::load(path)
                .with_context(|| format!("Loading table definitions from {path:?}"))?,
            None => SchemaDefinitions::bundled()?,
        };
        debug!(
            "Catalog holds {} alias key(s) and {} table(s)",
            aliases.len(),
            schema.tables().len()
        );
        Ok(Self::new(aliases, schema))
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.aliases, &self.schema)
    }

    pub fn verify(&self) -> VerificationReport {
        verify::verify(&self.aliases, &self.schema)
    }

    /// Fails unless the catalog passes every consistency check.
    pub fn ensure_consistent(&self) -> Result<()> {
        let report = self.verify();
        if !report.passed() {
            bail!(
                "Alias table and table definitions disagree ({} defect(s)); run `verify` for details:\n{}",
                report.defects().len(),
                report.render_text()
            );
        }
        Ok(())
    }

    /// Loads a catalog and, unless `skip_verify` is set, refuses one that
    /// fails verification.
    pub fn load_checked(
        aliases: Option<&Path>,
        tables: Option<&Path>,
        skip_verify: bool,
    ) -> Result<Self> {
        let catalog = Self::load(aliases, tables)?;
        if skip_verify {
            warn!("Skipping alias table verification; results may be unreliable");
        } else {
            catalog.ensure_consistent()?;
        }
        Ok(catalog)
    }
}
