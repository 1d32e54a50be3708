//! Consistency audit of an alias table against the table definitions.
//!
//! Every alias key must resolve without error, and every defined table
//! column must resolve to itself. All defects are collected in one pass and
//! returned sorted, so a maintainer can fix a whole batch at once.

use std::fmt::{self, Write as _};

use itertools::Itertools;
use log::debug;
use serde::Serialize;

use crate::{
    alias::{AliasTable, AliasTarget},
    identity::Identity,
    resolve::{Resolution, ResolveError, Resolver},
    schema::SchemaDefinitions,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    /// Problems found while building the tables themselves.
    Construction,
    /// Every alias key resolves.
    AliasCompleteness,
    /// Every defined column resolves to itself.
    SchemaCoverage,
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Check::Construction => "construction",
            Check::AliasCompleteness => "alias completeness",
            Check::SchemaCoverage => "schema coverage",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DefectReason {
    Unresolvable { error: ResolveError },
    CanonicalDropped,
    CanonicalRedirected { resolved: Identity },
    DuplicateAlias { kept: AliasTarget, ignored: AliasTarget },
    DuplicateColumn,
}

impl fmt::Display for DefectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefectReason::Unresolvable { error } => write!(f, "{error}"),
            DefectReason::CanonicalDropped => {
                write!(f, "defined column resolves to removed")
            }
            DefectReason::CanonicalRedirected { resolved } => {
                write!(f, "defined column resolves to '{resolved}' instead of itself")
            }
            DefectReason::DuplicateAlias { kept, ignored } => write!(
                f,
                "alias key listed more than once (kept '{kept}', ignored '{ignored}')"
            ),
            DefectReason::DuplicateColumn => {
                write!(f, "column listed more than once in its table definition")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Defect {
    pub check: Check,
    pub identity: Identity,
    #[serde(flatten)]
    pub reason: DefectReason,
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.identity, self.reason)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    passed: bool,
    alias_keys_checked: usize,
    canonical_checked: usize,
    dropped: usize,
    defects: Vec<Defect>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn defects(&self) -> &[Defect] {
        &self.defects
    }

    pub fn alias_keys_checked(&self) -> usize {
        self.alias_keys_checked
    }

    pub fn canonical_checked(&self) -> usize {
        self.canonical_checked
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn render_text(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(
            output,
            "Alias table: {} key(s) checked, {} dropped",
            self.alias_keys_checked, self.dropped
        );
        let _ = writeln!(
            output,
            "Table definitions: {} column(s) checked",
            self.canonical_checked
        );
        if self.passed {
            let _ = writeln!(output, "No defects found.");
            return output;
        }
        let _ = writeln!(output, "{} defect(s):", self.defects.len());
        for (check, defects) in &self.defects.iter().chunk_by(|defect| defect.check) {
            let _ = writeln!(output, "  {check}");
            for defect in defects {
                let _ = writeln!(output, "    - {defect}");
            }
        }
        output
    }
}

/// Runs every check and returns the full, sorted list of defects.
pub fn verify(aliases: &AliasTable, schema: &SchemaDefinitions) -> VerificationReport {
    let resolver = Resolver::new(aliases, schema);

    let mut defects = construction_defects(aliases, schema);
    let (alias_defects, dropped) = check_alias_completeness(&resolver);
    defects.extend(alias_defects);
    defects.extend(check_schema_coverage(&resolver));
    sort_defects(&mut defects);

    debug!(
        "Verified {} alias key(s) and {} defined column(s): {} defect(s)",
        aliases.len(),
        schema.column_count(),
        defects.len()
    );

    VerificationReport {
        passed: defects.is_empty(),
        alias_keys_checked: aliases.len(),
        canonical_checked: schema.column_count(),
        dropped,
        defects,
    }
}

fn construction_defects(aliases: &AliasTable, schema: &SchemaDefinitions) -> Vec<Defect> {
    let duplicate_aliases = aliases.duplicates().iter().map(|duplicate| Defect {
        check: Check::Construction,
        identity: duplicate.key.clone(),
        reason: DefectReason::DuplicateAlias {
            kept: duplicate.kept.clone(),
            ignored: duplicate.ignored.clone(),
        },
    });
    let duplicate_columns = schema.duplicate_columns().iter().map(|identity| Defect {
        check: Check::Construction,
        identity: identity.clone(),
        reason: DefectReason::DuplicateColumn,
    });
    duplicate_aliases.chain(duplicate_columns).collect()
}

/// Resolves every alias key. Returns the failures and the number of keys
/// that resolved to removed.
pub fn check_alias_completeness(resolver: &Resolver<'_>) -> (Vec<Defect>, usize) {
    let mut defects = Vec::new();
    let mut dropped = 0usize;
    for key in resolver.aliases().all_keys() {
        match resolver.resolve(key) {
            Ok(Resolution::Current(_)) => {}
            Ok(Resolution::Dropped) => dropped += 1,
            Err(error) => defects.push(Defect {
                check: Check::AliasCompleteness,
                identity: key.clone(),
                reason: DefectReason::Unresolvable { error },
            }),
        }
    }
    (defects, dropped)
}

/// Resolves every defined column and requires it to come back unchanged.
pub fn check_schema_coverage(resolver: &Resolver<'_>) -> Vec<Defect> {
    resolver
        .schema()
        .identities()
        .filter_map(|identity| {
            let reason = match resolver.resolve(&identity) {
                Ok(Resolution::Current(resolved)) if resolved == identity => return None,
                Ok(Resolution::Current(resolved)) => {
                    DefectReason::CanonicalRedirected { resolved }
                }
                Ok(Resolution::Dropped) => DefectReason::CanonicalDropped,
                Err(error) => DefectReason::Unresolvable { error },
            };
            Some(Defect {
                check: Check::SchemaCoverage,
                identity,
                reason,
            })
        })
        .collect()
}

fn sort_defects(defects: &mut [Defect]) {
    defects.sort_by_cached_key(|defect| {
        (
            defect.check,
            defect.identity.clone(),
            defect.reason.to_string(),
        )
    });
}
