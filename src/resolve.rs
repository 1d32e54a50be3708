//! Follows alias chains from a historical identity to its present-day
//! identity.
//!
//! Resolution is an explicit loop over the chain with a visited set, so a
//! looping alias table yields [`ResolveError::CyclicAlias`] instead of
//! running forever. The resolver only borrows read-only data and can be
//! shared freely between threads.

use std::collections::HashSet;

use itertools::Itertools;
use log::trace;
use serde::Serialize;
use thiserror::Error;

use crate::{alias::AliasTable, alias::AliasTarget, identity::Identity, schema::SchemaDefinitions};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "identity", rename_all = "snake_case")]
pub enum Resolution {
    /// Data for the identity now lives under this canonical identity.
    Current(Identity),
    /// The identity was intentionally discontinued.
    Dropped,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolveError {
    #[error("{}", describe_unknown(.identity, .origin))]
    UnknownIdentity { identity: Identity, origin: Identity },

    #[error("alias chain loops: {}", .cycle.iter().join(" -> "))]
    CyclicAlias {
        cycle: Vec<Identity>,
        origin: Identity,
    },

    #[error("'{identity}' is marked current but is not a defined table column (resolving '{origin}')")]
    SchemaMismatch { identity: Identity, origin: Identity },
}

fn describe_unknown(identity: &Identity, origin: &Identity) -> String {
    if identity == origin {
        format!("no alias entry for '{identity}'")
    } else {
        format!("no alias entry for '{identity}' (reached from '{origin}')")
    }
}

impl ResolveError {
    /// The identity resolution started from.
    pub fn origin(&self) -> &Identity {
        match self {
            ResolveError::UnknownIdentity { origin, .. }
            | ResolveError::CyclicAlias { origin, .. }
            | ResolveError::SchemaMismatch { origin, .. } => origin,
        }
    }
}

/// The identities visited while resolving, in order, and the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub chain: Vec<Identity>,
    pub outcome: Result<Resolution, ResolveError>,
}

#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    aliases: &'a AliasTable,
    schema: &'a SchemaDefinitions,
}

impl<'a> Resolver<'a> {
    pub fn new(aliases: &'a AliasTable, schema: &'a SchemaDefinitions) -> Self {
        Self { aliases, schema }
    }

    pub fn aliases(&self) -> &'a AliasTable {
        self.aliases
    }

    pub fn schema(&self) -> &'a SchemaDefinitions {
        self.schema
    }

    pub fn resolve(&self, identity: &Identity) -> Result<Resolution, ResolveError> {
        let mut chain = Vec::new();
        self.walk(identity, &mut chain)
    }

    pub fn trace(&self, identity: &Identity) -> Trace {
        let mut chain = Vec::new();
        let outcome = self.walk(identity, &mut chain);
        Trace { chain, outcome }
    }

    fn walk(
        &self,
        start: &Identity,
        chain: &mut Vec<Identity>,
    ) -> Result<Resolution, ResolveError> {
        let mut visited: HashSet<Identity> = HashSet::new();
        let mut current = start.clone();
        visited.insert(current.clone());
        chain.push(current.clone());

        loop {
            let target =
                self.aliases
                    .lookup(&current)
                    .ok_or_else(|| ResolveError::UnknownIdentity {
                        identity: current.clone(),
                        origin: start.clone(),
                    })?;

            let Some(next) = target.successor(&current) else {
                return match target {
                    AliasTarget::Current if self.schema.contains(&current) => {
                        Ok(Resolution::Current(current))
                    }
                    AliasTarget::Current => Err(ResolveError::SchemaMismatch {
                        identity: current,
                        origin: start.clone(),
                    }),
                    _ => Ok(Resolution::Dropped),
                };
            };

            trace!("{current} -> {next}");
            if !visited.insert(next.clone()) {
                let from = chain
                    .iter()
                    .position(|identity| *identity == next)
                    .unwrap_or_default();
                let mut cycle = chain[from..].to_vec();
                cycle.push(next);
                return Err(ResolveError::CyclicAlias {
                    cycle,
                    origin: start.clone(),
                });
            }
            chain.push(next.clone());
            current = next;
        }
    }
}
