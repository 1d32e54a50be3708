//! Maps a raw file header onto the present-day tables.
//!
//! A [`HeaderPlan`] is built once per file from its table name and header
//! row. It records, for every destination table, which source column feeds
//! each canonical column, and can then rewrite raw records one at a time.
//!
//! Any column that fails to resolve makes the whole source table
//! unrecognized; dropped columns are discarded and logged.

use std::collections::HashMap;

use itertools::Itertools;
use log::{debug, info};
use thiserror::Error;

use crate::{
    identity::Identity,
    resolve::{Resolution, ResolveError, Resolver},
};

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("unrecognized table '{table}'")]
    UnrecognizedTable { table: String },

    #[error("cannot resolve column '{column}' of table '{table}': {source}")]
    Unresolved {
        table: String,
        column: String,
        source: ResolveError,
    },

    #[error("columns '{first}' and '{second}' of table '{table}' both resolve to '{target}'")]
    Collision {
        table: String,
        first: String,
        second: String,
        target: Identity,
    },
}

/// One destination table and where each of its columns comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTable {
    pub name: String,
    pub columns: Vec<String>,
    /// Source header index per column; `None` is written as an empty cell.
    pub sources: Vec<Option<usize>>,
}

impl OutputTable {
    pub fn mapped_columns(&self) -> usize {
        self.sources.iter().flatten().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscardedColumn {
    pub index: usize,
    pub column: String,
}

#[derive(Debug, Clone)]
pub struct HeaderPlan {
    source_table: String,
    outputs: Vec<OutputTable>,
    discarded: Vec<DiscardedColumn>,
}

impl HeaderPlan {
    pub fn build(
        resolver: &Resolver<'_>,
        source_table: &str,
        headers: &[String],
    ) -> Result<Self, PlanError> {
        if !resolver
            .aliases()
            .historical_table_names()
            .contains(source_table)
        {
            return Err(PlanError::UnrecognizedTable {
                table: source_table.to_string(),
            });
        }

        let mut claimed: HashMap<Identity, usize> = HashMap::new();
        let mut discarded = Vec::new();
        for (index, header) in headers.iter().enumerate() {
            let identity = Identity::new(source_table, header);
            match resolver.resolve(&identity) {
                Ok(Resolution::Current(target)) => {
                    if let Some(&first) = claimed.get(&target) {
                        return Err(PlanError::Collision {
                            table: source_table.to_string(),
                            first: headers[first].clone(),
                            second: header.clone(),
                            target,
                        });
                    }
                    debug!("{identity} -> {target}");
                    claimed.insert(target, index);
                }
                Ok(Resolution::Dropped) => {
                    info!("Discarding dropped column {identity}");
                    discarded.push(DiscardedColumn {
                        index,
                        column: header.clone(),
                    });
                }
                Err(source) => {
                    return Err(PlanError::Unresolved {
                        table: source_table.to_string(),
                        column: header.clone(),
                        source,
                    });
                }
            }
        }

        let by_table = claimed
            .into_iter()
            .map(|(target, index)| (target.table, (target.column, index)))
            .into_group_map();
        let outputs = by_table
            .into_iter()
            .sorted_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(name, placed)| {
                let placed: HashMap<String, usize> = placed.into_iter().collect();
                let columns = resolver
                    .schema()
                    .columns(&name)
                    .unwrap_or_default()
                    .to_vec();
                let sources = columns
                    .iter()
                    .map(|column| placed.get(column).copied())
                    .collect();
                OutputTable {
                    name,
                    columns,
                    sources,
                }
            })
            .collect();

        Ok(HeaderPlan {
            source_table: source_table.to_string(),
            outputs,
            discarded,
        })
    }

    pub fn source_table(&self) -> &str {
        &self.source_table
    }

    pub fn outputs(&self) -> &[OutputTable] {
        &self.outputs
    }

    pub fn discarded(&self) -> &[DiscardedColumn] {
        &self.discarded
    }

    /// Rewrites one raw record into one record per destination table.
    pub fn remap_record(&self, record: &[String]) -> Vec<(String, Vec<String>)> {
        self.outputs
            .iter()
            .map(|output| {
                let values = output
                    .sources
                    .iter()
                    .map(|source| {
                        source
                            .and_then(|index| record.get(index))
                            .cloned()
                            .unwrap_or_default()
                    })
                    .collect();
                (output.name.clone(), values)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        alias::{AliasTable, AliasTarget},
        schema::{SchemaDefinitions, TableDefinition},
    };

    fn same_as(table: Option<&str>, column: Option<&str>) -> AliasTarget {
        AliasTarget::same_as(table, column).expect("valid same_as")
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn fixture() -> (AliasTable, SchemaDefinitions) {
        let aliases = AliasTable::from_entries([
            (Identity::new("flux", "TIMESTAMP"), same_as(Some("stats30"), None)),
            (Identity::new("flux", "l"), same_as(Some("stats30"), Some("L"))),
            (Identity::new("flux", "gps_ready"), AliasTarget::Removed),
            (Identity::new("flux", "batt_volt_Avg"), same_as(Some("site_daily"), None)),
            (Identity::new("flux", "L_dup"), same_as(Some("stats30"), Some("L"))),
            (Identity::new("stats30", "TIMESTAMP"), AliasTarget::Current),
            (Identity::new("stats30", "L"), AliasTarget::Current),
            (Identity::new("stats30", "Hc"), AliasTarget::Current),
            (Identity::new("site_daily", "batt_volt_Avg"), AliasTarget::Current),
        ]);
        let schema = SchemaDefinitions::from_tables([
            TableDefinition {
                name: "stats30".to_string(),
                columns: headers(&["TIMESTAMP", "L", "Hc"]),
            },
            TableDefinition {
                name: "site_daily".to_string(),
                columns: headers(&["batt_volt_Avg"]),
            },
        ])
        .expect("schema");
        (aliases, schema)
    }

    #[test]
    fn plan_splits_columns_across_tables_in_canonical_order() {
        let (aliases, schema) = fixture();
        let resolver = Resolver::new(&aliases, &schema);
        let plan = HeaderPlan::build(
            &resolver,
            "flux",
            &headers(&["TIMESTAMP", "gps_ready", "l", "batt_volt_Avg"]),
        )
        .expect("plan");

        assert_eq!(plan.source_table(), "flux");
        let names: Vec<&str> = plan.outputs().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["site_daily", "stats30"]);
        assert_eq!(plan.outputs()[1].sources, vec![Some(0), Some(2), None]);
        assert_eq!(plan.outputs()[1].mapped_columns(), 2);
        assert_eq!(
            plan.discarded(),
            &[DiscardedColumn {
                index: 1,
                column: "gps_ready".to_string(),
            }]
        );

        let record = headers(&["2012-01-01 00:30:00", "1", "-12.5", "12.9"]);
        assert_eq!(
            plan.remap_record(&record),
            vec![
                ("site_daily".to_string(), headers(&["12.9"])),
                (
                    "stats30".to_string(),
                    headers(&["2012-01-01 00:30:00", "-12.5", ""])
                ),
            ]
        );
    }

    #[test]
    fn unknown_table_is_unrecognized() {
        let (aliases, schema) = fixture();
        let resolver = Resolver::new(&aliases, &schema);
        let err = HeaderPlan::build(&resolver, "mystery", &headers(&["x"])).unwrap_err();
        assert!(matches!(err, PlanError::UnrecognizedTable { table } if table == "mystery"));
    }

    #[test]
    fn unresolvable_column_rejects_whole_table() {
        let (aliases, schema) = fixture();
        let resolver = Resolver::new(&aliases, &schema);
        let err = HeaderPlan::build(&resolver, "flux", &headers(&["l", "Fc_wpl"])).unwrap_err();
        match err {
            PlanError::Unresolved { column, source, .. } => {
                assert_eq!(column, "Fc_wpl");
                assert!(matches!(source, ResolveError::UnknownIdentity { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn two_sources_for_one_column_collide() {
        let (aliases, schema) = fixture();
        let resolver = Resolver::new(&aliases, &schema);
        let err = HeaderPlan::build(&resolver, "flux", &headers(&["l", "L_dup"])).unwrap_err();
        assert!(err.to_string().contains("both resolve to 'stats30:L'"));
    }

    #[test]
    fn short_records_fill_missing_cells_with_empty() {
        let (aliases, schema) = fixture();
        let resolver = Resolver::new(&aliases, &schema);
        let plan = HeaderPlan::build(&resolver, "flux", &headers(&["TIMESTAMP", "l"]))
            .expect("plan");
        let remapped = plan.remap_record(&headers(&["2012-01-01 00:30:00"]));
        assert_eq!(
            remapped,
            vec![(
                "stats30".to_string(),
                headers(&["2012-01-01 00:30:00", "", ""])
            )]
        );
    }
}
