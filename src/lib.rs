pub mod alias;
pub mod catalog;
pub mod cli;
pub mod homogenize;
pub mod identity;
pub mod resolve;
pub mod schema;
pub mod toa5;
pub mod verify;

use std::{env, fmt::Write as _, sync::OnceLock};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, info, warn};

use crate::{
    catalog::Catalog,
    cli::{Cli, Commands, PlanArgs, ReportFormat, ResolveArgs, TablesArgs, VerifyArgs},
    homogenize::HeaderPlan,
    resolve::{Resolution, Trace},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("toa5_alias", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Verify(args) => handle_verify(&args),
        Commands::Resolve(args) => handle_resolve(&args),
        Commands::Tables(args) => handle_tables(&args),
        Commands::Plan(args) => handle_plan(&args),
    }
}

fn handle_verify(args: &VerifyArgs) -> Result<()> {
    let catalog = Catalog::load(args.data.aliases.as_deref(), args.data.tables.as_deref())?;
    info!(
        "Verifying {} alias key(s) against {} table definition(s)",
        catalog.aliases.len(),
        catalog.schema.tables().len()
    );
    let report = catalog.verify();
    match args.format {
        ReportFormat::Text => print!("{}", report.render_text()),
        ReportFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Serializing verification report")?
        ),
    }
    if !report.passed() {
        bail!("Verification found {} defect(s)", report.defects().len());
    }
    Ok(())
}

fn handle_resolve(args: &ResolveArgs) -> Result<()> {
    let catalog = Catalog::load_checked(
        args.data.aliases.as_deref(),
        args.data.tables.as_deref(),
        args.skip_verify,
    )?;
    let resolver = catalog.resolver();
    let mut failures = 0usize;
    for identity in &args.identities {
        let trace = resolver.trace(identity);
        if trace.outcome.is_err() {
            failures += 1;
        }
        println!("{}", render_trace(&trace, args.trace));
    }
    if failures > 0 {
        bail!("{failures} identity(ies) could not be resolved");
    }
    Ok(())
}

fn render_trace(trace: &Trace, full_chain: bool) -> String {
    let mut line = if full_chain {
        trace.chain.iter().join(" -> ")
    } else {
        trace
            .chain
            .first()
            .map(|identity| identity.to_string())
            .unwrap_or_default()
    };
    let _ = match &trace.outcome {
        Ok(Resolution::Current(_)) if full_chain => write!(line, " (current)"),
        Ok(Resolution::Current(identity)) => write!(line, " -> {identity}"),
        Ok(Resolution::Dropped) => write!(line, " -> dropped"),
        Err(err) => write!(line, " -> error: {err}"),
    };
    line
}

fn handle_tables(args: &TablesArgs) -> Result<()> {
    let catalog = Catalog::load(args.data.aliases.as_deref(), args.data.tables.as_deref())?;
    let tables = catalog
        .schema
        .tables()
        .iter()
        .filter(|table| args.table.as_deref().is_none_or(|name| name == table.name))
        .collect::<Vec<_>>();
    if let Some(name) = args.table.as_deref()
        && tables.is_empty()
    {
        return Err(anyhow!(
            "No table named '{name}' is defined (known: {})",
            catalog.schema.table_names().join(", ")
        ));
    }
    for table in tables {
        println!("{} ({} column(s))", table.name, table.columns.len());
        for (idx, column) in table.columns.iter().enumerate() {
            println!("  {:>3}  {column}", idx + 1);
        }
    }
    Ok(())
}

fn handle_plan(args: &PlanArgs) -> Result<()> {
    let header = toa5::read_header(&args.input)?;
    info!(
        "Planning '{}' table '{}' from station '{}' with {} column(s)",
        args.input.display(),
        header.table,
        header.station,
        header.columns.len()
    );
    let catalog = Catalog::load_checked(
        args.data.aliases.as_deref(),
        args.data.tables.as_deref(),
        args.skip_verify,
    )?;
    let resolver = catalog.resolver();
    let plan = HeaderPlan::build(&resolver, &header.table, &header.columns)
        .with_context(|| format!("Skipping {:?}", args.input))?;

    for output in plan.outputs() {
        println!(
            "{}: {} of {} column(s) mapped",
            output.name,
            output.mapped_columns(),
            output.columns.len()
        );
        for (column, source) in output.columns.iter().zip(&output.sources) {
            match source {
                Some(index) => println!("  {column} <- {}", header.columns[*index]),
                None => println!("  {column} (empty)"),
            }
        }
    }
    if !plan.discarded().is_empty() {
        warn!(
            "Discarded {} dropped column(s) from '{}'",
            plan.discarded().len(),
            plan.source_table()
        );
        println!(
            "discarded: {}",
            plan.discarded().iter().map(|d| d.column.as_str()).join(", ")
        );
    }
    Ok(())
}
