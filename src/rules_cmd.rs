use std::fs::File;

use anyhow::{Context, Result, anyhow};
use log::{info, warn};

use crate::{cli::RulesArgs, config, diff::build_diff, io_utils, rules::RuleEngine};

pub fn execute(args: &RulesArgs) -> Result<()> {
    let workflow = config::load_rule_workflow(&args.workflow)
        .with_context(|| format!("Loading rule workflow {:?}", args.workflow))?;
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let source_delimiter = io_utils::resolve_input_delimiter(&args.source, args.delimiter);
    let target_delimiter = io_utils::resolve_input_delimiter(&args.target, args.delimiter);
    let source = io_utils::read_table(&args.source, source_delimiter, encoding)?;
    let target = io_utils::read_table(&args.target, target_delimiter, encoding)?;
    info!(
        "Loaded source {:?} ({} row(s)) and target {:?} ({} row(s))",
        args.source,
        source.row_count(),
        args.target,
        target.row_count()
    );

    let mut engine = RuleEngine::new(&workflow);
    if let Some(key) = args.key_column.as_deref() {
        engine = engine.with_key_column(key);
    }
    if engine.key_column().trim().is_empty() {
        return Err(anyhow!(
            "No key column configured; set sourceConfig.keyColumn or pass --key-column"
        ));
    }

    let outcome = engine
        .execute(&source, &target)
        .with_context(|| format!("Running rule workflow '{}'", workflow.name))?;
    let diff = build_diff(
        &target,
        &outcome.table,
        &outcome.changes,
        Some(engine.key_column()),
    );
    for warning in &diff.warnings {
        warn!("Row {} ({}): {}", warning.row + 1, warning.column, warning.message);
    }
    info!(
        "{} step(s) changed {} cell(s) across {} row(s)",
        workflow.steps.len(),
        diff.summary.cells_modified,
        diff.summary.rows_affected
    );

    if let Some(path) = &args.output {
        let delimiter =
            io_utils::resolve_output_delimiter(Some(path), None, target_delimiter);
        io_utils::write_table(&outcome.table, Some(path), delimiter)?;
        info!("Patched target written to {path:?}");
    }

    match &args.diff {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("Creating diff file {path:?}"))?;
            serde_json::to_writer_pretty(file, &diff).context("Writing diff JSON")?;
            info!("Diff written to {path:?}");
        }
        None => println!(
            "{}",
            serde_json::to_string_pretty(&diff).context("Serializing diff")?
        ),
    }
    Ok(())
}
