use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use log::{info, warn};

use crate::{
    cli::MergeArgs,
    config,
    io_utils, keys,
    merge::MergeEngine,
    report::{InputFileReport, RunReport},
    table::{self, TableSet},
    workflow::MergeWorkflow,
};

pub fn execute(args: &MergeArgs) -> Result<()> {
    let workflow = config::load_merge_workflow(&args.workflow)
        .with_context(|| format!("Loading merge workflow {:?}", args.workflow))?;
    let bindings = bind_inputs(&workflow, &args.inputs)?;
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let started_at = Utc::now();

    let mut tables = TableSet::new();
    let mut input_files = Vec::with_capacity(bindings.len());
    for (file_id, path) in &bindings {
        let delimiter = io_utils::resolve_input_delimiter(path, args.delimiter);
        let table = io_utils::read_table(path, delimiter, encoding)?;
        info!(
            "Loaded '{}' from {:?}: {} row(s) x {} column(s)",
            keys::file_label(&workflow.files, file_id),
            path,
            table.row_count(),
            table.column_count()
        );
        input_files.push(InputFileReport {
            file_id: file_id.clone(),
            path: path.display().to_string(),
            rows: table.row_count(),
        });
        tables.insert(file_id.clone(), table);
    }

    let engine = MergeEngine::new(&workflow);
    let result = match args.preview {
        Some(rows) => engine.preview(&tables, rows),
        None => engine.execute(&tables),
    };
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            let err = anyhow::Error::new(err)
                .context(format!("Running merge workflow '{}'", workflow.name));
            if let Some(path) = &args.report {
                RunReport::failed(&workflow.name, started_at, input_files, &err).save(path)?;
            }
            return Err(err);
        }
    };

    for warning in &outcome.warnings {
        warn!("{warning}");
    }

    if args.preview.is_some() {
        table::print_table(outcome.table.columns(), &outcome.table.display_rows());
    }
    if args.output.is_some() || args.preview.is_none() {
        let input_delimiter = bindings
            .first()
            .map(|(_, path)| io_utils::resolve_input_delimiter(path, args.delimiter))
            .unwrap_or(io_utils::DEFAULT_CSV_DELIMITER);
        let delimiter = io_utils::resolve_output_delimiter(
            args.output.as_deref(),
            args.output_delimiter,
            input_delimiter,
        );
        io_utils::write_table(&outcome.table, args.output.as_deref(), delimiter)?;
    }

    info!(
        "Merged {} file(s) into {} row(s) x {} column(s) with {} warning(s)",
        tables.len(),
        outcome.table.row_count(),
        outcome.table.column_count(),
        outcome.warnings.len()
    );

    if let Some(path) = &args.report {
        RunReport::completed(&workflow.name, started_at, input_files, &outcome)
            .save(path)
            .with_context(|| format!("Writing run report to {path:?}"))?;
        info!("Run report written to {path:?}");
    }
    Ok(())
}

/// Pairs each `--input` with a workflow file id.
///
/// `ID=PATH` binds explicitly. Bare paths fill the workflow's remaining files
/// in their configured order, and must match them in number. A workflow
/// without a file list takes bare paths under their file stems.
pub fn bind_inputs(workflow: &MergeWorkflow, inputs: &[String]) -> Result<Vec<(String, PathBuf)>> {
    let mut explicit: Vec<(String, PathBuf)> = Vec::new();
    let mut bare = Vec::new();
    for input in inputs {
        match input.split_once('=') {
            Some((id, path)) if is_file_id(id) => {
                let id = id.trim().to_string();
                if explicit.iter().any(|(seen, _)| *seen == id) {
                    return Err(anyhow!("Input '{id}' was given more than once"));
                }
                explicit.push((id, PathBuf::from(path)));
            }
            _ => bare.push(PathBuf::from(input)),
        }
    }

    if workflow.files.is_empty() {
        for path in bare {
            let id = stem_id(&path);
            if explicit.iter().any(|(seen, _)| *seen == id) {
                return Err(anyhow!("Input '{id}' was given more than once"));
            }
            explicit.push((id, path));
        }
        return Ok(explicit);
    }

    for (id, _) in &explicit {
        if workflow.file(id).is_none() {
            warn!("Input '{id}' is not listed in workflow '{}'", workflow.name);
        }
    }
    let unbound = workflow
        .files
        .iter()
        .filter(|file| !explicit.iter().any(|(id, _)| *id == file.id))
        .count();
    if !bare.is_empty() && bare.len() != unbound {
        return Err(anyhow!("Expected {} files, got {}", unbound, bare.len()));
    }

    let mut bare = bare.into_iter();
    let mut bindings = Vec::with_capacity(inputs.len());
    for file in &workflow.files {
        if let Some(position) = explicit.iter().position(|(id, _)| *id == file.id) {
            bindings.push(explicit.remove(position));
        } else if let Some(path) = bare.next() {
            bindings.push((file.id.clone(), path));
        }
    }
    bindings.extend(explicit);
    Ok(bindings)
}

fn is_file_id(candidate: &str) -> bool {
    let trimmed = candidate.trim();
    !trimmed.is_empty() && !trimmed.contains(['/', '\\'])
}

fn stem_id(path: &Path) -> String {
    if io_utils::is_dash(path) {
        return "stdin".to_string();
    }
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
