use anyhow::{Context, Result};
use log::info;

use crate::{cli::CompareArgs, data::cell_to_string, diff::compare_tables, io_utils, table};

pub fn execute(args: &CompareArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let original = io_utils::read_table(
        &args.original,
        io_utils::resolve_input_delimiter(&args.original, args.delimiter),
        encoding,
    )?;
    let modified = io_utils::read_table(
        &args.modified,
        io_utils::resolve_input_delimiter(&args.modified, args.delimiter),
        encoding,
    )?;
    if original.row_count() != modified.row_count() {
        info!(
            "Row counts differ ({} vs {}); comparing the first {}",
            original.row_count(),
            modified.row_count(),
            original.row_count().min(modified.row_count())
        );
    }

    let changes = compare_tables(&original, &modified, &args.key);
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&changes).context("Serializing changes")?
        );
    } else {
        let headers = ["row", "key", "column", "old", "new"]
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();
        let rows = changes
            .iter()
            .map(|change| {
                vec![
                    (change.row + 1).to_string(),
                    change.key_value.clone(),
                    change.column.clone(),
                    cell_to_string(&change.old_value),
                    cell_to_string(&change.new_value),
                ]
            })
            .collect::<Vec<_>>();
        table::print_table(&headers, &rows);
    }
    info!(
        "{} changed cell(s) between {:?} and {:?}",
        changes.len(),
        args.original,
        args.modified
    );
    Ok(())
}
