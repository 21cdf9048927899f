use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::InspectArgs,
    io_utils, printable_delimiter,
    profile::{profile_rows, profile_table},
    table,
};

pub fn execute(args: &InspectArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Inspecting '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(delimiter)
    );
    let loaded = io_utils::read_table(&args.input, delimiter, encoding)?;
    let profiles = profile_table(&loaded, args.samples);

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&profiles).context("Serializing column profiles")?
        );
    } else {
        let headers = ["column", "kind", "nulls", "unique", "samples"]
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();
        table::print_table(&headers, &profile_rows(&profiles));
    }
    info!(
        "Profiled {} column(s) across {} row(s) from {:?}",
        profiles.len(),
        loaded.row_count(),
        args.input
    );
    Ok(())
}
