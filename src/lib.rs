pub mod cli;
pub mod compare_cmd;
pub mod config;
pub mod data;
pub mod diff;
pub mod error;
pub mod evaluate;
pub mod inspect_cmd;
pub mod io_utils;
pub mod keys;
pub mod merge;
pub mod merge_cmd;
pub mod profile;
pub mod report;
pub mod rules;
pub mod rules_cmd;
pub mod steps;
pub mod table;
pub mod workflow;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, debug};

use crate::cli::{Cli, Commands};

pub use crate::{
    data::{Cell, Value},
    diff::{CellChange, DiffResult, build_diff, compare_tables},
    error::Error,
    evaluate::evaluate_column,
    keys::{KeyUniverse, RowCorrespondence, resolve_join},
    merge::{MergeEngine, MergeOutcome, run_merge},
    rules::{RuleEngine, RuleOutcome, run_rules},
    table::{Table, TableSet},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_workflow", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    debug!("Parsed command: {:?}", cli.command);
    match cli.command {
        Commands::Merge(args) => merge_cmd::execute(&args),
        Commands::Rules(args) => rules_cmd::execute(&args),
        Commands::Compare(args) => compare_cmd::execute(&args),
        Commands::Inspect(args) => inspect_cmd::execute(&args),
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
