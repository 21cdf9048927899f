use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Merge spreadsheets and apply rule workflows",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Merge several CSV files into one table using a merge workflow
    Merge(MergeArgs),
    /// Patch a target CSV from a source CSV using a rule workflow and report the diff
    Rules(RulesArgs),
    /// Compare two CSV files cell by cell by row position
    Compare(CompareArgs),
    /// Profile the columns of a CSV file
    Inspect(InspectArgs),
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Merge workflow definition (.json, otherwise YAML)
    #[arg(short = 'w', long = "workflow")]
    pub workflow: PathBuf,
    /// Input files as `ID=PATH`, or bare paths bound to the workflow's files in order
    #[arg(short = 'i', long = "input", action = clap::ArgAction::Append, required = true)]
    pub inputs: Vec<String>,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Print the first N merged rows as a table instead of writing CSV to stdout
    #[arg(long = "preview", num_args = 0..=1, default_missing_value = "20")]
    pub preview: Option<usize>,
    /// Write a JSON run report to this path
    #[arg(long = "report")]
    pub report: Option<PathBuf>,
    /// CSV delimiter character for reading input
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter to use for output (defaults to input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct RulesArgs {
    /// Rule workflow definition (.json, otherwise YAML)
    #[arg(short = 'w', long = "workflow")]
    pub workflow: PathBuf,
    /// Source CSV whose rows drive the rules
    #[arg(short = 's', long = "source")]
    pub source: PathBuf,
    /// Target CSV to patch
    #[arg(short = 't', long = "target")]
    pub target: PathBuf,
    /// Key column shared by source and target (overrides the workflow)
    #[arg(short = 'k', long = "key-column")]
    pub key_column: Option<String>,
    /// Write the patched target CSV here
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Write the JSON diff here (stdout if omitted)
    #[arg(long = "diff")]
    pub diff: Option<PathBuf>,
    /// CSV delimiter character for reading input
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct CompareArgs {
    /// Original CSV file
    #[arg(long = "original")]
    pub original: PathBuf,
    /// Modified CSV file
    #[arg(long = "modified")]
    pub modified: PathBuf,
    /// Column whose value labels each changed row
    #[arg(short = 'k', long = "key")]
    pub key: String,
    /// Emit changes as JSON instead of a table
    #[arg(long)]
    pub json: bool,
    /// CSV delimiter character for reading input
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Input CSV file to profile
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Sample values shown per column
    #[arg(long, default_value_t = 3)]
    pub samples: usize,
    /// Emit profiles as JSON instead of a table
    #[arg(long)]
    pub json: bool,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
