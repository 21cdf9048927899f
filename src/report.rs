//! Run reports written by `merge --report`.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::merge::MergeOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputFileReport {
    pub file_id: String,
    pub path: String,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub workflow_name: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub input_files: Vec<InputFileReport>,
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn completed(
        workflow_name: &str,
        started_at: DateTime<Utc>,
        input_files: Vec<InputFileReport>,
        outcome: &MergeOutcome,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            workflow_name: workflow_name.to_string(),
            status: RunStatus::Completed,
            started_at,
            completed_at: Utc::now(),
            input_files,
            row_count: outcome.table.row_count(),
            column_count: outcome.table.column_count(),
            columns: outcome.table.columns().to_vec(),
            warnings: outcome.warnings.clone(),
            output_fingerprint: Some(outcome.table.fingerprint()),
            error: None,
        }
    }

    pub fn failed(
        workflow_name: &str,
        started_at: DateTime<Utc>,
        input_files: Vec<InputFileReport>,
        error: &anyhow::Error,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            workflow_name: workflow_name.to_string(),
            status: RunStatus::Failed,
            started_at,
            completed_at: Utc::now(),
            input_files,
            row_count: 0,
            column_count: 0,
            columns: Vec::new(),
            warnings: Vec::new(),
            output_fingerprint: None,
            error: Some(format!("{error:#}")),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Creating report file {path:?}"))?;
        serde_json::to_writer_pretty(file, self).context("Writing run report JSON")
    }
}
