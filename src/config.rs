use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{steps::RuleWorkflow, workflow::MergeWorkflow};

/// On-disk encoding of a workflow definition, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    Json,
    Yaml,
}

impl DefinitionFormat {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DefinitionFormat::Json,
            _ => DefinitionFormat::Yaml,
        }
    }

    pub fn parse_str<T: DeserializeOwned>(self, input: &str) -> Result<T> {
        match self {
            DefinitionFormat::Json => Ok(serde_json::from_str(input)?),
            DefinitionFormat::Yaml => Ok(serde_yaml::from_str(input)?),
        }
    }

    pub fn dump<T: Serialize>(self, value: &T) -> Result<String> {
        match self {
            DefinitionFormat::Json => Ok(serde_json::to_string_pretty(value)?),
            DefinitionFormat::Yaml => Ok(serde_yaml::to_string(value)?),
        }
    }
}

fn read_to_string(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("Opening workflow file {path:?}"))?;
    let mut buf = String::new();
    file.read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_string(path: &Path, contents: &str) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Creating workflow file {path:?}"))?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(())
}

pub fn load_from_path<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = read_to_string(path)?;
    DefinitionFormat::for_path(path)
        .parse_str(&raw)
        .with_context(|| format!("Parsing workflow definition {path:?}"))
}

pub fn save_to_path<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let serialized = DefinitionFormat::for_path(path).dump(data)?;
    write_string(path, &serialized)
}

pub fn load_merge_workflow(path: &Path) -> Result<MergeWorkflow> {
    load_from_path(path)
}

pub fn load_rule_workflow(path: &Path) -> Result<RuleWorkflow> {
    load_from_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{ColumnSource, JoinType};
    use tempfile::tempdir;

    const MERGE_JSON: &str = r#"{
        "name": "Stock",
        "files": [{"id": "inv", "name": "Inventory"}],
        "keyColumn": {"mappings": {"inv": "id"}},
        "joinConfig": {"joinType": "inner"},
        "outputColumns": [
            {"name": "id", "order": 0, "source": {"type": "direct", "fileId": "inv", "column": "id"}}
        ]
    }"#;

    #[test]
    fn format_follows_extension() {
        assert_eq!(DefinitionFormat::for_path(Path::new("a.JSON")), DefinitionFormat::Json);
        assert_eq!(DefinitionFormat::for_path(Path::new("a.yml")), DefinitionFormat::Yaml);
        assert_eq!(DefinitionFormat::for_path(Path::new("a")), DefinitionFormat::Yaml);
    }

    #[test]
    fn json_definition_round_trips_through_yaml() {
        let dir = tempdir().expect("temp dir");
        let json_path = dir.path().join("stock.json");
        std::fs::write(&json_path, MERGE_JSON).expect("write json");
        let workflow = load_merge_workflow(&json_path).expect("load json");
        assert_eq!(
            workflow.join_config.as_ref().map(|j| &j.join_type),
            Some(&JoinType::Inner)
        );
        assert_eq!(workflow.output_columns[0].source, ColumnSource::direct("inv", "id"));

        let yaml_path = dir.path().join("stock.yaml");
        save_to_path(&yaml_path, &workflow).expect("save yaml");
        let reloaded = load_merge_workflow(&yaml_path).expect("load yaml");
        assert_eq!(reloaded, workflow);
    }

    #[test]
    fn malformed_definition_names_the_file() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").expect("write");
        let err = load_rule_workflow(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.json"));
    }
}
