use std::fs;
use std::path::{Path, PathBuf};
use glob::glob;

use crate::error::{Result, SurgeonError};
use super::column::Column;
use super::frame::Dataset;
use super::value::Value;

const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "json", "jsonl", "ndjson", "yaml", "yml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Csv,
    Json,
    JsonLines,
    Yaml,
}

impl FileFormat {
    fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "json" => Ok(FileFormat::Json),
            "jsonl" | "ndjson" => Ok(FileFormat::JsonLines),
            "yaml" | "yml" => Ok(FileFormat::Yaml),
            _ => Err(SurgeonError::Dataset(format!(
                "Unsupported file type '{}' (expected one of: {})",
                path.display(),
                SUPPORTED_EXTENSIONS.join(", ")
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub trim_whitespace: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { trim_whitespace: true }
    }
}

/// Reads and writes record-oriented files. File I/O stays out of the
/// session: a dataset is fully loaded before it reaches the engine.
#[derive(Debug, Default)]
pub struct DatasetLoader {
    options: LoadOptions,
}

impl DatasetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: LoadOptions) -> Self {
        Self { options }
    }

    /// List every supported dataset file below `dir`.
    pub fn discover(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for ext in SUPPORTED_EXTENSIONS {
            let pattern = dir.as_ref().join(format!("**/*.{}", ext));
            let pattern_str = pattern.to_string_lossy();
            let paths = glob(&pattern_str)
                .map_err(|e| SurgeonError::Dataset(e.to_string()))?
                .filter_map(|r| r.ok());
            found.extend(paths);
        }
        found.sort();
        Ok(found)
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<Dataset> {
        let path = path.as_ref();
        let format = FileFormat::from_path(path)?;
        let content = fs::read_to_string(path)
            .map_err(|e| SurgeonError::Dataset(format!("{}: {}", path.display(), e)))?;
        self.parse(&content, format)
    }

    pub fn load_json_str(&self, content: &str) -> Result<Dataset> {
        self.parse(content, FileFormat::Json)
    }

    pub fn load_csv_str(&self, content: &str) -> Result<Dataset> {
        self.parse(content, FileFormat::Csv)
    }

    fn parse(&self, content: &str, format: FileFormat) -> Result<Dataset> {
        let dataset = match format {
            FileFormat::Csv => csv_to_dataset(content)?,
            FileFormat::Json => {
                let records: Vec<serde_json::Value> = serde_json::from_str(content)?;
                records_to_dataset(&records)?
            }
            FileFormat::JsonLines => {
                let records: Vec<serde_json::Value> = content
                    .lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(serde_json::from_str)
                    .collect::<std::result::Result<_, _>>()?;
                records_to_dataset(&records)?
            }
            FileFormat::Yaml => {
                let records: Vec<serde_json::Value> = serde_yaml::from_str(content)?;
                records_to_dataset(&records)?
            }
        };

        if dataset.is_empty() {
            return Err(SurgeonError::EmptyDataset {
                rows: dataset.row_count(),
                columns: dataset.column_count(),
            });
        }

        if self.options.trim_whitespace {
            Ok(dataset.trim_whitespace())
        } else {
            Ok(dataset)
        }
    }

    pub fn export(&self, dataset: &Dataset, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = match FileFormat::from_path(path)? {
            FileFormat::Csv => dataset_to_csv(dataset)?,
            FileFormat::Json => serde_json::to_string_pretty(&dataset_to_records(dataset))?,
            FileFormat::JsonLines => {
                let mut lines = Vec::with_capacity(dataset.row_count());
                for record in &dataset_to_records(dataset) {
                    lines.push(serde_json::to_string(record)?);
                }
                lines.join("\n") + "\n"
            }
            FileFormat::Yaml => serde_yaml::to_string(&dataset_to_records(dataset))?,
        };

        fs::write(path, content)?;
        Ok(())
    }
}

fn records_to_dataset(records: &[serde_json::Value]) -> Result<Dataset> {
    let mut names: Vec<String> = Vec::new();
    for (i, record) in records.iter().enumerate() {
        let obj = record.as_object().ok_or_else(|| {
            SurgeonError::Dataset(format!("Record {} is not an object", i))
        })?;
        for key in obj.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    let columns = names
        .iter()
        .map(|name| {
            let values = records
                .iter()
                .map(|r| r.get(name).map(Value::from_json).unwrap_or(Value::Null))
                .collect();
            Column::new(name.clone(), values)
        })
        .collect();

    Dataset::new(columns)
}

/// Header row names the columns; every later row is one record.
fn csv_to_dataset(content: &str) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(content.as_bytes());

    let names: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut values: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
    for record in reader.records() {
        let record = record?;
        for (column, cell) in values.iter_mut().zip(record.iter()) {
            column.push(Value::from_csv_cell(cell));
        }
    }

    let columns = names
        .into_iter()
        .zip(values)
        .map(|(name, values)| Column::new(name, values))
        .collect();
    Dataset::new(columns)
}

fn dataset_to_csv(dataset: &Dataset) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(dataset.column_names())?;
    for row in 0..dataset.row_count() {
        writer.write_record(
            dataset
                .columns()
                .iter()
                .map(|c| c.get(row).map(Value::to_csv_cell).unwrap_or_default()),
        )?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| SurgeonError::Dataset(format!("CSV write failed: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| SurgeonError::Dataset(e.to_string()))
}

fn dataset_to_records(dataset: &Dataset) -> Vec<serde_json::Value> {
    (0..dataset.row_count())
        .map(|row| {
            let obj: serde_json::Map<String, serde_json::Value> = dataset
                .columns()
                .iter()
                .map(|c| {
                    let value = c.get(row).map(Value::to_json).unwrap_or(serde_json::Value::Null);
                    (c.name().to_string(), value)
                })
                .collect();
            serde_json::Value::Object(obj)
        })
        .collect()
}
