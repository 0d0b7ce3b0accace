use std::borrow::Cow;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use crate::error::{ExportError, Result};

const SNAPSHOT_EXTENSION: &str = "json";
const EXPORT_EXTENSION: &str = "csv";

/// Where one page's artifacts go: `{prefix}_{page_id}.json` and `.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub snapshot: PathBuf,
    pub export: PathBuf,
}

impl OutputPaths {
    pub fn for_page(prefix: &str, page_id: &str) -> Self {
        let stem = format!("{}_{}", prefix, sanitize(page_id));
        OutputPaths {
            snapshot: PathBuf::from(format!("{}.{}", stem, SNAPSHOT_EXTENSION)),
            export: PathBuf::from(format!("{}.{}", stem, EXPORT_EXTENSION)),
        }
    }
}

/// Keep page ids usable as file names (`11741:224247` has a colon).
fn sanitize(page_id: &str) -> String {
    page_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

/// Header row plus one newline-terminated row per instance.
pub fn build_table(headings: &[String], rows: &[Vec<String>], delimiter: &str) -> String {
    let mut body = join_record(headings, delimiter);
    body.push('\n');

    for (i, row) in rows.iter().enumerate() {
        if row.len() != headings.len() {
            warn!(
                "Row {} has {} cells for {} headings",
                i + 1,
                row.len(),
                headings.len()
            );
        }
        body.push_str(&join_record(row, delimiter));
        body.push('\n');
    }
    body
}

fn join_record(values: &[String], delimiter: &str) -> String {
    values
        .iter()
        .map(|v| quote_field(v, delimiter))
        .collect::<Vec<_>>()
        .join(delimiter)
}

/// Quote fields holding the delimiter, a quote or a line break; quotes are doubled.
fn quote_field<'a>(value: &'a str, delimiter: &str) -> Cow<'a, str> {
    if value.contains(delimiter) || value.contains(['"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Write the full response, pretty-printed, for auditing.
pub async fn write_snapshot(path: &Path, raw: &Value) -> Result<()> {
    info!("Writing full data copy to {:?}", path);
    let json = serde_json::to_vec_pretty(raw)?;
    write_file(path, &json).await
}

pub async fn write_export(path: &Path, table: &str) -> Result<()> {
    info!("Writing export to {:?}", path);
    write_file(path, table.as_bytes()).await
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let io_err = |source: std::io::Error| ExportError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(path, bytes).await.map_err(io_err)
}
