use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::client::{NodeSource, PageDocument};
use crate::error::{ExportError, Result};
use crate::parser;
use crate::settings::Settings;
use crate::table::{self, OutputPaths};

/// What a finished page produced.
#[derive(Debug, Clone)]
pub struct PageSummary {
    pub rows: usize,
    pub paths: OutputPaths,
}

/// Outcome of one page; failures never affect sibling pages.
#[derive(Debug)]
pub struct PageReport {
    pub page_id: String,
    /// Rows extracted, known whenever the fetch succeeded, even if a write failed.
    pub rows: Option<usize>,
    pub outcome: Result<PageSummary>,
}

impl PageReport {
    fn failed(page_id: &str, error: ExportError) -> Self {
        PageReport {
            page_id: page_id.to_string(),
            rows: None,
            outcome: Err(error),
        }
    }
}

/// Totals returned after every page has finished.
pub struct ExportStats {
    pub reports: Vec<PageReport>,
}

impl ExportStats {
    pub fn ok(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.len() - self.ok()
    }

    pub fn rows(&self) -> usize {
        self.reports.iter().filter_map(|r| r.rows).sum()
    }
}

/// Fetch a page, giving up after the configured timeout.
pub async fn fetch_with_timeout(
    source: &dyn NodeSource,
    page_id: &str,
    settings: &Settings,
) -> Result<PageDocument> {
    tokio::time::timeout(settings.timeout(), source.fetch_page(page_id))
        .await
        .map_err(|_| ExportError::Timeout {
            page: page_id.to_string(),
            secs: settings.timeout_secs,
        })?
}

/// fetch → locate → extract → table → write, for one page.
///
/// Both files are attempted independently; the first write error becomes the
/// page's outcome and the row count is kept either way.
pub async fn export_page(source: &dyn NodeSource, page_id: &str, settings: &Settings) -> PageReport {
    let document = match fetch_with_timeout(source, page_id, settings).await {
        Ok(document) => document,
        Err(e) => return PageReport::failed(page_id, e),
    };

    let rows = parser::process_document(&document.root, settings);
    info!("Page {}: {} matching instances", page_id, rows.len());

    let paths = OutputPaths::for_page(&settings.output, page_id);
    let snapshot = table::write_snapshot(&paths.snapshot, &document.raw).await;

    let body = table::build_table(&settings.headings, &rows, &settings.delimiter);
    let export = table::write_export(&paths.export, &body).await;

    let outcome = match (snapshot, export) {
        (Ok(()), Ok(())) => Ok(PageSummary {
            rows: rows.len(),
            paths,
        }),
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Err(first), Err(second)) => {
            error!("Page {}: {}", page_id, second);
            Err(first)
        }
    };

    PageReport {
        page_id: page_id.to_string(),
        rows: Some(rows.len()),
        outcome,
    }
}

/// A matched instance as listed by `matches`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchListing {
    pub name: String,
    pub nesting: Vec<String>,
}

/// Fetch and locate each page in turn without writing anything.
/// A failed page is reported in place and the rest still run.
pub async fn list_matches(
    source: &dyn NodeSource,
    settings: &Settings,
    page_ids: &[String],
) -> Vec<(String, Result<Vec<MatchListing>>)> {
    let mut listings = Vec::with_capacity(page_ids.len());
    for page_id in page_ids {
        let found: Result<Vec<MatchListing>> = fetch_with_timeout(source, page_id, settings)
            .await
            .map(|document| {
                parser::locate::locate_instances(&document.root, &settings.components)
                    .into_iter()
                    .map(|m| MatchListing {
                        name: m.node.name.clone(),
                        nesting: m.nesting,
                    })
                    .collect()
            });
        if let Err(e) = &found {
            error!("Page {} failed: {}", page_id, e);
        }
        listings.push((page_id.clone(), found));
    }
    listings
}

/// Run every page concurrently and wait for all of them.
/// Reports come back in the order the pages were given.
pub async fn export_pages(
    source: Arc<dyn NodeSource>,
    settings: Arc<Settings>,
    page_ids: Vec<String>,
) -> ExportStats {
    let pb = progress_bar(page_ids.len());
    let mut tasks = JoinSet::new();

    for (index, page_id) in page_ids.iter().cloned().enumerate() {
        let source = Arc::clone(&source);
        let settings = Arc::clone(&settings);
        tasks.spawn(async move { (index, export_page(source.as_ref(), &page_id, &settings).await) });
    }

    let mut slots: Vec<Option<PageReport>> = page_ids.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, report)) => {
                if let Err(e) = &report.outcome {
                    error!("Page {} failed: {}", report.page_id, e);
                }
                slots[index] = Some(report);
            }
            Err(e) => error!("Page task aborted: {}", e),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    // a panicked task leaves its slot empty
    let reports = slots
        .into_iter()
        .zip(page_ids)
        .map(|(slot, page_id)| {
            slot.unwrap_or_else(|| {
                let error = ExportError::Task(format!("export task for page {} panicked", page_id));
                PageReport::failed(&page_id, error)
            })
        })
        .collect();

    ExportStats { reports }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} pages")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::document_from_response;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Serves the fixture for every page except the ones told to fail or hang.
    struct FakeSource {
        failing: Vec<String>,
        hanging: Vec<String>,
    }

    #[async_trait]
    impl NodeSource for FakeSource {
        async fn fetch_page(&self, page_id: &str) -> Result<PageDocument> {
            if self.failing.iter().any(|p| p == page_id) {
                return Err(ExportError::Status {
                    status: 403,
                    body: "{\"status\":403,\"err\":\"Invalid token\"}".into(),
                });
            }
            if self.hanging.iter().any(|p| p == page_id) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            let raw = std::fs::read_to_string("tests/fixtures/page.json").unwrap();
            // every fake page answers with the same document
            let raw = raw.replace("11741:224247", &crate::client::node_key(page_id));
            document_from_response(serde_json::from_str(&raw)?, page_id)
        }
    }

    fn settings(output: &std::path::Path) -> Settings {
        let mut s = Settings::from_toml(
            "token = \"t\"\nfile = \"f\"\n[[pages]]\nid = \"1-1\"\n[[pages]]\nid = \"2-2\"\n",
        )
        .unwrap();
        s.output = output.join("data").to_string_lossy().into_owned();
        s.timeout_secs = 1;
        s
    }

    fn source(failing: &[&str], hanging: &[&str]) -> Arc<dyn NodeSource> {
        Arc::new(FakeSource {
            failing: failing.iter().map(|s| s.to_string()).collect(),
            hanging: hanging.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[tokio::test]
    async fn single_page_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let report = export_page(source(&[], &[]).as_ref(), "1-1", &s).await;
        assert_eq!(report.rows, Some(3));
        let summary = report.outcome.unwrap();

        assert_eq!(summary.rows, 3);
        let csv = std::fs::read_to_string(&summary.paths.export).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "ID, Required, Question, Current, No Change, Flow, Section");
        assert_eq!(lines.len(), 4);
        assert!(csv.ends_with('\n'));

        let snapshot: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&summary.paths.snapshot).unwrap()).unwrap();
        assert!(snapshot["nodes"]["1:1"]["document"].is_object());
    }

    #[tokio::test]
    async fn failed_page_does_not_stop_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let s = Arc::new(settings(dir.path()));
        let stats = export_pages(source(&["1-1"], &[]), s, vec!["1-1".into(), "2-2".into()]).await;

        assert_eq!(stats.ok(), 1);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.reports[0].page_id, "1-1");
        assert_eq!(stats.reports[0].rows, None);
        assert!(matches!(stats.reports[0].outcome, Err(ExportError::Status { status: 403, .. })));

        let second = stats.reports[1].outcome.as_ref().unwrap();
        assert!(second.paths.export.exists());
        assert!(!OutputPaths::for_page(&dir.path().join("data").to_string_lossy(), "1-1")
            .export
            .exists());
    }

    #[tokio::test]
    async fn stalled_page_times_out_alone() {
        let dir = tempfile::tempdir().unwrap();
        let s = Arc::new(settings(dir.path()));
        let stats = export_pages(source(&[], &["2-2"]), s, vec!["1-1".into(), "2-2".into()]).await;

        assert!(stats.reports[0].outcome.is_ok());
        assert!(matches!(
            stats.reports[1].outcome,
            Err(ExportError::Timeout { ref page, secs: 1 }) if page == "2-2"
        ));
        assert_eq!(stats.rows(), 3);
    }

    #[tokio::test]
    async fn blocked_snapshot_still_writes_table() {
        let dir = tempfile::tempdir().unwrap();
        let s = Arc::new(settings(dir.path()));
        let paths = OutputPaths::for_page(&s.output, "1-1");
        // a directory where the snapshot file should go
        std::fs::create_dir_all(&paths.snapshot).unwrap();

        let stats = export_pages(source(&[], &[]), s, vec!["1-1".into()]).await;

        let report = &stats.reports[0];
        assert!(matches!(report.outcome, Err(ExportError::Write { ref path, .. }) if *path == paths.snapshot));
        assert_eq!(report.rows, Some(3));
        assert_eq!(stats.rows(), 3);
        assert_eq!(stats.failed(), 1);

        let csv = std::fs::read_to_string(&paths.export).unwrap();
        assert_eq!(csv.lines().count(), 4);
    }

    #[tokio::test]
    async fn listing_continues_past_failed_page() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let ids = vec!["1-1".to_string(), "2-2".to_string()];
        let listings = list_matches(source(&["1-1"], &[]).as_ref(), &s, &ids).await;

        assert_eq!(listings.len(), 2);
        assert!(matches!(listings[0].1, Err(ExportError::Status { status: 403, .. })));

        let found = listings[1].1.as_ref().unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].nesting, vec!["Application flow", "Contact details"]);
        assert_eq!(found[2].nesting, vec!["Application flow", "Archived"]);
        // nothing is written
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
