mod client;
mod error;
mod nodes;
mod parser;
mod pipeline;
mod settings;
mod table;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::client::{FigmaClient, NodeSource};
use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "figma_export", about = "Export component instance properties from Figma pages")]
struct Cli {
    /// Configuration file (TOML); FIGMA_* environment variables override it
    #[arg(short, long, global = true, default_value = settings::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every configured page and write its snapshot and table
    Export {
        /// Only export this page id
        #[arg(short, long)]
        page: Option<String>,
    },
    /// List matched instances and their nesting without writing files
    Matches {
        /// Only inspect this page id
        #[arg(short, long)]
        page: Option<String>,
    },
    /// Validate and print the loaded configuration
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;

    let result = match cli.command {
        Commands::Export { page } => {
            let pages = settings.select_pages(page.as_deref())?;
            let source: Arc<dyn NodeSource> = Arc::new(FigmaClient::new(&settings)?);
            let page_ids: Vec<String> = pages.into_iter().map(|p| p.id).collect();

            println!("Exporting {} page(s)...", page_ids.len());
            let stats = pipeline::export_pages(source, Arc::new(settings), page_ids).await;

            for report in &stats.reports {
                match &report.outcome {
                    Ok(summary) => println!(
                        "  {}: {} rows -> {}",
                        report.page_id,
                        summary.rows,
                        summary.paths.export.display()
                    ),
                    Err(e) => match report.rows {
                        Some(rows) => println!("  {}: FAILED after {} rows ({})", report.page_id, rows, e),
                        None => println!("  {}: FAILED ({})", report.page_id, e),
                    },
                }
            }
            println!(
                "Done: {} pages ({} ok, {} failed), {} rows.",
                stats.reports.len(),
                stats.ok(),
                stats.failed(),
                stats.rows()
            );

            if stats.failed() > 0 {
                Err(anyhow::anyhow!("{} page(s) failed", stats.failed()))
            } else {
                Ok(())
            }
        }
        Commands::Matches { page } => {
            let pages = settings.select_pages(page.as_deref())?;
            let client = FigmaClient::new(&settings)?;
            let page_ids: Vec<String> = pages.into_iter().map(|p| p.id).collect();

            let mut failed = 0usize;
            for (page_id, found) in pipeline::list_matches(&client, &settings, &page_ids).await {
                match found {
                    Ok(found) => print_matches(&page_id, &found),
                    Err(e) => {
                        println!("\n--- Page {} FAILED ({}) ---", page_id, e);
                        failed += 1;
                    }
                }
            }

            if failed > 0 {
                Err(anyhow::anyhow!("{} page(s) failed", failed))
            } else {
                Ok(())
            }
        }
        Commands::Check => {
            println!("Config:     {}", cli.config.display());
            println!("Token:      {}", settings.masked_token());
            println!("File:       {}", settings.file);
            println!(
                "Pages:      {}",
                settings.pages.iter().map(|p| p.id.as_str()).collect::<Vec<_>>().join(", ")
            );
            println!("Components: {}", settings.components.join(", "));
            println!("Headings:   {}", settings.headings.join(" | "));
            println!("Delimiter:  {:?}", settings.delimiter);
            println!("Output:     {}", settings.output);
            println!("Timeout:    {}s", settings.timeout_secs);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

fn print_matches(page_id: &str, found: &[pipeline::MatchListing]) {
    println!("\n--- Page {} ({} matches) ---", page_id, found.len());
    if found.is_empty() {
        return;
    }
    println!("{:>3} | {:<32} | {}", "#", "Instance", "Nesting");
    println!("{}", "-".repeat(80));
    for (i, m) in found.iter().enumerate() {
        println!(
            "{:>3} | {:<32} | {}",
            i + 1,
            truncate(&m.name, 32),
            m.nesting.join(" › ")
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
