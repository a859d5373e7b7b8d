//! livelog CLI: inspect, export and clean run directories written by livelog.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use livelog::data::SUBFOLDERS;
use livelog::scalars::Scalar;
use livelog::{storage, summary, HtmlRenderer, HtmlReport, DEFAULT_DIR};

#[derive(Parser)]
#[command(
    name = "livelog",
    about = "Inspect experiment runs logged with livelog",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the summary: latest value of every scalar and the recorded step
    Show {
        /// Path to the run directory
        #[arg(default_value = DEFAULT_DIR)]
        dir: PathBuf,
    },
    /// Show the full history of one scalar
    History {
        /// Metric name, `/`-separated for nested metrics
        metric: String,
        /// Path to the run directory
        #[arg(long, short, default_value = DEFAULT_DIR)]
        dir: PathBuf,
    },
    /// Regenerate the HTML report
    Report {
        /// Path to the run directory
        #[arg(default_value = DEFAULT_DIR)]
        dir: PathBuf,
    },
    /// Export every scalar history to CSV or JSON
    Export {
        /// Path to the run directory
        #[arg(default_value = DEFAULT_DIR)]
        dir: PathBuf,
        /// Output format
        #[arg(long, short, default_value = "csv", value_parser = ["csv", "json"])]
        format: String,
        /// Output file (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Remove all artifacts of a run
    Clean {
        /// Path to the run directory
        #[arg(default_value = DEFAULT_DIR)]
        dir: PathBuf,
        /// Actually delete (default: dry run)
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Show { dir } => cmd_show(&dir)?,
        Commands::History { metric, dir } => cmd_history(&dir, &metric)?,
        Commands::Report { dir } => cmd_report(&dir)?,
        Commands::Export { dir, format, output } => cmd_export(&dir, &format, output)?,
        Commands::Clean { dir, force } => cmd_clean(&dir, force)?,
    }

    Ok(())
}

// ─── Command implementations ──────────────────────────────────────────────────

fn cmd_show(dir: &Path) -> Result<()> {
    let summary_path = storage::with_suffix(dir, ".json");
    if !summary_path.exists() {
        anyhow::bail!("No summary found at {}", summary_path.display());
    }

    let latest = summary::read_latest(&summary_path)?;
    let rows = summary::flatten(&latest);

    println!("Run: {}", dir.display());
    match latest.get("step") {
        Some(step) => println!("Step: {}", step),
        None => println!("Step: -"),
    }

    let metrics: Vec<_> = rows.into_iter().filter(|(k, _)| k != "step").collect();
    if metrics.is_empty() {
        println!("No metrics logged yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["Metric", "Value"]);
    for (name, value) in &metrics {
        table.add_row([name.clone(), value.to_string()]);
    }
    println!("{}", table);
    Ok(())
}

fn cmd_history(dir: &Path, metric: &str) -> Result<()> {
    let path = Scalar::new(metric, dir).output_path().to_path_buf();
    if !path.exists() {
        anyhow::bail!("No history for '{}' in {}", metric, dir.display());
    }

    let rows = storage::read_scalar_rows(&path)?;
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["Step", "Value", "Timestamp (ms)"]);
    for row in &rows {
        let step = row.step.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
        table.add_row([step, row.value.to_string(), row.timestamp.to_string()]);
    }

    println!("Metric: {} ({} rows)", metric, rows.len());
    println!("{}", table);
    Ok(())
}

fn cmd_report(dir: &Path) -> Result<()> {
    let mut report = HtmlReport::new(dir);
    report.render()?;
    println!("Report written to {}", report.html_path().display());
    Ok(())
}

fn cmd_export(dir: &Path, format: &str, output: Option<PathBuf>) -> Result<()> {
    let files = storage::list_scalar_files(&dir.join(Scalar::SUBFOLDER))?;
    if files.is_empty() {
        anyhow::bail!("No scalars found in {}", dir.display());
    }

    let mut records = vec![];
    for (name, path) in &files {
        debug!(metric = %name, path = %path.display(), "Reading scalar history");
        for row in storage::read_scalar_rows(path)? {
            records.push(serde_json::json!({
                "metric": name,
                "step": row.step,
                "timestamp": row.timestamp,
                "value": row.value,
            }));
        }
    }

    let content = match format {
        "json" => serde_json::to_string_pretty(&records)? + "\n",
        "csv" => {
            let mut out = String::from("metric,step,timestamp,value\n");
            for r in &records {
                let step = r["step"].as_u64().map(|s| s.to_string()).unwrap_or_default();
                out += &format!(
                    "{},{},{},{}\n",
                    r["metric"].as_str().unwrap_or_default(),
                    step,
                    r["timestamp"],
                    r["value"]
                );
            }
            out
        }
        _ => anyhow::bail!("Unknown format: {}", format),
    };

    match output {
        Some(path) => {
            std::fs::write(&path, &content)?;
            println!("Exported {} rows to {}", records.len(), path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn cmd_clean(dir: &Path, force: bool) -> Result<()> {
    let html_dir = storage::with_suffix(dir, "_dvc_plots");
    let mut targets: Vec<PathBuf> = SUBFOLDERS.iter().map(|s| dir.join(s)).collect();
    targets.push(storage::with_suffix(dir, ".json"));
    targets.push(html_dir);
    targets.retain(|p| p.exists());

    if targets.is_empty() {
        println!("Nothing to clean in {}", dir.display());
        return Ok(());
    }

    println!("Will delete {} path(s):", targets.len());
    for target in &targets {
        println!("  - {}", target.display());
    }

    if !force {
        println!("\nDry run. Use --force to actually delete.");
        return Ok(());
    }

    for target in &targets {
        if target.is_dir() {
            storage::remove_dir_if_exists(target)?;
        } else {
            storage::remove_file_if_exists(target)?;
        }
        debug!(path = %target.display(), "Removed");
        println!("  ✓ Deleted {}", target.display());
    }

    println!("Done.");
    Ok(())
}
