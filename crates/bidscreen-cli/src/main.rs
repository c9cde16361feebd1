mod display;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use bidscreen_ai::{
    ConsensusConfig, DEFAULT_BASE_URL, OpenAiAnalyzer, RiskProfile, run_consensus,
};
use bidscreen_consensus::{ConsensusMerger, MergeOptions};
use bidscreen_core::document::split_pages;
use bidscreen_core::{DetailLevel, StructuredReport};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bidscreen", version, about = "Consensus pre-bid screening of tender documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge reports of the same document into one consensus report.
    Merge {
        /// Report JSON files, in run order.
        #[arg(required = true)]
        reports: Vec<PathBuf>,
        /// Write the merged report here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        similarity: SimilarityArgs,
    },
    /// Run N analyses of a plain-text document and merge them.
    Analyze {
        /// Extracted document text; form feeds separate pages.
        document: PathBuf,
        /// Consensus config (JSON).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Company risk profile (JSON).
        #[arg(long)]
        profile: Option<PathBuf>,
        /// Number of runs; overrides the configured temperatures.
        #[arg(long)]
        runs: Option<usize>,
        /// low, medium or high.
        #[arg(long)]
        detail: Option<DetailLevel>,
        #[arg(long, env = "BIDSCREEN_MODEL")]
        model: Option<String>,
        #[arg(long, env = "BIDSCREEN_BASE_URL", default_value = DEFAULT_BASE_URL)]
        base_url: String,
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the report card of a report.
    Show { report: PathBuf },
    /// Show fingerprints and pairwise similarity of texts.
    Fingerprint {
        #[arg(required = true)]
        texts: Vec<String>,
        #[command(flatten)]
        similarity: SimilarityArgs,
    },
}

#[derive(clap::Args)]
struct SimilarityArgs {
    /// Shared terms needed for two items to match.
    #[arg(long)]
    threshold: Option<usize>,
    /// Terms kept per fingerprint.
    #[arg(long)]
    max_terms: Option<usize>,
    /// Group items that are equal ignoring case, even without shared terms.
    #[arg(long)]
    fold_exact_repeats: bool,
}

impl SimilarityArgs {
    fn options(&self) -> MergeOptions {
        let defaults = MergeOptions::default();
        MergeOptions {
            similarity_threshold: self.threshold.unwrap_or(defaults.similarity_threshold),
            max_terms: self.max_terms.unwrap_or(defaults.max_terms),
            fold_exact_repeats: self.fold_exact_repeats,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Merge {
            reports,
            output,
            similarity,
        } => cmd_merge(&reports, output.as_deref(), similarity.options()),
        Command::Analyze {
            document,
            config,
            profile,
            runs,
            detail,
            model,
            base_url,
            api_key,
            output,
        } => {
            let mut config = match config {
                Some(path) => ConsensusConfig::load(&path)?,
                None => ConsensusConfig::default(),
            };
            if let Some(runs) = runs {
                config = config.with_runs(runs);
            }
            if let Some(detail) = detail {
                config.detail = detail;
            }
            if let Some(model) = model {
                config.model = model;
            }
            let profile = match profile {
                Some(path) => RiskProfile::load(&path)?,
                None => RiskProfile::default(),
            };
            cmd_analyze(&document, config, &profile, base_url, api_key, output.as_deref()).await
        }
        Command::Show { report } => {
            display::print_report_card(&load_report(&report)?);
            Ok(())
        }
        Command::Fingerprint { texts, similarity } => {
            cmd_fingerprint(&texts, similarity.options());
            Ok(())
        }
    }
}

fn cmd_merge(paths: &[PathBuf], output: Option<&Path>, options: MergeOptions) -> anyhow::Result<()> {
    let reports = paths
        .iter()
        .map(|p| load_report(p))
        .collect::<anyhow::Result<Vec<_>>>()?;
    info!(reports = reports.len(), "merging");

    let merged = ConsensusMerger::new(options).merge(&reports)?;
    write_report(&merged, output)?;
    display::print_report_card(&merged);
    Ok(())
}

async fn cmd_analyze(
    document: &Path,
    config: ConsensusConfig,
    profile: &RiskProfile,
    base_url: String,
    api_key: String,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(document)
        .with_context(|| format!("read document {}", document.display()))?;
    let pages = split_pages(&text);
    if pages.iter().all(|p| p.trim().is_empty()) {
        bail!("{} contains no text", document.display());
    }

    let analyzer = OpenAiAnalyzer::new(base_url, api_key, profile)?;
    let outcome = run_consensus(&analyzer, &pages, &config).await?;
    for failure in &outcome.failures {
        eprintln!(
            "  run {} (temperature {}) failed: {}",
            failure.run + 1,
            failure.temperature,
            failure.error
        );
    }
    eprintln!(
        "  {}/{} runs merged",
        outcome.runs_succeeded, outcome.runs_requested
    );

    write_report(&outcome.report, output)?;
    display::print_report_card(&outcome.report);
    Ok(())
}

fn cmd_fingerprint(texts: &[String], options: MergeOptions) {
    let prints: Vec<_> = texts.iter().map(|t| options.fingerprint(t)).collect();
    for (i, (text, print)) in texts.iter().zip(&prints).enumerate() {
        println!("[{}] {}", i + 1, text);
        let terms: Vec<&str> = print.terms().collect();
        println!("    terms: {}", terms.join(", "));
    }
    if texts.len() < 2 {
        return;
    }
    println!();
    for i in 0..texts.len() {
        for j in i + 1..texts.len() {
            let verdict = if options.similar(&texts[i], &texts[j]) {
                "similar"
            } else {
                "distinct"
            };
            println!(
                "[{}] ~ [{}]  overlap {}  {verdict}",
                i + 1,
                j + 1,
                prints[i].overlap(&prints[j])
            );
        }
    }
}

fn load_report(path: &Path) -> anyhow::Result<StructuredReport> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read report {}", path.display()))?;
    StructuredReport::from_json(&raw).with_context(|| format!("parse report {}", path.display()))
}

fn write_report(report: &StructuredReport, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report).context("serialize report")?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
            info!(path = %path.display(), "wrote report");
        }
        None => println!("{json}"),
    }
    Ok(())
}
