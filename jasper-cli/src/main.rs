//! Jasper - queue markdown notes and publish them to Arweave and Bluesky
//!
//! Operator-facing output goes to stdout; logs go to stderr (and optionally a
//! log file).

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use jasper_core::index::{ArchiveRecord, IndexStore, PostRecord};
use jasper_core::note::NoteMetadata;
use jasper_core::probe::{CostProbe, ProbeCache, QueueEstimate};
use jasper_core::publish::{ArweavePublisher, AtprotoPublisher, BatchReport, FileOutcome};
use jasper_core::runner::{SystemRunner, ToolRunner};
use jasper_core::selection::{ContentTree, SelectionTracker, TreeNode};
use jasper_core::status::resolve;
use jasper_core::{JasperConfig, Notifier};

mod credentials_cli;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "jasper",
    about = "Publish markdown notes to Arweave and Bluesky and keep their indexes in sync",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Configuration file (default: ./jasper.json if present)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Set log level
    #[clap(long, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON
    #[clap(long, global = true)]
    log_json: bool,

    /// Also append plain-text logs to this file
    #[clap(long, global = true)]
    log_file: Option<PathBuf>,

    /// Simulate uploads and posts instead of invoking arkb / bsky
    #[clap(long, global = true)]
    simulate: bool,

    /// Override the content root from the configuration
    #[clap(long, global = true)]
    content_root: Option<PathBuf>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Show the note tree with Arweave and Bluesky status
    Tree {
        /// Directory to scan (default: configured content root)
        #[clap(long)]
        root: Option<PathBuf>,
    },

    /// Show publication status of individual notes
    Status {
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },

    /// Estimate upload cost for notes and directories
    Estimate {
        #[clap(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Upload notes to Arweave
    Upload {
        #[clap(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Post to Bluesky once for each note
    Post {
        #[clap(required = true)]
        paths: Vec<PathBuf>,

        /// Post text
        #[clap(long)]
        text: String,
    },

    /// Manage Bluesky credentials
    Credentials {
        #[clap(subcommand)]
        command: credentials_cli::CredentialsCommand,
    },
}

/// Initialize tracing with CLI flags
///
/// Logs always go to stderr so stdout carries only operator output.
fn initialize_tracing(log_level: &LogLevel, json: bool, log_file: Option<&Path>) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

    let filter = EnvFilter::new(log_level.to_filter_directive());
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if json {
        layers.push(
            fmt::layer()
                .json()
                .with_target(true)
                .with_writer(std::io::stderr)
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .boxed(),
        );
    }

    if let Some(path) = log_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .boxed(),
        );
    }

    tracing_subscriber::registry().with(layers).with(filter).init();
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_tracing(&cli.log_level, cli.log_json, cli.log_file.as_deref())?;

    let mut config = JasperConfig::load(cli.config.as_deref())?;
    if cli.simulate {
        config.arweave.simulate = true;
        config.atproto.simulate = true;
    }
    if let Some(root) = cli.content_root {
        config.content_root = root;
    }
    debug!("Effective configuration: {:?}", config);

    let runner: Arc<dyn ToolRunner> = Arc::new(SystemRunner);
    let notifier: Arc<dyn Notifier> = Arc::new(|message: &str| println!("{message}"));

    match cli.command {
        Command::Tree { root } => {
            let root = root.unwrap_or_else(|| config.content_root.clone());
            show_tree(&config, &root)
        }
        Command::Status { files } => show_status(&config, &files),
        Command::Estimate { paths } => {
            let selection = select(&paths)?;
            let probe = CostProbe::new(config.arweave.clone(), runner);
            let estimate = probe.estimate_queue(&selection.snapshot()).await;
            print_estimate(&estimate);
            match estimate.spend_gate(config.arweave.simulate) {
                Ok(()) => println!("Upload allowed."),
                Err(blocked) => println!("Upload blocked: {blocked}"),
            }
            Ok(())
        }
        Command::Upload { paths } => {
            let selection = select(&paths)?;
            let files = selection.snapshot();
            let probe = CostProbe::new(config.arweave.clone(), runner.clone());
            let mut cache = ProbeCache::new();

            let estimate = cache
                .get_or_estimate(&probe, selection.generation(), &files)
                .await;
            print_estimate(estimate);

            let publisher = ArweavePublisher::new(config.arweave.clone(), runner, notifier);
            let report = publisher.upload_queue(estimate).await;
            cache.invalidate();
            finish_batch(&report)
        }
        Command::Post { paths, text } => {
            let selection = select(&paths)?;
            let publisher = AtprotoPublisher::new(config.atproto.clone(), runner, notifier);
            let report = publisher.post_batch(&selection.snapshot(), &text).await;
            finish_batch(&report)
        }
        Command::Credentials { command } => command.execute(&config),
    }
}

/// Build the publish queue from file and directory arguments.
///
/// Arguments only ever add to the queue; a note named twice, directly or
/// through overlapping directories, is queued once.
fn select(paths: &[PathBuf]) -> Result<SelectionTracker> {
    let mut selection = SelectionTracker::new();
    for path in paths {
        let files = if path.is_dir() {
            let files = ContentTree::scan(path).files();
            if files.is_empty() {
                info!("No markdown notes under {}", path.display());
            }
            files
        } else if path.is_file() {
            vec![path.clone()]
        } else {
            bail!("No such file or directory: {}", path.display());
        };
        for file in files {
            if !selection.is_selected(&file) {
                selection.toggle_file(&file);
            }
        }
    }
    if selection.is_empty() {
        bail!("Nothing selected");
    }
    Ok(selection)
}

/// Table row for a note and its publication status
#[derive(Tabled)]
struct NoteRow {
    #[tabled(rename = "Note")]
    note: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Arweave")]
    arweave: String,
    #[tabled(rename = "Bluesky")]
    bluesky: String,
}

/// Both indexes, loaded once per command
struct Indexes {
    archive: Vec<ArchiveRecord>,
    posts: Vec<PostRecord>,
}

impl Indexes {
    fn load(config: &JasperConfig) -> Self {
        Self {
            archive: IndexStore::new(&config.arweave.index_file).load(),
            posts: IndexStore::new(&config.atproto.index_file).load(),
        }
    }

    fn row(&self, label: String, file: &Path) -> NoteRow {
        let metadata = NoteMetadata::load_or_default(file);
        let id = metadata.identifier();
        NoteRow {
            note: label,
            title: metadata.title.clone(),
            arweave: resolve(id, &self.archive).archive_label(),
            bluesky: resolve(id, &self.posts).post_label(),
        }
    }
}

fn show_tree(config: &JasperConfig, root: &Path) -> Result<()> {
    if !root.is_dir() {
        bail!("Content root {} is not a directory", root.display());
    }
    let tree = ContentTree::scan(root);
    let indexes = Indexes::load(config);

    let mut rows = Vec::new();
    for child in &tree.root().children {
        collect_rows(&indexes, child, 0, &mut rows);
    }
    if rows.is_empty() {
        println!("No markdown notes under {}", root.display());
        return Ok(());
    }
    print_table(&rows);
    Ok(())
}

fn collect_rows(indexes: &Indexes, node: &TreeNode, depth: usize, rows: &mut Vec<NoteRow>) {
    let indent = "  ".repeat(depth);
    if node.is_dir {
        rows.push(NoteRow {
            note: format!("{indent}{}/", node.name),
            title: String::new(),
            arweave: String::new(),
            bluesky: String::new(),
        });
        for child in &node.children {
            collect_rows(indexes, child, depth + 1, rows);
        }
    } else {
        rows.push(indexes.row(format!("{indent}{}", node.name), &node.path));
    }
}

fn show_status(config: &JasperConfig, files: &[PathBuf]) -> Result<()> {
    let indexes = Indexes::load(config);
    let rows: Vec<NoteRow> = files
        .iter()
        .map(|file| indexes.row(file.display().to_string(), file))
        .collect();
    print_table(&rows);
    Ok(())
}

/// Table row for a queued note's cost
#[derive(Tabled)]
struct CostRow {
    #[tabled(rename = "Note")]
    note: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "UUID")]
    uuid: String,
    #[tabled(rename = "Est. cost (AR)")]
    cost: String,
}

fn print_estimate(estimate: &QueueEstimate) {
    let rows: Vec<CostRow> = estimate
        .items
        .iter()
        .map(|item| CostRow {
            note: item.path.display().to_string(),
            title: item.metadata.title.clone(),
            uuid: item
                .metadata
                .identifier()
                .unwrap_or("N/A")
                .to_string(),
            cost: format!("{:.6}", item.cost),
        })
        .collect();
    print_table(&rows);
    println!("Total estimated cost: {:.6} AR", estimate.total_cost);
    if estimate.balance_known() {
        println!("Wallet balance: {:.6} AR", estimate.balance);
    } else {
        println!("Wallet balance: unknown");
    }
}

/// Table row for a batch result
#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Note")]
    note: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Location")]
    location: String,
}

fn finish_batch(report: &BatchReport) -> Result<()> {
    if report.outcomes.is_empty() {
        return Ok(());
    }
    let rows: Vec<OutcomeRow> = report
        .outcomes
        .iter()
        .map(|(path, outcome)| {
            let (result, location) = match outcome {
                FileOutcome::Published(receipt) if receipt.recorded => {
                    ("published".to_string(), receipt.locator.clone())
                }
                FileOutcome::Published(receipt) => (
                    "published, index not updated".to_string(),
                    receipt.locator.clone(),
                ),
                FileOutcome::Failed { error, .. } => (error.to_string(), String::new()),
                FileOutcome::NotAttempted => ("not attempted".to_string(), String::new()),
            };
            OutcomeRow {
                note: path.display().to_string(),
                result,
                location,
            }
        })
        .collect();
    print_table(&rows);

    if let Some(abort) = &report.abort {
        bail!("Batch aborted: {abort}");
    }
    if report.failed() > 0 {
        bail!(
            "{} of {} notes failed",
            report.failed(),
            report.outcomes.len()
        );
    }
    Ok(())
}

fn print_table<T: Tabled>(rows: &[T]) {
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();
    println!("{table}");
}
