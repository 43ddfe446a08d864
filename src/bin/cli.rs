//! Tidymarks CLI - reorganize browser bookmark exports from the terminal
//!
//! Usage: tidymarks-cli [OPTIONS] <COMMAND>
//!
//! Reads and writes NETSCAPE-Bookmark-file-1 HTML exports. Supports JSON output for scripting.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::{Path, PathBuf};
use tidymarks_lib::ai_client::{Backend, LlmBackend};
use tidymarks_lib::settings::{self, KeySource, Settings};
use tidymarks_lib::{hierarchy, netscape, BookmarkNode, BookmarkStore, Categorizer, ChunkOrder, Document};
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Main CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "tidymarks-cli")]
#[command(version, about = "Sort browser bookmarks into categorized folders", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON for scripting
    #[arg(long, global = true)]
    json: bool,

    /// Suppress progress output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Detailed logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the bookmark tree of an export
    Show {
        /// Bookmark export (.html)
        file: PathBuf,
    },
    /// List every link in an export, depth-first
    Flatten {
        /// Bookmark export (.html)
        file: PathBuf,
    },
    /// Categorize all links with an LLM and write a regrouped export
    Organize {
        /// Bookmark export to read (.html)
        input: PathBuf,
        /// Where to write the organized export (.html)
        #[arg(long, short)]
        output: PathBuf,
        /// One folder level per category, no sub-categories
        #[arg(long)]
        simple: bool,
        /// Let the model shorten titles
        #[arg(long)]
        clean_titles: bool,
        /// Keep links in input order inside each batch
        #[arg(long)]
        keep_order: bool,
        /// LLM backend: anthropic or gemini (default: from config)
        #[arg(long)]
        backend: Option<LlmBackend>,
        /// Model override (default: from config, then backend default)
        #[arg(long)]
        model: Option<String>,
    },
    /// Configuration settings
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// List all settings
    List,
    /// Get a setting value
    Get {
        /// Setting key
        key: String,
    },
    /// Set a setting value (empty value clears API keys and model)
    Set {
        /// Setting key
        key: String,
        /// Setting value
        value: String,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Logs go to stderr so `--json` output on stdout stays parseable
fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Err(e) = run_cli(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_cli(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Show { file } => handle_show(&file, cli.json),
        Commands::Flatten { file } => handle_flatten(&file, cli.json),
        Commands::Organize {
            input,
            output,
            simple,
            clean_titles,
            keep_order,
            backend,
            model,
        } => {
            let args = OrganizeArgs {
                input,
                output,
                simple,
                clean_titles,
                keep_order,
                backend,
                model,
            };
            handle_organize(args, cli.json, cli.quiet).await
        }
        Commands::Config { cmd } => handle_config(cmd, cli.json),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "tidymarks-cli", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Failed to serialize output: {}", e))
}

fn load_document(path: &Path) -> Result<Document, String> {
    netscape::read_file(path).map_err(|e| match e {
        tidymarks_lib::Error::Parse(e) => format!("{}: {}", path.display(), e),
        other => other.to_string(),
    })
}

// ============================================================================
// Show / Flatten
// ============================================================================

fn print_tree(nodes: &[BookmarkNode], depth: usize) {
    let indent = "  ".repeat(depth);
    for node in nodes {
        match node {
            BookmarkNode::Folder { title, children } => {
                println!("{}{}/", indent, title);
                print_tree(children, depth + 1);
            }
            BookmarkNode::Link { title, url } => println!("{}{}  <{}>", indent, title, url),
        }
    }
}

fn handle_show(file: &Path, json: bool) -> Result<(), String> {
    let document = load_document(file)?;
    if json {
        println!("{}", to_json(&document)?);
    } else {
        print_tree(&document.roots, 0);
        println!();
        println!("{} links in {} folders", document.link_count(), document.folder_count());
    }
    Ok(())
}

fn handle_flatten(file: &Path, json: bool) -> Result<(), String> {
    let links = hierarchy::flatten(&load_document(file)?);
    if json {
        println!("{}", to_json(&links)?);
    } else {
        for link in &links {
            println!("{}\t{}", link.title, link.url);
        }
    }
    Ok(())
}

// ============================================================================
// Organize
// ============================================================================

struct OrganizeArgs {
    input: PathBuf,
    output: PathBuf,
    simple: bool,
    clean_titles: bool,
    keep_order: bool,
    backend: Option<LlmBackend>,
    model: Option<String>,
}

async fn handle_organize(args: OrganizeArgs, json: bool, quiet: bool) -> Result<(), String> {
    let mut settings = Settings::load(&settings::default_path());
    if let Some(backend) = args.backend {
        settings.llm_backend = backend;
    }
    let kind = settings.llm_backend;

    let (api_key, source) = settings.api_key_with_source();
    let api_key = api_key.ok_or_else(|| {
        format!(
            "No {} API key. Set {} or run: tidymarks-cli config set {}-api-key <key>",
            kind,
            kind.api_key_env(),
            kind
        )
    })?;
    if source == KeySource::Env {
        tracing::debug!("Using API key from {}", kind.api_key_env());
    }

    let model = args.model.or(settings.model.clone());
    let backend = Backend::new(kind, api_key, model).map_err(|e| e.to_string())?;
    let store = BookmarkStore::new(Categorizer::new(backend));

    let mut options = settings.organize_options();
    options.use_simple_categories |= args.simple;
    options.clean_titles |= args.clean_titles;
    if args.keep_order {
        options.chunk_order = ChunkOrder::Input;
    }
    store.set_options(options);

    let count = store.import_file(&args.input).map_err(|e| e.to_string())?;
    if !quiet {
        eprintln!("Imported {} bookmarks from {}", count, args.input.display());
        eprintln!("Categorizing with {} (Ctrl-C stops after the current batch)...", kind);
    }

    // Cancellation only takes effect between batches; the in-flight request finishes
    let cancel = store.cancel_handle();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current batch");
            cancel.cancel();
        }
    });
    let result = store.organize().await;
    watcher.abort();
    let report = result.map_err(|e| e.to_string())?;

    store.export_file(&args.output).map_err(|e| e.to_string())?;

    if json {
        println!("{}", to_json(&report)?);
    } else if !quiet {
        println!(
            "Organized {} bookmarks into {} folders -> {}",
            report.categorized,
            report.folders,
            args.output.display()
        );
        if report.dropped > 0 {
            println!("{} bookmarks had no category and were left out", report.dropped);
        }
    }
    Ok(())
}

// ============================================================================
// Config Commands
// ============================================================================

fn handle_config(cmd: ConfigCommands, json: bool) -> Result<(), String> {
    let path = settings::default_path();
    let mut settings = Settings::load(&path);

    match cmd {
        ConfigCommands::List => {
            let mut values = serde_json::Map::new();
            for key in settings::KEYS {
                let value = settings.get(key).map_err(|e| e.to_string())?;
                values.insert(key.to_string(), serde_json::Value::String(value));
            }
            if json {
                println!("{}", to_json(&values)?);
            } else {
                for (key, value) in &values {
                    println!("{:<18} {}", format!("{}:", key), value.as_str().unwrap_or_default());
                }
                println!();
                println!("Settings file: {}", path.display());
            }
        }
        ConfigCommands::Get { key } => {
            let value = settings.get(&key).map_err(|e| e.to_string())?;
            if json {
                println!("{}", to_json(&serde_json::json!({ key: value }))?);
            } else {
                println!("{}", value);
            }
        }
        ConfigCommands::Set { key, value } => {
            settings.set(&key, &value).map_err(|e| e.to_string())?;
            settings.save(&path).map_err(|e| e.to_string())?;
            let shown = settings.get(&key).map_err(|e| e.to_string())?;
            if json {
                println!("{}", to_json(&serde_json::json!({ key: shown }))?);
            } else {
                println!("Set {} = {}", key, shown);
            }
        }
    }
    Ok(())
}
