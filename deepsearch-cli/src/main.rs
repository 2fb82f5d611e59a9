//! Deepsearch CLI: run one deep research query from the terminal.

mod commands;
mod progress;

use clap::Parser;
use deepsearch_core::{
    CancellationController, DeepsearchConfig, RelatedQuestions, ResearchDepth, ResearchEngine,
    ResearchResult, create_llm_provider, create_search_provider,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Exit status for a run stopped with Ctrl-C.
const EXIT_CANCELLED: u8 = 130;

/// Deepsearch: plan, search, analyse and compile a research report
#[derive(Parser, Debug)]
#[command(name = "deepsearch", version, about, long_about = None)]
struct Cli {
    /// Research query
    query: Option<String>,

    /// Research depth: standard, comprehensive, exhaustive
    #[arg(short, long)]
    depth: Option<ResearchDepth>,

    /// Maximum number of sources kept in the result
    #[arg(long)]
    max_sources: Option<usize>,

    /// Completion model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the output to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit the full result as JSON
    #[arg(long)]
    json: bool,

    /// Also suggest related follow-up questions
    #[arg(long)]
    related: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress progress and non-essential output
    #[arg(short, long)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default configuration file in the workspace
    Init,
    /// Show the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "deepsearch", "deepsearch")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "deepsearch.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    if let Some(Commands::Config { action }) = &cli.command {
        commands::handle_config(action, &workspace, cli.config.as_deref())?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(query) = cli.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) else {
        anyhow::bail!("No research query given. Run `deepsearch --help` for usage.");
    };

    if cli.config.is_none() && !deepsearch_core::config::config_exists(Some(&workspace)) {
        tracing::info!("No configuration file found, using defaults and environment");
    }
    let mut config =
        deepsearch_core::load_config(Some(&workspace), cli.config.as_deref(), None)
            .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    apply_overrides(&mut config, &cli);

    let llm = create_llm_provider(&config.llm)
        .map_err(|e| anyhow::anyhow!("Failed to initialize completion provider: {}", e))?;
    let search = create_search_provider(&config.search)
        .map_err(|e| anyhow::anyhow!("Failed to initialize search provider: {}", e))?;

    tracing::info!(
        llm = llm.model_name(),
        search = search.name(),
        depth = ?config.research.default_depth,
        "Providers ready"
    );

    let engine = ResearchEngine::new(llm.clone(), search, config.research.clone());
    let options = engine.default_options();

    let callback = Arc::new(progress::TerminalProgress::new(cli.quiet));
    let controller = CancellationController::new();
    let ctrl_c = controller.clone();
    let quiet = cli.quiet;
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            if !quiet {
                eprintln!("\nCancelling research...");
            }
            ctrl_c.cancel();
        }
    });

    let result = match engine.run(query, options, callback, controller).await {
        Ok(result) => result,
        Err(e) if e.is_cancellation() => {
            if !cli.quiet {
                eprintln!("Research cancelled.");
            }
            return Ok(ExitCode::from(EXIT_CANCELLED));
        }
        Err(e) => return Err(anyhow::anyhow!("Research failed: {}", e)),
    };

    let related = if cli.related {
        RelatedQuestions::new(llm).generate(query).await
    } else {
        Vec::new()
    };

    let rendered = if cli.json {
        render_json(&result, &related)?
    } else {
        render_markdown(&result, &related)
    };

    match &cli.output {
        Some(path) => {
            std::fs::write(path, &rendered)?;
            if !cli.quiet {
                eprintln!("Report written to {}", path.display());
            }
        }
        None => println!("{}", rendered),
    }

    Ok(ExitCode::SUCCESS)
}

fn apply_overrides(config: &mut DeepsearchConfig, cli: &Cli) {
    if let Some(depth) = cli.depth {
        config.research.default_depth = depth;
    }
    if let Some(max_sources) = cli.max_sources {
        config.research.max_sources = max_sources;
    }
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }
}

fn render_markdown(result: &ResearchResult, related: &[String]) -> String {
    let mut out = result.report.trim_end().to_string();

    if !result.sources.is_empty() {
        out.push_str("\n\n## Sources\n\n");
        for (i, source) in result.sources.iter().enumerate() {
            let title = if source.title.is_empty() {
                source.url.as_str()
            } else {
                source.title.as_str()
            };
            out.push_str(&format!("{}. [{}]({})\n", i + 1, title, source.url));
        }
    }

    if !related.is_empty() {
        out.push_str("\n## Related questions\n\n");
        for question in related {
            out.push_str(&format!("- {}\n", question));
        }
    }

    out
}

fn render_json(result: &ResearchResult, related: &[String]) -> anyhow::Result<String> {
    let mut value = serde_json::to_value(result)?;
    if let Some(obj) = value.as_object_mut() {
        if !related.is_empty() {
            obj.insert("related".to_string(), serde_json::json!(related));
        }
    }
    Ok(serde_json::to_string_pretty(&value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use deepsearch_core::{ResearchPlan, Source};

    fn result() -> ResearchResult {
        ResearchResult {
            query: "X".into(),
            report: "# Report\n\nBody\n".into(),
            sources: vec![
                Source {
                    title: "First".into(),
                    url: "https://a.example".into(),
                    snippet: "a".into(),
                },
                Source {
                    title: String::new(),
                    url: "https://b.example".into(),
                    snippet: "b".into(),
                },
            ],
            plan: ResearchPlan::new(vec![]),
            notes: vec![],
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::parse_from([
            "deepsearch",
            "--depth",
            "exhaustive",
            "--max-sources",
            "3",
            "--json",
            "quantum batteries",
        ]);
        assert_eq!(cli.depth, Some(ResearchDepth::Exhaustive));
        assert_eq!(cli.max_sources, Some(3));
        assert!(cli.json);
        assert_eq!(cli.query.as_deref(), Some("quantum batteries"));
    }

    #[test]
    fn test_cli_config_show() {
        let cli = Cli::parse_from(["deepsearch", "config", "show"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Show
            })
        ));
    }

    #[test]
    fn test_overrides_applied() {
        let cli = Cli::parse_from(["deepsearch", "-d", "comprehensive", "--model", "m", "q"]);
        let mut config = DeepsearchConfig::default();
        apply_overrides(&mut config, &cli);
        assert_eq!(config.research.default_depth, ResearchDepth::Comprehensive);
        assert_eq!(config.llm.model, "m");
        assert_eq!(config.research.max_sources, 10);
    }

    #[test]
    fn test_render_markdown_lists_sources() {
        let text = render_markdown(&result(), &["Why?".to_string()]);
        assert!(text.starts_with("# Report\n\nBody\n\n## Sources"));
        assert!(text.contains("1. [First](https://a.example)"));
        assert!(text.contains("2. [https://b.example](https://b.example)"));
        assert!(text.contains("- Why?"));
    }

    #[test]
    fn test_render_json_includes_related() {
        let json = render_json(&result(), &["Why?".to_string()]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["query"], "X");
        assert_eq!(value["sources"].as_array().unwrap().len(), 2);
        assert_eq!(value["related"][0], "Why?");
    }
}
