use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};

use pdfaudit::db::{default_database_path, run_repo};
use pdfaudit::telemetry::{init_logging, LogFormat};
use pdfaudit::{
    findings_for_document, load_config_or_default, CancellationToken, Config, Database,
    DirectoryChecker, DocumentProcessor, HeadingCheck, PageRange, PassRequest, PipelineManager,
    PipelineRegistry,
};

#[derive(Parser)]
#[command(name = "pdfaudit")]
#[command(about = "Run accessibility pipelines over PDF checker reports")]
#[command(version)]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, global = true, default_value = "pdfaudit.json")]
    config: PathBuf,

    /// SQLite database path (overrides the config)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = OutputLogFormat::Text)]
    log_format: OutputLogFormat,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputLogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a processing pass over one document
    Process {
        #[arg(long)]
        document_id: i64,

        /// Source PDF
        #[arg(long)]
        pdf: PathBuf,

        /// Directory holding document.json and page-<n>.json checker reports
        #[arg(long)]
        reports: PathBuf,

        /// Auto-tagged variant of the PDF
        #[arg(long)]
        tagged_pdf: Option<PathBuf>,

        /// Page range such as 3 or 2-7; defaults to every page
        #[arg(long, value_parser = parse_pages)]
        pages: Option<PageRange>,

        /// Stage remediated artifacts for pipelines that support it
        #[arg(long)]
        resolve: bool,

        /// Top-level heading found in the document structure
        #[arg(long, conflicts_with = "no_heading")]
        heading: Option<String>,

        /// The document structure has no top-level heading
        #[arg(long)]
        no_heading: bool,

        /// Only use the whole-document report, skip per-page collection
        #[arg(long)]
        document_only: bool,

        /// Run only this pipeline; repeat to select several
        #[arg(long = "pipeline", value_name = "NAME")]
        pipelines: Vec<String>,
    },

    /// Show shared and page-specific findings for a document
    Findings {
        #[arg(long)]
        document_id: i64,
    },

    /// List pipeline run history for a document
    Runs {
        #[arg(long)]
        document_id: i64,

        #[arg(long)]
        pipeline: Option<String>,
    },

    /// List registered pipelines
    Pipelines,
}

fn parse_pages(s: &str) -> std::result::Result<PageRange, String> {
    PageRange::parse(s).ok_or_else(|| format!("invalid page range '{}'", s))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = match cli.log_format {
        OutputLogFormat::Text => LogFormat::Text,
        OutputLogFormat::Json => LogFormat::Json,
    };
    init_logging(format, &cli.log_level)?;

    let config = load_config_or_default(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;

    match cli.command {
        Commands::Process {
            document_id,
            pdf,
            reports,
            tagged_pdf,
            pages,
            resolve,
            heading,
            no_heading,
            document_only,
            pipelines,
        } => {
            let heading = match (heading, no_heading) {
                (Some(text), _) => HeadingCheck::Found(text),
                (None, true) => HeadingCheck::Missing,
                (None, false) => HeadingCheck::NotChecked,
            };
            let request = PassRequest {
                document_id,
                pdf_path: pdf,
                tagged_pdf_path: tagged_pdf,
                page_range: pages,
                collect_pages: !document_only,
                resolve_enabled: resolve,
                heading,
                pipelines: (!pipelines.is_empty()).then_some(pipelines),
            };
            let db = open_database(cli.database.as_deref(), &config)?;
            process(&config, db, &reports, &request)
        }
        Commands::Findings { document_id } => {
            let db = open_database(cli.database.as_deref(), &config)?;
            print_json(&findings_for_document(&db, document_id)?)
        }
        Commands::Runs {
            document_id,
            pipeline,
        } => {
            let db = open_database(cli.database.as_deref(), &config)?;
            print_json(&run_repo::list_for_document(&db, document_id, pipeline.as_deref())?)
        }
        Commands::Pipelines => {
            let registry = PipelineRegistry::builtin()?;
            for pipeline in registry.all_pipelines() {
                println!("{:<22} {}", pipeline.name(), pipeline.title());
                println!("{:<22} {}", "", pipeline.description());
            }
            Ok(())
        }
    }
}

fn open_database(flag: Option<&Path>, config: &Config) -> Result<Database> {
    let path = flag
        .map(Path::to_path_buf)
        .or_else(|| config.database_path.clone())
        .or_else(default_database_path)
        .ok_or_else(|| anyhow!("no database path given and no home directory found"))?;
    Database::open(&path).with_context(|| format!("opening database {}", path.display()))
}

fn process(config: &Config, db: Database, reports: &Path, request: &PassRequest) -> Result<()> {
    let registry = Arc::new(PipelineRegistry::builtin()?);
    let manager =
        PipelineManager::new(registry, db.clone()).with_stale_after(config.stale_run_after());
    let checker = Arc::new(DirectoryChecker::new(reports));
    let processor = DocumentProcessor::new(config, checker, manager, db);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupted, finishing in-flight work and skipping the rest");
        on_interrupt.cancel();
    })?;

    let outcome = processor.process(request, &cancel)?;
    info!(pass_id = %outcome.pass_id, runs = outcome.runs.len(), "Pass stored");
    print_json(&outcome)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_process_arguments() {
        let cli = Cli::try_parse_from([
            "pdfaudit",
            "--log-format",
            "json",
            "process",
            "--document-id",
            "7",
            "--pdf",
            "in.pdf",
            "--reports",
            "reports",
            "--pages",
            "2-4",
            "--no-heading",
        ])
        .unwrap();
        match cli.command {
            Commands::Process {
                document_id,
                pages,
                no_heading,
                resolve,
                ..
            } => {
                assert_eq!(document_id, 7);
                assert_eq!(pages, PageRange::new(2, 4));
                assert!(no_heading);
                assert!(!resolve);
            }
            _ => panic!("expected process command"),
        }
    }

    #[test]
    fn test_pipeline_flag_repeats() {
        let cli = Cli::try_parse_from([
            "pdfaudit",
            "process",
            "--document-id",
            "3",
            "--pdf",
            "a.pdf",
            "--reports",
            "r",
            "--pipeline",
            "failed-rules",
            "--pipeline",
            "h1-heading-presence",
        ])
        .unwrap();
        match cli.command {
            Commands::Process { pipelines, .. } => {
                assert_eq!(pipelines, vec!["failed-rules", "h1-heading-presence"]);
            }
            _ => panic!("expected process command"),
        }
    }

    #[test]
    fn test_heading_flags_conflict() {
        let result = Cli::try_parse_from([
            "pdfaudit",
            "process",
            "--document-id",
            "1",
            "--pdf",
            "a.pdf",
            "--reports",
            "r",
            "--heading",
            "Title",
            "--no-heading",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_page_range_rejected() {
        assert!(parse_pages("5-2").is_err());
        assert_eq!(parse_pages("3").unwrap(), PageRange::single(3).unwrap());
    }
}
