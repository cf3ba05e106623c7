use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use collaboration::{HttpBackend, LockManager, TranslationBackend, WorkSession};
use document::{select_editable_version, CompletedParagraphs, DocumentId, LockLease};
use markup::{export_document, segment_with_count, ExportOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use workbench::WorkbenchConfig;

#[derive(Parser)]
#[command(name = "workbench")]
#[command(about = "Translation workbench CLI - segment, export and manage translation locks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Tag the paragraphs of a markup file
    Segment {
        input: PathBuf,

        /// Namespace for paragraph ids (original, ai-draft, translation)
        #[arg(short, long, default_value = "translation")]
        namespace: String,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a standalone copy of an edited file
    Export {
        input: PathBuf,

        /// Original document whose stylesheets are carried over
        #[arg(long)]
        original: Option<PathBuf>,

        #[arg(long)]
        title: Option<String>,

        /// Keep data-paragraph-* attributes
        #[arg(long)]
        keep_tags: bool,

        /// Output file or directory (defaults to a name derived from the title)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Acquire the edit lock on a document
    Lock { document: String },

    /// Show who holds the lock on a document
    Status {
        document: String,

        /// Print the raw lock status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Save and hand a document over to the next worker
    Handover {
        document: String,

        #[arg(short, long)]
        memo: String,

        /// Glossary notes for the next worker
        #[arg(long)]
        terms: Option<String>,

        /// Content to save first (latest editable version when omitted)
        #[arg(long)]
        content: Option<PathBuf>,

        /// Completed paragraph indices, comma separated
        #[arg(long, value_delimiter = ',')]
        completed: Vec<usize>,
    },

    /// Save the final content and send the document to review
    Complete {
        document: String,

        #[arg(long)]
        content: Option<PathBuf>,

        #[arg(long, value_delimiter = ',')]
        completed: Vec<usize>,
    },

    /// Write a default config file
    ServeConfig {
        /// Destination (defaults to the user config directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "workbench=debug,collaboration=debug,markup=debug,cli=debug"
    } else {
        "workbench=info,collaboration=info,cli=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config_path = cli.config.clone().or_else(WorkbenchConfig::default_path);

    match cli.command {
        Commands::Segment {
            input,
            namespace,
            output,
        } => segment_command(input, namespace, output),
        Commands::Export {
            input,
            original,
            title,
            keep_tags,
            output,
        } => export_command(input, original, title, keep_tags, output),
        Commands::Lock { document } => {
            lock_command(load_config(config_path.as_deref())?, document.into()).await
        }
        Commands::Status { document, json } => {
            status_command(load_config(config_path.as_deref())?, document.into(), json).await
        }
        Commands::Handover {
            document,
            memo,
            terms,
            content,
            completed,
        } => {
            let config = load_config(config_path.as_deref())?;
            handover_command(config, document.into(), memo, terms, content, completed).await
        }
        Commands::Complete {
            document,
            content,
            completed,
        } => {
            let config = load_config(config_path.as_deref())?;
            complete_command(config, document.into(), content, completed).await
        }
        Commands::ServeConfig { path, force } => {
            let path = path
                .or(config_path)
                .context("no config directory on this platform, pass --path")?;
            serve_config_command(&path, force)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<WorkbenchConfig> {
    let config = match path {
        Some(path) => WorkbenchConfig::load_or_default(path)?,
        None => WorkbenchConfig::default(),
    };
    Ok(config.with_env_overrides())
}

fn backend(config: &WorkbenchConfig) -> Result<Arc<dyn TranslationBackend>> {
    info!("backend {}", config.backend.api_url);
    Ok(Arc::new(HttpBackend::new(&config.backend)?))
}

fn segment_command(input: PathBuf, namespace: String, output: Option<PathBuf>) -> Result<()> {
    let raw = std::fs::read_to_string(&input)
        .with_context(|| format!("reading {}", input.display()))?;
    let segmented = segment_with_count(&raw, &namespace);
    if segmented.paragraph_count == 0 {
        warn!("no paragraph blocks in {:?}", input);
    }
    match output {
        Some(path) => {
            std::fs::write(&path, &segmented.markup)?;
            info!(
                "tagged {} paragraphs, written to {:?}",
                segmented.paragraph_count, path
            );
        }
        None => println!("{}", segmented.markup),
    }
    Ok(())
}

fn export_command(
    input: PathBuf,
    original: Option<PathBuf>,
    title: Option<String>,
    keep_tags: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let edited = std::fs::read_to_string(&input)
        .with_context(|| format!("reading {}", input.display()))?;
    let original = original
        .map(|path| {
            std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
        })
        .transpose()?;

    let mut options = ExportOptions::default();
    if let Some(title) = title {
        options = options.with_title(title);
    }
    if !keep_tags {
        options = options.with_stripped_tags();
    }
    let exported = export_document(&edited, original.as_deref(), &options);

    let path = match output {
        Some(path) if path.is_dir() => path.join(&exported.file_name),
        Some(path) => path,
        None => PathBuf::from(&exported.file_name),
    };
    std::fs::write(&path, &exported.markup)?;
    info!("exported to {:?}", path);
    Ok(())
}

fn print_lease(lease: &LockLease) {
    println!("document:  {}", lease.document_id);
    println!("holder:    {}", lease.holder);
    println!(
        "since:     {}",
        lease
            .acquired_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
    );
    println!("editable:  {}", lease.can_edit);
    println!("completed: {:?}", lease.completed_paragraphs.to_vec());
}

async fn lock_command(config: WorkbenchConfig, id: DocumentId) -> Result<()> {
    let manager = LockManager::new(backend(&config)?, config.retry);
    match manager.acquire(&id).await {
        Ok(lease) => {
            print_lease(&lease);
            Ok(())
        }
        Err(err) => bail!(err.user_message()),
    }
}

async fn status_command(config: WorkbenchConfig, id: DocumentId, json: bool) -> Result<()> {
    let backend = backend(&config)?;
    if json {
        let status = backend.lock_status(&id).await?;
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }
    let document = backend.document(&id).await?;
    println!("title:     {}", document.title);
    println!("status:    {:?}", document.status);
    if let Some(handover) = &document.latest_handover {
        println!("handover:  {} ({})", handover.memo, handover.handed_over_by);
    }

    let status = LockManager::new(backend, config.retry).status(&id).await?;
    match &status.lease {
        Some(lease) if status.locked => print_lease(lease),
        _ => println!("unlocked"),
    }
    Ok(())
}

/// Takes the lease (re-entrant for the current holder) and resolves the
/// content to persist.
async fn open_session(
    config: &WorkbenchConfig,
    id: &DocumentId,
    content: Option<PathBuf>,
    completed: Vec<usize>,
) -> Result<(WorkSession, String, CompletedParagraphs)> {
    let backend = backend(config)?;
    let content = match content {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let versions = backend.versions(id).await?;
            select_editable_version(&versions)
                .map(|v| v.content.clone())
                .context("document has no editable version")?
        }
    };
    let segmented = segment_with_count(&content, "translation");
    let completed = CompletedParagraphs::from_indices(completed, segmented.paragraph_count);

    let manager = LockManager::new(backend, config.retry);
    let session = match WorkSession::open(&manager, id, String::new()).await {
        Ok(session) => session,
        Err(err) => bail!(err.user_message()),
    };
    Ok((session, segmented.markup, completed))
}

async fn handover_command(
    config: WorkbenchConfig,
    id: DocumentId,
    memo: String,
    terms: Option<String>,
    content: Option<PathBuf>,
    completed: Vec<usize>,
) -> Result<()> {
    let (session, content, completed) = open_session(&config, &id, content, completed).await?;
    if let Err(err) = session.handover(&content, &completed, &memo, terms).await {
        bail!(err.user_message());
    }
    println!("handed over {} ({} paragraphs completed)", id, completed.len());
    Ok(())
}

async fn complete_command(
    config: WorkbenchConfig,
    id: DocumentId,
    content: Option<PathBuf>,
    completed: Vec<usize>,
) -> Result<()> {
    let (session, content, completed) = open_session(&config, &id, content, completed).await?;
    if let Err(err) = session.complete(&content, &completed).await {
        bail!(err.user_message());
    }
    println!("{} sent to review", id);
    Ok(())
}

fn serve_config_command(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists, pass --force to overwrite", path.display());
    }
    WorkbenchConfig::default().save(path)?;
    println!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_list_parses() {
        let cli = Cli::try_parse_from([
            "workbench",
            "handover",
            "doc-1",
            "--memo",
            "half done",
            "--completed",
            "0,2,5",
        ])
        .unwrap();
        match cli.command {
            Commands::Handover {
                document,
                memo,
                completed,
                ..
            } => {
                assert_eq!(document, "doc-1");
                assert_eq!(memo, "half done");
                assert_eq!(completed, vec![0, 2, 5]);
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_serve_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workbench").join("config.json");
        serve_config_command(&path, false).unwrap();
        assert!(serve_config_command(&path, false).is_err());
        serve_config_command(&path, true).unwrap();
        assert!(WorkbenchConfig::load(&path).is_ok());
    }
}
