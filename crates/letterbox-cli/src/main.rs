mod display;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use letterbox_core::{ImageUpload, Importance, LetterField, LetterPatch};
use letterbox_extract::{DEFAULT_SERVICE_URL, ExtractionClient, Extractor};
use letterbox_store::{ARCHIVE_NAMESPACE, ArchiveStore};
use letterbox_workflow::{Notification, UploadOutcome, WorkflowController};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "letterbox=info";

#[derive(Parser, Debug)]
#[command(name = "letterbox", version, about = "Scan, review, and archive incoming letters")]
struct Cli {
    /// Extraction service endpoint
    #[arg(long, env = "LETTERBOX_SERVICE_URL", default_value = DEFAULT_SERVICE_URL, global = true)]
    service_url: String,

    /// Archive location (defaults to the platform data directory)
    #[arg(long, env = "LETTERBOX_ARCHIVE", value_name = "PATH", global = true)]
    archive: Option<PathBuf>,

    /// Storage backend for the archive
    #[arg(long, env = "LETTERBOX_BACKEND", value_enum, default_value_t = Backend::Json, global = true)]
    backend: Backend,

    /// Seconds to wait for the extraction service
    #[arg(long, env = "LETTERBOX_TIMEOUT_SECS", value_name = "SECS", global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    Json,
    #[cfg(feature = "duckdb")]
    Duckdb,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract fields from a scanned letter, review them, and archive it
    Scan(ScanArgs),
    /// List every archived letter, newest first
    List,
    /// Search archived letters by subject, number, sender, or receiver
    Search {
        /// Case-insensitive substring; empty lists everything
        query: String,
    },
    /// Show one archived letter in full
    Show { id: String },
    /// Amend fields of an archived letter
    Edit(EditArgs),
    /// Delete an archived letter
    Delete {
        id: String,
        /// Delete without asking for confirmation
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Image file of the scanned letter
    image: PathBuf,

    /// Override an extracted field before saving (repeatable)
    #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
    set: Vec<(LetterField, String)>,

    /// Show the reviewed draft without saving it
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct EditArgs {
    id: String,
    #[arg(long)]
    subject: Option<String>,
    #[arg(long)]
    sender: Option<String>,
    #[arg(long)]
    receiver: Option<String>,
    #[arg(long)]
    number: Option<String>,
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    body: Option<String>,
    /// Normal or Urgent
    #[arg(long)]
    importance: Option<Importance>,
}

impl EditArgs {
    fn patch(&self) -> LetterPatch {
        LetterPatch {
            subject: self.subject.clone(),
            sender_service: self.sender.clone(),
            receiver_service: self.receiver.clone(),
            letter_number: self.number.clone(),
            date: self.date.clone(),
            body: self.body.clone(),
            importance: self.importance,
            image_data: None,
        }
    }
}

fn parse_assignment(s: &str) -> Result<(LetterField, String), String> {
    let (field, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{s}'"))?;
    let field = field.trim().parse::<LetterField>().map_err(|e| e.to_string())?;
    Ok((field, value.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("letterbox v{}", env!("CARGO_PKG_VERSION"));

    let store = open_store(cli.backend, cli.archive.as_deref())?;
    let client = match cli.timeout_secs {
        Some(secs) => ExtractionClient::with_timeout(&cli.service_url, Duration::from_secs(secs)),
        None => ExtractionClient::new(&cli.service_url),
    }
    .context("building extraction client")?;
    let (mut workflow, mut notifications) = WorkflowController::new(store, client);

    let result = run(&mut workflow, cli.command, &mut notifications).await;
    report(&mut notifications);
    result
}

async fn run<E: Extractor>(
    wf: &mut WorkflowController<E>,
    command: Command,
    notifications: &mut UnboundedReceiver<Notification>,
) -> anyhow::Result<()> {
    match command {
        Command::Scan(args) => scan(wf, args, notifications).await,
        Command::List => {
            display::print_cards(&wf.archive_view()?, "");
            Ok(())
        }
        Command::Search { query } => {
            wf.set_query(query.as_str())?;
            display::print_cards(&wf.archive_view()?, &query);
            Ok(())
        }
        Command::Show { id } => {
            let letter = wf.letter(&id)?.with_context(|| format!("no letter with id {id}"))?;
            display::print_letter(letter);
            Ok(())
        }
        Command::Edit(args) => {
            let patch = args.patch();
            if patch.is_empty() {
                bail!("nothing to change; pass at least one field flag");
            }
            if !wf.update_letter(&args.id, &patch)? {
                bail!("no letter with id {}", args.id);
            }
            let letter = wf.letter(&args.id)?.with_context(|| format!("no letter with id {}", args.id))?;
            display::print_letter(letter);
            Ok(())
        }
        Command::Delete { id, yes } => delete(wf, &id, yes, &mut io::stdin().lock(), &mut io::stderr()),
    }
}

/// Delete a letter, asking first unless `yes` is set.
fn delete<E: Extractor>(
    wf: &mut WorkflowController<E>,
    id: &str,
    yes: bool,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> anyhow::Result<()> {
    let subject = wf
        .letter(id)?
        .map(|l| l.subject.clone())
        .with_context(|| format!("no letter with id {id}"))?;

    let question = format!("Delete \"{subject}\" ({id})? This cannot be undone.");
    if !yes && !confirm(&question, input, output)? {
        println!("Kept {id}.");
        return Ok(());
    }
    if !wf.delete_letter(id)? {
        bail!("no letter with id {id}");
    }
    println!("Deleted {id}.");
    Ok(())
}

/// Ask a yes/no question; anything but "y" or "yes" is a no.
fn confirm(question: &str, input: &mut impl BufRead, output: &mut impl Write) -> io::Result<bool> {
    write!(output, "{question} [y/N] ")?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

async fn scan<E: Extractor>(
    wf: &mut WorkflowController<E>,
    args: ScanArgs,
    notifications: &mut UnboundedReceiver<Notification>,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.image).with_context(|| format!("reading {}", args.image.display()))?;
    let file_name = args
        .image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.image.display().to_string());

    let outcome = wf.upload(ImageUpload::new(file_name, bytes)).await?;
    report(notifications);
    // The failure itself was already reported through the notifications.
    if let UploadOutcome::Failed { .. } = outcome {
        bail!("scan failed; nothing was archived");
    }

    for (field, value) in &args.set {
        wf.edit(*field, value.as_str())?;
    }
    if let Some(draft) = wf.state().draft() {
        display::print_draft(draft);
    }
    if args.dry_run {
        println!("Dry run: nothing saved.");
        return Ok(());
    }

    let saved = wf.submit()?;
    report(notifications);
    println!();
    println!("{}", display::card(&saved));
    Ok(())
}

/// Print whatever the workflow reported since the last call.
fn report(notifications: &mut UnboundedReceiver<Notification>) {
    while let Ok(n) = notifications.try_recv() {
        if let Some(line) = display::notification_line(&n) {
            eprintln!("{line}");
        }
    }
}

fn open_store(backend: Backend, archive: Option<&Path>) -> anyhow::Result<ArchiveStore> {
    let path = match archive {
        Some(p) => p.to_path_buf(),
        None => default_archive_path(backend)?,
    };
    let store = match backend {
        Backend::Json => ArchiveStore::open_json(&path),
        #[cfg(feature = "duckdb")]
        Backend::Duckdb => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
            }
            ArchiveStore::open_duckdb(&path)
        }
    };
    store.with_context(|| format!("opening archive at {}", path.display()))
}

fn default_archive_path(backend: Backend) -> anyhow::Result<PathBuf> {
    let extension = match backend {
        Backend::Json => "json",
        #[cfg(feature = "duckdb")]
        Backend::Duckdb => "duckdb",
    };
    let dir = dirs::data_dir().context("no platform data directory; pass --archive")?;
    Ok(dir
        .join("letterbox")
        .join(format!("{ARCHIVE_NAMESPACE}.{extension}")))
}
