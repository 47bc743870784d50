//! mkx-extract - headless front end for the extraction job engine.
//!
//! Loads the settings, lists every input file through mkvmerge, queues one
//! job per file and runs the queue to the end.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;

use mkx_core::abort::AbortController;
use mkx_core::catalog::MkvMergeCatalog;
use mkx_core::config::{ConfigManager, ConfigSection, Settings, ToolPaths};
use mkx_core::extraction::{EngineConfig, ExtractionEngine};
use mkx_core::jobs::{JobQueue, JobState, QueueEvent};
use mkx_core::logging::{init_tracing, DiagnosticLog};
use mkx_core::models::{ChapterFormat, ExtractionMode, SegmentId};
use mkx_core::params::ExtractionOptions;
use mkx_core::selection::{OutputLocation, Selection};

#[derive(Parser)]
#[command(name = "mkx-extract", version, about = "Extract tracks, chapters, attachments and tags from Matroska files")]
struct Cli {
    /// Settings file (created with defaults if missing)
    #[arg(long, default_value = ".config/mkx-extract.toml")]
    config: PathBuf,

    /// Extraction mode (Tracks, Tags, Attachments, Chapters, Cue_Sheet, Timecodes_v2, Timestamps_v2, Cues)
    #[arg(long)]
    mode: Option<ExtractionMode>,

    /// Chapter output format (XML, OGM, CUE, PBF)
    #[arg(long)]
    chapter_format: Option<ChapterFormat>,

    /// Output directory (default: next to each source file, or the last used directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Replace existing output files
    #[arg(long)]
    overwrite: bool,

    /// Track IDs to extract (default: everything in the file)
    #[arg(short, long, value_delimiter = ',')]
    tracks: Vec<u64>,

    /// Attachment IDs to extract
    #[arg(short, long, value_delimiter = ',')]
    attachments: Vec<u64>,

    /// Also select chapters when track or attachment IDs are given
    #[arg(long)]
    chapters: bool,

    /// Append the jobs saved by an earlier run before running
    #[arg(long)]
    resume: bool,

    /// Save the job list when done
    #[arg(long)]
    save_jobs: bool,

    /// Matroska files to process
    files: Vec<PathBuf>,
}

impl Cli {
    fn explicit_selection(&self) -> bool {
        !self.tracks.is_empty() || !self.attachments.is_empty() || self.chapters
    }

    fn output_location(&self, settings: &Settings) -> OutputLocation {
        if let Some(ref dir) = self.output {
            return OutputLocation::Directory(dir.clone());
        }
        let last = &settings.paths.last_output_directory;
        if settings.paths.use_source_directory || last.is_empty() {
            OutputLocation::SourceDirectory
        } else {
            OutputLocation::Directory(PathBuf::from(last))
        }
    }
}

fn print_event(event: &QueueEvent) {
    match event {
        QueueEvent::JobStateChanged { job_id, state } => match state {
            JobState::Ready => {}
            JobState::Running => println!("[{}] started", job_id),
            other => println!("\r[{}] {}", job_id, other),
        },
        QueueEvent::JobProgress { job_id, percent } => {
            print!("\r[{}] {:>3}%", job_id, percent);
            let _ = std::io::stdout().flush();
        }
        QueueEvent::TrackStarted { job_id, name } => println!("\r[{}] extracting {}", job_id, name),
        QueueEvent::QueueProgress { completed, total } => {
            println!("Queue: {}/{} job(s) finished", completed, total)
        }
        QueueEvent::QueueFinished(summary) => println!("Finished: {}", summary),
    }
}

fn run(cli: Cli) -> Result<bool> {
    let mut config = ConfigManager::new(&cli.config);
    config
        .load_or_create()
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;
    let settings = config.settings().clone();

    init_tracing(settings.logging.level);
    tracing::debug!("Settings loaded from {}", config.path().display());

    if cli.files.is_empty() && !cli.resume {
        bail!("no input files given");
    }

    let tools = ToolPaths::locate(&settings.tool);
    let catalog = MkvMergeCatalog::new(&tools.mkvmerge);

    let mut options = ExtractionOptions::from_settings(&settings);
    if let Some(mode) = cli.mode {
        options.mode = mode;
    }
    if let Some(format) = cli.chapter_format {
        options = options.with_chapter_format(format);
    }
    if cli.overwrite {
        options = options.with_overwrite(true);
    }

    let mut selection = Selection::new();
    for file in &cli.files {
        selection
            .load(file, &catalog)
            .with_context(|| format!("reading {}", file.display()))?;

        if cli.explicit_selection() {
            for &id in &cli.tracks {
                if !selection.set_checked(file, SegmentId::Track(id), true) {
                    tracing::warn!("{} has no track {}", file.display(), id);
                }
            }
            for &id in &cli.attachments {
                if !selection.set_checked(file, SegmentId::Attachment(id), true) {
                    tracing::warn!("{} has no attachment {}", file.display(), id);
                }
            }
            if cli.chapters {
                selection.set_checked(file, SegmentId::Chapters, true);
            }
        } else {
            selection.set_file_checked(file, true);
        }
    }

    if !cli.files.is_empty() && selection.checked_count() == 0 {
        bail!("nothing selected for extraction");
    }
    tracing::info!(
        "{} segment(s) selected in {} file(s)",
        selection.checked_count(),
        selection.files().len()
    );

    let requests = selection
        .build_parameters(&options, &cli.output_location(&settings))
        .context("building extraction requests")?;

    let log = DiagnosticLog::create_in(
        config.logs_folder(),
        "mkx-extract",
        settings.logging.to_log_config(),
        None,
    )
    .with_context(|| format!("opening log in {}", config.logs_folder().display()))?;

    let engine = ExtractionEngine::new(
        EngineConfig::from_settings(&settings).with_mkvextract(&tools.mkvextract),
        log.clone(),
        AbortController::new(),
    );
    let queue = JobQueue::new(engine).with_callback(Box::new(print_event));

    let jobs_file = config.jobs_file();
    if cli.resume && jobs_file.exists() {
        let report = queue
            .load_from(&jobs_file, &catalog)
            .with_context(|| format!("restoring jobs from {}", jobs_file.display()))?;
        println!("Restored {} job(s)", report.restored);
        for (path, reason) in &report.skipped {
            println!("Skipped {}: {}", path.display(), reason);
        }
    }

    for request in requests {
        if queue.enqueue(request).is_none() {
            tracing::info!("Ignoring a duplicate request");
        }
    }

    let summary = queue.run_to_end()?;
    log.flush();

    if cli.save_jobs {
        queue
            .save_to(&jobs_file)
            .with_context(|| format!("saving jobs to {}", jobs_file.display()))?;
    }

    if let Some(ref dir) = cli.output {
        config.settings_mut().paths.last_output_directory = dir.display().to_string();
        config.settings_mut().paths.use_source_directory = false;
        if let Err(e) = config.update_section(ConfigSection::Paths) {
            tracing::warn!("Could not remember the output directory: {}", e);
        }
    }

    Ok(summary.error == 0 && summary.aborted == 0)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
