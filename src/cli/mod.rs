//! # CLI Module
//!
//! Command-line interface for the photo inbox sorter.
//!
//! ## Usage
//! ```bash
//! # File everything in two inboxes into a library
//! photo-sort sort ~/inbox/phone ~/inbox/camera --output ~/Pictures/library
//!
//! # See what would happen
//! photo-sort sort --config photo-sort.json --dry-run
//!
//! # Regenerate the index from the library
//! photo-sort rebuild --output ~/Pictures/library --fresh
//!
//! # Move an old flat index into SQLite
//! photo-sort migrate --from photos.csv --to ~/Pictures/library/.photo-sort/index.db
//!
//! # What would a file be filed as?
//! photo-sort inspect ~/inbox/phone/mov1.mp4
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use photo_inbox_sorter::config::{parse_mode, SorterConfig};
use photo_inbox_sorter::core::index::{
    migrate, open_backend, open_backend_read_only, BackendKind, DuplicateIndex,
};
use photo_inbox_sorter::core::media::{classify, Classification, MediaUnit};
use photo_inbox_sorter::core::metadata::{ExifReader, MetadataSource};
use photo_inbox_sorter::core::pipeline::{IndexRebuilder, RebuildResult, SortResult, Sorter};
use photo_inbox_sorter::error::{IndexError, Result};
use photo_inbox_sorter::events::{Event, EventChannel, EventReceiver, RunEvent, ScanEvent, UnitEvent};
use photo_inbox_sorter::init_tracing;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::info;

/// Photo Inbox Sorter - file media by capture date, once
#[derive(Parser, Debug)]
#[command(name = "photo-sort")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// File new media from the inboxes into the library
    Sort {
        /// Inbox directories (replace the configured sources)
        sources: Vec<PathBuf>,

        #[command(flatten)]
        library: LibraryArgs,

        /// Directory layout, e.g. "%(year)d/%(year)04d_%(month)02d_%(day)02d"
        #[arg(long)]
        directory_format: Option<String>,

        /// Prefix for filed names, e.g. "%(year)04d%(month)02d%(day)02d_"
        #[arg(long)]
        filename_format: Option<String>,

        /// Octal permission bits for filed files
        #[arg(long, value_parser = parse_mode)]
        mode: Option<u32>,

        /// Include hidden files
        #[arg(long)]
        include_hidden: bool,

        /// Decide everything but move nothing
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Output format
        #[arg(long, default_value = "pretty")]
        format: OutputFormat,
    },

    /// Regenerate the index from the files already in the library
    Rebuild {
        #[command(flatten)]
        library: LibraryArgs,

        /// Set the existing index aside and start empty
        #[arg(long)]
        fresh: bool,

        /// Output format
        #[arg(long, default_value = "pretty")]
        format: OutputFormat,
    },

    /// Copy every entry of one index into another
    Migrate {
        /// Index to read
        #[arg(long)]
        from: PathBuf,

        /// Index to write
        #[arg(long)]
        to: PathBuf,

        /// Backend of --from (guessed from the extension)
        #[arg(long)]
        from_backend: Option<BackendKind>,

        /// Backend of --to (guessed from the extension)
        #[arg(long)]
        to_backend: Option<BackendKind>,
    },

    /// Show how files would be grouped, fingerprinted and dated
    Inspect {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Where the library and its index live
#[derive(Args, Debug)]
struct LibraryArgs {
    /// Library root
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Index file
    #[arg(long)]
    index: Option<PathBuf>,

    /// Index backend
    #[arg(long)]
    backend: Option<BackendKind>,
}

impl LibraryArgs {
    fn apply(self, config: &mut SorterConfig) {
        if let Some(output) = self.output {
            config.output = Some(output);
        }
        if let Some(index) = self.index {
            config.index = Some(index);
        }
        if let Some(backend) = self.backend {
            config.backend = Some(backend);
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON summary for scripting
    Json,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Sort {
            sources,
            library,
            directory_format,
            filename_format,
            mode,
            include_hidden,
            dry_run,
            format,
        } => {
            let mut config = SorterConfig::load_or_default(cli.config.as_deref())?;
            if !sources.is_empty() {
                config.sources.clear();
                for source in sources {
                    config.add_source(source);
                }
            }
            library.apply(&mut config);
            if let Some(format) = directory_format {
                config.directory_format = format;
            }
            if filename_format.is_some() {
                config.filename_format = filename_format;
            }
            if let Some(mode) = mode {
                config.mode = mode;
            }
            run_sort(&config, include_hidden, dry_run, format, cli.verbose)
        }
        Commands::Rebuild {
            library,
            fresh,
            format,
        } => {
            let mut config = SorterConfig::load_or_default(cli.config.as_deref())?;
            library.apply(&mut config);
            run_rebuild(&config, fresh, format, cli.verbose)
        }
        Commands::Migrate {
            from,
            to,
            from_backend,
            to_backend,
        } => run_migrate(&from, &to, from_backend, to_backend),
        Commands::Inspect { files } => run_inspect(&files),
    }
}

fn open_index(config: &SorterConfig, fresh: bool) -> Result<DuplicateIndex> {
    let root = config.output_root()?;
    let path = config.index_path()?;
    let kind = config.backend_kind();
    if fresh {
        set_aside(&path)?;
    }
    info!("using {} index {}", kind, path.display());
    let backend = open_backend(kind, &path)?;
    Ok(DuplicateIndex::load(backend, root)?)
}

/// The index as it stands, for a run that must not write it
fn open_index_read_only(config: &SorterConfig) -> Result<DuplicateIndex> {
    let path = config.index_path()?;
    let kind = config.backend_kind();
    info!("using {} index {} (read only)", kind, path.display());
    let backend = open_backend_read_only(kind, &path)?;
    Ok(DuplicateIndex::load(backend, config.output_root()?)?)
}

/// Rename an index (and any SQLite journal files) to `<name>.bak`
fn set_aside(path: &Path) -> Result<()> {
    for suffix in ["", "-wal", "-shm"] {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        let current = PathBuf::from(name);
        if !current.exists() {
            continue;
        }
        let mut backup = current.as_os_str().to_owned();
        backup.push(".bak");
        fs::rename(&current, PathBuf::from(backup)).map_err(|source| IndexError::Io {
            path: current.clone(),
            source,
        })?;
    }
    Ok(())
}

fn progress_bar(format: OutputFormat) -> ProgressBar {
    if matches!(format, OutputFormat::Json) {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map(|s| s.progress_chars("█▓░"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// Render events on a separate thread until the sender is dropped
fn spawn_event_thread(receiver: EventReceiver, pb: ProgressBar, verbose: bool) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for event in receiver.iter() {
            match event {
                Event::Run(RunEvent::PhaseChanged { phase }) => pb.set_message(phase.to_string()),
                Event::Scan(ScanEvent::Completed { total_files }) => pb.set_length(total_files as u64),
                Event::Run(RunEvent::Progress(p)) => pb.set_position(p.processed as u64),
                Event::Unit(UnitEvent::Filed { from, to, .. }) if verbose => {
                    pb.println(format!("{} {} -> {}", style("filed").green(), display_path(&from), display_path(&to)));
                }
                Event::Unit(UnitEvent::WouldFile { from, to, .. }) => {
                    pb.println(format!("{} {} -> {}", style("would file").cyan(), display_path(&from), display_path(&to)));
                }
                Event::Unit(UnitEvent::Indexed { path, .. }) if verbose => {
                    pb.println(format!("{} {}", style("indexed").green(), display_path(&path)));
                }
                Event::Unit(UnitEvent::Duplicate {
                    path,
                    existing,
                    verified,
                    ..
                }) => {
                    let label = if verified {
                        style("duplicate").yellow()
                    } else {
                        style("duplicate?").yellow().bold()
                    };
                    pb.println(format!("{} {} = {}", label, display_path(&path), display_path(&existing)));
                }
                Event::Unit(UnitEvent::Skipped { path, reason }) => {
                    pb.println(format!("{} {}: {}", style("skipped").red(), display_path(&path), reason));
                }
                Event::Unit(UnitEvent::Failed { path, message }) => {
                    pb.println(format!("{} {}: {}", style("failed").red().bold(), display_path(&path), message));
                }
                Event::Run(RunEvent::Completed { .. }) | Event::Run(RunEvent::Error { .. }) => {
                    pb.finish_and_clear();
                }
                _ => {}
            }
        }
        pb.finish_and_clear();
    })
}

fn run_sort(
    config: &SorterConfig,
    include_hidden: bool,
    dry_run: bool,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let term = Term::stderr();
    if matches!(format, OutputFormat::Pretty) {
        term.write_line(&format!(
            "{} {}",
            style("Photo Inbox Sorter").bold().cyan(),
            style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    let sorter = Sorter::builder(config.output_root()?)
        .sources(config.source_dirs())
        .placement(config.placement()?)
        .include_hidden(include_hidden)
        .dry_run(dry_run)
        .build()?;
    let mut index = if dry_run {
        open_index_read_only(config)?
    } else {
        open_index(config, false)?
    };

    let (sender, receiver) = EventChannel::new();
    let event_thread = spawn_event_thread(receiver, progress_bar(format), verbose);

    let result = sorter.run_with_events(&mut index, &sender);

    drop(sender);
    event_thread.join().ok();

    let result = result?;
    if !dry_run {
        index.close()?;
    }

    match format {
        OutputFormat::Pretty => print_sort_results(&term, &result),
        OutputFormat::Json => print_json(&result.summary),
    }
    Ok(())
}

fn print_sort_results(term: &Term, result: &SortResult) {
    let summary = &result.summary;
    term.write_line("").ok();
    let title = if summary.dry_run { "Dry Run Complete" } else { "Sort Complete" };
    let mark = if summary.is_clean() {
        style("✓").green().bold()
    } else {
        style("!").yellow().bold()
    };
    term.write_line(&format!("{} {}", mark, title)).ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} files seen in {:.1}s ({} units)",
        style(summary.files_seen).cyan(),
        summary.duration_ms as f64 / 1000.0,
        summary.units
    ))
    .ok();
    let filed = if summary.dry_run { "would be filed" } else { "filed" };
    term.write_line(&format!("  {} {}", style(summary.filed).green(), filed)).ok();
    term.write_line(&format!("  {} duplicates left in place", style(summary.duplicates).yellow()))
        .ok();
    if summary.collisions > 0 {
        term.write_line(&format!(
            "  {} duplicates differ from the filed copy (hash collision)",
            style(summary.collisions).red().bold()
        ))
        .ok();
    }
    if summary.ambiguous > 0 {
        term.write_line(&format!(
            "  {} files in ambiguous same-name groups",
            style(summary.ambiguous).yellow()
        ))
        .ok();
    }
    if summary.skipped + summary.failed > 0 {
        term.write_line(&format!(
            "  {} skipped, {} failed",
            style(summary.skipped).red(),
            style(summary.failed).red()
        ))
        .ok();
    }

    print_errors(term, &result.errors);
}

fn run_rebuild(config: &SorterConfig, fresh: bool, format: OutputFormat, verbose: bool) -> Result<()> {
    let term = Term::stderr();
    let mut index = open_index(config, fresh)?;

    let mut rebuilder = IndexRebuilder::new();
    for source in config.source_dirs() {
        rebuilder = rebuilder.excluding(source);
    }

    let (sender, receiver) = EventChannel::new();
    let event_thread = spawn_event_thread(receiver, progress_bar(format), verbose);

    let result = rebuilder.run_with_events(&mut index, &sender);

    drop(sender);
    event_thread.join().ok();

    let result = result?;
    let location = index.location().to_path_buf();
    index.close()?;

    match format {
        OutputFormat::Pretty => print_rebuild_results(&term, &result, &location),
        OutputFormat::Json => print_json(&result.summary),
    }
    Ok(())
}

fn print_rebuild_results(term: &Term, result: &RebuildResult, location: &Path) {
    let summary = &result.summary;
    term.write_line(&format!(
        "{} Rebuilt {}",
        style("✓").green().bold(),
        display_path(location)
    ))
    .ok();
    term.write_line(&format!(
        "  {} indexed, {} already known, {} duplicates, {} skipped",
        style(summary.indexed).green(),
        summary.unchanged,
        style(summary.duplicates).yellow(),
        style(summary.skipped).red()
    ))
    .ok();
    print_errors(term, &result.errors);
}

fn run_migrate(
    from: &Path,
    to: &Path,
    from_backend: Option<BackendKind>,
    to_backend: Option<BackendKind>,
) -> Result<()> {
    let mut source = open_backend(from_backend.unwrap_or_else(|| BackendKind::from_path(from)), from)?;
    let mut target = open_backend(to_backend.unwrap_or_else(|| BackendKind::from_path(to)), to)?;

    let report = migrate(source.as_mut(), target.as_mut())?;
    source.close()?;
    target.close()?;

    Term::stderr()
        .write_line(&format!(
            "{} {} entries copied to {}, {} already present",
            style("✓").green().bold(),
            style(report.copied).cyan(),
            display_path(to),
            report.skipped
        ))
        .ok();
    Ok(())
}

fn run_inspect(files: &[PathBuf]) -> Result<()> {
    let term = Term::stdout();
    let reader = ExifReader;

    for path in files {
        term.write_line(&style(display_path(path)).bold().to_string()).ok();

        match classify(path) {
            Classification::Ambiguous { siblings, .. } => {
                term.write_line(&format!(
                    "  {} {} files share this name, treated one by one",
                    style("ambiguous").yellow(),
                    siblings.len()
                ))
                .ok();
            }
            Classification::Pair { media, sidecar, .. } => {
                term.write_line(&format!(
                    "  media {}, metadata from {}",
                    display_path(&media),
                    display_path(&sidecar)
                ))
                .ok();
            }
            Classification::Single { .. } => {}
        }

        let mut unit = MediaUnit::build_for(path);
        term.write_line(&format!("  type         {}", style(unit.kind()).cyan())).ok();

        let tags = reader.date_tags(unit.sidecar_path().unwrap_or(unit.primary_path()));
        if tags.has_data() {
            for (name, value) in [
                ("DateTimeOriginal", &tags.original),
                ("DateTime", &tags.image),
                ("DateTimeDigitized", &tags.digitized),
            ] {
                if let Some(value) = value {
                    term.write_line(&format!("  {:<18} {}", name, value)).ok();
                }
            }
        }

        match unit.capture_time(&reader) {
            Ok(time) => term.write_line(&format!("  captured     {}", time)).ok(),
            Err(e) => term.write_line(&format!("  captured     {}", style(e).red())).ok(),
        };
        match unit.fingerprint(&reader) {
            Ok(fingerprint) => term.write_line(&format!("  fingerprint  {}", fingerprint)).ok(),
            Err(e) => term.write_line(&format!("  fingerprint  {}", style(e).red())).ok(),
        };
        term.write_line("").ok();
    }
    Ok(())
}

fn print_errors(term: &Term, errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    term.write_line("").ok();
    term.write_line(&format!("{}", style("Problems:").bold().underlined())).ok();
    for error in errors {
        term.write_line(&format!("  {} {}", style("•").red(), error)).ok();
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("cannot render summary: {}", e),
    }
}

fn display_path(path: &Path) -> String {
    match dirs::home_dir().and_then(|home| path.strip_prefix(home).ok().map(Path::to_path_buf)) {
        Some(relative) => format!("~/{}", relative.display()),
        None => path.display().to_string(),
    }
}
