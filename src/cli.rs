// Photo Gallery CLI binary

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Parser, Subcommand};

use photo_gallery_lib::access;
use photo_gallery_lib::config::Settings;
use photo_gallery_lib::db::catalog::require_by_id;
use photo_gallery_lib::db::schema::{self, MediaEntity};
use photo_gallery_lib::db::{self, SqliteCatalog};
use photo_gallery_lib::{GalleryError, Indexer, TimestampResolver, ViewCache, ViewKey};

#[derive(Parser)]
#[command(name = "photogallery")]
#[command(about = "Photo Gallery - index and browse a dated photo/video library", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (defaults to PHOTOGALLERY_CONFIG, then the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Catalog database path (overrides settings)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Principal whose access rules apply to listings
    #[arg(long, global = true, default_value = "")]
    principal: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the catalog with the library roots
    Index {
        /// Roots to index (defaults to the configured roots)
        roots: Vec<PathBuf>,
        /// Worker threads for timestamp resolution
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// List the library roots and the years with content
    Roots,

    /// Resolve the timestamp of one file without touching the catalog
    Resolve {
        file: PathBuf,
    },

    /// List a folder of the library
    Folder {
        path: PathBuf,
    },

    /// List a calendar year, grouped by month
    Year {
        year: i32,
    },

    /// Show one entry and its neighbours in a view
    Show {
        id: i64,
        /// Navigate within this year
        #[arg(long, conflicts_with = "folder")]
        year: Option<i32>,
        /// Navigate within this folder
        #[arg(long)]
        folder: Option<PathBuf>,
    },

    /// Set or clear the manual date of an entry
    SetDate {
        id: i64,
        /// RFC 3339 timestamp, e.g. 2019-07-04T10:00:00Z
        #[arg(required_unless_present = "clear")]
        date: Option<String>,
        #[arg(long, conflicts_with = "date")]
        clear: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::locate(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        settings.database.path = Some(database);
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.logging.level.clone()),
    )
    .init();

    match cli.command {
        Commands::Index { roots, workers } => cmd_index(settings, roots, workers),
        Commands::Roots => cmd_roots(settings, &cli.principal),
        Commands::Resolve { file } => cmd_resolve(&settings, file),
        Commands::Folder { path } => cmd_folder(settings, &cli.principal, path),
        Commands::Year { year } => cmd_year(settings, &cli.principal, year),
        Commands::Show { id, year, folder } => cmd_show(settings, &cli.principal, id, year, folder),
        Commands::SetDate { id, date, clear } => cmd_set_date(&settings, id, date, clear),
    }
}

fn open_catalog(settings: &Settings) -> Result<Arc<SqliteCatalog>> {
    let path = settings.database.resolved_path();
    let conn = db::open_db(&path)
        .with_context(|| format!("Failed to open catalog at {}", path.display()))?;
    Ok(Arc::new(SqliteCatalog::new(conn)))
}

fn view_cache(mut settings: Settings) -> Result<ViewCache> {
    settings.validate_roots()?;
    let store = open_catalog(&settings)?;
    let access = access::from_settings(settings.access.rules_file.as_deref());
    Ok(ViewCache::new(
        store,
        Arc::from(access),
        settings.library.roots.clone(),
        settings.library.extensions(),
    ))
}

fn cmd_index(mut settings: Settings, roots: Vec<PathBuf>, workers: Option<usize>) -> Result<()> {
    if !roots.is_empty() {
        settings.library.roots = roots;
    }
    if settings.library.roots.is_empty() {
        anyhow::bail!("No library roots configured. Pass them as arguments or set [library] roots.");
    }

    let store = open_catalog(&settings)?;
    let resolver = Arc::new(TimestampResolver::new(settings.library.extensions()));
    let indexer = Indexer::new(store, resolver)
        .with_workers(workers.unwrap_or(settings.indexer.workers));

    let report = indexer.reconcile(&settings.library.roots)?;

    println!("Index complete:");
    println!("  Discovered:     {}", report.discovered);
    println!("  Already known:  {}", report.existing);
    println!("  Added:          {}", report.added);
    println!("  Removed:        {}", report.removed);
    println!("  Clones skipped: {}", report.clones_skipped);
    println!("  Failed:         {}", report.failed);
    println!("  Catalog size:   {}", report.catalog_size);
    if report.cancelled {
        println!("  (cancelled before all files were processed)");
    }

    Ok(())
}

fn cmd_roots(settings: Settings, principal: &str) -> Result<()> {
    let views = view_cache(settings)?;

    println!("Folders:");
    let roots = views.root_folders(principal);
    if roots.is_empty() {
        println!("  (none)");
    }
    for root in &roots {
        println!("  {}", root.display());
    }

    println!();
    println!("Years:");
    let years = views.years(principal)?;
    if years.is_empty() {
        println!("  (none)");
    }
    for year in years {
        println!("  {}", year);
    }
    Ok(())
}

fn cmd_resolve(settings: &Settings, file: PathBuf) -> Result<()> {
    let resolver = TimestampResolver::new(settings.library.extensions());
    let resolution = resolver.resolve(&file);

    println!("File:        {}", file.display());
    println!("Timestamp:   {}", format_ms(resolution.timestamp));
    println!("Source:      {}", resolution.provenance);
    if resolution.extraction_failed {
        println!("Metadata:    unreadable (would be flagged broken)");
    }
    Ok(())
}

fn cmd_folder(settings: Settings, principal: &str, path: PathBuf) -> Result<()> {
    let views = view_cache(settings)?;
    let listing = views.folder_listing(principal, &path)?;

    println!("Folder: {}", listing.folder.display());
    println!("Parent: {}", listing.parent.display());
    for sub in &listing.sub_folders {
        println!("  [dir] {}", sub.display());
    }
    print_entries(&listing.entries);
    Ok(())
}

fn cmd_year(settings: Settings, principal: &str, year: i32) -> Result<()> {
    let views = view_cache(settings)?;
    let listing = views.year_listing(principal, year)?;

    println!("Year {}", listing.year);
    for month in listing.months.iter().filter(|m| !m.entries.is_empty()) {
        println!();
        println!("{} ({})", month.name, month.entries.len());
        print_entries(&month.entries);
    }
    Ok(())
}

fn cmd_show(
    settings: Settings,
    principal: &str,
    id: i64,
    year: Option<i32>,
    folder: Option<PathBuf>,
) -> Result<()> {
    let views = view_cache(settings)?;

    // Build the view first, as a browser would have shown it
    let key = match (year, folder) {
        (Some(year), _) => {
            views.year_listing(principal, year)?;
            ViewKey::year(principal, year)
        }
        (None, Some(folder)) => {
            views.folder_listing(principal, &folder)?;
            ViewKey::folder(principal, &folder)
        }
        (None, None) => anyhow::bail!("Pass --year or --folder to pick a view"),
    };

    let (entity, position) = views
        .media_with_position(id, &key)?
        .ok_or(GalleryError::MediaNotFound(id))?;

    println!("Media #{}", entity.id);
    println!();
    println!("Name:        {}", entity.file_name);
    println!("Path:        {}", entity.full_path);
    println!("Date:        {}", format_ms(entity.effective_timestamp()));
    println!("Source:      {}", entity.timestamp_source);
    if entity.override_timestamp.is_some() {
        println!("Parsed date: {}", format_ms(entity.parsed_timestamp));
    }
    println!("Final:       {}", if entity.is_final { "yes" } else { "no" });
    println!("Broken:      {}", if entity.is_broken { "yes" } else { "no" });
    println!();
    println!("Position:    {} of {}", position.position, position.total);
    println!("Previous:    #{}", position.prev_id);
    println!("Next:        #{}", position.next_id);
    Ok(())
}

fn cmd_set_date(settings: &Settings, id: i64, date: Option<String>, clear: bool) -> Result<()> {
    let store = open_catalog(settings)?;
    let entity = require_by_id(store.as_ref(), id)?;

    let override_ts = if clear {
        None
    } else {
        let raw = date.unwrap_or_default();
        let parsed = DateTime::parse_from_rfc3339(&raw)
            .with_context(|| format!("Invalid date '{}', expected RFC 3339", raw))?;
        Some(parsed.timestamp_millis())
    };

    store.with_connection(|conn| schema::set_override_timestamp(conn, entity.id, override_ts))?;

    match override_ts {
        Some(ts) => println!("Media #{} now dated {}", entity.id, format_ms(ts)),
        None => println!("Media #{} reverted to {}", entity.id, format_ms(entity.parsed_timestamp)),
    }
    Ok(())
}

fn print_entries(entries: &[MediaEntity]) {
    if entries.is_empty() {
        println!("  (no media)");
        return;
    }
    println!("  {:>6}  {:<20}  {:<19}  {}", "ID", "Date", "Source", "Name");
    for e in entries {
        println!(
            "  {:>6}  {:<20}  {:<19}  {}{}",
            e.id,
            format_ms(e.effective_timestamp()),
            e.timestamp_source,
            e.file_name,
            if e.is_broken { " [broken]" } else { "" }
        );
    }
}

fn format_ms(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| ms.to_string())
}
