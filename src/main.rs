// src/main.rs
mod extractors;
mod sources;
mod storage;
mod utils;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use extractors::{definitions_for, normalize_text, SectionExtractor, SectionId};
use sources::client::DEFAULT_TIMEOUT_SECS;
use sources::{gather_sources, load_cookies, load_document_text, DocumentClient, DocumentSource};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use storage::{ExtractionEntry, StorageManager};
use utils::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            // tracing has no level above error
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

/// Extracts CBIT baseline sections from UNFCCC country reports
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Country name (prompted for when omitted)
    #[arg(short, long)]
    country: Option<String>,

    /// Sections to extract, comma separated (default: all)
    #[arg(short, long, value_enum, value_delimiter = ',')]
    sections: Vec<SectionId>,

    /// Output directory for bundles and country records
    #[arg(short, long, default_value = "data")]
    output_dir: PathBuf,

    /// Directory where downloaded documents are cached
    #[arg(long, default_value = "downloads")]
    download_dir: PathBuf,

    /// JSON file with cookies sent on every download
    #[arg(long)]
    cookies_file: Option<PathBuf>,

    /// Local document to process (repeatable)
    #[arg(long = "local-doc", visible_alias = "local-pdf")]
    local_docs: Vec<PathBuf>,

    /// Directory whose documents are all processed
    #[arg(long, visible_alias = "local-pdf-dir")]
    local_doc_dir: Option<PathBuf>,

    /// Document URL to download and process (repeatable)
    #[arg(long = "document-url")]
    document_urls: Vec<String>,

    /// Do not download anything, only process local documents
    #[arg(long)]
    skip_scrape: bool,

    /// Re-download and re-extract even when cached results exist
    #[arg(long)]
    force_scrape: bool,

    /// Default log level when RUST_LOG is not set
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Drop sections shorter than this many bytes (0 disables the check)
    #[arg(long, default_value_t = 0)]
    min_section_size: usize,

    /// Per-request HTTP timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
struct RunConfig {
    country: String,
    sections: Vec<SectionId>,
    output_dir: PathBuf,
    download_dir: PathBuf,
    cookies_file: Option<PathBuf>,
    local_docs: Vec<PathBuf>,
    local_doc_dir: Option<PathBuf>,
    document_urls: Vec<String>,
    skip_scrape: bool,
    force_scrape: bool,
    min_section_size: usize,
    timeout: Duration,
}

impl RunConfig {
    fn from_args<R: BufRead, W: Write>(args: Args, input: &mut R, output: &mut W) -> Result<Self, AppError> {
        let country = match args.country.as_deref().map(str::trim) {
            Some(country) if !country.is_empty() => country.to_string(),
            _ => prompt_country(input, output)?,
        };

        let sections = if args.sections.is_empty() {
            SectionId::ALL.to_vec()
        } else {
            let mut sections = args.sections;
            sections.sort();
            sections.dedup();
            sections
        };

        if args.skip_scrape && args.force_scrape {
            tracing::warn!("--skip-scrape and --force-scrape both set; nothing will be downloaded");
        }

        Ok(Self {
            country,
            sections,
            output_dir: args.output_dir,
            download_dir: args.download_dir,
            cookies_file: args.cookies_file,
            local_docs: args.local_docs,
            local_doc_dir: args.local_doc_dir,
            document_urls: args.document_urls,
            skip_scrape: args.skip_scrape,
            force_scrape: args.force_scrape,
            min_section_size: args.min_section_size,
            timeout: Duration::from_secs(args.timeout_secs),
        })
    }
}

fn prompt_country<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<String, AppError> {
    write!(output, "Country name: ")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    let country = line.trim();
    if country.is_empty() {
        return Err(AppError::Config("A country name is required".to_string()));
    }
    Ok(country.to_string())
}

fn write_bundles(
    storage: &StorageManager,
    grouped: &BTreeMap<SectionId, Vec<ExtractionEntry>>,
) -> Result<(), AppError> {
    for (section, entries) in grouped {
        let path = storage.write_section_outputs(*section, entries)?;
        tracing::info!("{}: {} entr(ies) -> {}", section.display_name(), entries.len(), path.display());
    }
    Ok(())
}

/// Fetches, normalizes and extracts one document.
async fn process_document(
    client: &DocumentClient,
    extractor: &SectionExtractor,
    source: &DocumentSource,
    country: &str,
) -> Result<Vec<(SectionId, ExtractionEntry)>, AppError> {
    let path = client.fetch(source).await?;
    let raw = load_document_text(&path).await?;
    let text = normalize_text(&raw);
    tracing::info!("Loaded {} ({} chars after normalization)", source.title, text.len());

    let timestamp = Utc::now();
    let entries = extractor
        .extract(&text, &source.title)
        .into_iter()
        .filter_map(|section| {
            let id = SectionId::from_display_name(&section.name)?;
            tracing::debug!("{} / {} extracted via {:?}", source.source_doc, section.name, section.method);
            let entry = ExtractionEntry::new(country, id, &source.source_doc, &source.url, &section.text, timestamp);
            Some((id, entry))
        })
        .collect();
    Ok(entries)
}

async fn run(config: RunConfig) -> Result<(), AppError> {
    let storage = StorageManager::new(&config.output_dir)?;

    // Reuse the stored country record unless asked to redo the work
    if !config.force_scrape && !config.skip_scrape {
        if let Some(record) = storage.load_country_record(&config.country)? {
            let grouped = record.to_entries(&config.sections, Utc::now());
            if !grouped.is_empty() {
                tracing::info!("Using cached record for {}; pass --force-scrape to re-extract", config.country);
                return write_bundles(&storage, &grouped);
            }
            tracing::info!("Cached record for {} has none of the requested sections", config.country);
        }
    }

    let cookies = match &config.cookies_file {
        Some(path) => load_cookies(path)?,
        None => BTreeMap::new(),
    };

    let urls: &[String] = if config.skip_scrape {
        if !config.document_urls.is_empty() {
            tracing::info!("Skipping {} document URL(s) (--skip-scrape)", config.document_urls.len());
        }
        &[]
    } else {
        &config.document_urls
    };
    let sources = gather_sources(urls, &config.local_docs, config.local_doc_dir.as_deref());
    if sources.is_empty() {
        tracing::warn!("No documents to process for {}", config.country);
        return Ok(());
    }

    let client = DocumentClient::new(&cookies, config.timeout, &config.download_dir, config.force_scrape)?;
    let definitions = definitions_for(&config.sections, Some(&config.country));
    let extractor = SectionExtractor::new(&definitions).with_min_section_size(config.min_section_size);

    let mut grouped: BTreeMap<SectionId, Vec<ExtractionEntry>> = BTreeMap::new();
    let mut success_count = 0;
    let mut failure_count = 0;

    for source in &sources {
        tracing::info!("Processing {} ({})", source.title, source.source_doc);
        match process_document(&client, &extractor, source, &config.country).await {
            Ok(entries) => {
                tracing::info!("Extracted {} section(s) from {}", entries.len(), source.title);
                success_count += 1;
                for (section, entry) in entries {
                    grouped.entry(section).or_default().push(entry);
                }
            }
            Err(e) => {
                tracing::error!("Failed to process {}: {}", source.url, e);
                failure_count += 1;
            }
        }
    }

    write_bundles(&storage, &grouped)?;

    let all_entries: Vec<ExtractionEntry> = grouped.into_values().flatten().collect();
    if !all_entries.is_empty() {
        storage.upsert_country_record(&config.country, &all_entries)?;
    }

    tracing::info!("Processing finished. Success: {}, Failures: {}", success_count, failure_count);

    if success_count == 0 && failure_count > 0 {
        return Err(AppError::Processing(format!(
            "Failed to process any of {} document(s) for {}",
            failure_count, config.country
        )));
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();

    // RUST_LOG takes precedence over --log-level
    utils::logging::setup_logging(args.log_level.as_filter());
    tracing::debug!("Starting with args: {:?}", args);

    let stdin = std::io::stdin();
    let config = RunConfig::from_args(args, &mut stdin.lock(), &mut std::io::stdout())?;
    tracing::info!(
        "Extracting {} section(s) for {}",
        config.sections.len(),
        config.country
    );

    run(config).await
}
