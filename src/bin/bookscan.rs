//! CLI binary for bookscan.
//!
//! A thin shim over the library crate that maps flags and environment
//! variables to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use bookscan::{
    extract, extract_to_zip, inspect, ExtractionConfig, ExtractionProgressCallback,
    ExtractionReport, PageRange, PageSelection, PageSeparator, ProgressCallback, RangeTable,
    ARABIC_SCRIPT_PATTERN,
};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── Terminal styling ─────────────────────────────────────────────────────────

/// ANSI styles for status output.
#[derive(Clone, Copy)]
enum Paint {
    Good,
    Bad,
    Warn,
    Faint,
    Strong,
}

impl Paint {
    fn on(self, s: impl Display) -> String {
        let code = match self {
            Paint::Good => "32",
            Paint::Bad => "31",
            Paint::Warn => "33",
            Paint::Faint => "2",
            Paint::Strong => "1",
        };
        format!("\x1b[{code}m{s}\x1b[0m")
    }

    /// Status mark for a run with `failed` of `total` pages failed.
    fn verdict(failed: usize, total: usize) -> String {
        match failed {
            0 => Paint::Good.on("✔"),
            f if f == total => Paint::Bad.on("✘"),
            _ => Paint::Warn.on("⚠"),
        }
    }
}

// ── Progress bar ─────────────────────────────────────────────────────────────

/// Page counter bar with one line per page above it.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::hidden();
        bar.set_style(
            ProgressStyle::with_template(
                "{prefix:.bold} [{wide_bar:.green/238}] {pos}/{len}  {elapsed}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
        );
        bar.set_prefix("Scanning");
        Arc::new(Self { bar })
    }

    fn line(&self, mark: String, page_num: usize, detail: String) {
        self.bar.println(format!("  {mark} page {page_num:>4}  {detail}"));
        self.bar.inc(1);
    }
}

impl ExtractionProgressCallback for BarProgress {
    fn on_extraction_start(&self, total_pages: usize) {
        self.bar.set_length(total_pages as u64);
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
        self.bar.enable_steady_tick(Duration::from_millis(120));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, _total: usize, text_len: usize) {
        let detail = match text_len {
            0 => "no text".to_string(),
            n => format!("{n} bytes"),
        };
        self.line(Paint::Good.on("✓"), page_num, Paint::Faint.on(detail));
    }

    fn on_page_error(&self, page_num: usize, _total: usize, error: &str) {
        let mut msg: String = error.chars().take(80).collect();
        if msg.len() < error.len() {
            msg.push('…');
        }
        self.line(Paint::Bad.on("✗"), page_num, Paint::Bad.on(msg));
    }

    fn on_extraction_complete(&self, _total_pages: usize, _failed_pages: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Two chapters from uploads/book.pdf
  bookscan extract --range 1-3=intro.md --range 4-10=body.md

  # Range table from JSON, images and text in a book folder
  bookscan extract --pdf book.pdf --ranges chapters.json \
      --images book/images --text book/content

  # Default output names (range_1_3.md, range_4_10.md)
  bookscan extract --range 1-3 --range 4-10

  # Urdu book: language hint and keep only Arabic-script lines
  bookscan extract --range 5-200=book.md --lang ur --arabic-script-only

  # One text file per page, zipped
  bookscan bundle --pdf book.pdf -o pages.zip

  # PDF metadata (no credentials needed)
  bookscan inspect book.pdf

RANGE TABLE (JSON):
  [{"start": 1, "end": 3, "output": "intro.md"},
   {"start": 4, "end": 10, "output": "body.md"}]

ENVIRONMENT VARIABLES:
  GOOGLE_VISION_API_KEY           Google Cloud Vision API key
  GOOGLE_APPLICATION_CREDENTIALS  JSON file with "api_key" or "access_token"
  UPLOAD_FOLDER                   Folder holding the PDF (default: uploads)
  PDF_FILENAME                    PDF file name (default: book.pdf)
  IMAGES_FOLDER                   Rendered page images (default: images)
  TEXT_FILES_FOLDER               Range output files (default: text)
  BOOKSCAN_DPI                    Rendering DPI (default: 300)
  PDFIUM_LIB_PATH                 libpdfium file or directory
  RUST_LOG                        Log filter, e.g. bookscan=debug
"#;

/// Rasterise scanned book PDFs and OCR page ranges into chapter files.
#[derive(Parser, Debug)]
#[command(
    name = "bookscan",
    version,
    about = "Rasterise scanned book PDFs and OCR page ranges into chapter files",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "BOOKSCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "BOOKSCAN_QUIET")]
    quiet: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "BOOKSCAN_NO_PROGRESS")]
    no_progress: bool,

    /// libpdfium file or directory containing it.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render every page and append OCR text to each range's output file.
    Extract(ExtractArgs),
    /// OCR every page into page_<N>.txt and write them to a zip archive.
    Bundle(BundleArgs),
    /// Print PDF metadata only.
    Inspect(InspectArgs),
}

/// Where the PDF comes from.
#[derive(Args, Debug)]
struct PdfArgs {
    /// PDF path. Overrides --upload-folder/--pdf-filename.
    #[arg(long)]
    pdf: Option<PathBuf>,

    /// Folder holding the PDF.
    #[arg(long, env = "UPLOAD_FOLDER", default_value = "uploads")]
    upload_folder: PathBuf,

    /// PDF file name inside the upload folder.
    #[arg(long, env = "PDF_FILENAME", default_value = "book.pdf")]
    pdf_filename: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "BOOKSCAN_PASSWORD")]
    password: Option<String>,
}

impl PdfArgs {
    fn path(&self) -> PathBuf {
        self.pdf
            .clone()
            .unwrap_or_else(|| self.upload_folder.join(&self.pdf_filename))
    }
}

/// Rendering and OCR settings shared by `extract` and `bundle`.
#[derive(Args, Debug)]
struct ScanArgs {
    /// Rendering DPI (72–600).
    #[arg(long, env = "BOOKSCAN_DPI", default_value_t = bookscan::DEFAULT_DPI,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Page selection: all, 5, 3-15, or a list such as 1,3,7-9.
    #[arg(long, default_value = "all")]
    pages: String,

    /// OCR language hint (repeatable), e.g. --lang ur.
    #[arg(long = "lang")]
    languages: Vec<String>,

    /// Keep only OCR lines matching this regex.
    #[arg(long, conflicts_with = "arabic_script_only")]
    line_filter: Option<String>,

    /// Keep only lines containing Arabic-script characters.
    #[arg(long)]
    arabic_script_only: bool,

    /// Retries per page on transient OCR failures (0–10).
    #[arg(long, default_value_t = 2,
          value_parser = clap::value_parser!(u32).range(0..=i64::from(bookscan::MAX_RETRIES_LIMIT)))]
    max_retries: u32,

    /// Per-request OCR timeout in seconds.
    #[arg(long, default_value_t = 60)]
    api_timeout: u64,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    #[command(flatten)]
    pdf: PdfArgs,

    #[command(flatten)]
    scan: ScanArgs,

    /// Page range START-END[=FILE] or PAGE[=FILE] (repeatable).
    #[arg(long = "range", value_name = "RANGE")]
    ranges: Vec<PageRange>,

    /// JSON file with the range table.
    #[arg(long = "ranges", value_name = "FILE.json")]
    ranges_file: Option<PathBuf>,

    /// Folder for rendered page images.
    #[arg(long, env = "IMAGES_FOLDER", default_value = "images")]
    images: PathBuf,

    /// Folder for range output files.
    #[arg(long, env = "TEXT_FILES_FOLDER", default_value = "text")]
    text: PathBuf,

    /// Page marker: none, hr, comment, or a custom string with {page}.
    #[arg(long, default_value = "comment")]
    separator: String,

    /// Exit with an error when any page failed.
    #[arg(long)]
    strict: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct BundleArgs {
    #[command(flatten)]
    pdf: PdfArgs,

    #[command(flatten)]
    scan: ScanArgs,

    /// Zip archive to write.
    #[arg(short, long, default_value = "pages.zip")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// PDF file.
    pdf: PathBuf,

    /// Print metadata as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO-level library logs would tear through the progress bar; the bar
    // reports everything the user needs.
    let json = matches!(&cli.command, Command::Extract(a) if a.json)
        || matches!(&cli.command, Command::Inspect(a) if a.json);
    let uses_bar = !matches!(cli.command, Command::Inspect(_));
    let show_progress = uses_bar && !cli.quiet && !cli.no_progress && !json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(BarProgress::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    match &cli.command {
        Command::Inspect(args) => run_inspect(&cli, args).await,
        Command::Extract(args) => run_extract(&cli, args, progress_cb).await,
        Command::Bundle(args) => run_bundle(&cli, args, progress_cb).await,
    }
}

async fn run_inspect(cli: &Cli, args: &InspectArgs) -> Result<()> {
    let meta = inspect(&args.pdf, cli.pdfium_lib.as_deref())
        .await
        .context("Failed to inspect PDF")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
        );
        return Ok(());
    }

    let pages = meta.page_count.to_string();
    let fields = [
        ("File", Some(args.pdf.display().to_string())),
        ("Title", meta.title),
        ("Author", meta.author),
        ("Subject", meta.subject),
        ("Pages", Some(pages)),
        ("PDF version", Some(meta.pdf_version)),
        ("Creator", meta.creator),
        ("Producer", meta.producer),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            println!("{:<13} {}", format!("{label}:"), value);
        }
    }
    Ok(())
}

async fn run_extract(
    cli: &Cli,
    args: &ExtractArgs,
    progress: Option<ProgressCallback>,
) -> Result<()> {
    let ranges = load_ranges(&args.ranges, args.ranges_file.as_deref()).await?;

    let builder = ExtractionConfig::builder()
        .pdf_path(args.pdf.path())
        .images_dir(&args.images)
        .text_dir(&args.text)
        .ranges(ranges)
        .page_separator(parse_separator(&args.separator));
    let config = scan_config(cli, &args.pdf, &args.scan, builder, progress)?;

    let report = extract(&config).await.context("Extraction failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&report, &args.text);
    }

    if args.strict {
        report.into_result().context("Some pages failed")?;
    }
    Ok(())
}

async fn run_bundle(cli: &Cli, args: &BundleArgs, progress: Option<ProgressCallback>) -> Result<()> {
    let config = scan_config(cli, &args.pdf, &args.scan, ExtractionConfig::builder(), progress)?;

    let report = extract_to_zip(args.pdf.path(), &args.output, &config)
        .await
        .context("Bundling failed")?;

    if !cli.quiet {
        let s = &report.stats;
        eprintln!(
            "{}  {} page files  {}ms  →  {}",
            Paint::verdict(s.failed_pages, s.selected_pages),
            s.selected_pages,
            s.total_duration_ms,
            Paint::Strong.on(args.output.display()),
        );
    }
    Ok(())
}

/// Apply the flags shared by `extract` and `bundle` and build the config.
fn scan_config(
    cli: &Cli,
    pdf: &PdfArgs,
    scan: &ScanArgs,
    mut builder: bookscan::ExtractionConfigBuilder,
    progress: Option<ProgressCallback>,
) -> Result<ExtractionConfig> {
    builder = builder
        .dpi(scan.dpi)
        .pages(parse_pages(&scan.pages)?)
        .language_hints(scan.languages.iter().cloned())
        .max_retries(scan.max_retries)
        .api_timeout_secs(scan.api_timeout);

    if scan.arabic_script_only {
        builder = builder.line_filter(ARABIC_SCRIPT_PATTERN);
    } else if let Some(ref pattern) = scan.line_filter {
        builder = builder.line_filter(pattern.as_str());
    }
    if let Some(ref pwd) = pdf.password {
        builder = builder.password(pwd.as_str());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Merge `--range` flags with an optional `--ranges` JSON file.
async fn load_ranges(flags: &[PageRange], file: Option<&Path>) -> Result<RangeTable> {
    let mut ranges = flags.to_vec();
    if let Some(path) = file {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read range table {:?}", path))?;
        let table = RangeTable::from_json(&json)
            .with_context(|| format!("Invalid range table {:?}", path))?;
        ranges.extend(table.ranges().iter().cloned());
    }
    if ranges.is_empty() {
        anyhow::bail!("No page ranges given; use --range START-END[=FILE] or --ranges FILE.json");
    }
    RangeTable::new(ranges).context("Invalid page ranges")
}

fn print_summary(report: &ExtractionReport, text_dir: &Path) {
    let s = &report.stats;
    eprintln!(
        "{}  {} with text, {} empty, {} unranged, {} failed  {}ms",
        Paint::verdict(s.failed_pages, s.selected_pages),
        s.extracted_pages,
        s.empty_pages,
        s.unmapped_pages,
        s.failed_pages,
        s.total_duration_ms,
    );
    for output in &report.outputs {
        let shown = output.strip_prefix(text_dir).unwrap_or(output.as_path());
        eprintln!("   {} {}", Paint::Faint.on("→"), shown.display());
    }
    for error in report.failures() {
        eprintln!("   {} {}", Paint::Bad.on("✗"), error);
    }
}

/// Parse `--pages`: `all`, or comma-separated page numbers and `A-B` spans.
///
/// One number gives `Single`, one span gives `Range`, anything longer is
/// flattened into a `Set`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("all") {
        return Ok(PageSelection::All);
    }

    let spans = s
        .split(',')
        .map(|token| parse_span(token.trim()))
        .collect::<Result<Vec<_>>>()?;

    Ok(match spans[..] {
        [(a, b)] if a == b => PageSelection::Single(a),
        [(a, b)] => PageSelection::Range(a, b),
        _ => PageSelection::Set(spans.iter().flat_map(|&(a, b)| a..=b).collect()),
    })
}

/// `N` or `A-B`, 1-based and inclusive.
fn parse_span(token: &str) -> Result<(usize, usize)> {
    let number = |t: &str| -> Result<usize> {
        let n: usize = t
            .trim()
            .parse()
            .with_context(|| format!("Invalid page number '{}'", t.trim()))?;
        anyhow::ensure!(n >= 1, "Pages start at 1 (got '{token}')");
        Ok(n)
    };
    let (a, b) = match token.split_once('-') {
        Some((a, b)) => (number(a)?, number(b)?),
        None => {
            let n = number(token)?;
            (n, n)
        }
    };
    anyhow::ensure!(a <= b, "Page span '{token}' runs backwards");
    Ok((a, b))
}

/// Parse `--separator` string into `PageSeparator`.
fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "none" => PageSeparator::None,
        "hr" | "---" => PageSeparator::HorizontalRule,
        "comment" => PageSeparator::Comment,
        _ => PageSeparator::Custom(s.to_string()),
    }
}
