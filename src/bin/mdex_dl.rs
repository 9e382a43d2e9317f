use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use mdex_dl::app::{App, MangaRequest, PlanResult};
use mdex_dl::batch::{BatchRequest, OutputMode as BatchMode};
use mdex_dl::config::{ConfigLoader, ResolvedConfig};
use mdex_dl::domain::Quality;
use mdex_dl::error::MdexError;
use mdex_dl::fetch::HttpFetcher;
use mdex_dl::mangadex::{MangadexClient, extract_chapter_id, extract_manga_id};
use mdex_dl::output::{HumanOutput, JsonOutput, OutputMode};

const EXIT_REQUEST: u8 = 1;
const EXIT_DOWNLOAD: u8 = 2;
const EXIT_USAGE: u8 = 3;

#[derive(Parser)]
#[command(name = "mdex-dl")]
#[command(about = "Download chapters from MangaDex concurrently, as folders or archives")]
#[command(version, author)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Engine/API settings file (defaults to ./mdex-dl.json when present)"
    )]
    config: Option<String>,

    #[arg(long, global = true, help = "Print plans and reports as JSON on stdout")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(visible_alias = "m", about = "Download multiple chapters from a manga")]
    Manga(MangaArgs),
    #[command(visible_alias = "c", about = "Download a single chapter")]
    Chapter(ChapterArgs),
}

#[derive(Args)]
struct MangaArgs {
    #[arg(help = "Manga id or url")]
    input: String,

    #[arg(help = "Folder to save downloaded chapters in (current folder if omitted)")]
    output: Option<Utf8PathBuf>,

    #[arg(
        short,
        long,
        default_value = "chapter_",
        help = "Prefix of downloaded folders or archives; `:id` is the position, `:m` the manga title"
    )]
    prefix: String,

    #[arg(short, long, value_delimiter = ',', help = "Chapters to download")]
    chapters: Vec<String>,

    #[arg(short, long, value_delimiter = ',', help = "Volumes to download")]
    volumes: Vec<String>,

    #[arg(
        short = 'C',
        long,
        value_delimiter = ',',
        allow_negative_numbers = true,
        help = "Inclusive chapter range, two values separated by a comma"
    )]
    chapter_range: Vec<f64>,

    #[arg(
        short = 'V',
        long,
        value_delimiter = ',',
        allow_negative_numbers = true,
        help = "Inclusive volume range, two values separated by a comma"
    )]
    volume_range: Vec<f64>,

    #[arg(short, long, default_value = "en", help = "Translated language")]
    language: String,

    #[arg(
        short,
        long,
        value_delimiter = ',',
        help = "Preferred scanlation groups, earlier ones win when a chapter has several versions"
    )]
    groups: Vec<String>,

    #[arg(short, long, help = "Pack each chapter into an archive with this extension (e.g. cbz)")]
    archive: Option<String>,

    #[arg(short = 'n', long, help = "Only print the chapters that would be downloaded")]
    dry_run: bool,

    #[arg(short, long, help = "Download original quality images instead of data-saver ones")]
    raw: bool,

    #[arg(long, help = "Page through the whole feed instead of the first 500 chapters")]
    all: bool,

    #[arg(
        short = 'L',
        long,
        help = "Only the last N chapters; cannot be combined with chapter or volume filters"
    )]
    last: Option<usize>,
}

#[derive(Args)]
struct ChapterArgs {
    #[arg(help = "Chapter id or url")]
    input: String,

    #[arg(help = "Folder (or archive name when --archive is set) to save the chapter to")]
    output: Option<Utf8PathBuf>,

    #[arg(short, long, help = "Pack the chapter into an archive with this extension (e.g. cbz)")]
    archive: Option<String>,

    #[arg(short, long, help = "Download original quality images instead of data-saver ones")]
    raw: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(err) = report.downcast_ref::<MdexError>() {
                return ExitCode::from(map_exit_code(err));
            }
            ExitCode::from(EXIT_REQUEST)
        }
    }
}

fn map_exit_code(error: &MdexError) -> u8 {
    if error.is_usage() {
        return EXIT_USAGE;
    }
    match error {
        MdexError::Transport { .. }
        | MdexError::Remote { .. }
        | MdexError::UnexpectedContentType { .. }
        | MdexError::EmptyUnit(_)
        | MdexError::Timeout { .. }
        | MdexError::WorkerLost(_)
        | MdexError::Spawn { .. }
        | MdexError::Filesystem(_) => EXIT_DOWNLOAD,
        _ => EXIT_REQUEST,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Manga(args) => run_manga(args, &config, output_mode),
        Commands::Chapter(args) => run_chapter(args, &config, output_mode),
    }
}

fn build_app(config: &ResolvedConfig) -> Result<App<MangadexClient, HttpFetcher>, MdexError> {
    let source = MangadexClient::new(&config.api, config.engine.request_timeout)?;
    let fetcher = HttpFetcher::new(config.engine.request_timeout)?;
    Ok(App::new(source, fetcher, config.engine.clone()))
}

fn run_manga(
    args: MangaArgs,
    config: &ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<ExitCode> {
    let request = MangaRequest {
        manga_id: extract_manga_id(&args.input)?,
        language: args.language,
        chapters: args.chapters,
        volumes: args.volumes,
        chapter_range: args.chapter_range,
        volume_range: args.volume_range,
        groups: args.groups,
        last: args.last,
        all: args.all,
    };
    request.build_filter()?;
    let app = build_app(config)?;

    if args.dry_run {
        let chapters = app.plan_manga(&request)?;
        let plan = PlanResult::from_chapters(&chapters);
        match output_mode {
            OutputMode::Json => JsonOutput::print_plan(&plan).into_diagnostic()?,
            OutputMode::Human => HumanOutput::print_plan(&plan).into_diagnostic()?,
        }
        return Ok(ExitCode::SUCCESS);
    }

    let prefix = match args.output {
        Some(dir) => dir.join(&args.prefix).to_string(),
        None => args.prefix,
    };
    let mode = match args.archive {
        Some(extension) => BatchMode::Archive { extension },
        None => BatchMode::Loose,
    };
    let batch = BatchRequest {
        prefix,
        mode,
        quality: Quality::from_raw_flag(args.raw),
    };

    let report = app.download_manga(&request, batch)?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_report(&report).into_diagnostic()?,
        OutputMode::Human => HumanOutput::print_report(&report).into_diagnostic()?,
    }
    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_DOWNLOAD))
    }
}

fn run_chapter(
    args: ChapterArgs,
    config: &ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<ExitCode> {
    let chapter_id = extract_chapter_id(&args.input)?;
    let app = build_app(config)?;

    let output = match (args.output, args.archive.is_some()) {
        (Some(path), true) if path.as_str() != "." && !path.as_str().is_empty() => path,
        (_, true) => Utf8PathBuf::from("chapter"),
        (Some(path), false) => path,
        (None, false) => Utf8PathBuf::from("."),
    };

    let result = app.download_chapter(
        &chapter_id,
        output,
        args.archive.as_deref(),
        Quality::from_raw_flag(args.raw),
    )?;
    if matches!(output_mode, OutputMode::Json) {
        JsonOutput::print_chapter(&result).into_diagnostic()?;
    }
    Ok(ExitCode::SUCCESS)
}
