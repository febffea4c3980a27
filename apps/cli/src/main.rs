use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};
use console::style;
use gifcut_core::{
    Embedder, FallbackTranscripts, FfmpegMedia, GifcutError, Highlight, HighlightConfig,
    HighlightPipeline, HighlightRequest, PlatformCaptions, ScoringStrategy, TranscriptSegment,
    cache::{
        find_video_in_cache, get_cache_dir, get_transcript_path, get_video_id_path,
    },
    config::DEFAULT_CONFIG_FILE,
    format::format_highlights_readable,
    output_prefix,
    sources::{cleanup_media, download_video, load_or_fetch, load_transcript, resolve_video_id},
};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

/// CLI wrapper for ScoringStrategy (needed for clap ValueEnum)
#[derive(Clone, Copy, ValueEnum)]
enum CliStrategy {
    Tiered,
    Semantic,
}

impl From<CliStrategy> for ScoringStrategy {
    fn from(cli: CliStrategy) -> Self {
        match cli {
            CliStrategy::Tiered => ScoringStrategy::Tiered,
            CliStrategy::Semantic => ScoringStrategy::Semantic,
        }
    }
}

#[derive(Parser)]
#[command(name = "gifcut")]
#[command(about = "Find the moments of a video that match a prompt and turn them into captioned GIFs")]
struct Cli {
    /// Video URL or path to a local video file
    source: String,

    /// What the highlights should be about
    #[arg(short, long)]
    prompt: String,

    /// Number of GIFs to make
    #[arg(short = 'n', long)]
    count: Option<usize>,

    /// Segment scoring strategy
    #[arg(short, long)]
    strategy: Option<CliStrategy>,

    /// Seed for reproducible segment sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Transcript JSON to use instead of fetching captions
    #[arg(short, long)]
    transcript: Option<PathBuf>,

    /// Caption language to fetch from the video platform
    #[arg(long, default_value = "en")]
    lang: String,

    /// Directory the GIFs are written to
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// JSON config file
    #[arg(short, long, env = "GIFCUT_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Force re-processing even if cached files exist
    #[arg(short, long)]
    force: bool,

    /// Print `{"gifs": [...]}` instead of the human-readable listing
    #[arg(long)]
    json: bool,

    /// Delete downloaded media when done
    #[arg(long)]
    cleanup: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Terminal progress, silent in `--json` mode.
struct Progress {
    quiet: bool,
}

impl Progress {
    fn spinner(&self, msg: &str) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
                .template("{spinner:.cyan} {msg}")
                .expect("spinner template is valid"),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    fn done(&self, pb: ProgressBar, label: &str, started: Instant) {
        pb.finish_with_message(format!(
            "{} {} {}",
            style("✓").green().bold(),
            label,
            style(format!("[{}]", format_duration(started.elapsed()))).dim()
        ));
    }

    fn cached(&self, label: &str) {
        if !self.quiet {
            println!("{} {} {}", style("✓").green().bold(), label, style("(cached)").dim());
        }
    }
}

/// Where the video comes from and how its outputs are named.
struct Source {
    video_path: PathBuf,
    video_id: Option<String>,
    cache_dir: PathBuf,
    downloaded: bool,
}

async fn resolve_source(cli: &Cli, progress: &Progress) -> Result<Source> {
    let local = Path::new(&cli.source);
    if local.is_file() {
        let canonical = local.canonicalize()?;
        return Ok(Source {
            cache_dir: get_cache_dir(&canonical.to_string_lossy()),
            video_path: canonical,
            video_id: None,
            downloaded: false,
        });
    }

    let url = cli.source.as_str();
    let cache_dir = get_cache_dir(url);
    fs::create_dir_all(&cache_dir).await?;

    let id_path = get_video_id_path(&cache_dir);
    let cached_id = match fs::read_to_string(&id_path).await {
        Ok(id) if !cli.force && !id.trim().is_empty() => Some(id.trim().to_string()),
        _ => None,
    };
    let video_id = match cached_id {
        Some(id) => id,
        None => {
            let id = resolve_video_id(url).await?;
            fs::write(&id_path, &id).await?;
            id
        }
    };

    let cached_video = (!cli.force).then(|| find_video_in_cache(&cache_dir)).flatten();
    let video_path = match cached_video {
        Some(video) => {
            progress.cached("Downloaded");
            video
        }
        None => {
            let started = Instant::now();
            let pb = progress.spinner("Downloading video...");
            let video = download_video(url, &cache_dir).await?;
            progress.done(pb, &format!("Downloaded {}", style(&video_id).dim()), started);
            video
        }
    };

    Ok(Source {
        video_path,
        video_id: Some(video_id),
        cache_dir,
        downloaded: true,
    })
}

async fn fetch_transcript(
    cli: &Cli,
    source: &Source,
    progress: &Progress,
) -> Result<Vec<TranscriptSegment>> {
    if let Some(path) = &cli.transcript {
        let transcript = load_transcript(path).await.map_err(|e| GifcutError::TranscriptUnavailable {
            reason: format!("{}: {e}", path.display()),
        })?;
        progress.cached(&format!("Transcript: {} segments", transcript.len()));
        return Ok(transcript);
    }

    let mut chain = FallbackTranscripts::new();
    if source.video_id.is_some() {
        chain.push(Box::new(
            PlatformCaptions::new(source.cache_dir.join("captions")).with_lang(&cli.lang),
        ));
    }
    #[cfg(feature = "whisper")]
    chain.push(Box::new(gifcut_core::sources::WhisperTranscriber::from_cache(
        &gifcut_core::cache::get_root_cache_dir(),
        &source.video_path,
        &source.cache_dir,
    )));

    let started = Instant::now();
    let pb = progress.spinner("Fetching transcript...");
    let video_id = source.video_id.as_deref().unwrap_or_default();
    let transcript_path = get_transcript_path(&source.cache_dir);
    let (transcript, cached) = match load_or_fetch(&chain, video_id, &transcript_path, cli.force).await {
        Ok(fetched) => fetched,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e.into());
        }
    };

    let label = format!("Transcript: {} segments", transcript.len());
    if cached {
        pb.finish_and_clear();
        progress.cached(&label);
    } else {
        progress.done(pb, &label, started);
    }
    Ok(transcript)
}

#[cfg(feature = "semantic")]
fn load_embedder(progress: &Progress) -> Result<Arc<dyn Embedder>> {
    use gifcut_core::embedding::{MiniLmEmbedder, minilm::DEFAULT_MODEL_ID};

    let started = Instant::now();
    let pb = progress.spinner("Loading embedding model...");
    let embedder = MiniLmEmbedder::load(DEFAULT_MODEL_ID)?;
    progress.done(pb, "Embedding model loaded", started);
    Ok(Arc::new(embedder))
}

#[cfg(not(feature = "semantic"))]
fn load_embedder(_progress: &Progress) -> Result<Arc<dyn Embedder>> {
    Err(GifcutError::InvalidConfig {
        reason: "semantic scoring needs gifcut built with the `semantic` feature".into(),
    }
    .into())
}

fn load_config(cli: &Cli) -> Result<HighlightConfig> {
    let mut config = HighlightConfig::load(&cli.config);
    if let Some(count) = cli.count {
        config.count = count;
    }
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy.into();
    }
    if let Some(out) = &cli.out {
        config.output_dir = out.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn highlight(
    cli: &Cli,
    config: &HighlightConfig,
    source: &Source,
    progress: &Progress,
) -> Result<Vec<Highlight>> {
    let transcript = fetch_transcript(cli, source, progress).await?;

    let embedder = match config.strategy {
        ScoringStrategy::Semantic => Some(load_embedder(progress)?),
        ScoringStrategy::Tiered => None,
    };
    let pipeline = HighlightPipeline::new(config.clone(), embedder)?;
    let media = Arc::new(FfmpegMedia::open(&source.video_path).await?);

    let mut request = HighlightRequest::new(&cli.prompt, transcript)
        .with_prefix(output_prefix(source.video_id.as_deref()));
    if let Some(seed) = cli.seed {
        request = request.with_seed(seed);
    }

    let started = Instant::now();
    let pb = progress.spinner(&format!("Rendering GIFs for \"{}\"...", cli.prompt));
    let highlights = match pipeline.run(media, &request).await {
        Ok(highlights) => highlights,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e.into());
        }
    };
    progress.done(pb, &format!("Rendered {} GIFs", highlights.len()), started);
    Ok(highlights)
}

/// Await `work`, then remove downloaded media from `cache_dir` when `enabled`,
/// whether or not `work` succeeded.
async fn cleaning_up<T>(
    enabled: bool,
    cache_dir: &Path,
    progress: &Progress,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    let result = work.await;
    if enabled {
        match cleanup_media(cache_dir).await {
            Ok(removed) => progress.cached(&format!("Removed {removed} media files")),
            Err(e) => error!(error = %e, "failed to remove downloaded media"),
        }
    }
    result
}

async fn run(cli: &Cli) -> Result<Vec<Highlight>> {
    let progress = Progress { quiet: cli.json };
    let config = load_config(cli)?;

    if !cli.json {
        println!(
            "\n{}  {}\n",
            style("gifcut").cyan().bold(),
            style("Highlight GIFs").dim()
        );
        println!("{}", style("─".repeat(60)).dim());
    }

    let total_start = Instant::now();

    let source = resolve_source(cli, &progress).await?;
    let highlights = cleaning_up(
        cli.cleanup && source.downloaded,
        &source.cache_dir,
        &progress,
        highlight(cli, &config, &source, &progress),
    )
    .await?;

    if !cli.json {
        println!(
            "\n{} {}\n",
            style("Total time:").dim(),
            style(format_duration(total_start.elapsed())).cyan().bold()
        );
        println!("{}", style("─".repeat(60)).dim());
    }

    Ok(highlights)
}

#[cfg(feature = "whisper")]
extern "C" fn whisper_log_callback(
    _level: u32,
    _message: *const std::ffi::c_char,
    _user_data: *mut std::ffi::c_void,
) {
    // silent
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    #[cfg(feature = "whisper")]
    unsafe {
        whisper_rs::set_log_callback(Some(whisper_log_callback), std::ptr::null_mut());
    }

    let highlights = match run(&cli).await {
        Ok(highlights) => highlights,
        Err(e) => {
            error!(error = %e, "request failed");
            let message = e
                .downcast_ref::<GifcutError>()
                .map(GifcutError::user_message)
                .unwrap_or("A server error occurred.");
            eprintln!("{} {}", style("Error:").red().bold(), message);
            std::process::exit(1);
        }
    };

    if cli.json {
        let gifs: Vec<String> = highlights
            .iter()
            .map(|h| h.artifact.path.display().to_string())
            .collect();
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "gifs": gifs }))?);
    } else {
        print!("{}", format_highlights_readable(&highlights));
    }

    Ok(())
}
