use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tldw_core::{
    PipelineConfig, PipelineState, ProgressEvent, Provider, Stage, SummarizeRequest, Summarizer,
    SummaryMode, VideoId, progress, reference, transcript::silence_whisper_logs,
};
use tracing_subscriber::EnvFilter;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, Copy, Default, ValueEnum)]
enum CliProvider {
    #[default]
    Grok,
    Openai,
    Gemini,
    Deepseek,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Grok => Provider::Grok,
            CliProvider::Openai => Provider::Openai,
            CliProvider::Gemini => Provider::Gemini,
            CliProvider::Deepseek => Provider::Deepseek,
        }
    }
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum CliMode {
    #[default]
    Video,
    Podcast,
}

impl From<CliMode> for SummaryMode {
    fn from(cli: CliMode) -> Self {
        match cli {
            CliMode::Video => SummaryMode::Video,
            CliMode::Podcast => SummaryMode::Podcast,
        }
    }
}

#[derive(Parser)]
#[command(name = "tldw")]
#[command(about = "Summarize a video or a subtitle file with AI")]
struct Cli {
    /// Video URL or id
    #[arg(required_unless_present_any = ["srt", "list_backends", "history"], conflicts_with = "srt")]
    url: Option<String>,

    /// Summarize a local .srt file instead of a video
    #[arg(long, value_name = "PATH")]
    srt: Option<PathBuf>,

    /// Video the subtitle file belongs to, used as the history key
    #[arg(long, requires = "srt")]
    video_id: Option<String>,

    /// Summary language (e.g., "en", "ja", "zh-tw", "uk")
    #[arg(short, long, default_value = "en")]
    lang: String,

    /// Summary layout
    #[arg(short, long, default_value = "video")]
    mode: CliMode,

    /// AI provider for summary generation
    #[arg(short, long, default_value = "grok")]
    provider: CliProvider,

    /// Print which AI providers are configured and exit
    #[arg(long)]
    list_backends: bool,

    /// Print saved summaries, newest first, and exit
    #[arg(long)]
    history: bool,
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.cyan} {msg}")
    {
        pb.set_style(spinner_style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Analyzing => "Analyzing",
        Stage::Processing => "Summarizing",
        Stage::Finalizing => "Finalizing",
        Stage::Saving => "Saving",
    }
}

fn print_backends(summarizer: &Summarizer) {
    let available = summarizer.backends().available();
    for provider in Provider::ALL {
        let marker = if available.iter().any(|name| name == provider.key()) {
            style("✓").green().bold()
        } else {
            style("✗").red().bold()
        };
        println!(
            "{} {:<10} {}",
            marker,
            provider.key(),
            style(provider.config().env_var).dim()
        );
    }
}

async fn print_history(summarizer: &Summarizer) -> Result<()> {
    let records = summarizer.store().list().await?;
    if records.is_empty() {
        println!("{}", style("No saved summaries yet").dim());
    }
    for record in records {
        println!(
            "{} {} {} {}",
            style(record.updated_at.format("%Y-%m-%d %H:%M")).dim(),
            style(&record.video_key).cyan(),
            style(format!("[{}, {}]", record.language, record.mode)).yellow(),
            record.title
        );
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn build_request(cli: &Cli, summarizer: &Summarizer) -> Result<SummarizeRequest> {
    let provider: Provider = cli.provider.into();
    let mode: SummaryMode = cli.mode.into();

    if let Some(path) = &cli.srt {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .context("subtitle path has no file name")?;
        let video_id = match cli.video_id.as_deref() {
            Some(raw) => Some(VideoId::parse(raw).or_else(|_| reference::resolve(raw))?),
            None => None,
        };

        let srt_id = summarizer
            .uploads()
            .save(&bytes, &file_name, video_id)
            .await?;
        return Ok(SummarizeRequest::for_subtitles(
            &srt_id,
            &cli.lang,
            mode,
            provider.key(),
        ));
    }

    match &cli.url {
        Some(url) => Ok(SummarizeRequest::for_url(
            url.as_str(),
            &cli.lang,
            mode,
            provider.key(),
        )),
        None => bail!("a video URL or --srt <PATH> is required"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let config = PipelineConfig::from_env()?;
    if config.whisper_model.is_some() {
        silence_whisper_logs();
    }
    let summarizer = Summarizer::from_config(&config);

    if cli.list_backends {
        print_backends(&summarizer);
        return Ok(());
    }
    if cli.history {
        return print_history(&summarizer).await;
    }

    // Validate API key early
    let provider: Provider = cli.provider.into();
    if let Err(e) = provider.validate_api_key() {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    println!(
        "\n{}  {}\n",
        style("tldw").cyan().bold(),
        style("Video Summarizer").dim()
    );

    let request = build_request(&cli, &summarizer).await?;
    let total_start = Instant::now();

    let (sender, mut events) = progress::channel(config.progress_buffer);
    let pipeline = {
        let summarizer = summarizer.clone();
        tokio::spawn(async move { summarizer.run(request, sender).await })
    };

    let spinner = create_spinner("Starting...");
    let mut failed = false;
    while let Some(event) = events.recv().await {
        match event {
            ProgressEvent::Progress {
                current_chunk,
                total_chunks,
                stage,
                message,
            } => {
                if total_chunks > 0 {
                    spinner.set_message(format!(
                        "{} [{}/{}] {}",
                        stage_label(stage),
                        current_chunk,
                        total_chunks,
                        style(message).dim()
                    ));
                } else {
                    spinner.set_message(format!("{} {}", stage_label(stage), style(message).dim()));
                }
            }
            ProgressEvent::Complete {
                summary,
                source,
                warning,
                ..
            } => {
                spinner.finish_with_message(format!(
                    "{} Summary ready ({}, source: {}) {}",
                    style("✓").green().bold(),
                    provider.name(),
                    style(source.as_str()).yellow(),
                    style(format!("[{}]", format_duration(total_start.elapsed()))).dim()
                ));
                if let Some(warning) = warning {
                    println!("{} {}", style("!").yellow().bold(), warning);
                } else {
                    println!(
                        "{} {}",
                        style("Saved:").dim(),
                        style(config.history_path().display()).cyan()
                    );
                }
                println!("{}", style("─".repeat(60)).dim());
                println!("{}", summary);
            }
            ProgressEvent::Error { error, details, .. } => {
                failed = true;
                spinner.finish_and_clear();
                eprintln!("{} {}", style("Error:").red().bold(), error);
                eprintln!("  {}", style(details).dim());
            }
        }
    }

    let state = pipeline.await.context("summarization task panicked")?;
    if failed || state != PipelineState::Completed {
        std::process::exit(1);
    }
    Ok(())
}
