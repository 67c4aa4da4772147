//! CLI binary for visual-health-report.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AnalysisConfig`, prints the narrative and writes the PDF report.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use visual_health_report::{
    analyze_to_file, resolve_image, AnalysisConfig, AnalysisProgressCallback, AnalysisRequest,
    ProgressCallback,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while the request is in flight and
/// one log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading image…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_analysis_start(&self, media_type: &str, image_bytes: usize) {
        self.bar.println(format!(
            "{} {}  {}",
            cyan("◆"),
            bold("Analyzing image"),
            dim(&format!("{media_type}, {image_bytes} bytes")),
        ));
    }

    fn on_model_request(&self, model: &str) {
        self.bar.set_prefix("Analyzing");
        self.bar.set_message(format!("waiting for {model}…"));
    }

    fn on_model_response(&self, narrative_len: usize, duration_ms: u64) {
        self.bar.println(format!(
            "  {} Findings   {:<12}  {}",
            green("✓"),
            dim(&format!("{narrative_len:>5} chars")),
            dim(&format!("{:.1}s", duration_ms as f64 / 1000.0)),
        ));
        self.bar.set_prefix("Rendering");
        self.bar.set_message("building PDF report…");
    }

    fn on_render_complete(&self, pages: usize, bytes: usize) {
        self.bar.println(format!(
            "  {} Report     {:<12}  {}",
            green("✓"),
            dim(&format!("{pages:>2} page(s)")),
            dim(&format!("{bytes} bytes")),
        ));
    }

    fn on_analysis_complete(&self, _total_duration_ms: u64) {
        self.bar.finish_and_clear();
    }

    fn on_analysis_error(&self, error: &str) {
        self.bar.finish_and_clear();

        // Truncate very long error messages to keep output tidy.
        let first_line = error.lines().next().unwrap_or_default();
        let msg = if first_line.chars().count() > 80 {
            format!("{}\u{2026}", first_line.chars().take(79).collect::<String>())
        } else {
            first_line.to_string()
        };
        eprintln!("  {} {}", red("✗"), red(&msg));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyze a photo and write health_report.pdf
  health-report rash.jpg -p "It itches and appeared two days ago"

  # Choose the report location
  health-report xray.png -p "Any fracture?" -o reports/xray.pdf

  # Analyze an image from a URL
  health-report https://example.org/images/mole.png

  # Use another vision provider through edgequake-llm
  health-report --provider openai --model gpt-4.1-mini scan.jpeg

  # JSON output (narrative + stats) for scripting
  health-report --json rash.jpg > result.json

ENVIRONMENT VARIABLES:
  GOOGLE_API_KEY          Gemini API key (GEMINI_API_KEY also accepted)
  HEALTH_REPORT_MODEL     Override model ID (default: gemini-1.5-flash)
  HEALTH_REPORT_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  PDFIUM_LIB_PATH         Use an existing libpdfium instead of downloading one
  PDFIUM_AUTO_CACHE_DIR   Where the downloaded libpdfium is cached
  RUST_LOG                Override log filter (e.g. visual_health_report=debug)

  Variables can also be placed in a .env file in the working directory.

DISCLAIMER:
  The analysis is generated by an AI model and is not a diagnosis.
  Consult with a Doctor before making any decisions.
"#;

/// Analyze a health-related image with a multimodal model and produce a PDF report.
#[derive(Parser, Debug)]
#[command(
    name = "health-report",
    version,
    about = "Analyze a health-related image with a multimodal model and produce a PDF report",
    long_about = "Send an image (jpg, jpeg or png; local file or URL) and an optional question \
to a hosted multimodal model. The model's findings are printed to stdout and rendered into a \
paginated PDF report. Uses Google Gemini by default; any edgequake-llm vision provider can be \
selected with --provider.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image to analyze: local path or HTTP/HTTPS URL (jpg, jpeg, png).
    image: Option<String>,

    /// Your question or description of the symptoms.
    #[arg(short, long, env = "HEALTH_REPORT_PROMPT", default_value = "")]
    prompt: String,

    /// Where to write the PDF report.
    #[arg(short, long, env = "HEALTH_REPORT_OUTPUT", default_value = "health_report.pdf")]
    output: PathBuf,

    /// Model ID (e.g. gemini-1.5-flash, gemini-2.0-flash, gpt-4.1-mini).
    #[arg(long, env = "HEALTH_REPORT_MODEL")]
    model: Option<String>,

    /// Gemini API key. GEMINI_API_KEY is also read when this is unset.
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Provider: gemini (default), openai, anthropic, ollama, azure.
    #[arg(
        long,
        env = "HEALTH_REPORT_PROVIDER",
        long_help = "Model provider. `gemini` (the default) calls the Google Generative Language \
          API directly with GOOGLE_API_KEY.\n\
          Any other name is created through edgequake-llm and reads that provider's own key."
    )]
    provider: Option<String>,

    /// Model call timeout in seconds (no timeout when unset).
    #[arg(long, env = "HEALTH_REPORT_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// HTTP download timeout in seconds, for URL inputs.
    #[arg(long, env = "HEALTH_REPORT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Sampling temperature (0.0–2.0). Provider default when unset.
    #[arg(long, env = "HEALTH_REPORT_TEMPERATURE")]
    temperature: Option<f32>,

    /// Max output tokens. Provider default when unset.
    #[arg(long, env = "HEALTH_REPORT_MAX_TOKENS")]
    max_tokens: Option<u32>,

    /// Path to a text file replacing the built-in analysis instruction.
    #[arg(long, env = "HEALTH_REPORT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Output structured JSON (AnalysisOutput) instead of the plain narrative.
    #[arg(long, env = "HEALTH_REPORT_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "HEALTH_REPORT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "HEALTH_REPORT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "HEALTH_REPORT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before parsing so `env = ...` flags and API keys see it.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides all the feedback that matters while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Ensure PDFium engine is available ────────────────────────────────
    // The first run downloads the library into the user cache; later runs
    // only check the cached path.
    if !pdfium_auto::is_pdfium_cached() {
        if !cli.quiet {
            let dl_bar = ProgressBar::new(0);
            dl_bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} {prefix:.bold}  \
                     [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  ")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
            );
            dl_bar.set_prefix("PDF engine");
            dl_bar.enable_steady_tick(Duration::from_millis(80));

            let bar = dl_bar.clone();
            tokio::task::block_in_place(|| {
                pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
                    if let Some(t) = total {
                        if bar.length() != Some(t) {
                            bar.set_length(t);
                        }
                    }
                    bar.set_position(downloaded);
                }))
            })
            .context("Failed to download PDFium engine")?;

            dl_bar.finish_with_message("ready ✓");
        } else {
            tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
                .context("Failed to download PDFium engine")?;
        }
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn AnalysisProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Collect input ────────────────────────────────────────────────────
    let mut request = AnalysisRequest::new(cli.prompt.clone());
    if let Some(ref input) = cli.image {
        let image = resolve_image(input, config.download_timeout_secs)
            .await
            .with_context(|| format!("Failed to load image {input:?}"));
        match image {
            Ok(image) => request = request.with_image(image),
            Err(e) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_analysis_error(&format!("{e:#}"));
                }
                return Err(e);
            }
        }
    }

    // ── Run analysis ─────────────────────────────────────────────────────
    let output = analyze_to_file(&request, &cli.output, &config)
        .await
        .context("Analysis failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.narrative.as_bytes())
            .context("Failed to write to stdout")?;
        if !output.narrative.ends_with('\n') {
            handle
                .write_all(b"\n")
                .context("Failed to write to stdout")?;
        }
    }

    if !cli.quiet {
        eprintln!(
            "{}  {} page(s)  {}ms  →  {}",
            green("✔"),
            output.stats.report_pages,
            output.stats.total_duration_ms,
            bold(&cli.output.display().to_string()),
        );
        if output.stats.input_tokens + output.stats.output_tokens > 0 {
            eprintln!(
                "   {} tokens in  /  {} tokens out",
                dim(&output.stats.input_tokens.to_string()),
                dim(&output.stats.output_tokens.to_string()),
            );
        }
    }

    Ok(())
}

/// Map CLI args to `AnalysisConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let report_name = cli
        .output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("Output path must name a file")?;

    let mut builder = AnalysisConfig::builder()
        .download_timeout_secs(cli.download_timeout)
        .report_file_name(report_name);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(n) = cli.max_tokens {
        builder = builder.max_output_tokens(n);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
