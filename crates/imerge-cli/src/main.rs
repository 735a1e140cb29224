mod settings;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use imerge_core::{HeightBasis, MergeConfig, MergeRequest};
use imerge_render::{Compositor, MergeEvent, MergeReport, OverlayOutcome};

use settings::{resolve_config, Overrides};

#[derive(Parser)]
#[command(
    name = "imerge",
    version,
    about = "imerge - merge overlay images onto a background",
    long_about = "imerge composites rectangular and circular image overlays onto a background\nand delivers the result as a JPEG data URI or file."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a merge request described by a JSON file
    Merge {
        /// Path to the request JSON ({"bgImg": {...}, "otherImgs": [...]})
        #[arg()]
        request: PathBuf,

        /// Write the JPEG to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the data URI to stdout instead of a summary
        #[arg(long)]
        data_uri: bool,

        /// Path to an imerge TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Oversampling factor applied to the display width
        #[arg(long)]
        scale: Option<f64>,

        /// Available display width before oversampling
        #[arg(long)]
        display_width: Option<u32>,

        /// Dimension vertical fractions scale with: surface-width or surface-height
        #[arg(long)]
        height_basis: Option<HeightBasis>,

        /// JPEG quality (1-100)
        #[arg(long)]
        quality: Option<u8>,

        /// Hex color transparent pixels are flattened onto
        #[arg(long)]
        matte: Option<String>,

        /// HTTP timeout in seconds for remote images
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Print the default configuration as TOML
    Config {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Display version and defaults
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays usable for data URIs and summaries.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Merge {
            request,
            output,
            data_uri,
            config,
            scale,
            display_width,
            height_basis,
            quality,
            matte,
            timeout,
        } => {
            let overrides = Overrides {
                scale,
                display_width,
                height_basis,
                quality,
                matte,
                timeout_secs: timeout,
            };
            let config = resolve_config(config.as_deref(), &overrides)?;
            cmd_merge(&request, output.as_deref(), data_uri, config)
        }
        Commands::Config { output } => cmd_config(output.as_deref()),
        Commands::Info => cmd_info(),
    }
}

fn cmd_merge(
    request_path: &Path,
    output: Option<&Path>,
    print_data_uri: bool,
    config: MergeConfig,
) -> Result<()> {
    let request = MergeRequest::load_from_file(request_path)
        .with_context(|| format!("failed to read request: {}", request_path.display()))?;
    let compositor = Compositor::with_http(config).context("failed to set up compositor")?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let (events, report) = runtime.block_on(async { compositor.start(request).finish().await });

    for event in &events {
        match event {
            MergeEvent::Success { result } => {
                tracing::info!("success ({} chars)", result.len())
            }
            MergeEvent::Error { error, result } => {
                tracing::warn!("error: {} ({} chars)", error, result.len())
            }
            MergeEvent::Finally { result } => {
                tracing::info!("finally ({} chars)", result.len())
            }
        }
    }

    let report = report.context("merge failed")?;

    if let Some(path) = output {
        let bytes = report
            .jpeg_bytes()
            .context("merge produced no image to write")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create output dir: {}", parent.display()))?;
        }
        std::fs::write(path, &bytes)
            .with_context(|| format!("failed to write output: {}", path.display()))?;
        tracing::info!("Wrote {} ({} bytes)", path.display(), bytes.len());
    }

    if print_data_uri {
        println!("{}", report.data_uri);
    } else {
        println!("{}", serde_json::to_string_pretty(&summary(&report, output))?);
    }
    Ok(())
}

fn summary(report: &MergeReport, output: Option<&Path>) -> serde_json::Value {
    let overlays: Vec<serde_json::Value> = report
        .overlays
        .iter()
        .map(|o| match o {
            OverlayOutcome::Drawn => serde_json::json!({ "status": "drawn" }),
            OverlayOutcome::Failed(message) => {
                serde_json::json!({ "status": "failed", "error": message })
            }
        })
        .collect();
    serde_json::json!({
        "target": report.target,
        "width": report.surface_width,
        "height": report.surface_height,
        "overlays": overlays,
        "encoded_chars": report.data_uri.len(),
        "encode_error": report.encode_error,
        "output": output.map(|p| p.display().to_string()),
    })
}

fn cmd_config(output: Option<&Path>) -> Result<()> {
    let config = MergeConfig::default();
    match output {
        Some(path) => {
            config
                .save_to_file(path)
                .with_context(|| format!("failed to write config: {}", path.display()))?;
            println!("Wrote default config to {}", path.display());
        }
        None => print!("{}", config.to_toml()?),
    }
    Ok(())
}

fn cmd_info() -> Result<()> {
    let config = MergeConfig::default();
    println!("imerge image compositor");
    println!("   Version:        {}", env!("CARGO_PKG_VERSION"));
    println!("   Output:         JPEG data URI (quality {})", config.jpeg_quality);
    println!("   Scale factor:   {}", config.scale_factor);
    println!("   Display width:  {}", config.display_width);
    println!("   Height basis:   {:?}", config.height_basis);
    println!("   Remote images:  http(s), upgraded to https: {}", config.upgrade_insecure);
    Ok(())
}
