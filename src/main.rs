//! Command-line interface for the waveform denoiser.
//!
//! The CLI wraps the core model to denoise WAV files, report the valid input
//! lengths of an architecture, and summarize its channel plan.

use anyhow::Result;
use burn::tensor::backend::Backend;
use burn_ndarray::{NdArray, NdArrayDevice};
use clap::{Parser, Subcommand, ValueEnum};
use denoiser::audio::io::WavEncoding;
use denoiser::config::{load_config, DenoiserConfig};
use denoiser::runtime::DenoiseRuntime;
use denoiser::{Demucs, ModelConfig};
use std::path::{Path, PathBuf};

#[cfg(feature = "backend-wgpu")]
use burn_wgpu::graphics::AutoGraphicsApi;
#[cfg(feature = "backend-wgpu")]
use burn_wgpu::{init_setup, Wgpu, WgpuDevice};

/// Supported compute backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
enum BackendChoice {
    /// Use the WGPU backend (GPU acceleration when available).
    Wgpu,
    /// Use the ndarray backend (CPU).
    Ndarray,
}

#[cfg(feature = "backend-wgpu")]
const DEFAULT_BACKEND: BackendChoice = BackendChoice::Wgpu;
#[cfg(not(feature = "backend-wgpu"))]
const DEFAULT_BACKEND: BackendChoice = BackendChoice::Ndarray;

/// Top-level CLI options.
#[derive(Parser)]
#[command(name = "denoiser")]
#[command(about = "Waveform-domain speech denoiser", long_about = None)]
struct Cli {
    /// Log debug-level events (channel plan, rescale factors, timings).
    #[arg(long, short, global = true)]
    verbose: bool,
    /// Write a Chrome trace file (trace-*.json) of the run.
    #[arg(long, global = true)]
    chrome_tracing: bool,
    /// Compute backend to use.
    #[arg(long, value_enum, default_value_t = DEFAULT_BACKEND, global = true)]
    backend: BackendChoice,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Denoise a WAV file.
    Denoise {
        /// Input WAV path.
        #[arg(long)]
        input: PathBuf,
        /// Output WAV path (mono, input sample rate).
        #[arg(long)]
        output: PathBuf,
        /// Model configuration YAML; defaults to the reference architecture.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Seed for random initialization when no weights are configured.
        #[arg(long)]
        seed: Option<u64>,
        /// Write 32-bit float samples instead of 16-bit PCM.
        #[arg(long)]
        float: bool,
    },
    /// Print the valid input length for a raw length.
    ValidLength {
        /// Raw input length in samples.
        #[arg(long)]
        length: usize,
        /// Model configuration YAML; defaults to the reference architecture.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the channel plan and parameter count.
    Info {
        /// Model configuration YAML; defaults to the reference architecture.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone)]
struct DenoiseArgs {
    input: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    seed: Option<u64>,
    encoding: WavEncoding,
}

fn init_tracing(verbose: bool, chrome_tracing: bool) -> Option<tracing_chrome::FlushGuard> {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::prelude::*;

    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let fmt_layer = tracing_subscriber::fmt::Layer::new()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(level);
    if chrome_tracing {
        let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new().build();
        tracing_subscriber::registry()
            .with(fmt_layer)
            .with(chrome_layer)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::registry().with(fmt_layer).init();
        None
    }
}

/// Entry point for the CLI.
fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.verbose, cli.chrome_tracing);
    let backend = cli.backend;

    match cli.command {
        Commands::Denoise {
            input,
            output,
            config,
            seed,
            float,
        } => {
            let args = DenoiseArgs {
                input,
                output,
                config,
                seed,
                encoding: if float {
                    WavEncoding::Float32
                } else {
                    WavEncoding::Pcm16
                },
            };
            match backend {
                BackendChoice::Wgpu => {
                    #[cfg(feature = "backend-wgpu")]
                    {
                        let device = WgpuDevice::default();
                        init_setup::<AutoGraphicsApi>(&device, Default::default());
                        run_denoise::<Wgpu>(args, &device)?;
                    }
                    #[cfg(not(feature = "backend-wgpu"))]
                    {
                        let _ = args;
                        anyhow::bail!("WGPU backend not enabled; build with --features backend-wgpu");
                    }
                }
                BackendChoice::Ndarray => {
                    let device = NdArrayDevice::default();
                    run_denoise::<NdArray<f32>>(args, &device)?;
                }
            }
        }
        Commands::ValidLength { length, config } => {
            let config = config_or_default(config.as_deref())?;
            println!("{}", config.model.valid_length(length));
        }
        Commands::Info { config } => {
            let config = config_or_default(config.as_deref())?;
            print_info(&config.model)?;
        }
    }

    Ok(())
}

fn config_or_default(path: Option<&Path>) -> Result<DenoiserConfig> {
    match path {
        Some(path) => Ok(load_config(path)?),
        None => {
            let config = DenoiserConfig::default();
            config.model.validate()?;
            Ok(config)
        }
    }
}

fn run_denoise<B: Backend>(args: DenoiseArgs, device: &B::Device) -> Result<()> {
    let runtime = match &args.config {
        Some(path) => DenoiseRuntime::<B>::from_config_path(path, args.seed, device)?,
        None => DenoiseRuntime::<B>::from_config(DenoiserConfig::default(), None, args.seed, device)?,
    };
    runtime.denoise_file(&args.input, &args.output, args.encoding)?;
    tracing::info!(output = %args.output.display(), "wrote denoised audio");
    Ok(())
}

fn print_info(config: &ModelConfig) -> Result<()> {
    let resample = config.validate()?;
    println!(
        "depth {} | resample x{} | causal {} | total stride {}",
        config.depth,
        resample.factor(),
        config.causal,
        config.total_stride()
    );
    for level in 0..config.depth {
        println!(
            "level {level}: {} -> {} channels",
            config.encoder_in_channels(level),
            config.encoder_out_channels(level)
        );
    }
    println!("bottleneck: {} channels", config.bottleneck_channels());

    let device = NdArrayDevice::default();
    let model = Demucs::<NdArray<f32>>::with_seed(config.clone(), 0, &device)?;
    println!("parameters: {}", model.num_parameters());
    Ok(())
}
