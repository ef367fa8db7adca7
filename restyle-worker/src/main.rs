use std::{io, path::PathBuf, process::ExitCode, time::Duration};

use clap::{error::ErrorKind, Args as ClapArgs, CommandFactory, Parser, Subcommand};
use restyle_core::{
    check_availability, runtime::block_on_detached, select_best_device, DeviceMap, FluxLoader,
    GenerationResult, InferenceSteps, RedesignRequest, Redesigner, Settings,
    DEFAULT_GENERATION_TIMEOUT, DEFAULT_MODELS_PATH, DEFAULT_OUTPUTS_PATH,
};
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Redesign a room photograph with FLUX.1-schnell",
    allow_negative_numbers = true,
    subcommand_negates_reqs = true
)]
struct Args {
    /// Path to the original room photograph
    #[arg(required = true)]
    input_image_path: Option<PathBuf>,

    /// Free-text design direction (may be empty)
    #[arg(required = true)]
    prompt: Option<String>,

    /// Design style, e.g. modern
    #[arg(required = true)]
    style: Option<String>,

    /// Room type, e.g. living_room
    #[arg(required = true)]
    room_type: Option<String>,

    /// Identifier used in the output file name
    #[arg(required = true)]
    output_id: Option<String>,

    /// Inference steps, 1-4 (other integers fall back to 4)
    #[arg(value_parser = InferenceSteps::parse_arg)]
    inference_steps: Option<InferenceSteps>,

    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report whether the model and output locations are usable
    Check,
}

#[derive(ClapArgs, Debug)]
struct ConfigArgs {
    /// Directory holding the FLUX.1-schnell weights
    #[arg(long, env = "AI_MODELS_PATH", default_value = DEFAULT_MODELS_PATH, global = true)]
    models_path: PathBuf,

    /// Directory generated images are written to
    #[arg(long, env = "AI_OUTPUTS_PATH", default_value = DEFAULT_OUTPUTS_PATH, global = true)]
    outputs_path: PathBuf,

    /// Longest side of the image passed to the model
    #[arg(
        long,
        env = "AI_MAX_DIMENSION",
        default_value_t = restyle_core::preprocess::DEFAULT_MAX_DIMENSION,
        value_parser = clap::value_parser!(u32).range(1..),
        global = true
    )]
    max_dimension: u32,

    /// Generation deadline in seconds, 0 disables it
    #[arg(
        long,
        env = "AI_GENERATION_TIMEOUT_SECS",
        default_value_t = DEFAULT_GENERATION_TIMEOUT.as_secs(),
        global = true
    )]
    timeout_secs: u64,

    /// Seed for reproducible generations
    #[arg(long, env = "AI_SEED", global = true)]
    seed: Option<u64>,

    /// `cpu` or the accelerator ordinal to run on
    #[arg(long, env = "AI_DEVICE", default_value_t = DeviceMap::default(), global = true)]
    device: DeviceMap,
}

impl ConfigArgs {
    fn settings(&self) -> Settings {
        Settings {
            models_path: self.models_path.clone(),
            outputs_path: self.outputs_path.clone(),
            max_dimension: self.max_dimension,
            generation_timeout: (self.timeout_secs > 0)
                .then(|| Duration::from_secs(self.timeout_secs)),
            seed: self.seed,
        }
    }
}

impl Args {
    fn into_request(self) -> Option<RedesignRequest> {
        Some(RedesignRequest {
            input_image_path: self.input_image_path?,
            prompt: self.prompt?,
            style: self.style?,
            room_type: self.room_type?,
            output_id: self.output_id?,
            inference_steps: self.inference_steps.unwrap_or_default(),
        })
    }
}

#[derive(Error, Debug)]
enum StartupError {
    #[error("Compute device {device} is unavailable: {cause:#}")]
    Device {
        device: DeviceMap,
        cause: anyhow::Error,
    },

    #[error("Compute device {device} cannot be seeded: {cause:#}")]
    Seed {
        device: DeviceMap,
        cause: anyhow::Error,
    },

    #[error("Failed to start the async runtime: {0}")]
    Runtime(#[source] io::Error),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Stdout carries only the result message.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn emit(result: &GenerationResult) -> ExitCode {
    match result.emit(io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "failed to write result message");
            ExitCode::FAILURE
        }
    }
}

fn usage_failure() -> ExitCode {
    let usage = Args::command().render_usage().to_string();
    emit(&GenerationResult::failure(usage.trim_end(), None));
    ExitCode::FAILURE
}

fn startup_failure(e: StartupError) -> ExitCode {
    error!(error = %e, "startup failed");
    emit(&GenerationResult::failure(e.to_string(), None));
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    init_tracing();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            warn!(error = %e.kind(), "malformed invocation");
            return usage_failure();
        }
    };

    let settings = args.config.settings();
    let device_map = args.config.device;

    if let Some(Command::Check) = args.command {
        let report = check_availability(&settings);
        info!(available = report.available, message = %report.message, "availability checked");
        return match serde_json::to_string(&report) {
            Ok(line) if report.available => {
                println!("{line}");
                ExitCode::SUCCESS
            }
            Ok(line) => {
                println!("{line}");
                ExitCode::FAILURE
            }
            Err(e) => {
                error!(error = %e, "failed to encode availability report");
                ExitCode::FAILURE
            }
        };
    }

    let Some(request) = args.into_request() else {
        return usage_failure();
    };

    let device = match select_best_device(device_map) {
        Ok(device) => device,
        Err(cause) => {
            return startup_failure(StartupError::Device {
                device: device_map,
                cause,
            })
        }
    };
    if let Some(seed) = settings.seed {
        if let Err(e) = device.set_seed(seed) {
            return startup_failure(StartupError::Seed {
                device: device_map,
                cause: e.into(),
            });
        }
    }

    let redesigner = Redesigner::<FluxLoader>::new(settings, device);
    // A generation abandoned at its deadline must not keep the process alive.
    match block_on_detached(redesigner.handle(request)) {
        Ok(result) => emit(&result),
        Err(e) => startup_failure(StartupError::Runtime(e)),
    }
}
