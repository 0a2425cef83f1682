//! CLI argument definitions.

use super::validators::{parse_scale, parse_unit_float};
use crate::config::{InferenceDevice, Interpolation};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Image interrogation (BLIP + CLIP) and LDSR super-resolution.
#[derive(Debug, Parser)]
#[command(name = "vista")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Describe images with a caption and ranked tags.
    Interrogate(InterrogateArgs),
    /// Upscale images with latent diffusion.
    Upscale(UpscaleArgs),
    /// Manage configuration.
    Config {
        /// Configuration action to perform.
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Manage model artifacts.
    Models {
        /// Models action to perform.
        #[command(subcommand)]
        action: ModelsAction,
    },
    /// List available execution providers.
    Providers {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

/// Config subcommand actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Create default configuration file.
    Init,
    /// Display current configuration.
    Show,
    /// Print configuration file path.
    Path,
}

/// Models subcommand actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ModelsAction {
    /// List configured artifacts and whether they are present.
    List {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Download every missing artifact that has a URL.
    Fetch,
    /// Verify checksums of present artifacts.
    Check,
}

/// Options shared by every subcommand.
#[derive(Debug, Args)]
#[allow(clippy::struct_excessive_bools)]
pub struct GlobalArgs {
    /// Configuration file (default: platform config dir).
    #[arg(long, global = true, env = "VISTA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Models directory (overrides config).
    #[arg(long, global = true, env = "VISTA_MODELS_DIR")]
    pub models_dir: Option<PathBuf>,

    /// Inference device.
    #[arg(long, value_enum, global = true, env = "VISTA_DEVICE",
          conflicts_with_all = ["gpu", "cpu"])]
    pub device: Option<InferenceDevice>,

    /// Use the best available GPU provider.
    #[arg(long, global = true, conflicts_with = "cpu")]
    pub gpu: bool,

    /// Force CPU inference.
    #[arg(long, global = true, conflicts_with = "gpu")]
    pub cpu: bool,

    /// Use full precision model files.
    #[arg(long, global = true)]
    pub no_half: bool,

    /// Low accelerator memory: offload resident models before each interrogation.
    #[arg(long, global = true, conflicts_with = "medvram")]
    pub lowvram: bool,

    /// Offload models before each interrogation (medium accelerator memory).
    #[arg(long, global = true, conflicts_with = "lowvram")]
    pub medvram: bool,

    /// Suppress progress output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase verbosity (-v: debug, -vv: trace+ORT info, -vvv: trace+ORT debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Arguments for the interrogate command.
#[derive(Debug, Args)]
pub struct InterrogateArgs {
    /// Input images or directories.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Print results as JSON.
    #[arg(long)]
    pub json: bool,

    /// Directory of category files (overrides config).
    #[arg(long, env = "VISTA_CATEGORIES_DIR")]
    pub categories_dir: Option<PathBuf>,

    /// Artist database CSV (overrides config).
    #[arg(long, env = "VISTA_ARTISTS_FILE")]
    pub artists_file: Option<PathBuf>,

    /// Do not rank the artist database.
    #[arg(long)]
    pub no_artists: bool,

    /// Beam count for caption generation.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=16))]
    pub num_beams: Option<u32>,

    /// Keep models on the accelerator between images.
    #[arg(long)]
    pub keep_models: bool,
}

/// Arguments for the upscale command.
#[derive(Debug, Args)]
pub struct UpscaleArgs {
    /// Input images or directories.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Overall upscale factor.
    #[arg(short, long, value_parser = parse_scale, env = "VISTA_SCALE")]
    pub scale: Option<f32>,

    /// Number of diffusion steps.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=1000), env = "VISTA_STEPS")]
    pub steps: Option<u32>,

    /// Output directory (default: same as input).
    #[arg(short, long, env = "VISTA_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Filter used to pre-shrink the input.
    #[arg(long, value_enum)]
    pub downsample: Option<Interpolation>,

    /// Seed for the diffusion noise.
    #[arg(long)]
    pub seed: Option<u64>,

    /// DDIM eta (0 = deterministic).
    #[arg(long, value_parser = parse_unit_float)]
    pub eta: Option<f32>,

    /// Overwrite existing outputs.
    #[arg(long)]
    pub force: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_interrogate() {
        let cli = Cli::try_parse_from(["vista", "interrogate", "a.png", "b.jpg", "--json"]).unwrap();
        match cli.command {
            Command::Interrogate(args) => {
                assert_eq!(args.inputs.len(), 2);
                assert!(args.json);
                assert!(!args.no_artists);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_upscale_options() {
        let cli = Cli::try_parse_from([
            "vista",
            "upscale",
            "photo.png",
            "--scale",
            "4",
            "--steps",
            "50",
            "--downsample",
            "bicubic",
            "--seed",
            "7",
            "--eta",
            "0",
        ])
        .unwrap();
        match cli.command {
            Command::Upscale(args) => {
                assert_eq!(args.scale, Some(4.0));
                assert_eq!(args.steps, Some(50));
                assert_eq!(args.downsample, Some(Interpolation::Bicubic));
                assert_eq!(args.seed, Some(7));
                assert_eq!(args.eta, Some(0.0));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "vista",
            "interrogate",
            "a.png",
            "--cpu",
            "--no-half",
            "--lowvram",
            "-vv",
            "-q",
        ])
        .unwrap();
        assert!(cli.global.cpu);
        assert!(cli.global.no_half);
        assert!(cli.global.lowvram);
        assert_eq!(cli.global.verbose, 2);
        assert!(cli.global.quiet);
    }

    #[test]
    fn test_cli_device_value() {
        let cli = Cli::try_parse_from(["vista", "--device", "tensorrt", "providers"]).unwrap();
        assert_eq!(cli.global.device, Some(InferenceDevice::TensorRt));
    }

    #[test]
    fn test_cli_conflicts() {
        assert!(Cli::try_parse_from(["vista", "interrogate", "a.png", "--gpu", "--cpu"]).is_err());
        assert!(
            Cli::try_parse_from(["vista", "interrogate", "a.png", "--lowvram", "--medvram"])
                .is_err()
        );
        assert!(
            Cli::try_parse_from(["vista", "--device", "cuda", "--cpu", "models", "list"]).is_err()
        );
    }

    #[test]
    fn test_cli_rejects_bad_values() {
        assert!(Cli::try_parse_from(["vista", "upscale", "a.png", "--scale", "0"]).is_err());
        assert!(Cli::try_parse_from(["vista", "upscale", "a.png", "--steps", "0"]).is_err());
        assert!(Cli::try_parse_from(["vista", "upscale", "a.png", "--eta", "2"]).is_err());
        assert!(Cli::try_parse_from(["vista", "interrogate"]).is_err());
    }

    #[test]
    fn test_cli_parse_config_and_models_subcommands() {
        assert!(Cli::try_parse_from(["vista", "config", "show"]).is_ok());
        assert!(Cli::try_parse_from(["vista", "models", "list", "--json"]).is_ok());
        assert!(Cli::try_parse_from(["vista", "models", "fetch"]).is_ok());
        assert!(Cli::try_parse_from(["vista", "providers", "--json"]).is_ok());
    }
}
