//! Vista - image interrogation and latent diffusion super-resolution.
//!
//! Captions images with BLIP, ranks label lists against them with CLIP, and
//! upscales images with the LDSR latent diffusion model, all over ONNX Runtime.

#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod interrogate;
pub mod output;
pub mod registry;
pub mod runtime;
pub mod upscale;

use clap::Parser;
use cli::{Cli, Command, ConfigAction, GlobalArgs, InterrogateArgs, ModelsAction, UpscaleArgs};
use config::{
    Config, InferenceDevice, MemoryMode, Precision, config_file_path, load_config_file,
    load_default_config, models_dir, save_config, validate_config,
};
use constants::{IMAGE_EXTENSIONS, artifacts, ldsr::OUTPUT_SUFFIX};
use interrogate::{
    InterrogateSettings, Interrogator, OnnxLoader, load_artists, load_categories,
};
use output::progress;
use runtime::{Provider, available_providers, select_provider};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use upscale::{Upscaler, UpscalerLdsr};

pub use error::{Error, Result};

/// Main entry point for the vista CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet);

    let mut config = match &cli.global.config {
        Some(path) => load_config_file(path)?,
        None => load_default_config()?,
    };
    apply_global_overrides(&mut config, &cli.global);

    match cli.command {
        Command::Interrogate(args) => interrogate_files(&args, config, &cli.global),
        Command::Upscale(args) => upscale_files(&args, config, &cli.global),
        Command::Config { action } => handle_config_command(action, &config, &cli.global),
        Command::Models { action } => handle_models_command(action, &config, &cli.global),
        Command::Providers { json } => handle_providers_command(json),
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    // ORT logging is suppressed by default because provider fallback is expected in auto mode.
    let filter_str = if quiet {
        "warn,ort=off".to_string()
    } else {
        match verbose {
            0 => "info,ort=off".to_string(),
            1 => "debug,ort=warn".to_string(),
            2 => "trace,ort=info".to_string(),
            _ => "trace".to_string(),
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Apply global CLI flags on top of the loaded configuration.
pub fn apply_global_overrides(config: &mut Config, global: &GlobalArgs) {
    if let Some(dir) = &global.models_dir {
        config.models.dir = Some(dir.clone());
    }

    if let Some(device) = global.device {
        config.runtime.device = device;
    } else if global.gpu {
        config.runtime.device = InferenceDevice::Gpu;
    } else if global.cpu {
        config.runtime.device = InferenceDevice::Cpu;
    }

    if global.no_half {
        config.runtime.precision = Precision::Full;
    }

    if global.lowvram {
        config.runtime.memory = MemoryMode::Low;
    } else if global.medvram {
        config.runtime.memory = MemoryMode::Medium;
    }
}

fn resolve_provider(config: &Config) -> Result<Provider> {
    select_provider(config.runtime.device, &available_providers())
}

/// Collect image files from paths (files and directories).
pub fn collect_image_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            if is_image_file(path) {
                files.push(path.clone());
            } else {
                warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            collect_image_files_recursive(path, &mut files)?;
        } else {
            warn!("Skipping non-existent path: {}", path.display());
        }
    }

    Ok(files)
}

fn collect_image_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            collect_image_files_recursive(&path, files)?;
        } else if is_image_file(&path) {
            files.push(path);
        }
    }

    Ok(())
}

fn is_image_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| {
        IMAGE_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(std::ffi::OsStr::new(known)))
    })
}

fn open_image(path: &Path) -> Result<image::DynamicImage> {
    image::open(path).map_err(|e| Error::ImageOpen {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Path an upscaled image is written to: `<stem>.ldsr.png` next to the input
/// or inside `output_dir`.
pub fn upscaled_output_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "image".into(), |s| s.to_string_lossy());
    let name = format!("{stem}{OUTPUT_SUFFIX}");
    match output_dir {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

/// Whether `path` names a file written by the upscaler.
fn is_upscaled_output(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().ends_with(OUTPUT_SUFFIX))
}

/// Image files to upscale, excluding outputs of earlier runs.
pub fn collect_upscale_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = collect_image_files(paths)?;
    files.retain(|path| {
        let keep = !is_upscaled_output(path);
        if !keep {
            debug!("Skipping upscaled output: {}", path.display());
        }
        keep
    });
    Ok(files)
}

/// One interrogation result for JSON output.
#[derive(Debug, Serialize)]
struct InterrogationRecord {
    file: PathBuf,
    prompt: String,
}

fn interrogate_files(args: &InterrogateArgs, mut config: Config, global: &GlobalArgs) -> Result<()> {
    let total_start = Instant::now();

    let files = collect_image_files(&args.inputs)?;
    if files.is_empty() {
        return Err(Error::NoValidImageFiles);
    }
    info!("Found {} image(s) to interrogate", files.len());

    if let Some(beams) = args.num_beams {
        config.interrogate.num_beams = beams as usize;
    }
    if args.no_artists {
        config.interrogate.use_builtin_artists = false;
    }
    if args.keep_models {
        config.interrogate.keep_models_in_memory = true;
    }
    validate_config(&config)?;

    let models_dir = models_dir(&config)?;
    let categories_dir = args
        .categories_dir
        .clone()
        .or_else(|| config.interrogate.categories_dir.clone())
        .unwrap_or_else(|| models_dir.join(artifacts::CATEGORIES_DIR));
    let artists_file = args
        .artists_file
        .clone()
        .or_else(|| config.interrogate.artists_file.clone())
        .unwrap_or_else(|| models_dir.join(artifacts::ARTISTS_FILE));

    let categories = load_categories(&categories_dir)?;
    let artists = if config.interrogate.use_builtin_artists {
        load_artists(&artists_file)?
    } else {
        Vec::new()
    };

    let provider = resolve_provider(&config)?;
    let progress_enabled = !global.quiet && !args.json;
    let loader = OnnxLoader::new(&config, &models_dir, provider, progress_enabled);
    let settings = InterrogateSettings::from_config(&config);
    let mut interrogator = Interrogator::new(categories, artists, settings, loader);

    let file_progress = progress::create_file_progress(files.len(), progress_enabled);

    let mut records = Vec::with_capacity(files.len());
    let mut errors = 0;
    for file in &files {
        match open_image(file) {
            Ok(image) => {
                let prompt = interrogator.interrogate(&image);
                if args.json {
                    records.push(InterrogationRecord {
                        file: file.clone(),
                        prompt,
                    });
                } else {
                    println!("{}: {prompt}", file.display());
                }
            }
            Err(e) => {
                error!("Failed to process {}: {e}", file.display());
                errors += 1;
            }
        }
        progress::inc_progress(file_progress.as_ref());
    }
    progress::finish_progress(file_progress, "Complete");

    if args.json {
        let json = serde_json::to_string_pretty(&records)
            .map_err(|e| Error::JsonSerialize { source: e })?;
        println!("{json}");
    }

    info!(
        "Complete: {} interrogated, {} errors in {:.2}s",
        files.len() - errors,
        errors,
        total_start.elapsed().as_secs_f64()
    );
    if errors > 0 {
        warn!("{} file(s) had errors", errors);
    }
    Ok(())
}

fn upscale_files(args: &UpscaleArgs, mut config: Config, global: &GlobalArgs) -> Result<()> {
    let total_start = Instant::now();

    let files = collect_upscale_inputs(&args.inputs)?;
    if files.is_empty() {
        return Err(Error::NoValidImageFiles);
    }
    info!("Found {} image(s) to upscale", files.len());

    if let Some(scale) = args.scale {
        config.ldsr.target_scale = scale;
    }
    if let Some(steps) = args.steps {
        config.ldsr.steps = steps as usize;
    }
    if let Some(method) = args.downsample {
        config.ldsr.downsample = method;
    }
    if let Some(eta) = args.eta {
        config.ldsr.eta = eta;
    }
    if args.seed.is_some() {
        config.ldsr.seed = args.seed;
    }
    validate_config(&config)?;

    if let Some(dir) = &args.output_dir {
        std::fs::create_dir_all(dir)?;
    }

    let models_dir = models_dir(&config)?;
    let provider = resolve_provider(&config)?;
    let progress_enabled = !global.quiet;
    let mut upscaler = UpscalerLdsr::new(&config, &models_dir, provider, progress_enabled);
    let scale = config.ldsr.target_scale;

    let mut processed = 0;
    let mut skipped = 0;
    let mut errors = 0;
    for file in &files {
        let output = upscaled_output_path(file, args.output_dir.as_deref());
        if output.exists() && !args.force {
            info!("Skipping (output exists): {}", output.display());
            skipped += 1;
            continue;
        }

        upscaler.set_label(
            file.file_name()
                .map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned()),
        );
        let result = open_image(file)
            .and_then(|image| upscaler.upscale(&image, scale))
            .and_then(|upscaled| {
                upscaled.save(&output).map_err(|e| Error::ImageWrite {
                    path: output.clone(),
                    source: e,
                })
            });

        match result {
            Ok(()) => {
                info!("Wrote {}", output.display());
                processed += 1;
            }
            Err(e) => {
                error!("Failed to upscale {}: {e}", file.display());
                errors += 1;
            }
        }
    }

    info!(
        "Complete: {} upscaled with {}, {} skipped, {} errors in {:.2}s",
        processed,
        upscaler.name(),
        skipped,
        errors,
        total_start.elapsed().as_secs_f64()
    );
    if errors > 0 {
        warn!("{} file(s) had errors", errors);
    }
    Ok(())
}

fn handle_providers_command(json: bool) -> Result<()> {
    let providers = available_providers();

    if json {
        let metadata: Vec<_> = providers.iter().map(|p| p.metadata()).collect();
        let json = serde_json::to_string_pretty(&metadata)
            .map_err(|e| Error::JsonSerialize { source: e })?;
        println!("{json}");
        return Ok(());
    }

    println!("Available execution providers:");
    println!();
    for provider in &providers {
        println!("  ✓ {}", provider.metadata().description);
    }
    println!();
    println!("To use a specific provider:");
    println!("  --device <id>  Use a specific provider (cuda, tensorrt, directml, ...)");
    println!("  --gpu          Best available GPU provider");
    println!("  --cpu          Use CPU only");
    println!("  (default)      Auto-select (GPU if available, fallback to CPU)");
    Ok(())
}

fn config_path(global: &GlobalArgs) -> Result<PathBuf> {
    global
        .config
        .clone()
        .map_or_else(config_file_path, Ok)
}

fn handle_config_command(action: ConfigAction, config: &Config, global: &GlobalArgs) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let path = config_path(global)?;
            if path.exists() {
                println!("Configuration file already exists: {}", path.display());
            } else {
                save_config(&Config::default(), &path)?;
                println!("Created configuration file: {}", path.display());
                println!("\nNext steps:");
                println!("  vista models fetch");
            }
            Ok(())
        }
        ConfigAction::Show => {
            let contents = toml::to_string_pretty(config)
                .map_err(|e| Error::ConfigSerialize { source: e })?;
            println!("{contents}");
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", config_path(global)?.display());
            Ok(())
        }
    }
}

fn handle_models_command(action: ModelsAction, config: &Config, global: &GlobalArgs) -> Result<()> {
    let dir = models_dir(config)?;

    match action {
        ModelsAction::List { json } => {
            let statuses = registry::artifact_statuses(config, &dir);
            if json {
                let json = serde_json::to_string_pretty(&statuses)
                    .map_err(|e| Error::JsonSerialize { source: e })?;
                println!("{json}");
            } else {
                registry::list_artifacts(&statuses, &dir);
            }
            Ok(())
        }
        ModelsAction::Fetch => {
            let fetched = registry::fetch_missing(config, &dir, !global.quiet)?;
            println!("Fetched {fetched} artifact(s) into {}", dir.display());
            Ok(())
        }
        ModelsAction::Check => {
            let mut failed = 0;
            for (name, result) in registry::check_checksums(config, &dir) {
                match result {
                    Ok(()) => println!("  {name}: OK"),
                    Err(e) => {
                        println!("  {name}: {e}");
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                return Err(Error::ConfigValidation {
                    message: format!("{failed} artifact(s) failed verification"),
                });
            }
            Ok(())
        }
    }
}
