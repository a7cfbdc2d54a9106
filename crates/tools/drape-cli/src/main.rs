//! Drape CLI - turn garment cut-outs into relief meshes

mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::FlagOverrides;
use drape::matte::{self, DEFAULT_MAX_DIM};
use drape::pipeline::supported_formats;
use drape::{generate_file, validate_output_path};
use image::imageops::{self, FilterType};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Drape CLI - garment image to 3D mesh tool
#[derive(Parser)]
#[command(name = "drape")]
#[command(about = "Convert alpha-masked garment images into textured relief meshes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a mesh from an RGBA cut-out
    Mesh {
        /// Input image with the background made transparent
        input: PathBuf,

        /// Output mesh path (.obj, .ply or .stl)
        #[arg(short, long)]
        output: PathBuf,

        /// Alpha values above this count as garment (0-255)
        #[arg(long)]
        alpha_threshold: Option<u8>,

        /// Vertex position multipliers
        #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
        scale: Option<Vec<f32>>,

        /// Integer downscale factor applied before meshing
        #[arg(long)]
        downscale: Option<u32>,

        /// Simplify to at most this many triangles
        #[arg(long)]
        target_triangles: Option<usize>,

        /// TOML file with pipeline settings
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print run statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Composite a photo and a segmentation mask into an RGBA cut-out
    Matte {
        /// Garment photo
        photo: PathBuf,

        /// Grayscale mask, nonzero where the garment is
        mask: PathBuf,

        /// Output image path (.png)
        #[arg(short, long)]
        output: PathBuf,

        /// Longest side the photo is reduced to
        #[arg(long, default_value_t = DEFAULT_MAX_DIM)]
        max_dim: u32,

        /// Crop fully transparent margins
        #[arg(long)]
        trim: bool,
    },
}

fn main() -> anyhow::Result<()> {
    // A missing .env is fine
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Mesh {
            input,
            output,
            alpha_threshold,
            scale,
            downscale,
            target_triangles,
            config,
            json,
        } => {
            let flags = FlagOverrides {
                alpha_threshold,
                scale: scale.map(|s| [s[0], s[1], s[2]]),
                downscale,
                target_triangles,
            };
            mesh_command(&input, &output, config.as_deref(), &flags, json)?;
        }
        Commands::Matte {
            photo,
            mask,
            output,
            max_dim,
            trim,
        } => {
            matte_command(&photo, &mask, &output, max_dim, trim)?;
        }
    }

    Ok(())
}

fn spinner(message: &'static str) -> anyhow::Result<ProgressBar> {
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    progress.enable_steady_tick(Duration::from_millis(100));
    progress.set_message(message);
    Ok(progress)
}

fn mesh_command(
    input: &Path,
    output: &Path,
    config_file: Option<&Path>,
    flags: &FlagOverrides,
    json: bool,
) -> anyhow::Result<()> {
    // Fail on a bad extension before touching the input
    validate_output_path(output).with_context(|| {
        let names: Vec<_> = supported_formats().iter().map(|f| f.extension()).collect();
        format!("supported output formats: {}", names.join(", "))
    })?;

    let config = config::resolve(config_file, flags)?;
    debug!(?config, "Resolved pipeline configuration");

    if !json {
        println!("Drape Relief Mesher");
        println!("===================");
        println!("Input: {}", input.display());
        println!("Output: {}", output.display());
        println!("Alpha threshold: {}", config.alpha_threshold);
        println!(
            "Scale: {} {} {}",
            config.scale[0], config.scale[1], config.scale[2]
        );
        println!("Downscale: {}", config.downscale_factor);
        if let Some(target) = config.target_triangles {
            println!("Target triangles: {}", target);
        }
        println!();
    }

    let progress = spinner("Building mesh...")?;
    let stats = match generate_file(input, output, &config) {
        Ok(stats) => {
            progress.finish_with_message("✓ Mesh complete");
            stats
        }
        Err(e) => {
            progress.finish_with_message(format!("✗ Failed during {}", e.stage()));
            return Err(e).with_context(|| format!("failed to mesh {}", input.display()));
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Grid: {}x{}", stats.grid.0, stats.grid.1);
        println!("  {} vertices", stats.vertices);
        println!("  {} triangles", stats.triangles);
        println!("✓ Saved to {}", output.display());
    }

    Ok(())
}

fn matte_command(
    photo_path: &Path,
    mask_path: &Path,
    output: &Path,
    max_dim: u32,
    trim: bool,
) -> anyhow::Result<()> {
    let photo = image::open(photo_path)
        .with_context(|| format!("failed to open photo {}", photo_path.display()))?
        .to_rgb8();
    let mut mask = image::open(mask_path)
        .with_context(|| format!("failed to open mask {}", mask_path.display()))?
        .to_luma8();

    let progress = spinner("Compositing matte...")?;

    let bounded = matte::bound_photo(&photo, max_dim);
    // A mask made for the full-size photo follows it down
    if mask.dimensions() == photo.dimensions() && bounded.dimensions() != photo.dimensions() {
        mask = imageops::resize(&mask, bounded.width(), bounded.height(), FilterType::Nearest);
    }

    let mut rgba = match matte::composite(&bounded, &mask) {
        Ok(rgba) => rgba,
        Err(e) => {
            progress.finish_with_message("✗ Compositing failed");
            return Err(e).context("failed to composite matte");
        }
    };
    if trim {
        rgba = matte::trim_transparent(&rgba);
    }

    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    rgba.save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    progress.finish_with_message("✓ Matte complete");
    println!("✓ Saved to {} ({}x{})", output.display(), rgba.width(), rgba.height());

    Ok(())
}
