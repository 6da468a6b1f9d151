use std::path::PathBuf;

use anyhow::{Context, Result};
use atlasmorph_core::validation::max_abs;
use atlasmorph_core::{identity_grid, GridSize, Volume};
use atlasmorph_model::{AnchoringMode, DiffeoVaeConfig, TracingObserver};
use burn::config::Config;
use burn::tensor::{Distribution, Tensor};
use burn_ndarray::NdArray;
use clap::{Parser, Subcommand};
use tracing::info;

type Backend = NdArray<f32>;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Developer tasks for atlasmorph")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode random latent codes against a synthetic atlas
    Decode {
        /// Model configuration (JSON); defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Atlas extent along every axis
        #[arg(short, long, default_value_t = 32)]
        size: usize,

        /// Use a 3D atlas instead of a 2D one
        #[arg(long)]
        three_d: bool,

        /// Latent dimension (ignored with --config)
        #[arg(short, long, default_value_t = 4)]
        latent: usize,

        /// Number of latent codes to decode
        #[arg(short, long, default_value_t = 2)]
        batch: usize,

        /// Enable the isometry constraint (ignored with --config)
        #[arg(long)]
        isometry: bool,

        /// Anchor codes on the atlas (ignored with --config)
        #[arg(long)]
        anchored: bool,
    },

    /// Write the default configuration as JSON
    Config {
        /// Latent dimension
        #[arg(short, long, default_value_t = 4)]
        latent: usize,

        /// Output file; printed to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Decode {
            config,
            size,
            three_d,
            latent,
            batch,
            isometry,
            anchored,
        } => {
            let config = match config {
                Some(path) => DiffeoVaeConfig::load(&path)
                    .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
                None => DiffeoVaeConfig::new(latent)
                    .with_isometry_constraint(isometry)
                    .with_anchoring(if anchored {
                        AnchoringMode::AtlasAnchored
                    } else {
                        AnchoringMode::Referential
                    }),
            };
            decode(config, size, three_d, batch)?;
        }
        Commands::Config { latent, output } => {
            let config = DiffeoVaeConfig::new(latent);
            match output {
                Some(path) => {
                    config
                        .save(&path)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Configuration written to {}", path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&config)?),
            }
        }
    }

    Ok(())
}

/// Disk (2D) or ball (3D) of intensity 0.8 on a 0.1 background.
fn synthetic_atlas(size: usize, three_d: bool) -> Result<Volume<Backend>> {
    let device = Default::default();
    let extents = if three_d { vec![size; 3] } else { vec![size; 2] };
    let grid = GridSize::new(&extents)?;

    let center = (size as f64 - 1.0) / 2.0;
    let radius = size as f64 / 4.0;
    let coords = identity_grid::<Backend>(&grid, &vec![1.0; grid.dimension()], &device);
    let dist_sq = coords.sub_scalar(center).powf_scalar(2.0).sum_dim(1);
    let inside = dist_sq.lower_equal_elem(radius * radius);
    let atlas = Tensor::<Backend, 5>::full(inside.shape(), 0.1, &device).mask_fill(inside, 0.8);

    Ok(Volume::new(atlas, grid)?)
}

fn decode(config: DiffeoVaeConfig, size: usize, three_d: bool, batch: usize) -> Result<()> {
    let device = Default::default();
    let atlas = synthetic_atlas(size, three_d)?;
    info!("Synthetic atlas {:?}", atlas.shape());

    let latent = config.latent_dimension;
    let model = config
        .init::<Backend>(atlas, &device)?
        .with_observer(TracingObserver::default());

    let z = Tensor::<Backend, 2>::random([batch, latent], Distribution::Normal(0.0, 1.0), &device);
    let output = model.decode_detailed(z)?;

    let reconstruction = output.reconstruction.data();
    info!("Reconstruction {:?}", output.reconstruction.shape());
    info!(
        "Intensity range [{:.6}, {:.6}]",
        reconstruction.clone().min().into_scalar(),
        reconstruction.clone().max().into_scalar()
    );
    info!("Max |v| {:.4}", max_abs(output.velocity.data()));
    info!("Decodes: {}", model.decode_count());

    Ok(())
}
