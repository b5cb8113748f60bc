//! Fetch and render one survey cutout from the command line.
//!
//! Runs the same pipeline as the `/tile` endpoint and prints where the raw
//! and rendered artifacts were written.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sky_common::{CutoutRequest, PositionQuery};
use storage::CutoutCache;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use tile_api::config::{RenderConfig, UpstreamConfig, DEFAULT_SKYVIEW_URL};
use tile_api::pipeline::TilePipeline;
use tile_api::upstream::SkyViewClient;

#[derive(Parser, Debug)]
#[command(name = "skyview-fetch")]
#[command(about = "Download a SkyView cutout and render it as a PNG figure")]
struct Args {
    /// Object name resolved by SkyView (e.g. M51)
    #[arg(long, conflicts_with_all = ["ra", "dec"], required_unless_present_all = ["ra", "dec"])]
    target: Option<String>,

    /// Right ascension in degrees (J2000)
    #[arg(long, requires = "dec", allow_negative_numbers = true)]
    ra: Option<f64>,

    /// Declination in degrees (J2000)
    #[arg(long, requires = "ra", allow_negative_numbers = true)]
    dec: Option<f64>,

    #[arg(long, default_value = "DSS2 Red")]
    survey: String,

    /// Cutout width in degrees
    #[arg(long, default_value_t = 0.4)]
    width: f64,

    /// Cutout height in degrees (defaults to width)
    #[arg(long)]
    height: Option<f64>,

    #[arg(long, default_value_t = 600)]
    pixels: u32,

    #[arg(long, default_value = "Tan")]
    projection: String,

    #[arg(long, default_value = "outputs")]
    output_dir: PathBuf,

    /// Reuse existing artifacts instead of fetching again
    #[arg(long)]
    no_overwrite: bool,

    #[arg(long, env = "SKYVIEW_BASE_URL", default_value = DEFAULT_SKYVIEW_URL)]
    skyview_url: String,

    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let level = args.log_level.parse::<Level>().unwrap_or(Level::WARN);
    tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_max_level(level).finish(),
    )?;

    let position = PositionQuery::resolve(args.target.as_deref(), args.ra, args.dec)?;
    let request = CutoutRequest::builder(position)
        .survey(args.survey)
        .width_deg(args.width)
        .height_deg(args.height)
        .pixels(args.pixels)
        .projection(args.projection)
        .overwrite(!args.no_overwrite)
        .build()?;

    let upstream = UpstreamConfig {
        base_url: args.skyview_url,
        ..UpstreamConfig::default()
    };
    let client = SkyViewClient::new(&upstream)?;
    let pipeline = TilePipeline::new(
        CutoutCache::new(&args.output_dir),
        Arc::new(client),
        RenderConfig::default().options(),
    );

    let product = pipeline
        .run(&request)
        .await
        .with_context(|| format!("Failed to produce cutout for {}", request.canonical_position()))?;

    println!("FITS: {}", product.raw_path.display());
    println!("PNG:  {}", product.rendered_path.display());
    println!("Cache: {}", product.cache_status);
    Ok(())
}
