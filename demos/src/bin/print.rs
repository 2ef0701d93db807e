use anyhow::Result;
use burn::prelude::*;
use clap::Parser;
use poolnet_burn::{PoolNetConfig, ResNetConfig};
use poolnet_demos::backend::{create_device, SelectedBackend, BACKEND_NAME};

/// Print the PoolNet module tree and its parameter count
#[derive(Parser)]
#[command(name = "print")]
struct Args {
    /// Bottleneck blocks per backbone stage
    #[arg(long, value_delimiter = ',', default_values_t = [3, 4, 6, 3])]
    layers: Vec<usize>,
}

fn main() -> Result<()> {
    poolnet_demos::init_tracing();
    let args = Args::parse();

    let device = create_device();
    tracing::info!(backend = BACKEND_NAME, layers = ?args.layers, "building PoolNet");

    let model = PoolNetConfig::new()
        .with_backbone(ResNetConfig::new().with_layers(args.layers))
        .init::<SelectedBackend>(&device)?;

    println!("{model}");
    tracing::info!(params = model.num_params(), "done");

    Ok(())
}
