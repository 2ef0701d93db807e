use std::time::{Duration, Instant};

use anyhow::Result;
use burn::prelude::*;
use clap::Parser;
use poolnet_burn::PoolNetConfig;
use poolnet_demos::backend::{create_device, SelectedBackend, BACKEND_NAME};

/// Time the PoolNet forward pass on zero images
#[derive(Parser)]
#[command(name = "bench")]
struct Args {
    /// Square input edge in pixels
    #[arg(long, default_value_t = 384)]
    size: usize,

    /// Images per forward pass
    #[arg(long, default_value_t = 1)]
    batch: usize,

    /// Timed forward passes
    #[arg(long, default_value_t = 20)]
    iterations: usize,
}

fn main() -> Result<()> {
    poolnet_demos::init_tracing();
    let Args {
        size,
        batch,
        iterations,
    } = Args::parse();

    let device = create_device();
    tracing::info!(backend = BACKEND_NAME, size, batch, iterations, "benchmarking PoolNet");

    let config = PoolNetConfig::new();
    config.check_input_size([size, size])?;
    let model = config.init::<SelectedBackend>(&device)?;

    let start = Instant::now();
    let mut timings = Vec::with_capacity(iterations);
    for i in 0..iterations {
        let start_ = Instant::now();
        let x = Tensor::<SelectedBackend, 4>::zeros([batch, 3, size, size], &device);
        // Reading the result back forces asynchronous backends to finish the pass.
        let _y = model.forward(x)?.into_data();
        let elapsed = start_.elapsed();
        tracing::info!(iteration = i, ?elapsed, "forward");
        timings.push(elapsed);
    }

    let total = start.elapsed();
    let mean = timings.iter().sum::<Duration>() / u32::try_from(iterations.max(1))?;
    tracing::info!(
        ?total,
        ?mean,
        images_per_sec = (iterations * batch) as f32 / total.as_secs_f32(),
        "finished"
    );

    Ok(())
}
