mod cli;
mod preset;
mod render;

use anyhow::Context;
use clap::Parser;
use stomp_effects::EffectRegistry;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{
    cli::{Cli, Command, RenderArgs},
    preset::Preset,
    render::Audio,
};

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Render(args) => run_render(&args),
        Command::List => list_effects(),
    }
}

fn run_render(args: &RenderArgs) -> anyhow::Result<()> {
    let input = render::read_wav(&args.input)?;
    let preset = match &args.preset {
        Some(path) => Preset::load(path)?,
        None => Preset::default(),
    };

    let block_size = args.block_size as usize;
    let registry = EffectRegistry::with_builtin();
    let mut chain = preset
        .build_chain(&registry, input.sample_rate, input.channels, block_size)
        .context("failed to build effect chain")?;

    let samples = render::render(
        &mut chain,
        &input,
        block_size,
        !args.no_latency_compensation,
    );
    let output = Audio { samples, ..input };
    render::write_wav(&args.output, &output)?;

    info!(
        output = %args.output.display(),
        frames = output.frames(),
        "render complete"
    );
    Ok(())
}

fn list_effects() -> anyhow::Result<()> {
    let registry = EffectRegistry::with_builtin();
    let json = serde_json::to_string_pretty(&registry.metadata())
        .context("failed to serialize effect metadata")?;
    println!("{json}");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
