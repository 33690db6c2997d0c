//! carousel: recent-activity carousel runtime binary.
//! Merges the latest sales and listings of several NFT indexers into one
//! capped, newest-first view.

use clap::Parser;

mod cli;
mod cmd_chart;
mod cmd_feed;
mod config;
mod render;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // stdout carries the rendered view; logs go to stderr.
    let filter = std::env::var("CAROUSEL_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        cli::Command::Feed(opts) => {
            let config = config::FileConfig::resolve(args.config.as_deref(), args.tier)?;
            tracing::info!(tier = %config.engine.tier, kind = ?opts.kind, "building feed");
            cmd_feed::cmd_feed(&config, args.fixtures.as_deref(), &opts).await?;
        }
        cli::Command::Generative(opts) => {
            let config = config::FileConfig::resolve(args.config.as_deref(), args.tier)?;
            tracing::info!(
                tier = %config.engine.tier,
                ahk = opts.ahk.len(),
                ahp = opts.ahp.len(),
                "building generative feed"
            );
            cmd_feed::cmd_generative(&config, args.fixtures.as_deref(), &opts).await?;
        }
        cli::Command::Chart(opts) => {
            cmd_chart::cmd_chart(&opts)?;
        }
    }

    Ok(())
}
