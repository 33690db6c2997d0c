//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use carousel_core::chart::{DEFAULT_OUTLIER_SCALE, DEFAULT_SAMPLE_RATE};
use carousel_core::types::EventType;
use carousel_gateway::config::Tier;

#[derive(Parser)]
#[command(name = "carousel", about = "Recent NFT activity merged across indexers")]
pub struct Cli {
    /// TOML config file
    #[arg(long, short = 'c', global = true, env = "CAROUSEL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Deployment tier (overrides the config file)
    #[arg(long, global = true, env = "CAROUSEL_TIER")]
    pub tier: Option<Tier>,

    /// Serve every source from `<dir>/<source>.json` instead of the indexers
    #[arg(long, global = true)]
    pub fixtures: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Latest sales or listings across every carousel source
    Feed(FeedOpts),
    /// Sales and listings of generative drops
    Generative(GenerativeOpts),
    /// Bin a price series and drop outliers
    Chart(ChartOpts),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FeedKind {
    LatestSales,
    NewestList,
}

impl From<FeedKind> for EventType {
    fn from(kind: FeedKind) -> Self {
        match kind {
            FeedKind::LatestSales => EventType::LatestSales,
            FeedKind::NewestList => EventType::NewestList,
        }
    }
}

#[derive(clap::Args)]
pub struct FeedOpts {
    #[arg(long = "type", value_enum, default_value = "latest-sales")]
    pub kind: FeedKind,

    /// Print the merged view as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args)]
pub struct GenerativeOpts {
    /// Group ids on Asset Hub Kusama (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub ahk: Vec<String>,

    /// Group ids on Asset Hub Polkadot (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub ahp: Vec<String>,

    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args)]
pub struct ChartOpts {
    /// JSON array of events or `{timestamp, value}` points
    pub file: PathBuf,

    /// Fixed bin width; derived from the range when omitted
    #[arg(long)]
    pub bin_minutes: Option<u32>,

    #[arg(long, default_value_t = DEFAULT_OUTLIER_SCALE)]
    pub outlier_scale: f64,

    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: f64,

    /// Token decimals used to scale values for display
    #[arg(long)]
    pub decimals: Option<u32>,

    #[arg(long)]
    pub json: bool,
}
