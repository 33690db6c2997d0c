//! Engine configuration: deployment tier, caps and default limits.
//!
//! Every field has a default, so an empty `[engine]` table (or none at all)
//! yields the stock carousel.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use carousel_core::CarouselError;
use carousel_core::admission::DEFAULT_GROUP_CAP;
use carousel_core::merge::DEFAULT_DISPLAY_CAP;
use carousel_core::types::{EventType, SourceId};

// ─── Tier ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Production,
    Beta,
    #[default]
    Development,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Beta => "beta",
            Self::Development => "development",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = CarouselError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "beta" => Ok(Self::Beta),
            "development" | "dev" => Ok(Self::Development),
            _ => Err(CarouselError::Configuration(format!("unknown tier: {s}"))),
        }
    }
}

// ─── Limits ──────────────────────────────────────────────────────────

/// Per-event-type default result limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLimits {
    pub latest_sales: usize,
    pub newest_list: usize,
}

impl EventLimits {
    pub const fn uniform(limit: usize) -> Self {
        Self {
            latest_sales: limit,
            newest_list: limit,
        }
    }

    pub fn for_event(&self, event_type: EventType) -> usize {
        match event_type {
            EventType::LatestSales => self.latest_sales,
            EventType::NewestList => self.newest_list,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Limits on the production tier.
    pub production: EventLimits,
    /// Limits on every other tier.
    pub other: EventLimits,
    /// Limit of each generative-drop request.
    pub generative: usize,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            production: EventLimits::uniform(15),
            other: EventLimits::uniform(8),
            generative: 10,
        }
    }
}

// ─── Disabled Sources ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisabledSources {
    pub production: Vec<SourceId>,
    pub beta: Vec<SourceId>,
    pub development: Vec<SourceId>,
}

impl Default for DisabledSources {
    fn default() -> Self {
        Self {
            production: vec![SourceId::Ahr],
            beta: vec![SourceId::Ahr],
            development: Vec::new(),
        }
    }
}

impl DisabledSources {
    pub fn for_tier(&self, tier: Tier) -> &[SourceId] {
        match tier {
            Tier::Production => &self.production,
            Tier::Beta => &self.beta,
            Tier::Development => &self.development,
        }
    }
}

// ─── Engine Config ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tier: Tier,
    /// Maximum number of events in the merged view.
    pub display_cap: usize,
    /// Maximum admitted events per group, unless whitelisted.
    pub group_cap: u32,
    /// Multiplier applied to the result limit when querying a source.
    pub overfetch_margin: usize,
    /// Sources queried by the latest-activity feeds.
    pub carousel_sources: Vec<SourceId>,
    pub disabled_sources: DisabledSources,
    pub limits: LimitConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tier: Tier::default(),
            display_cap: DEFAULT_DISPLAY_CAP,
            group_cap: DEFAULT_GROUP_CAP,
            overfetch_margin: 1,
            carousel_sources: vec![SourceId::Ahk, SourceId::Ahp, SourceId::Rmrk, SourceId::Ksm],
            disabled_sources: DisabledSources::default(),
            limits: LimitConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Reject zero caps, margins and limits.
    pub fn validate(&self) -> Result<(), CarouselError> {
        let positive = [
            ("display_cap", self.display_cap),
            ("overfetch_margin", self.overfetch_margin),
            ("limits.production.latest_sales", self.limits.production.latest_sales),
            ("limits.production.newest_list", self.limits.production.newest_list),
            ("limits.other.latest_sales", self.limits.other.latest_sales),
            ("limits.other.newest_list", self.limits.other.newest_list),
            ("limits.generative", self.limits.generative),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(CarouselError::Configuration(format!(
                "{name} must be positive"
            )));
        }
        if self.group_cap == 0 {
            return Err(CarouselError::Configuration(
                "group_cap must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_disabled(&self, source: SourceId) -> bool {
        self.disabled_sources.for_tier(self.tier).contains(&source)
    }

    /// Default result limit of a latest-activity request on this tier.
    pub fn feed_limit(&self, event_type: EventType) -> usize {
        match self.tier {
            Tier::Production => self.limits.production.for_event(event_type),
            Tier::Beta | Tier::Development => self.limits.other.for_event(event_type),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
