//! Fundamental metric snapshots.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Fundamental fields recognised by the resolver even when a snapshot omits them.
pub const FUNDAMENTAL_FIELDS: &[&str] = &[
    "pe_ratio",
    "price_to_book",
    "roe",
    "roa",
    "debt_to_equity",
    "current_ratio",
    "revenue_growth",
    "earnings_growth",
    "dividend_yield",
    "profit_margin",
    "market_cap",
];

pub fn is_known_fundamental(name: &str) -> bool {
    FUNDAMENTAL_FIELDS.contains(&name)
}

/// One crore, the unit the size bands are quoted in.
const CRORE: f64 = 1e7;
const LARGE_CAP_MIN_CRORE: f64 = 20_000.0;
const MID_CAP_MIN_CRORE: f64 = 5_000.0;

/// Size band derived from the `market_cap` metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MarketCapCategory {
    Large,
    Mid,
    Small,
}

impl MarketCapCategory {
    /// Large from 20,000 crore, Mid from 5,000 crore, Small below.
    pub fn from_market_cap(market_cap: f64) -> Self {
        let crore = market_cap / CRORE;
        if crore >= LARGE_CAP_MIN_CRORE {
            MarketCapCategory::Large
        } else if crore >= MID_CAP_MIN_CRORE {
            MarketCapCategory::Mid
        } else {
            MarketCapCategory::Small
        }
    }
}

impl fmt::Display for MarketCapCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketCapCategory::Large => write!(f, "Large Cap"),
            MarketCapCategory::Mid => write!(f, "Mid Cap"),
            MarketCapCategory::Small => write!(f, "Small Cap"),
        }
    }
}

impl FromStr for MarketCapCategory {
    type Err = String;

    /// Accepts `large`, `Large Cap`, `large_cap`, `mid-cap` and similar.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect();
        match normalized.strip_suffix("cap").unwrap_or(&normalized) {
            "large" => Ok(MarketCapCategory::Large),
            "mid" => Ok(MarketCapCategory::Mid),
            "small" => Ok(MarketCapCategory::Small),
            _ => Err(format!(
                "unknown market cap category '{}' (expected large, mid or small)",
                s.trim()
            )),
        }
    }
}

/// Metric name to optional value. An absent metric is `None`, never a sentinel.
///
/// Also carries the symbol's sector, which is descriptive metadata rather
/// than a comparable metric.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FundamentalSnapshot {
    values: BTreeMap<String, Option<f64>>,
    sector: Option<String>,
}

impl FundamentalSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a metric. Non-finite numbers are stored as absent.
    pub fn set(&mut self, name: &str, value: Option<f64>) {
        let value = value.filter(|v| v.is_finite());
        self.values.insert(name.to_ascii_lowercase(), value);
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.set(name, Some(value));
        self
    }

    pub fn with_missing(mut self, name: &str) -> Self {
        self.set(name, None);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied().flatten()
    }

    /// True when the snapshot lists the metric, whether or not it has a value.
    pub fn has_field(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.sector.is_none()
    }

    /// Blank names are stored as no sector.
    pub fn set_sector(&mut self, sector: &str) {
        let sector = sector.trim();
        self.sector = (!sector.is_empty()).then(|| sector.to_string());
    }

    pub fn with_sector(mut self, sector: &str) -> Self {
        self.set_sector(sector);
        self
    }

    pub fn sector(&self) -> Option<&str> {
        self.sector.as_deref()
    }

    pub fn market_cap_category(&self) -> Option<MarketCapCategory> {
        self.get("market_cap").map(MarketCapCategory::from_market_cap)
    }
}
