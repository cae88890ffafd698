//! Shipping size tiers and carrier rate resolution.

use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, warn};

use crate::geometry::size_score_cm;
use crate::model::{Container, ContainerClass, RateEntry, ValidationError};

/// Tier label used by mailers.
pub const MAIL_TIER: &str = "MAIL";
/// Service for the mail tier.
pub const MAIL_SERVICE: &str = "Mail";
/// Service for every size tier.
pub const ECONOMY_SERVICE: &str = "Economy";

/// A discretized shipping size category.
///
/// Serializes as its label (`"MAIL"`, `"80"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SizeTier {
    Mail,
    /// Upper bound of the linear size score in centimetres.
    Size(u32),
}

impl SizeTier {
    /// Service name that prices this tier.
    pub fn service(&self) -> &'static str {
        match self {
            SizeTier::Mail => MAIL_SERVICE,
            SizeTier::Size(_) => ECONOMY_SERVICE,
        }
    }

    fn matches(&self, label: &str) -> bool {
        let label = label.trim();
        match self {
            SizeTier::Mail => label.eq_ignore_ascii_case(MAIL_TIER),
            SizeTier::Size(threshold) => label.parse::<u32>().is_ok_and(|v| v == *threshold),
        }
    }
}

impl std::fmt::Display for SizeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizeTier::Mail => f.write_str(MAIL_TIER),
            SizeTier::Size(threshold) => write!(f, "{}", threshold),
        }
    }
}

impl Serialize for SizeTier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Ordered size-score thresholds in centimetres.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SizeTiers {
    thresholds: Vec<u32>,
}

impl SizeTiers {
    pub const DEFAULT_THRESHOLDS: [u32; 6] = [60, 80, 100, 120, 140, 160];

    /// Accepts a non-empty, strictly ascending list of positive thresholds.
    pub fn new(thresholds: Vec<u32>) -> Result<Self, ValidationError> {
        if thresholds.is_empty() {
            return Err(ValidationError::InvalidConfiguration(
                "at least one size tier is required".to_string(),
            ));
        }
        if thresholds[0] == 0 || thresholds.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ValidationError::InvalidConfiguration(format!(
                "size tiers must be positive and strictly ascending, got {:?}",
                thresholds
            )));
        }
        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> &[u32] {
        &self.thresholds
    }

    /// Smallest threshold that is at least `score`.
    pub fn tier_for_score(&self, score_cm: u32) -> Option<u32> {
        self.thresholds.iter().copied().find(|&t| score_cm <= t)
    }

    fn largest(&self) -> u32 {
        self.thresholds.last().copied().unwrap_or_default()
    }
}

impl Default for SizeTiers {
    fn default() -> Self {
        Self {
            thresholds: Self::DEFAULT_THRESHOLDS.to_vec(),
        }
    }
}

/// Which carrier to price with, and which to fall back to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CarrierPolicy {
    pub requested: String,
    pub fallback: String,
}

impl CarrierPolicy {
    pub const DEFAULT_REQUESTED: &'static str = "CarrierB";
    pub const DEFAULT_FALLBACK: &'static str = "CarrierA";

    pub fn new(requested: impl Into<String>, fallback: impl Into<String>) -> Self {
        Self {
            requested: requested.into(),
            fallback: fallback.into(),
        }
    }
}

impl Default for CarrierPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_REQUESTED, Self::DEFAULT_FALLBACK)
    }
}

/// Why no price could be found for a container.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RateError {
    #[error("size score {score_cm} cm exceeds the largest tier ({largest_tier} cm)")]
    NoSizeTier { score_cm: u32, largest_tier: u32 },
    #[error(
        "no {service} rate for tier {tier} from {requested_carrier} or fallback {fallback_carrier}"
    )]
    ConfigurationGap {
        tier: String,
        service: String,
        requested_carrier: String,
        fallback_carrier: String,
    },
    #[error("no {service} rate for tier {tier} covers {parcel_weight_g} g")]
    WeightAboveRates {
        tier: String,
        service: String,
        parcel_weight_g: u64,
    },
}

impl RateError {
    pub fn code(&self) -> &'static str {
        match self {
            RateError::NoSizeTier { .. } => "no_size_tier",
            RateError::ConfigurationGap { .. } => "configuration_gap",
            RateError::WeightAboveRates { .. } => "weight_above_rates",
        }
    }
}

/// A price found for a container.
#[derive(Clone, Debug)]
pub struct ResolvedRate<'r> {
    pub entry: &'r RateEntry,
    pub tier: SizeTier,
    /// True when the requested carrier had no usable rate.
    pub used_fallback: bool,
}

/// Maps a container to its size tier.
///
/// Mailers always ship in the mail tier. Everything else is scored by its
/// outer dimensions.
pub fn size_tier(container: &Container, tiers: &SizeTiers) -> Result<SizeTier, RateError> {
    if container.class == ContainerClass::Mailer {
        return Ok(SizeTier::Mail);
    }
    let score_cm = size_score_cm(container.outer);
    tiers
        .tier_for_score(score_cm)
        .map(SizeTier::Size)
        .ok_or(RateError::NoSizeTier {
            score_cm,
            largest_tier: tiers.largest(),
        })
}

enum CarrierLookup<'r> {
    Found(&'r RateEntry),
    TooLight,
    Missing,
}

/// Lightest sufficient weight band for one carrier; lower price, then table
/// order, break ties.
fn lookup_carrier<'r>(
    rates: &'r [RateEntry],
    carrier: &str,
    tier: SizeTier,
    parcel_weight_g: u64,
) -> CarrierLookup<'r> {
    let service = tier.service();
    let mut any = false;
    let best = rates
        .iter()
        .filter(|rate| {
            rate.carrier == carrier && rate.service == service && tier.matches(&rate.size_tier)
        })
        .inspect(|_| any = true)
        .filter(|rate| u64::from(rate.max_weight_g) >= parcel_weight_g)
        .min_by_key(|rate| (rate.max_weight_g, rate.price));

    match best {
        Some(rate) => CarrierLookup::Found(rate),
        None if any => CarrierLookup::TooLight,
        None => CarrierLookup::Missing,
    }
}

/// Prices a container for a parcel weight.
///
/// Tries the requested carrier first and the fallback carrier second. Fails
/// only when neither has a matching rate.
pub fn resolve_rate<'r>(
    container: &Container,
    parcel_weight_g: u64,
    rates: &'r [RateEntry],
    tiers: &SizeTiers,
    carriers: &CarrierPolicy,
) -> Result<ResolvedRate<'r>, RateError> {
    let tier = size_tier(container, tiers)?;

    let requested = lookup_carrier(rates, &carriers.requested, tier, parcel_weight_g);
    if let CarrierLookup::Found(entry) = requested {
        return Ok(ResolvedRate {
            entry,
            tier,
            used_fallback: false,
        });
    }

    let fallback = if carriers.fallback == carriers.requested {
        CarrierLookup::Missing
    } else {
        lookup_carrier(rates, &carriers.fallback, tier, parcel_weight_g)
    };
    match (requested, fallback) {
        (_, CarrierLookup::Found(entry)) => {
            debug!(
                container_id = %container.id,
                tier = %tier,
                requested = %carriers.requested,
                fallback = %carriers.fallback,
                "requested carrier has no rate, using fallback carrier"
            );
            Ok(ResolvedRate {
                entry,
                tier,
                used_fallback: true,
            })
        }
        (CarrierLookup::TooLight, _) | (_, CarrierLookup::TooLight) => {
            Err(RateError::WeightAboveRates {
                tier: tier.to_string(),
                service: tier.service().to_string(),
                parcel_weight_g,
            })
        }
        _ => {
            warn!(
                container_id = %container.id,
                tier = %tier,
                requested = %carriers.requested,
                fallback = %carriers.fallback,
                "rate table has no entry for tier"
            );
            Err(RateError::ConfigurationGap {
                tier: tier.to_string(),
                service: tier.service().to_string(),
                requested_carrier: carriers.requested.clone(),
                fallback_carrier: carriers.fallback.clone(),
            })
        }
    }
}
