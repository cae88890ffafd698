//! Container fit filter.
//!
//! Decides which containers can hold a parcel. Weight and per-item linear
//! checks are exact; the volumetric fill ceiling is a conservative stand-in
//! for real 3-D placement and may accept combinations a strict packer would
//! reject.

use serde::Serialize;
use tracing::trace;

use crate::geometry::{fill_ratio, fits_inside};
use crate::model::{Container, ContainerClass, Item};
use crate::types::{self, Grams};

/// Maximum fill ratios per context.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FillCeilings {
    /// Ordinary parcels.
    pub standard: f64,
    /// Parcels holding at least one fragile item.
    pub fragile: f64,
    /// `long` containers, regardless of fragility.
    pub long: f64,
}

impl FillCeilings {
    pub const DEFAULT_STANDARD: f64 = 0.90;
    pub const DEFAULT_FRAGILE: f64 = 0.80;
    pub const DEFAULT_LONG: f64 = 0.90;

    /// Ceiling that applies to a container class and parcel fragility.
    ///
    /// Long containers ignore the fragile ceiling; their usual contents are
    /// rigid and elongated.
    pub fn ceiling_for(&self, class: ContainerClass, has_fragile: bool) -> f64 {
        match class {
            ContainerClass::Long => self.long,
            _ if has_fragile => self.fragile,
            _ => self.standard,
        }
    }
}

impl Default for FillCeilings {
    fn default() -> Self {
        Self {
            standard: Self::DEFAULT_STANDARD,
            fragile: Self::DEFAULT_FRAGILE,
            long: Self::DEFAULT_LONG,
        }
    }
}

/// Why a container cannot hold a parcel.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum FitRejection {
    WeightExceeded {
        parcel_weight_g: u64,
        max_weight_g: Grams,
    },
    ItemDoesNotFit {
        item_seq: usize,
        product_id: String,
    },
    FillRatioExceeded {
        fill_ratio: f64,
        ceiling: f64,
    },
    EmptyCavity,
}

impl FitRejection {
    pub fn code(&self) -> &'static str {
        match self {
            FitRejection::WeightExceeded { .. } => "weight_exceeded",
            FitRejection::ItemDoesNotFit { .. } => "item_does_not_fit",
            FitRejection::FillRatioExceeded { .. } => "fill_ratio_exceeded",
            FitRejection::EmptyCavity => "empty_cavity",
        }
    }
}

impl std::fmt::Display for FitRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitRejection::WeightExceeded {
                parcel_weight_g,
                max_weight_g,
            } => write!(
                f,
                "parcel weighs {} g, container allows {} g",
                parcel_weight_g, max_weight_g
            ),
            FitRejection::ItemDoesNotFit {
                item_seq,
                product_id,
            } => write!(
                f,
                "item #{} ({}) does not fit in any allowed orientation",
                item_seq, product_id
            ),
            FitRejection::FillRatioExceeded {
                fill_ratio,
                ceiling,
            } => write!(
                f,
                "fill ratio {:.1}% exceeds the {:.1}% ceiling",
                fill_ratio * 100.0,
                ceiling * 100.0
            ),
            FitRejection::EmptyCavity => write!(f, "container has no inner volume"),
        }
    }
}

/// A container that can hold the parcel.
#[derive(Clone, Debug)]
pub struct FitCandidate<'c> {
    pub container: &'c Container,
    /// Position in the catalog; the final tie-break.
    pub catalog_index: usize,
    pub fill_ratio: f64,
    pub inner_volume: u64,
}

/// Outcome of filtering the whole container catalog for one parcel.
#[derive(Clone, Debug, Default)]
pub struct FitReport<'c> {
    /// Candidates in catalog order.
    pub candidates: Vec<FitCandidate<'c>>,
    /// Rejected containers in catalog order.
    pub rejections: Vec<(&'c Container, FitRejection)>,
}

impl FitReport<'_> {
    /// True if every container turned the parcel down for its weight alone.
    pub fn all_rejected_for_weight(&self) -> bool {
        self.candidates.is_empty()
            && !self.rejections.is_empty()
            && self
                .rejections
                .iter()
                .all(|(_, reason)| matches!(reason, FitRejection::WeightExceeded { .. }))
    }
}

/// Checks one container against the parcel's items.
///
/// Returns the fill ratio when the container qualifies. Checks run in a fixed
/// order (weight, cavity, per-item orientation, fill ceiling) so the reported
/// rejection is stable.
pub fn check_container(
    items: &[Item],
    container: &Container,
    ceilings: &FillCeilings,
) -> Result<f64, FitRejection> {
    let parcel_weight_g = types::total_weight(items);
    if parcel_weight_g > u64::from(container.max_weight_g) {
        return Err(FitRejection::WeightExceeded {
            parcel_weight_g,
            max_weight_g: container.max_weight_g,
        });
    }

    let capacity = container.inner_volume();
    let ratio =
        fill_ratio(types::total_volume(items), capacity).ok_or(FitRejection::EmptyCavity)?;

    if let Some(item) = items.iter().find(|item| {
        !fits_inside(
            item.effective_dims,
            container.inner,
            item.can_rotate && container.allows_rotation,
        )
    }) {
        return Err(FitRejection::ItemDoesNotFit {
            item_seq: item.seq,
            product_id: item.product_id.clone(),
        });
    }

    let has_fragile = items.iter().any(|item| item.fragile);
    let ceiling = ceilings.ceiling_for(container.class, has_fragile);
    if ratio > ceiling {
        return Err(FitRejection::FillRatioExceeded {
            fill_ratio: ratio,
            ceiling,
        });
    }

    Ok(ratio)
}

/// Splits the catalog into candidates and rejections for one parcel.
pub fn filter_containers<'c>(
    items: &[Item],
    containers: &'c [Container],
    ceilings: &FillCeilings,
) -> FitReport<'c> {
    let mut report = FitReport::default();

    for (catalog_index, container) in containers.iter().enumerate() {
        match check_container(items, container, ceilings) {
            Ok(fill_ratio) => report.candidates.push(FitCandidate {
                container,
                catalog_index,
                fill_ratio,
                inner_volume: container.inner_volume(),
            }),
            Err(reason) => {
                trace!(container_id = %container.id, reason = reason.code(), "container rejected");
                report.rejections.push((container, reason));
            }
        }
    }

    report
}
