//! Cost-based choice between priced containers.

use std::cmp::Ordering;

use serde::Serialize;
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

use crate::fit::FitCandidate;
use crate::model::ContainerClass;
use crate::rates::{ResolvedRate, SizeTier};
use crate::types::Money;

/// A container that fits the parcel, together with its resolved price.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({
    "container_id": "BOX-60",
    "container_name": "60 size box",
    "class": "box",
    "carrier": "CarrierB",
    "service": "Economy",
    "size_tier": "60",
    "shipping_price": 850,
    "container_cost": 40,
    "total_cost": 890,
    "fill_ratio": 0.21,
    "inner_volume": 5400000,
    "catalog_index": 1,
    "used_fallback_carrier": false
}))]
pub struct Candidate {
    pub container_id: String,
    pub container_name: String,
    pub class: ContainerClass,
    pub carrier: String,
    pub service: String,
    #[schema(value_type = String)]
    pub size_tier: SizeTier,
    pub shipping_price: Money,
    pub container_cost: Money,
    /// Shipping price plus container cost.
    pub total_cost: Money,
    pub fill_ratio: f64,
    pub inner_volume: u64,
    pub catalog_index: usize,
    pub used_fallback_carrier: bool,
}

impl Candidate {
    pub fn new(fit: &FitCandidate<'_>, rate: &ResolvedRate<'_>) -> Self {
        let container = fit.container;
        Self {
            container_id: container.id.clone(),
            container_name: container.display_name().to_string(),
            class: container.class,
            carrier: rate.entry.carrier.clone(),
            service: rate.entry.service.clone(),
            size_tier: rate.tier,
            shipping_price: rate.entry.price,
            container_cost: container.material_cost,
            total_cost: rate.entry.price.saturating_add(container.material_cost),
            fill_ratio: fit.fill_ratio,
            inner_volume: fit.inner_volume,
            catalog_index: fit.catalog_index,
            used_fallback_carrier: rate.used_fallback,
        }
    }
}

/// Total order over candidates: cheaper first, then lower fill ratio, then
/// smaller cavity, then earlier catalog position.
pub fn compare(a: &Candidate, b: &Candidate) -> Ordering {
    a.total_cost
        .cmp(&b.total_cost)
        .then_with(|| a.fill_ratio.total_cmp(&b.fill_ratio))
        .then_with(|| a.inner_volume.cmp(&b.inner_volume))
        .then_with(|| a.catalog_index.cmp(&b.catalog_index))
}

/// The single best candidate, or `None` when nothing qualified.
pub fn select_best(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().min_by(|a, b| compare(a, b))
}

/// Sorts candidates best first.
pub fn rank(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(compare);
    candidates
}
