//! Recommendation assembly: per-parcel results, order totals and the plan
//! record handed to persistence.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

use crate::model::Item;
use crate::selector::Candidate;
use crate::splitter::{self, Parcel, SplitCause};
use crate::types::Money;

/// Why a parcel could not be given a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InfeasibleReason {
    /// Every container refused the parcel for its weight.
    WeightExceeded,
    /// No container holds every item under the fill ceiling.
    NoContainerLargeEnough,
    /// Some containers fit but none could be priced.
    NoRateAvailable,
}

impl InfeasibleReason {
    pub fn code(&self) -> &'static str {
        match self {
            InfeasibleReason::WeightExceeded => "weight_exceeded",
            InfeasibleReason::NoContainerLargeEnough => "no_container_large_enough",
            InfeasibleReason::NoRateAvailable => "no_rate_available",
        }
    }
}

impl std::fmt::Display for InfeasibleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfeasibleReason::WeightExceeded => {
                write!(f, "parcel is heavier than every container allows")
            }
            InfeasibleReason::NoContainerLargeEnough => {
                write!(f, "no container is large enough for the parcel")
            }
            InfeasibleReason::NoRateAvailable => {
                write!(f, "no shipping rate is available for any fitting container")
            }
        }
    }
}

/// Which check turned a container down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RejectionStage {
    Fit,
    Rate,
}

/// One container that was considered and rejected, with the reason.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct ContainerDiagnostic {
    pub container_id: String,
    pub stage: RejectionStage,
    pub code: String,
    pub message: String,
}

/// Outcome of resolving one parcel.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ParcelOutcome {
    Resolved { selection: Candidate },
    Infeasible { reason: InfeasibleReason, message: String },
}

impl ParcelOutcome {
    pub fn infeasible(reason: InfeasibleReason) -> Self {
        ParcelOutcome::Infeasible {
            reason,
            message: reason.to_string(),
        }
    }
}

/// A split parcel after container and rate selection.
#[derive(Clone, Debug)]
pub struct ResolvedParcel {
    pub parcel: Parcel,
    pub outcome: ParcelOutcome,
    pub rejected: Vec<ContainerDiagnostic>,
}

/// One parcel of the recommendation.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ParcelResult {
    /// 1-based position in the recommendation.
    pub parcel_no: usize,
    pub items: Vec<Item>,
    pub total_weight_g: u64,
    pub total_volume_mm3: u64,
    pub fragile: bool,
    /// Rules that split the order. Shared by every parcel of a split order.
    pub split_rationale: Vec<SplitCause>,
    pub outcome: ParcelOutcome,
    pub rejected_containers: Vec<ContainerDiagnostic>,
}

impl ParcelResult {
    pub fn selection(&self) -> Option<&Candidate> {
        match &self.outcome {
            ParcelOutcome::Resolved { selection } => Some(selection),
            ParcelOutcome::Infeasible { .. } => None,
        }
    }

    pub fn is_feasible(&self) -> bool {
        self.selection().is_some()
    }
}

/// Sums over the resolved parcels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrderTotals {
    pub shipping: Money,
    pub containers: Money,
    pub grand_total: Money,
}

/// Full answer for one order.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct Recommendation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub parcels: Vec<ParcelResult>,
    /// Distinct split causes of the whole order, sorted.
    pub split_rationale: Vec<SplitCause>,
    pub totals: OrderTotals,
    /// False when at least one parcel is infeasible.
    pub is_complete: bool,
}

/// A parcel that could not be shipped, as reported to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct InfeasibleParcel {
    pub parcel_no: usize,
    pub item_seqs: Vec<usize>,
    pub product_ids: Vec<String>,
    pub reason: InfeasibleReason,
    pub message: String,
}

impl Recommendation {
    pub fn parcel_count(&self) -> usize {
        self.parcels.len()
    }

    pub fn item_count(&self) -> usize {
        self.parcels.iter().map(|p| p.items.len()).sum()
    }

    /// Every infeasible parcel with the items it holds.
    pub fn infeasible_report(&self) -> Vec<InfeasibleParcel> {
        self.parcels
            .iter()
            .filter_map(|parcel| match &parcel.outcome {
                ParcelOutcome::Infeasible { reason, message } => Some(InfeasibleParcel {
                    parcel_no: parcel.parcel_no,
                    item_seqs: parcel.items.iter().map(|i| i.seq).collect(),
                    product_ids: parcel.items.iter().map(|i| i.product_id.clone()).collect(),
                    reason: *reason,
                    message: message.clone(),
                }),
                ParcelOutcome::Resolved { .. } => None,
            })
            .collect()
    }

    /// Flattens the recommendation into the shape stored by the plan archive.
    pub fn to_plan_record(&self) -> PlanRecord {
        let reasons: BTreeSet<&str> = self
            .split_rationale
            .iter()
            .map(|cause| cause.reason.as_str())
            .filter(|reason| !reason.is_empty())
            .collect();
        let split_reason = (self.parcels.len() > 1 && !reasons.is_empty())
            .then(|| reasons.into_iter().collect::<Vec<_>>().join(" / "));

        PlanRecord {
            order_id: self.order_id.clone(),
            parcel_count: self.parcels.len(),
            total_shipping: self.totals.shipping,
            total_container_cost: self.totals.containers,
            grand_total: self.totals.grand_total,
            split_reason,
            is_complete: self.is_complete,
            parcels: self.parcels.iter().map(ParcelRecord::from_result).collect(),
        }
    }
}

/// Assembles the recommendation from resolved parcels, in parcel order.
pub fn compose(order_id: Option<String>, resolved: Vec<ResolvedParcel>) -> Recommendation {
    let split_rationale = splitter::collect_causes(resolved.iter().map(|r| &r.parcel));
    let shared_rationale = if resolved.len() > 1 {
        split_rationale.clone()
    } else {
        Vec::new()
    };

    let mut totals = OrderTotals::default();
    let mut is_complete = true;
    let mut results = Vec::with_capacity(resolved.len());

    for (idx, entry) in resolved.into_iter().enumerate() {
        match &entry.outcome {
            ParcelOutcome::Resolved { selection } => {
                totals.shipping = totals.shipping.saturating_add(selection.shipping_price);
                totals.containers = totals.containers.saturating_add(selection.container_cost);
            }
            ParcelOutcome::Infeasible { .. } => is_complete = false,
        }
        let total_weight_g = entry.parcel.total_weight();
        let total_volume_mm3 = entry.parcel.total_volume();
        let fragile = entry.parcel.has_fragile();
        results.push(ParcelResult {
            parcel_no: idx + 1,
            items: entry.parcel.items,
            total_weight_g,
            total_volume_mm3,
            fragile,
            split_rationale: shared_rationale.clone(),
            outcome: entry.outcome,
            rejected_containers: entry.rejected,
        });
    }
    totals.grand_total = totals.shipping.saturating_add(totals.containers);

    Recommendation {
        order_id,
        parcels: results,
        split_rationale,
        totals,
        is_complete,
    }
}

/// How many units of one product a parcel holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct ItemMembership {
    pub product_id: String,
    pub quantity: u32,
}

/// One parcel row of a stored plan.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ParcelRecord {
    pub parcel_no: usize,
    /// Sorted by product id.
    pub items: Vec<ItemMembership>,
    pub container_id: Option<String>,
    pub carrier: Option<String>,
    pub service: Option<String>,
    pub size_tier: Option<String>,
    pub shipping_price: Option<Money>,
    pub container_cost: Option<Money>,
    pub fill_ratio: Option<f64>,
    /// Set for parcels that found no container.
    pub warning: Option<String>,
}

impl ParcelRecord {
    fn from_result(result: &ParcelResult) -> Self {
        let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
        for item in &result.items {
            *counts.entry(item.product_id.as_str()).or_default() += 1;
        }
        let items = counts
            .into_iter()
            .map(|(product_id, quantity)| ItemMembership {
                product_id: product_id.to_string(),
                quantity,
            })
            .collect();

        match &result.outcome {
            ParcelOutcome::Resolved { selection } => Self {
                parcel_no: result.parcel_no,
                items,
                container_id: Some(selection.container_id.clone()),
                carrier: Some(selection.carrier.clone()),
                service: Some(selection.service.clone()),
                size_tier: Some(selection.size_tier.to_string()),
                shipping_price: Some(selection.shipping_price),
                container_cost: Some(selection.container_cost),
                fill_ratio: Some(selection.fill_ratio),
                warning: None,
            },
            ParcelOutcome::Infeasible { message, .. } => Self {
                parcel_no: result.parcel_no,
                items,
                container_id: None,
                carrier: None,
                service: None,
                size_tier: None,
                shipping_price: None,
                container_cost: None,
                fill_ratio: None,
                warning: Some(format!("No suitable container found: {}", message)),
            },
        }
    }
}

/// Plan header plus parcel rows, as persisted by collaborators.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({
    "order_id": "ORD-1001",
    "parcel_count": 2,
    "total_shipping": 1650,
    "total_container_cost": 80,
    "grand_total": 1730,
    "split_reason": "contamination",
    "is_complete": true,
    "parcels": []
}))]
pub struct PlanRecord {
    pub order_id: Option<String>,
    pub parcel_count: usize,
    pub total_shipping: Money,
    pub total_container_cost: Money,
    pub grand_total: Money,
    /// Distinct rule reasons joined with `" / "`; only set for split orders.
    pub split_reason: Option<String>,
    pub is_complete: bool,
    pub parcels: Vec<ParcelRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContainerClass, ProhibitedRule};
    use crate::rates::SizeTier;
    use crate::splitter::split_into_parcels;
    use crate::types::Dims;

    fn item(seq: usize, product_id: &str, group: Option<&str>) -> Item {
        let dims = Dims::new(10, 10, 10);
        Item {
            seq,
            product_id: product_id.to_string(),
            name: None,
            raw_dims: dims,
            effective_dims: dims,
            weight_g: 100,
            can_rotate: true,
            fragile: false,
            prohibited_group: group.map(str::to_string),
            padding_mm: 0,
        }
    }

    fn selection(container_id: &str, shipping_price: Money, container_cost: Money) -> Candidate {
        Candidate {
            container_id: container_id.to_string(),
            container_name: container_id.to_string(),
            class: ContainerClass::Box,
            carrier: "CarrierB".to_string(),
            service: "Economy".to_string(),
            size_tier: SizeTier::Size(60),
            shipping_price,
            container_cost,
            total_cost: shipping_price.saturating_add(container_cost),
            fill_ratio: 0.25,
            inner_volume: 1_000_000,
            catalog_index: 0,
            used_fallback_carrier: false,
        }
    }

    fn resolve(parcel: Parcel, outcome: ParcelOutcome) -> ResolvedParcel {
        ResolvedParcel {
            parcel,
            outcome,
            rejected: Vec::new(),
        }
    }

    #[test]
    fn totals_cover_resolved_parcels_only() {
        let rules = vec![ProhibitedRule::new("food", "chemical", "contamination")];
        let parcels = split_into_parcels(
            vec![
                item(0, "TEA", Some("food")),
                item(1, "SOAP", Some("chemical")),
            ],
            &rules,
        );
        let mut parcels = parcels.into_iter();
        let first = parcels.next().unwrap();
        let second = parcels.next().unwrap();

        let recommendation = compose(
            Some("ORD-1".to_string()),
            vec![
                resolve(
                    first,
                    ParcelOutcome::Resolved {
                        selection: selection("BOX-60", 850, 40),
                    },
                ),
                resolve(
                    second,
                    ParcelOutcome::infeasible(InfeasibleReason::NoContainerLargeEnough),
                ),
            ],
        );

        assert_eq!(recommendation.totals.shipping, 850);
        assert_eq!(recommendation.totals.containers, 40);
        assert_eq!(recommendation.totals.grand_total, 890);
        assert!(!recommendation.is_complete);
        assert_eq!(recommendation.parcel_count(), 2);
        assert_eq!(recommendation.item_count(), 2);
    }

    #[test]
    fn totals_saturate_instead_of_wrapping() {
        let rules = vec![ProhibitedRule::new("food", "chemical", "contamination")];
        let parcels = split_into_parcels(
            vec![
                item(0, "TEA", Some("food")),
                item(1, "SOAP", Some("chemical")),
            ],
            &rules,
        );

        let recommendation = compose(
            None,
            parcels
                .into_iter()
                .map(|parcel| {
                    resolve(
                        parcel,
                        ParcelOutcome::Resolved {
                            selection: selection("BOX-60", Money::MAX - 1, 40),
                        },
                    )
                })
                .collect(),
        );

        assert_eq!(recommendation.totals.shipping, Money::MAX);
        assert_eq!(recommendation.totals.containers, 80);
        assert_eq!(recommendation.totals.grand_total, Money::MAX);
        assert!(recommendation.is_complete);
    }

    #[test]
    fn split_orders_share_rationale_on_every_parcel() {
        let rules = vec![ProhibitedRule::new("food", "chemical", "contamination")];
        let parcels = split_into_parcels(
            vec![
                item(0, "TEA", Some("food")),
                item(1, "SOAP", Some("chemical")),
            ],
            &rules,
        );
        let resolved = parcels
            .into_iter()
            .map(|p| {
                resolve(
                    p,
                    ParcelOutcome::Resolved {
                        selection: selection("BOX-60", 850, 40),
                    },
                )
            })
            .collect();

        let recommendation = compose(None, resolved);
        assert!(recommendation.is_complete);
        for parcel in &recommendation.parcels {
            assert_eq!(parcel.split_rationale.len(), 1);
            assert_eq!(parcel.split_rationale[0].reason, "contamination");
        }
        assert_eq!(
            recommendation.to_plan_record().split_reason.as_deref(),
            Some("contamination")
        );
    }

    #[test]
    fn single_parcel_has_no_rationale() {
        let parcels = split_into_parcels(vec![item(0, "TEA", Some("food"))], &[]);
        let resolved = parcels
            .into_iter()
            .map(|p| {
                resolve(
                    p,
                    ParcelOutcome::Resolved {
                        selection: selection("BOX-60", 850, 40),
                    },
                )
            })
            .collect();
        let recommendation = compose(None, resolved);
        assert!(recommendation.split_rationale.is_empty());
        assert!(recommendation.parcels[0].split_rationale.is_empty());
        assert_eq!(recommendation.to_plan_record().split_reason, None);
    }

    #[test]
    fn infeasible_report_names_items_and_reason() {
        let parcels = split_into_parcels(vec![item(0, "SOFA", None), item(1, "SOFA", None)], &[]);
        let resolved = parcels
            .into_iter()
            .map(|p| resolve(p, ParcelOutcome::infeasible(InfeasibleReason::WeightExceeded)))
            .collect();
        let recommendation = compose(None, resolved);

        let report = recommendation.infeasible_report();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].parcel_no, 1);
        assert_eq!(report[0].item_seqs, vec![0, 1]);
        assert_eq!(report[0].reason.code(), "weight_exceeded");
        assert_eq!(recommendation.totals, OrderTotals::default());
    }

    #[test]
    fn plan_record_aggregates_items_per_product() {
        let parcels = split_into_parcels(
            vec![item(0, "MUG", None), item(1, "CUP", None), item(2, "MUG", None)],
            &[],
        );
        let resolved: Vec<_> = parcels
            .into_iter()
            .map(|p| {
                resolve(
                    p,
                    ParcelOutcome::Resolved {
                        selection: selection("BOX-80", 1050, 60),
                    },
                )
            })
            .collect();
        let record = compose(Some("ORD-7".to_string()), resolved).to_plan_record();

        assert_eq!(record.order_id.as_deref(), Some("ORD-7"));
        assert_eq!(record.parcel_count, 1);
        assert_eq!(record.grand_total, 1110);
        let parcel = &record.parcels[0];
        assert_eq!(
            parcel.items,
            vec![
                ItemMembership {
                    product_id: "CUP".to_string(),
                    quantity: 1
                },
                ItemMembership {
                    product_id: "MUG".to_string(),
                    quantity: 2
                },
            ]
        );
        assert_eq!(parcel.size_tier.as_deref(), Some("60"));
        assert_eq!(parcel.warning, None);
    }

    #[test]
    fn infeasible_plan_rows_carry_a_warning() {
        let parcels = split_into_parcels(vec![item(0, "SOFA", None)], &[]);
        let resolved = parcels
            .into_iter()
            .map(|p| {
                resolve(
                    p,
                    ParcelOutcome::infeasible(InfeasibleReason::NoContainerLargeEnough),
                )
            })
            .collect();
        let record = compose(None, resolved).to_plan_record();
        let row = &record.parcels[0];
        assert!(row.container_id.is_none());
        assert!(
            row.warning
                .as_deref()
                .is_some_and(|w| w.starts_with("No suitable container found"))
        );
        assert!(!record.is_complete);
    }
}
