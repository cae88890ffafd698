//! Recommendation pipeline.
//!
//! Drives one order through every stage, in this order:
//! - expand order lines into padded unit items
//! - split the items into parcels without forbidden pairs
//! - filter containers that fit each parcel
//! - price every fitting container
//! - pick the cheapest combination and compose the result
//!
//! Every stage is a pure function of its inputs and the catalog snapshot, so
//! the same order always produces the same recommendation.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::catalog::CatalogSnapshot;
use crate::composer::{
    self, ContainerDiagnostic, InfeasibleReason, ParcelOutcome, Recommendation, RejectionStage,
    ResolvedParcel,
};
use crate::error::EngineError;
use crate::fit::{FillCeilings, filter_containers};
use crate::model::{Item, ItemSpec, OrderLine};
use crate::normalizer::{expand_order, expand_spec};
use crate::rates::{CarrierPolicy, SizeTiers, resolve_rate};
use crate::selector::{self, Candidate};
use crate::splitter::{Parcel, split_into_parcels};
use crate::types::{self, Money};

/// Tunable engine parameters.
///
/// Immutable once built; per-request overrides work on a copy.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    pub fill_ceilings: FillCeilings,
    pub size_tiers: SizeTiers,
    pub carriers: CarrierPolicy,
    /// Default number of simulator candidates.
    pub simulation_limit: usize,
    /// Most unit items one order may expand to.
    pub max_order_items: usize,
}

impl EngineSettings {
    pub const DEFAULT_SIMULATION_LIMIT: usize = 5;
    pub const DEFAULT_MAX_ORDER_ITEMS: usize = 10_000;

    /// Creates a builder for custom settings.
    pub fn builder() -> EngineSettingsBuilder {
        EngineSettingsBuilder::default()
    }

    /// Copy of these settings that prices with another carrier first.
    pub fn with_requested_carrier(&self, carrier: impl Into<String>) -> Self {
        let mut settings = self.clone();
        settings.carriers.requested = carrier.into();
        settings
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            fill_ceilings: FillCeilings::default(),
            size_tiers: SizeTiers::default(),
            carriers: CarrierPolicy::default(),
            simulation_limit: Self::DEFAULT_SIMULATION_LIMIT,
            max_order_items: Self::DEFAULT_MAX_ORDER_ITEMS,
        }
    }
}

/// Builder for [`EngineSettings`].
#[derive(Clone, Debug, Default)]
pub struct EngineSettingsBuilder {
    settings: EngineSettings,
}

impl EngineSettingsBuilder {
    pub fn fill_ceilings(mut self, ceilings: FillCeilings) -> Self {
        self.settings.fill_ceilings = ceilings;
        self
    }

    pub fn standard_fill_ceiling(mut self, ceiling: f64) -> Self {
        self.settings.fill_ceilings.standard = ceiling;
        self
    }

    pub fn fragile_fill_ceiling(mut self, ceiling: f64) -> Self {
        self.settings.fill_ceilings.fragile = ceiling;
        self
    }

    pub fn long_fill_ceiling(mut self, ceiling: f64) -> Self {
        self.settings.fill_ceilings.long = ceiling;
        self
    }

    pub fn size_tiers(mut self, tiers: SizeTiers) -> Self {
        self.settings.size_tiers = tiers;
        self
    }

    pub fn requested_carrier(mut self, carrier: impl Into<String>) -> Self {
        self.settings.carriers.requested = carrier.into();
        self
    }

    pub fn default_carrier(mut self, carrier: impl Into<String>) -> Self {
        self.settings.carriers.fallback = carrier.into();
        self
    }

    pub fn simulation_limit(mut self, limit: usize) -> Self {
        self.settings.simulation_limit = limit;
        self
    }

    pub fn max_order_items(mut self, limit: usize) -> Self {
        self.settings.max_order_items = limit;
        self
    }

    pub fn build(self) -> EngineSettings {
        self.settings
    }
}

/// Pipeline progress, suitable for streaming to a client.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum RecommendEvent {
    /// Order lines were expanded into unit items.
    ItemsExpanded { items: usize },
    /// The splitter produced a parcel.
    ParcelOpened {
        parcel_no: usize,
        items: usize,
        weight_g: u64,
        groups: Vec<String>,
    },
    /// A parcel got a container and rate.
    ParcelResolved {
        parcel_no: usize,
        container_id: String,
        carrier: String,
        service: String,
        total_cost: Money,
    },
    /// No container/rate combination works for a parcel.
    ParcelInfeasible {
        parcel_no: usize,
        reason_code: String,
        reason_text: String,
    },
    /// Computation finished.
    Finished {
        parcels: usize,
        infeasible: usize,
        grand_total: Money,
    },
}

/// One order of a batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "order_id": "ORD-1001",
    "lines": [{ "product_id": "SKU-TEA", "quantity": 2 }]
}))]
pub struct OrderRequest {
    #[serde(default)]
    pub order_id: Option<String>,
    pub lines: Vec<OrderLine>,
}

/// Priced containers for one set of items, with the reasons the others failed.
#[derive(Clone, Debug, Default)]
pub struct Pricing {
    /// In catalog order.
    pub candidates: Vec<Candidate>,
    pub diagnostics: Vec<ContainerDiagnostic>,
    /// Set when `candidates` is empty.
    pub infeasible: Option<InfeasibleReason>,
}

/// Runs the fit filter and rate resolver over the whole container catalog.
pub fn price_items(
    items: &[Item],
    catalog: &CatalogSnapshot,
    settings: &EngineSettings,
) -> Pricing {
    let report = filter_containers(items, catalog.containers(), &settings.fill_ceilings);
    let parcel_weight_g = types::total_weight(items);

    let mut pricing = Pricing {
        diagnostics: report
            .rejections
            .iter()
            .map(|(container, reason)| ContainerDiagnostic {
                container_id: container.id.clone(),
                stage: RejectionStage::Fit,
                code: reason.code().to_string(),
                message: reason.to_string(),
            })
            .collect(),
        ..Pricing::default()
    };

    for fit in &report.candidates {
        match resolve_rate(
            fit.container,
            parcel_weight_g,
            catalog.rates(),
            &settings.size_tiers,
            &settings.carriers,
        ) {
            Ok(rate) => pricing.candidates.push(Candidate::new(fit, &rate)),
            Err(err) => pricing.diagnostics.push(ContainerDiagnostic {
                container_id: fit.container.id.clone(),
                stage: RejectionStage::Rate,
                code: err.code().to_string(),
                message: err.to_string(),
            }),
        }
    }

    if pricing.candidates.is_empty() {
        pricing.infeasible = Some(if !report.candidates.is_empty() {
            InfeasibleReason::NoRateAvailable
        } else if report.all_rejected_for_weight() {
            InfeasibleReason::WeightExceeded
        } else {
            InfeasibleReason::NoContainerLargeEnough
        });
    }

    pricing
}

fn resolve_parcel(
    parcel: Parcel,
    catalog: &CatalogSnapshot,
    settings: &EngineSettings,
) -> ResolvedParcel {
    let pricing = price_items(&parcel.items, catalog, settings);
    let outcome = match selector::select_best(&pricing.candidates) {
        Some(best) => ParcelOutcome::Resolved {
            selection: best.clone(),
        },
        None => ParcelOutcome::infeasible(
            pricing
                .infeasible
                .unwrap_or(InfeasibleReason::NoContainerLargeEnough),
        ),
    };
    ResolvedParcel {
        parcel,
        outcome,
        rejected: pricing.diagnostics,
    }
}

/// Recommends parcels, containers and rates for one order.
///
/// Parcels without a feasible container are reported inside the result, not
/// as an error.
///
/// # Errors
/// [`EngineError::InvalidInput`] for unknown products, zero quantities, orders
/// above [`EngineSettings::max_order_items`] or non-positive product
/// measurements.
pub fn recommend(
    lines: &[OrderLine],
    catalog: &CatalogSnapshot,
    settings: &EngineSettings,
) -> Result<Recommendation, EngineError> {
    recommend_with_progress(lines, catalog, settings, |_| {})
}

/// Like [`recommend`], reporting each pipeline step to `on_event`.
pub fn recommend_with_progress(
    lines: &[OrderLine],
    catalog: &CatalogSnapshot,
    settings: &EngineSettings,
    on_event: impl FnMut(&RecommendEvent),
) -> Result<Recommendation, EngineError> {
    let items = expand_items(lines, catalog, settings)?;
    Ok(recommend_items(items, catalog, settings, on_event))
}

/// Validates and expands order lines, capped by the settings.
///
/// # Errors
/// Same as [`recommend`].
pub fn expand_items(
    lines: &[OrderLine],
    catalog: &CatalogSnapshot,
    settings: &EngineSettings,
) -> Result<Vec<Item>, EngineError> {
    Ok(expand_order(lines, catalog, settings.max_order_items)?)
}

/// Runs the pipeline after expansion. Never fails; parcels without a
/// feasible container are reported inside the result.
pub fn recommend_items(
    items: Vec<Item>,
    catalog: &CatalogSnapshot,
    settings: &EngineSettings,
    mut on_event: impl FnMut(&RecommendEvent),
) -> Recommendation {
    on_event(&RecommendEvent::ItemsExpanded { items: items.len() });

    let parcels = split_into_parcels(items, catalog.rules());
    for (idx, parcel) in parcels.iter().enumerate() {
        on_event(&RecommendEvent::ParcelOpened {
            parcel_no: idx + 1,
            items: parcel.items.len(),
            weight_g: parcel.total_weight(),
            groups: parcel.groups.iter().cloned().collect(),
        });
    }

    let mut resolved = Vec::with_capacity(parcels.len());
    for (idx, parcel) in parcels.into_iter().enumerate() {
        let parcel_no = idx + 1;
        let entry = resolve_parcel(parcel, catalog, settings);
        match &entry.outcome {
            ParcelOutcome::Resolved { selection } => {
                debug!(
                    parcel_no,
                    container_id = %selection.container_id,
                    carrier = %selection.carrier,
                    total_cost = selection.total_cost,
                    "parcel resolved"
                );
                on_event(&RecommendEvent::ParcelResolved {
                    parcel_no,
                    container_id: selection.container_id.clone(),
                    carrier: selection.carrier.clone(),
                    service: selection.service.clone(),
                    total_cost: selection.total_cost,
                });
            }
            ParcelOutcome::Infeasible { reason, message } => {
                info!(
                    parcel_no,
                    reason = reason.code(),
                    items = entry.parcel.items.len(),
                    "parcel has no feasible container"
                );
                on_event(&RecommendEvent::ParcelInfeasible {
                    parcel_no,
                    reason_code: reason.code().to_string(),
                    reason_text: message.clone(),
                });
            }
        }
        resolved.push(entry);
    }

    let recommendation = composer::compose(None, resolved);
    let infeasible = recommendation
        .parcels
        .iter()
        .filter(|p| !p.is_feasible())
        .count();
    info!(
        parcels = recommendation.parcel_count(),
        infeasible,
        grand_total = recommendation.totals.grand_total,
        "recommendation computed"
    );
    on_event(&RecommendEvent::Finished {
        parcels: recommendation.parcel_count(),
        infeasible,
        grand_total: recommendation.totals.grand_total,
    });

    recommendation
}

/// Ranks containers for one hypothetical item, best first.
///
/// The item is never split; at most `limit` candidates are returned.
pub fn simulate(
    spec: &ItemSpec,
    catalog: &CatalogSnapshot,
    settings: &EngineSettings,
    limit: usize,
) -> Result<Vec<Candidate>, EngineError> {
    let item = expand_spec(spec)?;
    let pricing = price_items(std::slice::from_ref(&item), catalog, settings);
    let mut ranked = selector::rank(pricing.candidates);
    ranked.truncate(limit);
    debug!(
        candidates = ranked.len(),
        rejected = pricing.diagnostics.len(),
        "simulation ranked"
    );
    Ok(ranked)
}

/// Recommends many orders against one snapshot in parallel.
///
/// Results keep the order of `orders`; an invalid order fails alone.
pub fn recommend_batch(
    orders: &[OrderRequest],
    catalog: &CatalogSnapshot,
    settings: &EngineSettings,
) -> Vec<Result<Recommendation, EngineError>> {
    orders
        .par_iter()
        .map(|order| {
            recommend(&order.lines, catalog, settings).map(|mut recommendation| {
                recommendation.order_id = order.order_id.clone();
                recommendation
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::catalog::CatalogDocument;
    use crate::model::{
        Container, ContainerClass, Product, ProhibitedRule, RateEntry, ValidationError,
    };
    use crate::rates::SizeTier;
    use crate::types::Dims;

    const DEMO_CATALOG: &str = include_str!("../demos/catalog.json");

    fn demo() -> CatalogSnapshot {
        CatalogSnapshot::from_json_str(DEMO_CATALOG).expect("demo catalog is valid")
    }

    fn demo_with_product(product: Product) -> CatalogSnapshot {
        let mut document = demo().to_document();
        document.products.push(product);
        CatalogSnapshot::new(document).expect("extended catalog is valid")
    }

    fn mixed_order() -> Vec<OrderLine> {
        vec![
            OrderLine::new("SKU-TEA", 2),
            OrderLine::new("SKU-DETERGENT", 1),
            OrderLine::new("SKU-MUG", 1),
            OrderLine::new("SKU-BATTERY", 2),
            OrderLine::new("SKU-OIL", 1),
            OrderLine::new("SKU-TSHIRT", 1),
        ]
    }

    #[test]
    fn every_item_lands_in_exactly_one_parcel() {
        let catalog = demo();
        let recommendation =
            recommend(&mixed_order(), &catalog, &EngineSettings::default()).unwrap();

        let seqs: Vec<usize> = recommendation
            .parcels
            .iter()
            .flat_map(|p| p.items.iter().map(|i| i.seq))
            .collect();
        let unique: BTreeSet<usize> = seqs.iter().copied().collect();
        assert_eq!(seqs.len(), 8, "2 tea + detergent + mug + 2 batteries + oil + shirt");
        assert_eq!(unique, (0..8).collect::<BTreeSet<_>>());
        assert_eq!(recommendation.item_count(), 8);
    }

    #[test]
    fn no_parcel_holds_a_forbidden_pair() {
        let catalog = demo();
        let recommendation =
            recommend(&mixed_order(), &catalog, &EngineSettings::default()).unwrap();

        for parcel in &recommendation.parcels {
            let groups: BTreeSet<&str> = parcel
                .items
                .iter()
                .filter_map(|i| i.prohibited_group.as_deref())
                .collect();
            for rule in catalog.rules() {
                assert!(
                    !(groups.contains(rule.group_a.as_str())
                        && groups.contains(rule.group_b.as_str())),
                    "parcel {} violates {} / {}",
                    parcel.parcel_no,
                    rule.group_a,
                    rule.group_b
                );
            }
        }
    }

    #[test]
    fn identical_input_serializes_identically() {
        let catalog = demo();
        let settings = EngineSettings::default();
        let first = recommend(&mixed_order(), &catalog, &settings).unwrap();
        let second = recommend(&mixed_order(), &catalog, &settings).unwrap();
        let first = serde_json::to_string(&first).unwrap();
        let second = serde_json::to_string(&second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn resolved_parcels_respect_weight_and_fill_ceiling() {
        let catalog = demo();
        let settings = EngineSettings::default();
        let recommendation = recommend(&mixed_order(), &catalog, &settings).unwrap();

        for parcel in &recommendation.parcels {
            let Some(selection) = parcel.selection() else {
                continue;
            };
            let container: &Container = catalog
                .containers()
                .iter()
                .find(|c| c.id == selection.container_id)
                .expect("selected container is in the catalog");
            assert!(parcel.total_weight_g <= u64::from(container.max_weight_g));
            let ceiling = settings.fill_ceilings.ceiling_for(container.class, parcel.fragile);
            assert!(
                selection.fill_ratio <= ceiling,
                "parcel {} fill {} above ceiling {}",
                parcel.parcel_no,
                selection.fill_ratio,
                ceiling
            );
        }
    }

    #[test]
    fn selection_is_never_beaten_on_cost() {
        let catalog = demo();
        let settings = EngineSettings::default();
        let recommendation = recommend(&mixed_order(), &catalog, &settings).unwrap();

        for parcel in &recommendation.parcels {
            let Some(selection) = parcel.selection() else {
                continue;
            };
            let pricing = price_items(&parcel.items, &catalog, &settings);
            assert!(
                pricing
                    .candidates
                    .iter()
                    .all(|c| c.total_cost >= selection.total_cost)
            );
        }
    }

    #[test]
    fn food_and_chemical_ship_separately_with_rationale() {
        crate::logging::init_test();
        let catalog = demo();
        let lines = vec![OrderLine::new("SKU-TEA", 1), OrderLine::new("SKU-DETERGENT", 1)];
        let recommendation = recommend(&lines, &catalog, &EngineSettings::default()).unwrap();

        assert_eq!(recommendation.parcel_count(), 2);
        assert!(recommendation.is_complete);
        for parcel in &recommendation.parcels {
            assert_eq!(parcel.split_rationale.len(), 1);
            let cause = &parcel.split_rationale[0];
            assert_eq!((cause.group_a.as_str(), cause.group_b.as_str()), ("chemical", "food"));
        }

        // Detergent stands upright only in the 80 box; the tea tin lies down in the 60 box.
        let chosen: Vec<_> = recommendation
            .parcels
            .iter()
            .map(|p| p.selection().map(|s| s.container_id.as_str()))
            .collect();
        assert_eq!(chosen, vec![Some("BOX-80"), Some("BOX-60")]);
        assert_eq!(recommendation.totals.shipping, 1050 + 850);
        assert_eq!(recommendation.totals.containers, 60 + 40);
        assert_eq!(recommendation.totals.grand_total, 2000);
    }

    #[test]
    fn oversized_item_is_reported_infeasible() {
        let catalog = demo_with_product(Product::new("SKU-SOFA", Dims::new(2000, 900, 800), 2000));
        let lines = vec![OrderLine::new("SKU-SOFA", 1), OrderLine::new("SKU-TSHIRT", 1)];
        let recommendation = recommend(&lines, &catalog, &EngineSettings::default()).unwrap();

        assert!(!recommendation.is_complete);
        let report = recommendation.infeasible_report();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].reason, InfeasibleReason::NoContainerLargeEnough);
        assert!(report[0].product_ids.contains(&"SKU-SOFA".to_string()));
        assert_eq!(
            recommendation.parcels[0].rejected_containers.len(),
            catalog.containers().len()
        );
    }

    #[test]
    fn overweight_item_is_reported_as_weight_exceeded() {
        let catalog = demo_with_product(Product::new("SKU-ANVIL", Dims::new(50, 50, 50), 30_000));
        let lines = [OrderLine::new("SKU-ANVIL", 1)];
        let recommendation = recommend(&lines, &catalog, &EngineSettings::default()).unwrap();
        let report = recommendation.infeasible_report();
        assert_eq!(report[0].reason, InfeasibleReason::WeightExceeded);
        assert_eq!(recommendation.totals.grand_total, 0);
    }

    #[test]
    fn missing_rates_are_reported_as_no_rate_available() {
        let mut document = demo().to_document();
        document.rates.clear();
        let catalog = CatalogSnapshot::new(document).unwrap();
        let lines = [OrderLine::new("SKU-TEA", 1)];
        let recommendation = recommend(&lines, &catalog, &EngineSettings::default()).unwrap();
        let report = recommendation.infeasible_report();
        assert_eq!(report[0].reason, InfeasibleReason::NoRateAvailable);
        assert!(
            recommendation.parcels[0]
                .rejected_containers
                .iter()
                .any(|d| d.stage == RejectionStage::Rate && d.code == "configuration_gap")
        );
    }

    #[test]
    fn flat_item_ships_by_mail() {
        let catalog = demo();
        let lines = [OrderLine::new("SKU-TSHIRT", 1)];
        let recommendation = recommend(&lines, &catalog, &EngineSettings::default()).unwrap();
        let selection = recommendation.parcels[0].selection().expect("shirt fits the mailer");
        assert_eq!(selection.container_id, "MAIL-A4");
        assert_eq!(selection.size_tier, SizeTier::Mail);
        assert_eq!(selection.service, "Mail");
        assert_eq!(selection.carrier, "CarrierB");
        assert_eq!(selection.total_cost, 360 + 15);
    }

    #[test]
    fn cost_tie_goes_to_lower_fill_then_smaller_box() {
        let boxed = |id: &str, inner: (u32, u32, u32)| {
            Container::new(
                id,
                ContainerClass::Box,
                Dims::new(inner.0, inner.1, inner.2),
                Dims::new(200, 200, 150),
                5000,
                40,
            )
            .unwrap()
        };
        let document = CatalogDocument {
            products: vec![Product::new("CUBE", Dims::new(100, 100, 100), 300)],
            containers: vec![
                boxed("TIGHT", (150, 150, 100)),
                boxed("ROOMY", (190, 190, 140)),
                boxed("ROOMY-TWIN", (190, 190, 140)),
            ],
            prohibited_pairs: vec![],
            rates: vec![RateEntry {
                carrier: "CarrierB".to_string(),
                service: "Economy".to_string(),
                size_tier: "60".to_string(),
                max_weight_g: 5000,
                price: 850,
            }],
        };
        let catalog = CatalogSnapshot::new(document).unwrap();
        let ranked = simulate(
            &ItemSpec {
                name: None,
                dims: Dims::new(100, 100, 100),
                weight_g: 300,
                padding_mm: 0,
                can_rotate: true,
                fragile: false,
            },
            &catalog,
            &EngineSettings::default(),
            5,
        )
        .unwrap();
        let ids: Vec<_> = ranked.iter().map(|c| c.container_id.as_str()).collect();
        assert_eq!(ids, vec!["ROOMY", "ROOMY-TWIN", "TIGHT"]);
    }

    #[test]
    fn requested_carrier_gap_falls_back_to_default_carrier() {
        let catalog = demo();
        let lines = [OrderLine::new("SKU-POSTER", 1)];
        let recommendation = recommend(&lines, &catalog, &EngineSettings::default()).unwrap();
        let selection = recommendation.parcels[0].selection().expect("poster fits the tube");
        assert_eq!(selection.container_id, "LONG-100");
        assert_eq!(selection.size_tier, SizeTier::Size(100));
        assert_eq!(selection.carrier, "CarrierA");
        assert!(selection.used_fallback_carrier);
        assert_eq!(selection.total_cost, 1200 + 70);
    }

    #[test]
    fn carrier_override_changes_pricing() {
        let catalog = demo();
        let settings = EngineSettings::default().with_requested_carrier("CarrierA");
        let recommendation =
            recommend(&[OrderLine::new("SKU-TSHIRT", 1)], &catalog, &settings).unwrap();
        let selection = recommendation.parcels[0].selection().unwrap();
        assert_eq!(selection.carrier, "CarrierA");
        assert_eq!(selection.shipping_price, 370);
        assert!(!selection.used_fallback_carrier);
    }

    #[test]
    fn unknown_product_aborts_the_request() {
        let err = recommend(&[OrderLine::new("SKU-404", 1)], &demo(), &EngineSettings::default())
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidInput(ValidationError::UnknownProduct("SKU-404".to_string()))
        );
    }

    #[test]
    fn empty_order_is_complete_and_free() {
        let recommendation = recommend(&[], &demo(), &EngineSettings::default()).unwrap();
        assert!(recommendation.parcels.is_empty());
        assert!(recommendation.is_complete);
        assert_eq!(recommendation.totals.grand_total, 0);
    }

    #[test]
    fn progress_events_frame_the_computation() {
        let catalog = demo();
        let lines = vec![OrderLine::new("SKU-TEA", 1), OrderLine::new("SKU-DETERGENT", 1)];
        let mut events = Vec::new();
        let recommendation =
            recommend_with_progress(&lines, &catalog, &EngineSettings::default(), |event| {
                events.push(event.clone())
            })
            .unwrap();

        assert!(matches!(events.first(), Some(RecommendEvent::ItemsExpanded { items: 2 })));
        assert!(matches!(
            events.last(),
            Some(RecommendEvent::Finished {
                parcels: 2,
                infeasible: 0,
                ..
            })
        ));
        let opened = events
            .iter()
            .filter(|e| matches!(e, RecommendEvent::ParcelOpened { .. }))
            .count();
        let resolved = events
            .iter()
            .filter(|e| matches!(e, RecommendEvent::ParcelResolved { .. }))
            .count();
        assert_eq!(opened, recommendation.parcel_count());
        assert_eq!(resolved, recommendation.parcel_count());
    }

    #[test]
    fn simulation_ranks_and_limits_candidates() {
        let catalog = demo();
        let spec = ItemSpec {
            name: Some("mug prototype".to_string()),
            dims: Dims::new(110, 90, 100),
            weight_g: 400,
            padding_mm: 15,
            can_rotate: true,
            fragile: true,
        };
        let ranked = simulate(&spec, &catalog, &EngineSettings::default(), 2).unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].container_id, "BOX-60");
        assert!(selector::compare(&ranked[0], &ranked[1]).is_le());

        let all = simulate(&spec, &catalog, &EngineSettings::default(), 10).unwrap();
        assert_eq!(&all[..2], &ranked[..]);
    }

    #[test]
    fn simulation_rejects_invalid_spec() {
        let spec = ItemSpec {
            name: None,
            dims: Dims::new(0, 10, 10),
            weight_g: 10,
            padding_mm: 0,
            can_rotate: true,
            fragile: false,
        };
        assert!(simulate(&spec, &demo(), &EngineSettings::default(), 5).is_err());
    }

    #[test]
    fn simulation_of_a_huge_item_finds_nothing() {
        let spec = ItemSpec {
            name: None,
            dims: Dims::new(3_000_000, 3_000_000, 3_000_000),
            weight_g: 100,
            padding_mm: 0,
            can_rotate: true,
            fragile: false,
        };
        let ranked = simulate(&spec, &demo(), &EngineSettings::default(), 5).unwrap();
        assert!(ranked.is_empty());
    }

    #[test]
    fn order_above_item_cap_is_invalid_input() {
        let settings = EngineSettings::builder().max_order_items(3).build();
        let lines = vec![OrderLine::new("SKU-TEA", 2), OrderLine::new("SKU-MUG", 2)];
        assert!(matches!(
            recommend(&lines, &demo(), &settings),
            Err(EngineError::InvalidInput(ValidationError::InvalidQuantity(_)))
        ));

        let lines = vec![OrderLine::new("SKU-TEA", 2), OrderLine::new("SKU-MUG", 1)];
        assert_eq!(recommend(&lines, &demo(), &settings).unwrap().item_count(), 3);
    }

    #[test]
    fn expanded_items_give_the_same_recommendation() {
        let catalog = demo();
        let settings = EngineSettings::default();
        let lines = mixed_order();
        let items = expand_items(&lines, &catalog, &settings).unwrap();
        let direct = recommend(&lines, &catalog, &settings).unwrap();
        assert_eq!(recommend_items(items, &catalog, &settings, |_| {}), direct);
    }

    #[test]
    fn batch_keeps_order_and_isolates_failures() {
        let catalog = demo();
        let orders = vec![
            OrderRequest {
                order_id: Some("A".to_string()),
                lines: vec![OrderLine::new("SKU-TSHIRT", 1)],
            },
            OrderRequest {
                order_id: Some("B".to_string()),
                lines: vec![OrderLine::new("SKU-404", 1)],
            },
            OrderRequest {
                order_id: Some("C".to_string()),
                lines: vec![OrderLine::new("SKU-POSTER", 1)],
            },
        ];
        let results = recommend_batch(&orders, &catalog, &EngineSettings::default());

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().order_id.as_deref(), Some("A"));
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().order_id.as_deref(), Some("C"));
    }

    #[test]
    fn batch_matches_single_order_results() {
        let catalog = demo();
        let settings = EngineSettings::default();
        let orders = vec![OrderRequest {
            order_id: None,
            lines: mixed_order(),
        }];
        let batch = recommend_batch(&orders, &catalog, &settings);
        let single = recommend(&mixed_order(), &catalog, &settings).unwrap();
        assert_eq!(batch[0].as_ref().unwrap(), &single);
    }

    #[test]
    fn builder_overrides_defaults() {
        let settings = EngineSettings::builder()
            .fragile_fill_ceiling(0.5)
            .requested_carrier("CarrierA")
            .default_carrier("CarrierC")
            .simulation_limit(3)
            .build();
        assert_eq!(settings.fill_ceilings.fragile, 0.5);
        assert_eq!(settings.fill_ceilings.standard, FillCeilings::DEFAULT_STANDARD);
        assert_eq!(settings.carriers.requested, "CarrierA");
        assert_eq!(settings.carriers.fallback, "CarrierC");
        assert_eq!(settings.simulation_limit, 3);
    }

    #[test]
    fn custom_rule_splits_otherwise_compatible_items() {
        let mut document = demo().to_document();
        document
            .prohibited_pairs
            .push(ProhibitedRule::new("food", "battery", "test rule"));
        let catalog = CatalogSnapshot::new(document).unwrap();
        let lines = vec![OrderLine::new("SKU-TEA", 1), OrderLine::new("SKU-BATTERY", 1)];
        let recommendation = recommend(&lines, &catalog, &EngineSettings::default()).unwrap();
        assert_eq!(recommendation.parcel_count(), 2);
        assert_eq!(recommendation.split_rationale[0].reason, "test rule");
    }
}
