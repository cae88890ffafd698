//! Splits an order's items into parcels that respect the prohibited pairs.
//!
//! The split is a deterministic first-fit over a fixed item order. It is not
//! a minimum partition; it reproduces the same parcels for the same input,
//! which is what packers and audits rely on.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::model::{Item, ProhibitedRule};
use crate::types;

/// The rule that kept an item out of an existing parcel.
///
/// Groups are stored in lexical order so the same rule always reads the same.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
pub struct SplitCause {
    pub group_a: String,
    pub group_b: String,
    pub reason: String,
}

impl From<&ProhibitedRule> for SplitCause {
    fn from(rule: &ProhibitedRule) -> Self {
        let (a, b) = rule.pair();
        Self {
            group_a: a.to_string(),
            group_b: b.to_string(),
            reason: rule.reason.clone(),
        }
    }
}

impl std::fmt::Display for SplitCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}: {}", self.group_a, self.group_b, self.reason)
    }
}

/// A group of items that will ship together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parcel {
    /// Items in placement order.
    pub items: Vec<Item>,
    /// Prohibited-group tags present in this parcel.
    pub groups: BTreeSet<String>,
    /// Rules that forced this parcel to be opened. Empty for the first parcel.
    pub split_causes: Vec<SplitCause>,
}

impl Parcel {
    fn open(item: Item, split_causes: Vec<SplitCause>) -> Self {
        let mut parcel = Self {
            items: Vec::new(),
            groups: BTreeSet::new(),
            split_causes,
        };
        parcel.push(item);
        parcel
    }

    fn push(&mut self, item: Item) {
        if let Some(group) = &item.prohibited_group {
            self.groups.insert(group.clone());
        }
        self.items.push(item);
    }

    /// Sum of item weights in grams.
    pub fn total_weight(&self) -> u64 {
        types::total_weight(&self.items)
    }

    /// Sum of effective item volumes in cubic millimetres.
    pub fn total_volume(&self) -> u64 {
        types::total_volume(&self.items)
    }

    pub fn has_fragile(&self) -> bool {
        self.items.iter().any(|item| item.fragile)
    }
}

/// Finds the first rule that forbids `group` next to any group already in `present`.
///
/// Present groups are scanned in lexical order and rules in catalog order.
fn conflicting_rule<'r>(
    present: &BTreeSet<String>,
    group: Option<&str>,
    rules: &'r [ProhibitedRule],
) -> Option<&'r ProhibitedRule> {
    let group = group?;
    present.iter().find_map(|existing| {
        rules
            .iter()
            .find(|rule| rule.forbids(existing.as_str(), group))
    })
}

/// Order in which items are offered to parcels: group tag (untagged first),
/// then larger effective volume first, then input order.
fn placement_order(a: &Item, b: &Item) -> Ordering {
    a.prohibited_group
        .cmp(&b.prohibited_group)
        .then_with(|| b.effective_volume().cmp(&a.effective_volume()))
        .then_with(|| a.seq.cmp(&b.seq))
}

/// Partitions `items` into parcels so no parcel holds a forbidden pair.
///
/// Each item goes into the first existing parcel it does not conflict with;
/// otherwise a new parcel is appended and the blocking rules are recorded on
/// it. Never fails; an empty input gives no parcels.
pub fn split_into_parcels(items: Vec<Item>, rules: &[ProhibitedRule]) -> Vec<Parcel> {
    let mut ordered = items;
    ordered.sort_by(placement_order);

    let mut parcels: Vec<Parcel> = Vec::new();

    for item in ordered {
        let group = item.prohibited_group.as_deref();
        let target = parcels
            .iter()
            .position(|parcel| conflicting_rule(&parcel.groups, group, rules).is_none());

        match target {
            Some(idx) => parcels[idx].push(item),
            None => {
                let mut causes: Vec<SplitCause> = Vec::new();
                for parcel in &parcels {
                    if let Some(rule) = conflicting_rule(&parcel.groups, group, rules) {
                        let cause = SplitCause::from(rule);
                        if !causes.contains(&cause) {
                            causes.push(cause);
                        }
                    }
                }
                debug!(
                    parcel_no = parcels.len() + 1,
                    item_seq = item.seq,
                    product_id = %item.product_id,
                    causes = causes.len(),
                    "opening parcel"
                );
                parcels.push(Parcel::open(item, causes));
            }
        }
    }

    parcels
}

/// All distinct split causes across parcels, sorted.
pub fn collect_causes<'a>(parcels: impl IntoIterator<Item = &'a Parcel>) -> Vec<SplitCause> {
    parcels
        .into_iter()
        .flat_map(|parcel| parcel.split_causes.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dims;

    fn item(seq: usize, group: Option<&str>, dims: (u32, u32, u32)) -> Item {
        let dims = Dims::new(dims.0, dims.1, dims.2);
        Item {
            seq,
            product_id: format!("P{seq}"),
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

    fn food_chemical() -> Vec<ProhibitedRule> {
        vec![ProhibitedRule::new("food", "chemical", "contamination")]
    }

    fn assert_no_conflicts(parcels: &[Parcel], rules: &[ProhibitedRule]) {
        for parcel in parcels {
            let groups: Vec<_> = parcel
                .items
                .iter()
                .filter_map(|i| i.prohibited_group.as_deref())
                .collect();
            for (i, a) in groups.iter().enumerate() {
                for b in &groups[i + 1..] {
                    assert!(
                        !rules.iter().any(|r| r.forbids(a, b)),
                        "parcel holds forbidden pair {a} / {b}"
                    );
                }
            }
        }
    }

    #[test]
    fn empty_input_gives_no_parcels() {
        assert!(split_into_parcels(Vec::new(), &food_chemical()).is_empty());
    }

    #[test]
    fn forbidden_pair_opens_second_parcel_with_cause() {
        let items = vec![
            item(0, Some("food"), (10, 10, 10)),
            item(1, Some("chemical"), (10, 10, 10)),
        ];
        let parcels = split_into_parcels(items, &food_chemical());

        assert_eq!(parcels.len(), 2);
        // "chemical" sorts before "food", so the chemical item opens parcel 1.
        assert_eq!(parcels[0].items[0].seq, 1);
        assert!(parcels[0].split_causes.is_empty());
        assert_eq!(
            parcels[1].split_causes,
            vec![SplitCause {
                group_a: "chemical".to_string(),
                group_b: "food".to_string(),
                reason: "contamination".to_string(),
            }]
        );
    }

    #[test]
    fn untagged_items_join_the_first_parcel() {
        let items = vec![
            item(0, Some("food"), (10, 10, 10)),
            item(1, None, (50, 50, 50)),
            item(2, Some("chemical"), (10, 10, 10)),
            item(3, None, (5, 5, 5)),
        ];
        let parcels = split_into_parcels(items, &food_chemical());

        assert_eq!(parcels.len(), 2);
        let first: Vec<_> = parcels[0].items.iter().map(|i| i.seq).collect();
        assert_eq!(first, vec![1, 3, 2], "untagged first, larger volume first");
        assert_eq!(parcels[1].items.len(), 1);
        assert_eq!(parcels[1].items[0].seq, 0);
    }

    #[test]
    fn same_group_items_share_a_parcel() {
        let items = vec![
            item(0, Some("food"), (10, 10, 10)),
            item(1, Some("food"), (20, 20, 20)),
        ];
        let parcels = split_into_parcels(items, &food_chemical());
        assert_eq!(parcels.len(), 1);
        let order: Vec<_> = parcels[0].items.iter().map(|i| i.seq).collect();
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn equal_volume_ties_keep_input_order() {
        let items = vec![
            item(0, None, (10, 10, 10)),
            item(1, None, (10, 10, 10)),
            item(2, None, (10, 10, 10)),
        ];
        let parcels = split_into_parcels(items, &[]);
        let order: Vec<_> = parcels[0].items.iter().map(|i| i.seq).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn third_group_reuses_first_compatible_parcel() {
        let rules = vec![
            ProhibitedRule::new("food", "chemical", "contamination"),
            ProhibitedRule::new("battery", "liquid", "fire"),
        ];
        let items = vec![
            item(0, Some("food"), (10, 10, 10)),
            item(1, Some("chemical"), (10, 10, 10)),
            item(2, Some("battery"), (10, 10, 10)),
            item(3, Some("liquid"), (10, 10, 10)),
        ];
        let parcels = split_into_parcels(items, &rules);

        assert_eq!(parcels.len(), 2);
        assert_no_conflicts(&parcels, &rules);
        let total: usize = parcels.iter().map(|p| p.items.len()).sum();
        assert_eq!(total, 4);
        // battery + chemical share parcel 1; food opens parcel 2 and liquid joins it.
        assert_eq!(
            collect_causes(&parcels),
            vec![SplitCause {
                group_a: "chemical".to_string(),
                group_b: "food".to_string(),
                reason: "contamination".to_string(),
            }]
        );
    }

    #[test]
    fn self_conflicting_group_gets_one_parcel_per_item() {
        let rules = vec![ProhibitedRule::new("lithium", "lithium", "limit per parcel")];
        let items = vec![
            item(0, Some("lithium"), (10, 10, 10)),
            item(1, Some("lithium"), (10, 10, 10)),
            item(2, Some("lithium"), (10, 10, 10)),
        ];
        let parcels = split_into_parcels(items, &rules);
        assert_eq!(parcels.len(), 3);
        assert_eq!(
            parcels[2].split_causes.len(),
            1,
            "one cause even though two parcels blocked the item"
        );
    }

    #[test]
    fn parcel_totals() {
        let mut fragile = item(1, None, (10, 10, 10));
        fragile.fragile = true;
        let parcels = split_into_parcels(vec![item(0, None, (10, 20, 30)), fragile], &[]);
        let parcel = &parcels[0];
        assert_eq!(parcel.total_weight(), 200);
        assert_eq!(parcel.total_volume(), 6000 + 1000);
        assert!(parcel.has_fragile());
    }
}
