//! Expands order lines into padded unit items.

use tracing::debug;

use crate::catalog::CatalogSnapshot;
use crate::model::{Item, ItemSpec, OrderLine, Product, ValidationError};

/// Product id given to items built from an [`ItemSpec`].
pub const SIMULATED_PRODUCT_ID: &str = "SIMULATED";

/// Expands every line into `quantity` identical unit items, in line order.
///
/// Quantity is repetition, never a bundle: three mugs are three items that
/// the splitter and fit filter see separately. Every line is checked, and the
/// total against `max_items`, before any item is built.
///
/// # Errors
/// `UnknownProduct` for a product the catalog does not know, `InvalidQuantity`
/// for a zero quantity or an order above `max_items` units, and
/// `InvalidDimension` / `InvalidWeight` for a product row with non-positive
/// measurements.
pub fn expand_order(
    lines: &[OrderLine],
    catalog: &CatalogSnapshot,
    max_items: usize,
) -> Result<Vec<Item>, ValidationError> {
    let mut resolved = Vec::with_capacity(lines.len());
    let mut total: u64 = 0;

    for (line_no, line) in lines.iter().enumerate() {
        let product = catalog
            .product(&line.product_id)
            .ok_or_else(|| ValidationError::UnknownProduct(line.product_id.clone()))?;

        if line.quantity == 0 {
            return Err(ValidationError::InvalidQuantity(format!(
                "line {} ({}) must have a quantity of at least 1",
                line_no + 1,
                line.product_id
            )));
        }
        product.validate()?;

        total = total.saturating_add(u64::from(line.quantity));
        resolved.push((product, line.quantity));
    }

    let total = usize::try_from(total).unwrap_or(usize::MAX);
    if total > max_items {
        return Err(ValidationError::InvalidQuantity(format!(
            "order expands to {} items, at most {} are allowed",
            total, max_items
        )));
    }

    let mut items = Vec::with_capacity(total);
    for (product, quantity) in resolved {
        for _ in 0..quantity {
            let seq = items.len();
            items.push(unit_item(seq, product));
        }
    }

    debug!(
        lines = lines.len(),
        items = items.len(),
        "expanded order lines into unit items"
    );
    Ok(items)
}

/// Builds the single item of a what-if query.
///
/// Simulated items never carry a prohibited group.
pub fn expand_spec(spec: &ItemSpec) -> Result<Item, ValidationError> {
    spec.validate()?;
    Ok(Item {
        seq: 0,
        product_id: SIMULATED_PRODUCT_ID.to_string(),
        name: spec.name.clone(),
        raw_dims: spec.dims,
        effective_dims: spec.dims.padded(spec.padding_mm),
        weight_g: spec.weight_g,
        can_rotate: spec.can_rotate,
        fragile: spec.fragile,
        prohibited_group: None,
        padding_mm: spec.padding_mm,
    })
}

fn unit_item(seq: usize, product: &Product) -> Item {
    Item {
        seq,
        product_id: product.id.clone(),
        name: product.name.clone(),
        raw_dims: product.dims,
        effective_dims: product.effective_dims(),
        weight_g: product.weight_g,
        can_rotate: product.can_rotate,
        fragile: product.fragile,
        prohibited_group: product
            .prohibited_group
            .as_deref()
            .map(str::trim)
            .filter(|group| !group.is_empty())
            .map(str::to_string),
        padding_mm: product.padding_mm,
    }
}
