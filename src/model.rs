//! Data models for parcel recommendation.
//!
//! This module defines the plain value structures the engine works on:
//! - `Product`, `Container`, `ProhibitedRule`, `RateEntry`: read-only catalog rows
//! - `OrderLine`: one line of an incoming order
//! - `Item`: one physical unit expanded from an order line
//!
//! None of these carry behaviour beyond validation and derived measurements;
//! the pipeline stages are free functions over slices of them.

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{Dimensional, Dims, Grams, Millimeters, Money, Weighted};

/// Validation error for catalog rows and order input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown product: {0}")]
    UnknownProduct(String),
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid weight: {0}")]
    InvalidWeight(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

fn validate_dims(dims: Dims, owner: &str, what: &str) -> Result<(), ValidationError> {
    if !dims.is_valid_dimension() {
        return Err(ValidationError::InvalidDimension(format!(
            "{} of {} must be positive on every axis, got: {}",
            what, owner, dims
        )));
    }
    Ok(())
}

fn validate_weight(value: Grams, owner: &str) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::InvalidWeight(format!(
            "Weight of {} must be positive, got: {}",
            owner, value
        )));
    }
    Ok(())
}

fn validate_id(id: &str, kind: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::InvalidConfiguration(format!(
            "{} id must not be empty",
            kind
        )));
    }
    Ok(())
}

fn default_true() -> bool {
    true
}

/// Product master row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Raw length, width and height in millimetres.
    #[schema(value_type = [u32; 3], example = json!([120, 80, 40]))]
    pub dims: Dims,
    pub weight_g: Grams,
    #[serde(default = "default_true")]
    pub can_rotate: bool,
    #[serde(default)]
    pub fragile: bool,
    /// Tag checked against the prohibited-pair rules.
    #[serde(default)]
    pub prohibited_group: Option<String>,
    /// Cushioning added on both sides of every axis.
    #[serde(default)]
    pub padding_mm: Millimeters,
}

impl Product {
    /// Checks dimensions and weight.
    ///
    /// # Examples
    /// ```
    /// use pack_advisor::model::Product;
    /// use pack_advisor::types::Dims;
    ///
    /// let mut product = Product::new("SKU-1", Dims::new(100, 50, 20), 300);
    /// assert!(product.validate().is_ok());
    ///
    /// product.weight_g = 0;
    /// assert!(product.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_id(&self.id, "Product")?;
        validate_dims(self.dims, &self.id, "Dimensions")?;
        validate_weight(self.weight_g, &self.id)?;
        Ok(())
    }

    /// Rotatable, non-fragile product without group or padding.
    pub fn new(id: impl Into<String>, dims: Dims, weight_g: Grams) -> Self {
        Self {
            id: id.into(),
            name: None,
            category: None,
            dims,
            weight_g,
            can_rotate: true,
            fragile: false,
            prohibited_group: None,
            padding_mm: 0,
        }
    }

    /// Dimensions after padding.
    pub fn effective_dims(&self) -> Dims {
        self.dims.padded(self.padding_mm)
    }
}

/// Shape class of a container; decides tiering and fill ceilings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContainerClass {
    #[default]
    Box,
    Mailer,
    Long,
}

impl ContainerClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerClass::Box => "box",
            ContainerClass::Mailer => "mailer",
            ContainerClass::Long => "long",
        }
    }
}

/// A shipping box or mailer from the container catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Container {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[schema(value_type = [u32; 3], example = json!([300, 200, 100]))]
    pub inner: Dims,
    #[schema(value_type = [u32; 3], example = json!([310, 210, 110]))]
    pub outer: Dims,
    pub max_weight_g: Grams,
    /// Cost of the container itself, in minor currency units.
    pub material_cost: Money,
    #[serde(default)]
    pub class: ContainerClass,
    /// Whether items may be turned to fit this container.
    #[serde(default = "default_true")]
    pub allows_rotation: bool,
}

impl Container {
    /// Creates a rotation-friendly container after validating the parameters.
    pub fn new(
        id: impl Into<String>,
        class: ContainerClass,
        inner: Dims,
        outer: Dims,
        max_weight_g: Grams,
        material_cost: Money,
    ) -> Result<Self, ValidationError> {
        let container = Self {
            id: id.into(),
            name: None,
            inner,
            outer,
            max_weight_g,
            material_cost,
            class,
            allows_rotation: true,
        };
        container.validate()?;
        Ok(container)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_id(&self.id, "Container")?;
        validate_dims(self.inner, &self.id, "Inner dimensions")?;
        validate_dims(self.outer, &self.id, "Outer dimensions")?;
        validate_weight(self.max_weight_g, &self.id)?;
        Ok(())
    }

    /// Inner volume in cubic millimetres.
    pub fn inner_volume(&self) -> u64 {
        self.inner.volume()
    }

    /// Name for display, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

impl Dimensional for Container {
    fn dimensions(&self) -> Dims {
        self.inner
    }
}

/// Two product groups that must never share a parcel.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
pub struct ProhibitedRule {
    pub group_a: String,
    pub group_b: String,
    pub reason: String,
}

impl ProhibitedRule {
    pub fn new(
        group_a: impl Into<String>,
        group_b: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            group_a: group_a.into(),
            group_b: group_b.into(),
            reason: reason.into(),
        }
    }

    /// The rule's groups in lexical order, so `{a, b}` and `{b, a}` compare equal.
    pub fn pair(&self) -> (&str, &str) {
        if self.group_a <= self.group_b {
            (&self.group_a, &self.group_b)
        } else {
            (&self.group_b, &self.group_a)
        }
    }

    /// True if this rule forbids `x` and `y` together, in either order.
    pub fn forbids(&self, x: &str, y: &str) -> bool {
        (self.group_a == x && self.group_b == y) || (self.group_a == y && self.group_b == x)
    }
}

/// One row of the carrier rate table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RateEntry {
    pub carrier: String,
    pub service: String,
    /// `MAIL` or a numeric size threshold such as `60`.
    pub size_tier: String,
    /// Heaviest parcel this price applies to.
    pub max_weight_g: Grams,
    pub price: Money,
}

/// A line of an incoming order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "product_id": "SKU-TEA", "quantity": 2 }))]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: u32,
}

impl OrderLine {
    pub fn new(product_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// One physical unit to pack.
///
/// Created by expanding an order line; never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Item {
    /// Position in the expanded input, starting at 0.
    pub seq: usize,
    pub product_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[schema(value_type = [u32; 3], example = json!([120, 80, 40]))]
    pub raw_dims: Dims,
    /// Raw dimensions plus twice the padding on every axis.
    #[schema(value_type = [u32; 3], example = json!([130, 90, 50]))]
    pub effective_dims: Dims,
    pub weight_g: Grams,
    pub can_rotate: bool,
    pub fragile: bool,
    #[serde(default)]
    pub prohibited_group: Option<String>,
    pub padding_mm: Millimeters,
}

impl Item {
    /// Volume of the padded item.
    pub fn effective_volume(&self) -> u64 {
        self.effective_dims.volume()
    }
}

impl Dimensional for Item {
    fn dimensions(&self) -> Dims {
        self.effective_dims
    }
}

impl Weighted for Item {
    fn weight_g(&self) -> Grams {
        self.weight_g
    }
}

/// A hypothetical product for what-if queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "dims": [250, 180, 60],
    "weight_g": 900,
    "padding_mm": 5,
    "can_rotate": true,
    "fragile": false
}))]
pub struct ItemSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[schema(value_type = [u32; 3])]
    pub dims: Dims,
    pub weight_g: Grams,
    #[serde(default)]
    pub padding_mm: Millimeters,
    #[serde(default = "default_true")]
    pub can_rotate: bool,
    #[serde(default)]
    pub fragile: bool,
}

impl ItemSpec {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let owner = self.name.as_deref().unwrap_or("simulated item");
        validate_dims(self.dims, owner, "Dimensions")?;
        validate_weight(self.weight_g, owner)?;
        Ok(())
    }
}
