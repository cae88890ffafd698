//! Read-only catalog snapshot: products, containers, prohibited pairs and rates.
//!
//! A snapshot is built once, validated, and then shared immutably (usually
//! behind an `Arc`) by every request that runs against it. Swapping catalogs
//! means building a new snapshot; an existing one never changes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::model::{Container, Product, ProhibitedRule, RateEntry, ValidationError};

/// Errors raised while loading or validating a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read catalog file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog is inconsistent: {0}")]
    Invalid(#[from] ValidationError),
}

/// Wire and file form of a catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CatalogDocument {
    #[serde(default)]
    pub products: Vec<Product>,
    /// Order matters: it is the last tie-break between equally good containers.
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    pub prohibited_pairs: Vec<ProhibitedRule>,
    #[serde(default)]
    pub rates: Vec<RateEntry>,
}

/// Row counts of a snapshot, for health output and logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct CatalogSummary {
    pub products: usize,
    pub containers: usize,
    pub prohibited_pairs: usize,
    pub rates: usize,
}

/// Validated, immutable catalog data.
#[derive(Clone, Debug, Default)]
pub struct CatalogSnapshot {
    products: Vec<Product>,
    product_index: BTreeMap<String, usize>,
    containers: Vec<Container>,
    rules: Vec<ProhibitedRule>,
    rates: Vec<RateEntry>,
}

impl CatalogSnapshot {
    /// Builds a snapshot after validating every row.
    pub fn new(document: CatalogDocument) -> Result<Self, ValidationError> {
        validate_document(&document)?;
        let CatalogDocument {
            products,
            containers,
            prohibited_pairs,
            rates,
        } = document;

        let product_index = products
            .iter()
            .enumerate()
            .map(|(idx, product)| (product.id.clone(), idx))
            .collect();

        Ok(Self {
            products,
            product_index,
            containers,
            rules: prohibited_pairs,
            rates,
        })
    }

    /// Parses and validates a JSON catalog.
    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(raw)?;
        Ok(Self::new(document)?)
    }

    /// Reads, parses and validates a JSON catalog file.
    pub fn load_from_path(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.product_index.get(id).map(|&idx| &self.products[idx])
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Containers in catalog order.
    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    pub fn rules(&self) -> &[ProhibitedRule] {
        &self.rules
    }

    pub fn rates(&self) -> &[RateEntry] {
        &self.rates
    }

    pub fn summary(&self) -> CatalogSummary {
        CatalogSummary {
            products: self.products.len(),
            containers: self.containers.len(),
            prohibited_pairs: self.rules.len(),
            rates: self.rates.len(),
        }
    }

    /// Copies the snapshot back into its wire form.
    pub fn to_document(&self) -> CatalogDocument {
        CatalogDocument {
            products: self.products.clone(),
            containers: self.containers.clone(),
            prohibited_pairs: self.rules.clone(),
            rates: self.rates.clone(),
        }
    }
}

fn validate_document(document: &CatalogDocument) -> Result<(), ValidationError> {
    let mut seen = BTreeSet::new();
    for product in &document.products {
        product.validate()?;
        if !seen.insert(product.id.as_str()) {
            return Err(ValidationError::InvalidConfiguration(format!(
                "duplicate product id '{}'",
                product.id
            )));
        }
    }

    let mut seen = BTreeSet::new();
    for container in &document.containers {
        container.validate()?;
        if !seen.insert(container.id.as_str()) {
            return Err(ValidationError::InvalidConfiguration(format!(
                "duplicate container id '{}'",
                container.id
            )));
        }
    }

    for rule in &document.prohibited_pairs {
        if rule.group_a.trim().is_empty() || rule.group_b.trim().is_empty() {
            return Err(ValidationError::InvalidConfiguration(
                "prohibited pair needs two non-empty groups".to_string(),
            ));
        }
    }

    for rate in &document.rates {
        if rate.carrier.trim().is_empty()
            || rate.service.trim().is_empty()
            || rate.size_tier.trim().is_empty()
        {
            return Err(ValidationError::InvalidConfiguration(format!(
                "rate row needs carrier, service and size tier: {:?}",
                rate
            )));
        }
    }

    Ok(())
}
