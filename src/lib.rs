//! Parcel recommendation engine.
//!
//! Splits an order into parcels that never mix prohibited product groups,
//! finds the containers each parcel fits, prices them against a carrier rate
//! table and picks the cheapest combination with deterministic tie-breaks.
//!
//! ```
//! use pack_advisor::catalog::CatalogSnapshot;
//! use pack_advisor::model::OrderLine;
//! use pack_advisor::optimizer::{EngineSettings, recommend};
//!
//! let catalog = CatalogSnapshot::from_json_str(r#"{
//!     "products": [{ "id": "SKU-1", "dims": [100, 80, 40], "weight_g": 300 }],
//!     "containers": [{ "id": "BOX-60", "inner": [250, 180, 120], "outer": [260, 190, 130],
//!                      "max_weight_g": 5000, "material_cost": 40 }],
//!     "rates": [{ "carrier": "CarrierB", "service": "Economy", "size_tier": "60",
//!                 "max_weight_g": 5000, "price": 850 }]
//! }"#)?;
//! let lines = [OrderLine::new("SKU-1", 2)];
//! let recommendation = recommend(&lines, &catalog, &EngineSettings::default())?;
//! assert!(recommendation.is_complete);
//! assert_eq!(recommendation.totals.grand_total, 890);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod api;
pub mod catalog;
pub mod composer;
pub mod config;
pub mod error;
pub mod fit;
pub mod geometry;
pub mod logging;
pub mod model;
pub mod normalizer;
pub mod optimizer;
pub mod rates;
pub mod selector;
pub mod splitter;
pub mod types;
