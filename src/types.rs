//! Common types and traits for parcel geometry.
//!
//! All lengths are whole millimetres, weights whole grams and volumes cubic
//! millimetres. Integer units keep every comparison in the engine exact, so two
//! runs over the same catalog always reach the same decision.

use serde::{Deserialize, Serialize};

/// Length in millimetres.
pub type Millimeters = u32;

/// Weight in grams.
pub type Grams = u32;

/// Money in minor currency units (e.g. yen, cents).
pub type Money = u64;

/// Three axis lengths of a box-shaped object or cavity.
///
/// Serialized as a `[length, width, height]` array.
///
/// # Examples
/// ```
/// use pack_advisor::types::Dims;
///
/// let item = Dims::new(100, 50, 20);
/// let padded = item.padded(5);
/// assert_eq!(padded, Dims::new(110, 60, 30));
/// assert_eq!(padded.volume(), 110 * 60 * 30);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[Millimeters; 3]", into = "[Millimeters; 3]")]
pub struct Dims {
    pub length: Millimeters,
    pub width: Millimeters,
    pub height: Millimeters,
}

impl Dims {
    #[inline]
    pub const fn new(length: Millimeters, width: Millimeters, height: Millimeters) -> Self {
        Self {
            length,
            width,
            height,
        }
    }

    #[inline]
    pub const fn as_array(&self) -> [Millimeters; 3] {
        [self.length, self.width, self.height]
    }

    /// Volume in cubic millimetres, saturating at `u64::MAX`.
    #[inline]
    pub fn volume(&self) -> u64 {
        u64::from(self.length)
            .saturating_mul(u64::from(self.width))
            .saturating_mul(u64::from(self.height))
    }

    /// Adds `padding` on both sides of every axis.
    #[inline]
    pub fn padded(&self, padding: Millimeters) -> Self {
        let extra = padding.saturating_mul(2);
        Self::new(
            self.length.saturating_add(extra),
            self.width.saturating_add(extra),
            self.height.saturating_add(extra),
        )
    }

    /// True if every axis is strictly positive.
    #[inline]
    pub fn is_valid_dimension(&self) -> bool {
        self.length > 0 && self.width > 0 && self.height > 0
    }

    /// Axis-by-axis comparison without any reorientation.
    #[inline]
    pub fn fits_within(&self, cavity: &Self) -> bool {
        self.length <= cavity.length && self.width <= cavity.width && self.height <= cavity.height
    }
}

impl From<[Millimeters; 3]> for Dims {
    #[inline]
    fn from(axes: [Millimeters; 3]) -> Self {
        Self::new(axes[0], axes[1], axes[2])
    }
}

impl From<Dims> for [Millimeters; 3] {
    #[inline]
    fn from(dims: Dims) -> Self {
        dims.as_array()
    }
}

impl std::fmt::Display for Dims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{} mm", self.length, self.width, self.height)
    }
}

/// Trait for objects with a box-shaped extent.
pub trait Dimensional {
    /// Returns the dimensions the engine packs or compares with.
    fn dimensions(&self) -> Dims;

    /// Volume of [`Dimensional::dimensions`].
    fn volume(&self) -> u64 {
        self.dimensions().volume()
    }
}

impl Dimensional for Dims {
    fn dimensions(&self) -> Dims {
        *self
    }
}

/// Trait for objects with weight.
pub trait Weighted {
    /// Returns the weight in grams.
    fn weight_g(&self) -> Grams;
}

/// Sums the weight of a collection without overflowing.
pub fn total_weight<'a, T: Weighted + 'a>(items: impl IntoIterator<Item = &'a T>) -> u64 {
    items
        .into_iter()
        .fold(0u64, |acc, i| acc.saturating_add(u64::from(i.weight_g())))
}

/// Sums the volume of a collection, saturating at `u64::MAX`.
pub fn total_volume<'a, T: Dimensional + 'a>(items: impl IntoIterator<Item = &'a T>) -> u64 {
    items
        .into_iter()
        .fold(0u64, |acc, i| acc.saturating_add(i.volume()))
}
