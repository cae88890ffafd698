//! Geometric helpers for orientation checks and size scoring.
//!
//! Nothing here places items at coordinates. The engine only asks whether a
//! single item fits a cavity in some axis assignment and how full a cavity
//! would be by volume.

use crate::types::{Dims, Millimeters};

/// All six axis assignments of `dims`, starting with the original one.
///
/// Duplicates are kept when axes are equal; callers only test membership.
pub fn orientations(dims: Dims) -> [Dims; 6] {
    let Dims {
        length: l,
        width: w,
        height: h,
    } = dims;
    [
        Dims::new(l, w, h),
        Dims::new(l, h, w),
        Dims::new(w, l, h),
        Dims::new(w, h, l),
        Dims::new(h, l, w),
        Dims::new(h, w, l),
    ]
}

/// Checks whether an item fits inside a cavity.
///
/// With `allow_rotation` every permutation of the item's axes is tried,
/// otherwise only the original assignment.
///
/// # Examples
/// ```
/// use pack_advisor::geometry::fits_inside;
/// use pack_advisor::types::Dims;
///
/// let cavity = Dims::new(100, 50, 30);
/// assert!(fits_inside(Dims::new(30, 100, 50), cavity, true));
/// assert!(!fits_inside(Dims::new(30, 100, 50), cavity, false));
/// ```
pub fn fits_inside(item: Dims, cavity: Dims, allow_rotation: bool) -> bool {
    if !allow_rotation {
        return item.fits_within(&cavity);
    }
    orientations(item)
        .iter()
        .any(|oriented| oriented.fits_within(&cavity))
}

/// Ratio of occupied volume to cavity volume.
///
/// Returns `None` for a cavity without volume.
pub fn fill_ratio(occupied: u64, capacity: u64) -> Option<f64> {
    if capacity == 0 {
        return None;
    }
    Some(occupied as f64 / capacity as f64)
}

/// Linear size score in centimetres: each outer axis is converted from
/// millimetres to centimetres, rounded up, and the three are summed.
///
/// # Examples
/// ```
/// use pack_advisor::geometry::size_score_cm;
/// use pack_advisor::types::Dims;
///
/// assert_eq!(size_score_cm(Dims::new(301, 200, 95)), 31 + 20 + 10);
/// ```
pub fn size_score_cm(outer: Dims) -> u32 {
    outer.as_array().iter().map(|&mm| mm_to_cm_ceil(mm)).sum()
}

#[inline]
fn mm_to_cm_ceil(mm: Millimeters) -> u32 {
    mm.div_ceil(10)
}
