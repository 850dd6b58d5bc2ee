//! Stage 5: global mass reduction.
//!
//! Parallel reduction of total system mass (living + waste): row chunks
//! independently sum into local floating-point partials, and each partial
//! is folded into one global accumulator with an integer atomic add. The
//! float is fixed-point encoded (x1000, truncated) for the atomic step and
//! decoded on readback - a portability concern, not an algorithmic one.
//!
//! The resulting normalization factor counteracts cumulative
//! discretization/clamping drift; it is soft-clamped so the correction is
//! never a visible discontinuity.

use std::sync::atomic::{AtomicI64, Ordering};

use rayon::prelude::*;

use crate::physics::{FIXED_POINT_SCALE, NORMALIZATION_CLAMP};
use crate::world::Cell;

/// Rows per reduction chunk.
const CHUNK_ROWS: usize = 8;

/// Total living + waste mass over the buffer.
pub fn total_mass(cells: &[Cell], width: usize) -> f32 {
    let accumulator = AtomicI64::new(0);
    cells
        .par_chunks(width * CHUNK_ROWS)
        .for_each(|chunk| {
            let partial: f32 = chunk.iter().map(|c| c.mass + c.waste.mass).sum();
            let encoded = (partial * FIXED_POINT_SCALE) as i64;
            accumulator.fetch_add(encoded, Ordering::Relaxed);
        });
    accumulator.load(Ordering::Relaxed) as f32 / FIXED_POINT_SCALE
}

/// Normalization factor to apply at the start of the next step's resolve.
///
/// Non-positive targets disable the correction; a near-empty world gets no
/// correction either (avoids the divide-by-zero blowup).
pub fn normalization_factor(total: f32, target: f32) -> f32 {
    if target <= 0.0 || total < 1e-6 {
        return 1.0;
    }
    (target / total).clamp(NORMALIZATION_CLAMP.0, NORMALIZATION_CLAMP.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factor_defaults_to_identity() {
        assert_eq!(normalization_factor(100.0, 0.0), 1.0);
        assert_eq!(normalization_factor(0.0, 50.0), 1.0);
    }

    #[test]
    fn factor_is_soft_clamped() {
        assert_eq!(normalization_factor(100.0, 1000.0), 1.1);
        assert_eq!(normalization_factor(1000.0, 100.0), 0.9);
        let f = normalization_factor(100.0, 103.0);
        assert!((f - 1.03).abs() < 1e-6);
    }
}
