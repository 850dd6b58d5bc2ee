//! Stage 1: potential field convolution.
//!
//! The potential at a cell is a weighted average of neighbor living mass
//! over a disc of radius `kernel_radius`, with weights from a
//! species-dependent kernel: three radial Gaussian rings (short, mid,
//! long range) blended by the cell's own structure gene. Different
//! structure genes therefore sense their surroundings through different
//! effective kernels.
//!
//! Normalization divides by the kernel weight actually sampled, so edge
//! truncation under the floor boundary needs no special casing.

use rayon::prelude::*;

use crate::params::Params;
use crate::world::{cell_at, Cell};

/// Ring centers of the three kernel Gaussians, as fractions of the radius.
const RING_CENTERS: [f32; 3] = [0.2, 0.5, 0.8];
/// Shared ring width, as a fraction of the radius.
const RING_WIDTH: f32 = 0.12;

/// Kernel shape K(r, structure) for a normalized distance r in [0,1].
///
/// The three rings are mixed by quadratic Bernstein weights of the
/// structure gene, so the blend varies smoothly from short-range sensing
/// (structure 0) to long-range sensing (structure 1).
#[inline]
pub fn kernel_weight(r: f32, structure: f32) -> f32 {
    if r > 1.0 {
        return 0.0;
    }
    let m = structure.clamp(0.0, 1.0);
    let blend = [(1.0 - m) * (1.0 - m), 2.0 * m * (1.0 - m), m * m];
    let mut k = 0.0;
    for (center, weight) in RING_CENTERS.iter().zip(blend) {
        let z = (r - center) / RING_WIDTH;
        k += weight * (-0.5 * z * z).exp();
    }
    k
}

/// Compute the potential field from the source snapshot into `out`.
///
/// O(R^2) gather per cell; rows are processed in parallel, each worker
/// writing only its own rows.
pub fn compute(src: &[Cell], params: &Params, out: &mut [f32]) {
    let width = params.width;
    let height = params.height;
    let floor = params.floor_boundary;
    let radius = params.kernel_radius;
    let ir = radius.ceil() as i32;

    out.par_chunks_mut(width)
        .enumerate()
        .for_each(|(j, row)| {
            for (i, slot) in row.iter_mut().enumerate() {
                let structure = src[j * width + i].genome.structure;
                let mut weighted = 0.0f32;
                let mut total_weight = 0.0f32;

                for dj in -ir..=ir {
                    for di in -ir..=ir {
                        let dist = ((di * di + dj * dj) as f32).sqrt();
                        if dist > radius {
                            continue;
                        }
                        let Some(idx) =
                            cell_at(width, height, floor, i as i32 + di, j as i32 + dj)
                        else {
                            continue;
                        };
                        let w = kernel_weight(dist / radius, structure);
                        weighted += w * src[idx].mass;
                        total_weight += w;
                    }
                }

                *slot = if total_weight > 1e-9 {
                    weighted / total_weight
                } else {
                    0.0
                };
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Cell;

    #[test]
    fn kernel_vanishes_outside_unit_radius() {
        assert_eq!(kernel_weight(1.1, 0.5), 0.0);
        assert!(kernel_weight(0.5, 0.5) > 0.0);
    }

    #[test]
    fn structure_gene_changes_kernel_shape() {
        // Short-range sensing dominates at structure 0, long-range at 1.
        assert!(kernel_weight(0.2, 0.0) > kernel_weight(0.8, 0.0));
        assert!(kernel_weight(0.8, 1.0) > kernel_weight(0.2, 1.0));
    }

    #[test]
    fn uniform_mass_yields_uniform_potential() {
        let params = Params {
            width: 32,
            height: 32,
            kernel_radius: 6.0,
            ..Params::default()
        };
        let mut cell = Cell::default();
        cell.mass = 0.75;
        cell.genome = crate::genome::Genome::DEFAULT;
        let src = vec![cell; 32 * 32];
        let mut out = vec![0.0; 32 * 32];
        compute(&src, &params, &mut out);
        for &u in &out {
            assert!((u - 0.75).abs() < 1e-4, "potential {u} != mass 0.75");
        }
    }
}
