//! Stage 2: velocity field.
//!
//! Three additive steering terms, all central-difference gradients over the
//! cross-shaped neighbor stencil:
//! - growth gradient: organisms climb toward potential values their own
//!   genome grows best at
//! - mass repulsion: organisms avoid runaway density (weighted x2)
//! - chemotaxis: organisms steer toward edible waste, damped when local
//!   waste is already plentiful
//!
//! The combined velocity is scaled by the speed gene, accelerated by
//! gravity, damped by friction and magnitude-clamped for numerical
//! stability. Cells below the mass epsilon are skipped entirely.

use glam::Vec2;
use rayon::prelude::*;

use crate::genome::growth_rate;
use crate::params::Params;
use crate::physics::{MAX_SPEED, MIN_MASS};
use crate::world::{cell_at, Cell};

/// Neighbor indices for the cross stencil, falling back to the center cell
/// where the floor boundary truncates the grid (zero-gradient edge).
#[inline]
fn stencil(width: usize, height: usize, floor: bool, i: usize, j: usize) -> [usize; 4] {
    let center = j * width + i;
    let fetch = |di: i32, dj: i32| {
        cell_at(width, height, floor, i as i32 + di, j as i32 + dj).unwrap_or(center)
    };
    [fetch(-1, 0), fetch(1, 0), fetch(0, -1), fetch(0, 1)]
}

/// Food affinity of a waste pool for an organism with the given diet gene.
#[inline]
fn food_affinity(cell: &Cell, diet: f32) -> f32 {
    (1.0 - (cell.waste.kind - diet).abs()).max(0.0) * cell.waste.mass
}

/// Compute the velocity field from the source snapshot and potential field.
pub fn compute(src: &[Cell], potential: &[f32], params: &Params, out: &mut [Vec2]) {
    let width = params.width;
    let height = params.height;
    let floor = params.floor_boundary;
    let gravity = params.gravity_vec() * params.dt;
    let damping = (1.0 - params.friction).clamp(0.0, 1.0);

    out.par_chunks_mut(width)
        .enumerate()
        .for_each(|(j, row)| {
            for (i, slot) in row.iter_mut().enumerate() {
                let idx = j * width + i;
                let cell = &src[idx];
                if cell.mass < MIN_MASS {
                    *slot = Vec2::ZERO;
                    continue;
                }

                let [left, right, down, up] = stencil(width, height, floor, i, j);
                let genome = cell.genome;

                // Growth gradient: evaluate G at neighbor potentials using
                // THIS cell's genome, not the neighbor's.
                let grad_growth = Vec2::new(
                    (growth_rate(potential[right], &genome)
                        - growth_rate(potential[left], &genome))
                        * 0.5,
                    (growth_rate(potential[up], &genome)
                        - growth_rate(potential[down], &genome))
                        * 0.5,
                );

                // Mass repulsion, weighted x2.
                let grad_mass = Vec2::new(
                    (src[right].mass - src[left].mass) * 0.5,
                    (src[up].mass - src[down].mass) * 0.5,
                );

                let mut v = grad_growth - 2.0 * grad_mass;

                if params.chemotaxis > 0.0 {
                    let diet = genome.diet;
                    let grad_food = Vec2::new(
                        (food_affinity(&src[right], diet) - food_affinity(&src[left], diet))
                            * 0.5,
                        (food_affinity(&src[up], diet) - food_affinity(&src[down], diet)) * 0.5,
                    );
                    // Sated organisms stop seeking: high local waste mass
                    // suppresses the term.
                    let hunger = 1.0 / (1.0 + 4.0 * cell.waste.mass);
                    v += params.chemotaxis * hunger * grad_food;
                }

                v *= 0.5 + cell.aux.speed;
                v += gravity;
                v *= damping;
                *slot = v.clamp_length_max(MAX_SPEED);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::Genome;

    fn uniform_world(n: usize, mass: f32) -> Vec<Cell> {
        let mut cell = Cell::default();
        cell.mass = mass;
        cell.genome = Genome::DEFAULT;
        cell.species = 1;
        vec![cell; n * n]
    }

    #[test]
    fn uniform_state_produces_zero_velocity() {
        let params = Params {
            width: 16,
            height: 16,
            kernel_radius: 4.0,
            ..Params::default()
        };
        let src = uniform_world(16, 1.0);
        let potential = vec![1.0; 16 * 16];
        let mut out = vec![Vec2::ONE; 16 * 16];
        compute(&src, &potential, &params, &mut out);
        for v in &out {
            assert_eq!(*v, Vec2::ZERO);
        }
    }

    #[test]
    fn void_cells_are_skipped() {
        let params = Params {
            width: 8,
            height: 8,
            kernel_radius: 2.0,
            gravity: 10.0,
            ..Params::default()
        };
        let src = vec![Cell::default(); 64];
        // Wildly varying potential must not move massless cells.
        let potential: Vec<f32> = (0..64).map(|i| (i % 7) as f32 * 0.1).collect();
        let mut out = vec![Vec2::ONE; 64];
        compute(&src, &potential, &params, &mut out);
        assert!(out.iter().all(|v| *v == Vec2::ZERO));
    }

    #[test]
    fn speed_never_exceeds_ceiling() {
        let params = Params {
            width: 8,
            height: 8,
            kernel_radius: 2.0,
            ..Params::default()
        };
        let mut src = uniform_world(8, 0.5);
        // Sharp mass spike produces a large repulsion gradient.
        src[3 * 8 + 3].mass = 500.0;
        let potential: Vec<f32> = (0..64).map(|i| (i as f32 * 0.37).sin().abs()).collect();
        let mut out = vec![Vec2::ZERO; 64];
        compute(&src, &potential, &params, &mut out);
        for v in &out {
            assert!(v.length() <= MAX_SPEED + 1e-4);
        }
    }
}
