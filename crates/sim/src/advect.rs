//! Stage 3: mass-conserving advection (gather, winner-takes-all).
//!
//! Scatter-style transport (each cell pushing mass to its destination)
//! risks write collisions and lost mass. Instead every destination PULLS:
//! it scans a search window, recomputes where each candidate source lands
//! (`source position + velocity * dt`) and accepts the tent-filter
//! bilinear fraction of the source's mass overlapping this cell. Summed
//! over all destinations the same weights total at most 1 per source, so
//! transport conserves mass exactly up to floating-point error.
//!
//! Genomes cannot be averaged - a blend of two unrelated species is not a
//! valid organism - so the destination adopts the full genome, species ID
//! and aux traits of whichever single source contributed the largest
//! weighted mass.

use glam::Vec2;
use rayon::prelude::*;

use crate::genome::{AuxTraits, Genome};
use crate::params::Params;
use crate::physics::{MAX_SPEED, MIN_MASS};
use crate::world::{cell_at, Cell};

/// Largest search window the gather supports. Configurations whose maximum
/// displacement exceeds this are clamped (and warned about) rather than
/// rejected; the simulation stays valid, transport merely truncates.
pub const MAX_SEARCH_RADIUS: i32 = 4;

/// Advected intermediate cell: transported mass plus the dominant
/// contributor's identity. Resolution of empty/degenerate results happens
/// in the next stage.
#[derive(Clone, Copy, Debug, Default)]
pub struct AdvectCell {
    pub mass: f32,
    pub genome: Genome,
    pub species: u32,
    pub aux: AuxTraits,
}

/// Search radius needed to cover the maximum single-step displacement,
/// before clamping to [`MAX_SEARCH_RADIUS`].
#[inline]
pub fn required_radius(params: &Params) -> i32 {
    (MAX_SPEED * params.dt).ceil() as i32 + 1
}

/// Gather transported mass and winner genetics into `out`.
pub fn gather(src: &[Cell], velocity: &[Vec2], params: &Params, out: &mut [AdvectCell]) {
    let width = params.width;
    let height = params.height;
    let floor = params.floor_boundary;
    let dt = params.dt;
    let window = required_radius(params).min(MAX_SEARCH_RADIUS);
    let y_max = (height - 1) as f32;

    out.par_chunks_mut(width)
        .enumerate()
        .for_each(|(j, row)| {
            for (i, slot) in row.iter_mut().enumerate() {
                let mut incoming = 0.0f32;
                let mut best_weighted = 0.0f32;
                let mut winner: Option<usize> = None;

                for dj in -window..=window {
                    for di in -window..=window {
                        // Virtual (unwrapped) source coordinates near the
                        // destination; actual data comes from the wrapped
                        // index.
                        let si = i as i32 + di;
                        let sj = j as i32 + dj;
                        let Some(sidx) = cell_at(width, height, floor, si, sj) else {
                            continue;
                        };
                        let source = &src[sidx];
                        if source.mass < MIN_MASS {
                            continue;
                        }

                        let v = velocity[sidx];
                        let land_x = si as f32 + v.x * dt;
                        let mut land_y = sj as f32 + v.y * dt;
                        if floor {
                            // Landing on the boundary cell keeps the whole
                            // tent footprint inside the grid.
                            land_y = land_y.clamp(0.0, y_max);
                        }

                        let wx = (1.0 - (land_x - i as f32).abs()).max(0.0);
                        let wy = (1.0 - (land_y - j as f32).abs()).max(0.0);
                        let w = wx * wy;
                        if w <= 0.0 {
                            continue;
                        }

                        let weighted = w * source.mass;
                        incoming += weighted;
                        if weighted > best_weighted {
                            best_weighted = weighted;
                            winner = Some(sidx);
                        }
                    }
                }

                *slot = match winner {
                    Some(widx) if incoming >= MIN_MASS => AdvectCell {
                        mass: incoming,
                        genome: src[widx].genome,
                        species: src[widx].species,
                        aux: src[widx].aux,
                    },
                    // Nothing meaningful arrived: carry an empty identity
                    // and let the resolve stage decide between regrowth and
                    // continued void.
                    _ => AdvectCell {
                        mass: incoming,
                        ..AdvectCell::default()
                    },
                };
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stationary_mass_transports_onto_itself() {
        let params = Params {
            width: 8,
            height: 8,
            kernel_radius: 2.0,
            ..Params::default()
        };
        let mut src = vec![Cell::default(); 64];
        src[3 * 8 + 4].mass = 0.8;
        src[3 * 8 + 4].genome = Genome::DEFAULT;
        src[3 * 8 + 4].species = 9;
        let velocity = vec![Vec2::ZERO; 64];
        let mut out = vec![AdvectCell::default(); 64];
        gather(&src, &velocity, &params, &mut out);

        assert!((out[3 * 8 + 4].mass - 0.8).abs() < 1e-6);
        assert_eq!(out[3 * 8 + 4].species, 9);
        let total: f32 = out.iter().map(|c| c.mass).sum();
        assert!((total - 0.8).abs() < 1e-6);
    }

    #[test]
    fn displaced_mass_splits_bilinearly() {
        let params = Params {
            width: 8,
            height: 8,
            kernel_radius: 2.0,
            dt: 0.1,
            ..Params::default()
        };
        let mut src = vec![Cell::default(); 64];
        src[2 * 8 + 2].mass = 1.0;
        src[2 * 8 + 2].genome = Genome::DEFAULT;
        src[2 * 8 + 2].species = 5;
        let mut velocity = vec![Vec2::ZERO; 64];
        // Lands at x = 2.4: 60% stays at column 2, 40% moves to column 3.
        velocity[2 * 8 + 2] = Vec2::new(4.0, 0.0);
        let mut out = vec![AdvectCell::default(); 64];
        gather(&src, &velocity, &params, &mut out);

        assert!((out[2 * 8 + 2].mass - 0.6).abs() < 1e-6);
        assert!((out[2 * 8 + 3].mass - 0.4).abs() < 1e-6);
        assert_eq!(out[2 * 8 + 2].species, 5);
        assert_eq!(out[2 * 8 + 3].species, 5);
    }
}
