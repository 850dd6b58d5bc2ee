//! Stage 4: growth and metabolism resolve.
//!
//! Consumes the advected intermediate, the previous living snapshot
//! (fallback/inertia), the potential and velocity fields, the diffused
//! waste, the environment and the previous step's normalization factor,
//! and writes the next full cell state. Effects apply in a fixed order:
//! fallback, mutation, speciation, inertia, metabolism (eating), death,
//! waste dynamics, void cleanup, global normalization. Every write path
//! clamps; every division branches around a near-zero denominator.

use rayon::prelude::*;

use crate::advect::AdvectCell;
use crate::genome::{effective_mu, growth_rate, AuxTraits, Genome};
use crate::noise;
use crate::params::Params;
use crate::physics::{
    BASE_DEATH_MULTIPLIER, CROWDING_MULTIPLIER, CROWDING_THRESHOLD, DEFENSE_MITIGATION,
    HAZARD_FACTOR, MIN_MASS, MUTATION_MASS_GATE, SPECIATION_DRIFT_THRESHOLD, SPECIATION_RATE,
    STARVATION_FACTOR, THERMAL_NICHE_WIDTH, VOID_THRESHOLD, WASTE_DIFFUSION,
};
use crate::world::{cell_at, Cell, EnvCell, Waste};

/// Hash salts keeping the per-cell random streams independent.
const SALT_MUTATE: u32 = 0x11;
const SALT_DRIFT: u32 = 0x22;
const SALT_SPECIATE: u32 = 0x33;

/// Per-gene sensitivity to the shared mutation drift value.
const DRIFT_STRUCTURE: f32 = 0.08;
const DRIFT_DIET: f32 = 0.12;
const DRIFT_SIGMA: f32 = 0.008;
const DRIFT_AUX: f32 = 0.10;

/// Diffused waste snapshot read by the eating step.
#[derive(Clone, Copy, Debug, Default)]
pub struct WasteSample {
    pub mass: f32,
    pub kind: f32,
}

/// One 4-neighbor Laplacian blur of the waste pools, gather-form so it
/// parallelizes without write collisions. Mass-conserving: on the torus
/// every outflow is someone's inflow, and under the floor boundary the
/// missing neighbor's exchange simply stays home.
pub fn diffuse_waste(src: &[Cell], params: &Params, out: &mut [WasteSample]) {
    let width = params.width;
    let height = params.height;
    let floor = params.floor_boundary;
    // Explicit-Euler diffusion is stable for a*4 < 1.
    let a = (WASTE_DIFFUSION * params.dt).min(0.2);

    out.par_chunks_mut(width)
        .enumerate()
        .for_each(|(j, row)| {
            for (i, slot) in row.iter_mut().enumerate() {
                let idx = j * width + i;
                let w0 = src[idx].waste.mass;
                let k0 = src[idx].waste.kind;

                let mut mass = w0;
                let mut kind_weighted = 0.0f32;
                let mut inflow = 0.0f32;
                for (di, dj) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
                    let Some(nidx) = cell_at(width, height, floor, i as i32 + di, j as i32 + dj)
                    else {
                        continue;
                    };
                    let wn = src[nidx].waste.mass;
                    mass += a * (wn - w0);
                    inflow += a * wn;
                    kind_weighted += a * wn * src[nidx].waste.kind;
                }

                let retained = mass - inflow;
                let denom = retained.max(0.0) + inflow;
                *slot = WasteSample {
                    mass: mass.max(0.0),
                    kind: if denom > 1e-9 {
                        ((retained.max(0.0) * k0 + kind_weighted) / denom).clamp(0.0, 1.0)
                    } else {
                        k0
                    },
                };
            }
        });
}

/// Smoothstep over [0,1].
#[inline]
fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Eating efficiency: how well the effective diet enzyme matches the
/// effective waste type, sharpened by the selectivity parameter and
/// modulated by the thermal niche.
#[inline]
fn eating_efficiency(genome: &Genome, aux: &AuxTraits, waste_kind: f32, temperature: f32, selectivity: f32) -> f32 {
    let mismatch = (effective_mu(genome.diet) - effective_mu(waste_kind)).abs();
    let cutoff = crate::genome::EFFECTIVE_MU_SPAN * selectivity.clamp(0.01, 1.0);
    let enzyme = smoothstep(1.0 - mismatch / cutoff);
    let z = (temperature - aux.thermal_preference) / THERMAL_NICHE_WIDTH;
    let thermal = (-0.5 * z * z).exp();
    enzyme * thermal
}

/// Apply the full resolve sequence, writing the next snapshot into `next`.
///
/// `scale` is the global normalization factor computed by the reduction on
/// the PREVIOUS step (already soft-clamped).
#[allow(clippy::too_many_arguments)]
pub fn apply(
    advected: &[AdvectCell],
    prev: &[Cell],
    potential: &[f32],
    velocity: &[glam::Vec2],
    diffused: &[WasteSample],
    env: &[EnvCell],
    scale: f32,
    params: &Params,
    step: u64,
    next: &mut [Cell],
) {
    let width = params.width;
    let dt = params.dt;
    let seed = params.seed;
    let damping = (1.0 - params.friction).clamp(0.0, 1.0);
    let gravity = params.gravity_vec() * dt;
    let stir = (params.velocity_impact * dt).clamp(0.0, 1.0);

    next.par_chunks_mut(width)
        .enumerate()
        .for_each(|(j, row)| {
            for (i, out) in row.iter_mut().enumerate() {
                let idx = j * width + i;
                let adv = &advected[idx];
                let prev_cell = &prev[idx];
                let local_env = &env[idx];

                let mut mass = adv.mass.max(0.0);
                let mut genome = adv.genome;
                let mut species = adv.species;
                let mut aux = adv.aux;

                // 1. Fallback: negligible or degenerate arrivals recover
                // local history, or the hard-coded default genome.
                if mass < MIN_MASS || genome.is_degenerate() {
                    if prev_cell.mass >= MIN_MASS && !prev_cell.genome.is_degenerate() {
                        genome = prev_cell.genome;
                        species = prev_cell.species;
                        aux = prev_cell.aux;
                    } else {
                        genome = Genome::DEFAULT;
                        aux = AuxTraits::DEFAULT;
                        if species == 0 {
                            species = noise::species_id(idx, step, seed);
                        }
                    }
                }
                genome = genome.clamped();
                aux = aux.clamped();

                let growth = growth_rate(potential[idx], &genome);

                // 2. Mutation: gated by mass, positive growth and the
                // global rate; the whole genome shares one drift value with
                // per-gene sensitivities.
                if mass > MUTATION_MASS_GATE
                    && growth > 0.0
                    && params.mutation_rate > 0.0
                    && noise::cell_rand(idx, step, seed, SALT_MUTATE) < params.mutation_rate
                {
                    let drift = (noise::cell_rand(idx, step, seed, SALT_DRIFT) - 0.5) * 2.0;
                    let before = genome;
                    genome.structure += drift * DRIFT_STRUCTURE;
                    genome.diet += drift * DRIFT_DIET;
                    genome.sigma += drift * DRIFT_SIGMA;
                    genome = genome.clamped();
                    aux.speed += drift * DRIFT_AUX;
                    aux.aggression += drift * DRIFT_AUX;
                    aux.defense += drift * DRIFT_AUX;
                    aux.thermal_preference += drift * DRIFT_AUX;
                    aux = aux.clamped();

                    // 3. Speciation: a large enough displacement MAY found
                    // a new species, behind a second, much rarer gate, so
                    // identities do not churn on every minor drift.
                    let displacement = (genome.structure - before.structure).abs()
                        + (genome.diet - before.diet).abs()
                        + (genome.sigma - before.sigma).abs() * 10.0;
                    if displacement > SPECIATION_DRIFT_THRESHOLD
                        && noise::cell_rand(idx, step, seed, SALT_SPECIATE) < SPECIATION_RATE
                    {
                        species = noise::species_id(idx, step, seed);
                    }
                }

                // 4. Inertia: resist rapid genetic change even while mass
                // flows.
                if prev_cell.mass >= MIN_MASS && !prev_cell.genome.is_degenerate() {
                    genome = genome.lerp(prev_cell.genome, params.genetic_inertia);
                    aux = aux.lerp(prev_cell.aux, params.genetic_inertia);
                }

                // 5. Metabolism: eat from the diffused waste pool.
                let mut waste_mass = diffused[idx].mass;
                let mut waste_kind = diffused[idx].kind;
                let mut eaten = 0.0f32;
                if mass >= MIN_MASS && waste_mass > MIN_MASS && params.eat_rate > 0.0 {
                    let efficiency = eating_efficiency(
                        &genome,
                        &aux,
                        waste_kind,
                        local_env.temperature,
                        params.diet_selectivity,
                    );
                    let appetite = 0.7 + 0.6 * aux.aggression;
                    eaten = (params.eat_rate
                        * efficiency
                        * appetite
                        * local_env.resource_capacity
                        * mass
                        * dt)
                        .min(waste_mass);
                    mass += eaten;
                    waste_mass -= eaten;
                }

                // 6. Death: base decay + overcrowding + starvation +
                // hazard. Dead mass moves to waste, never destroyed.
                if mass >= MIN_MASS {
                    let overflow = (mass - CROWDING_THRESHOLD).max(0.0) / CROWDING_THRESHOLD;
                    let crowding = overflow * overflow * CROWDING_MULTIPLIER;
                    // Starvation needs food to have been present but
                    // inedible; an empty substrate does not starve anyone.
                    let starvation = if growth < 0.0 && waste_mass > MIN_MASS && eaten <= 0.0 {
                        -growth * STARVATION_FACTOR
                    } else {
                        0.0
                    };
                    let hazard = (local_env.hazard - aux.defense * DEFENSE_MITIGATION).max(0.0)
                        * HAZARD_FACTOR;
                    let rate =
                        params.decay_rate * BASE_DEATH_MULTIPLIER + crowding + starvation + hazard;
                    let dead = mass * (rate * dt).clamp(0.0, 1.0);
                    mass -= dead;

                    let new_waste = waste_mass + dead;
                    if dead > 0.0 && new_waste > MIN_MASS {
                        // Waste type drifts toward the dying organism's
                        // structure gene, proportional to its contribution
                        // and attenuated for immiscible (dissimilar) types.
                        let similarity = (1.0 - (waste_kind - genome.structure).abs()).max(0.0);
                        let mix = (dead / new_waste)
                            * similarity.powf(params.immiscibility.max(0.0));
                        waste_kind += (genome.structure - waste_kind) * mix.clamp(0.0, 1.0);
                    }
                    waste_mass = new_waste;
                }

                // 7. Waste dynamics: the pool keeps its own velocity,
                // stirred by the living flow and pulled by gravity.
                let mut waste_velocity = prev_cell.waste.velocity;
                waste_velocity += (velocity[idx] - waste_velocity) * stir;
                waste_velocity += gravity;
                waste_velocity *= damping;

                // 8. Global normalization (factor already soft-clamped).
                mass *= scale;
                waste_mass *= scale;

                // 9. Void cleanup: residual mass folds into waste so the
                // conservation invariant holds at the living/void boundary.
                // Runs after the normalization multiply so a shrinking
                // factor cannot resurrect sub-threshold mass with a live
                // species ID.
                if mass < VOID_THRESHOLD {
                    waste_mass += mass;
                    mass = 0.0;
                    species = 0;
                }

                *out = Cell {
                    mass: mass.max(0.0),
                    genome,
                    species,
                    aux,
                    waste: Waste {
                        mass: waste_mass.max(0.0),
                        kind: waste_kind.clamp(0.0, 1.0),
                        velocity: waste_velocity,
                    },
                };
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waste_diffusion_conserves_mass_on_torus() {
        let params = Params {
            width: 16,
            height: 16,
            kernel_radius: 4.0,
            ..Params::default()
        };
        let mut src = vec![Cell::default(); 256];
        src[5 * 16 + 5].waste.mass = 2.0;
        src[5 * 16 + 5].waste.kind = 0.8;
        src[9 * 16 + 3].waste.mass = 0.7;
        let mut out = vec![WasteSample::default(); 256];
        diffuse_waste(&src, &params, &mut out);

        let before: f32 = src.iter().map(|c| c.waste.mass).sum();
        let after: f32 = out.iter().map(|s| s.mass).sum();
        assert!((before - after).abs() < 1e-5);
        // Kind spreads with the mass.
        assert!(out[5 * 16 + 4].kind > 0.0);
    }

    #[test]
    fn perfect_diet_match_eats_fastest() {
        let genome = Genome {
            structure: 0.5,
            diet: 0.6,
            sigma: 0.05,
        };
        let aux = AuxTraits {
            thermal_preference: 0.5,
            ..AuxTraits::DEFAULT
        };
        let matched = eating_efficiency(&genome, &aux, 0.6, 0.5, 0.5);
        let mismatched = eating_efficiency(&genome, &aux, 0.05, 0.5, 0.5);
        assert!(matched > 0.9);
        assert!(mismatched < 0.1);
        // Narrower selectivity sharpens the cutoff.
        let narrow = eating_efficiency(&genome, &aux, 0.45, 0.5, 0.1);
        let wide = eating_efficiency(&genome, &aux, 0.45, 0.5, 1.0);
        assert!(narrow < wide);
    }
}
