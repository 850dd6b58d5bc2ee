//! Genome and auxiliary trait types carried by every living cell.
//!
//! Genomes are plain values: transport copies them wholesale (winner-takes-all,
//! never blended) and every write path clamps back into the declared bounds.

use serde::{Deserialize, Serialize};

pub const SIGMA_MIN: f32 = 0.01;
pub const SIGMA_MAX: f32 = 0.1;

/// Offset of the usable potential range that raw [0,1] genes map into.
pub const EFFECTIVE_MU_BASE: f32 = 0.08;
/// Span of the usable potential range.
pub const EFFECTIVE_MU_SPAN: f32 = 0.42;

/// Map a raw [0,1] gene value into the potential-space growth target.
///
/// This mapping is shared between the velocity stage (growth gradient) and
/// the metabolism stage (diet enzyme vs. waste type matching); both sides
/// must use the same constants or eating targets drift away from growth
/// targets.
#[inline]
pub fn effective_mu(gene: f32) -> f32 {
    EFFECTIVE_MU_BASE + EFFECTIVE_MU_SPAN * gene
}

/// Heritable genome of an organism.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    /// Species shape gene: selects the sensing-kernel blend and the growth
    /// target in potential space.
    pub structure: f32,
    /// Preferred waste type for eating.
    pub diet: f32,
    /// Growth-curve width.
    pub sigma: f32,
}

impl Default for Genome {
    /// The empty identity carried by cells that received no mass.
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Genome {
    /// All-zero genome used for cells that received no mass during
    /// transport. Degenerate on purpose: the resolve stage detects it and
    /// substitutes a fallback.
    pub const EMPTY: Genome = Genome {
        structure: 0.0,
        diet: 0.0,
        sigma: 0.0,
    };

    /// Hard-coded fallback genome for cells with no usable history.
    pub const DEFAULT: Genome = Genome {
        structure: 0.5,
        diet: 0.5,
        sigma: 0.05,
    };

    #[inline]
    pub fn clamped(self) -> Genome {
        Genome {
            structure: self.structure.clamp(0.0, 1.0),
            diet: self.diet.clamp(0.0, 1.0),
            sigma: self.sigma.clamp(SIGMA_MIN, SIGMA_MAX),
        }
    }

    /// A genome that cannot drive the growth function (sigma below the
    /// representable floor, or non-finite fields).
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        !(self.sigma >= SIGMA_MIN * 0.5)
            || !self.structure.is_finite()
            || !self.diet.is_finite()
    }

    /// Blend toward `other` by `t` (genetic inertia). The result is clamped.
    #[inline]
    pub fn lerp(self, other: Genome, t: f32) -> Genome {
        Genome {
            structure: self.structure + (other.structure - self.structure) * t,
            diet: self.diet + (other.diet - self.diet) * t,
            sigma: self.sigma + (other.sigma - self.sigma) * t,
        }
        .clamped()
    }
}

/// Auxiliary trait genes: steering speed, predatory appetite, hazard
/// defense and thermal niche preference. All in [0,1].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AuxTraits {
    pub speed: f32,
    pub aggression: f32,
    pub defense: f32,
    pub thermal_preference: f32,
}

impl AuxTraits {
    pub const DEFAULT: AuxTraits = AuxTraits {
        speed: 0.5,
        aggression: 0.3,
        defense: 0.3,
        thermal_preference: 0.5,
    };

    #[inline]
    pub fn clamped(self) -> AuxTraits {
        AuxTraits {
            speed: self.speed.clamp(0.0, 1.0),
            aggression: self.aggression.clamp(0.0, 1.0),
            defense: self.defense.clamp(0.0, 1.0),
            thermal_preference: self.thermal_preference.clamp(0.0, 1.0),
        }
    }

    #[inline]
    pub fn lerp(self, other: AuxTraits, t: f32) -> AuxTraits {
        AuxTraits {
            speed: self.speed + (other.speed - self.speed) * t,
            aggression: self.aggression + (other.aggression - self.aggression) * t,
            defense: self.defense + (other.defense - self.defense) * t,
            thermal_preference: self.thermal_preference
                + (other.thermal_preference - self.thermal_preference) * t,
        }
        .clamped()
    }
}

/// Signed growth/decline rate for a cell sensing potential `u`.
///
/// Gaussian bump centered at the gene-derived effective mean: +1 at the
/// optimum, falling to -1 far away.
#[inline]
pub fn growth_rate(u: f32, genome: &Genome) -> f32 {
    let mu = effective_mu(genome.structure);
    let sigma = genome.sigma.max(SIGMA_MIN);
    let z = (u - mu) / sigma;
    2.0 * (-0.5 * z * z).exp() - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_mu_maps_gene_range_into_potential_range() {
        assert!((effective_mu(0.0) - 0.08).abs() < 1e-6);
        assert!((effective_mu(1.0) - 0.5).abs() < 1e-6);
        assert!((effective_mu(0.5) - 0.29).abs() < 1e-6);
    }

    #[test]
    fn growth_peaks_at_effective_mu() {
        let g = Genome {
            structure: 0.5,
            diet: 0.5,
            sigma: 0.05,
        };
        let peak = growth_rate(effective_mu(0.5), &g);
        assert!((peak - 1.0).abs() < 1e-6);
        // Far from the optimum the rate saturates at decline.
        assert!(growth_rate(1.0, &g) < -0.99);
    }

    #[test]
    fn clamp_respects_declared_bounds() {
        let g = Genome {
            structure: 1.7,
            diet: -0.3,
            sigma: 0.5,
        }
        .clamped();
        assert_eq!(g.structure, 1.0);
        assert_eq!(g.diet, 0.0);
        assert_eq!(g.sigma, SIGMA_MAX);
    }

    #[test]
    fn empty_genome_is_degenerate() {
        assert!(Genome::EMPTY.is_degenerate());
        assert!(!Genome::DEFAULT.is_degenerate());
        // The derived-in-transport empty identity is the degenerate genome.
        assert_eq!(Genome::default(), Genome::EMPTY);
    }
}
