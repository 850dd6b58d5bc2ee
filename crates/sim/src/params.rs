//! Driver-facing configuration.
//!
//! The simulation core defines no file format; the driver constructs a
//! [`Params`] block (deserialize it from wherever it likes) and hands it to
//! [`crate::Simulation::new`]. Numeric hazards inside the pipeline are
//! handled by clamping, so the only failures surfaced here are genuine
//! configuration mistakes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use glam::Vec2;

/// Errors raised when validating simulation parameters.
#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("grid dimensions must be non-zero (got {width}x{height})")]
    ZeroDimension { width: usize, height: usize },
    #[error("time step must be positive (got {0})")]
    NonPositiveTimestep(f32),
    #[error("kernel radius {radius} does not fit a {width}x{height} grid")]
    KernelRadiusTooLarge {
        radius: f32,
        width: usize,
        height: usize,
    },
    #[error("species table capacity must be non-zero")]
    ZeroStatsCapacity,
}

/// Paint-brush directive supplied by the driver for one step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum BrushMode {
    /// Deposit living mass with a genome derived from the brush hue.
    Create,
    /// Clear living mass and waste under the brush.
    Erase,
}

/// A single paint stroke, consumed as a parameter at the start of a step.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BrushStroke {
    /// Center in cell coordinates.
    pub x: f32,
    pub y: f32,
    /// Radius in cells.
    pub radius: f32,
    /// Structure gene painted into created mass, in [0,1].
    pub hue: f32,
    pub mode: BrushMode,
}

/// All per-step knobs the driver supplies. Everything is plain data;
/// changing a field between steps is allowed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Params {
    /// Grid resolution.
    pub width: usize,
    pub height: usize,

    /// Integration time step.
    pub dt: f32,

    /// Potential-field sensing radius in cells.
    pub kernel_radius: f32,

    /// Per-cell mutation probability gate (0 disables mutation).
    pub mutation_rate: f32,
    /// Waste consumption rate.
    pub eat_rate: f32,
    /// Base decay rate feeding the death term.
    pub decay_rate: f32,
    /// Blend factor pulling mutated genomes back toward the local previous
    /// genome, in [0,1].
    pub genetic_inertia: f32,
    /// Sharpness of the diet-enzyme/waste-type eating cutoff, in (0,1].
    /// Smaller is more selective.
    pub diet_selectivity: f32,
    /// Strength of the food-seeking velocity term (0 disables chemotaxis).
    pub chemotaxis: f32,

    /// Multiplicative velocity damping, in [0,1).
    pub friction: f32,
    /// Constant +y acceleration applied to the flow and to waste pools.
    pub gravity: f32,
    /// Exponent shaping how reluctantly dissimilar waste types mix.
    pub immiscibility: f32,
    /// How strongly the living flow stirs the co-located waste velocity.
    pub velocity_impact: f32,

    /// Total-mass target for global normalization. Non-positive disables
    /// the correction entirely.
    pub target_mass: f32,

    /// When set, the y axis clamps at the grid edges instead of wrapping.
    pub floor_boundary: bool,

    /// Initialization controls. Deterministic for a fixed seed.
    pub seed: u64,
    /// Fraction of the grid seeded with organisms. At >= 1 the init pass
    /// switches from random blocks to a dense uniform fill.
    pub density: f32,
    /// Approximate radius of an init block, in cells.
    pub block_size: usize,

    /// Slot count of the species statistics table.
    pub stats_capacity: usize,
}

impl Default for Params {
    fn default() -> Self {
        const W: usize = 256;
        const H: usize = 256;
        Self {
            width: W,
            height: H,
            dt: 0.1,
            kernel_radius: 8.0,
            mutation_rate: 0.005,
            eat_rate: 0.3,
            decay_rate: 0.01,
            genetic_inertia: 0.7,
            diet_selectivity: 0.5,
            chemotaxis: 1.0,
            friction: 0.05,
            gravity: 0.0,
            immiscibility: 2.0,
            velocity_impact: 0.5,
            // 15% fill keeps a default run comfortably inside the growth
            // regime of the default genome.
            target_mass: W as f32 * H as f32 * 0.15,
            floor_boundary: false,
            seed: 1,
            density: 0.15,
            block_size: 10,
            stats_capacity: 256,
        }
    }
}

impl Params {
    /// Defaults sized for a given resolution, with the normalization target
    /// scaled to match.
    pub fn for_resolution(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            target_mass: width as f32 * height as f32 * 0.15,
            ..Self::default()
        }
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Validate fatal configuration mistakes. Degraded-but-valid settings
    /// (for example a velocity ceiling whose displacement exceeds the
    /// advection search window) are reported as warnings at construction
    /// instead.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.width == 0 || self.height == 0 {
            return Err(ParamsError::ZeroDimension {
                width: self.width,
                height: self.height,
            });
        }
        if !(self.dt > 0.0) {
            return Err(ParamsError::NonPositiveTimestep(self.dt));
        }
        let max_radius = (self.width.min(self.height) / 2) as f32;
        if !(self.kernel_radius >= 1.0) || self.kernel_radius >= max_radius {
            return Err(ParamsError::KernelRadiusTooLarge {
                radius: self.kernel_radius,
                width: self.width,
                height: self.height,
            });
        }
        if self.stats_capacity == 0 {
            return Err(ParamsError::ZeroStatsCapacity);
        }
        Ok(())
    }

    /// Constant acceleration term shared by the flow and waste velocities.
    #[inline]
    pub fn gravity_vec(&self) -> Vec2 {
        Vec2::new(0.0, self.gravity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_validate() {
        assert_eq!(Params::default().validate(), Ok(()));
    }

    #[test]
    fn zero_dimension_is_fatal() {
        let p = Params {
            width: 0,
            ..Params::default()
        };
        assert!(matches!(
            p.validate(),
            Err(ParamsError::ZeroDimension { .. })
        ));
    }

    #[test]
    fn oversized_kernel_radius_is_fatal() {
        let mut p = Params::for_resolution(16, 16);
        p.kernel_radius = 8.0;
        assert!(matches!(
            p.validate(),
            Err(ParamsError::KernelRadiusTooLarge { .. })
        ));
    }
}
