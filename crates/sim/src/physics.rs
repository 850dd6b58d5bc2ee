//! Unified tuning constants for the simulation pipeline.
//!
//! All stages should use these constants instead of defining their own.
//! This prevents drift between subsystems and makes tuning easier.

/// Cells below this mass are treated as empty by the velocity and
/// advection stages (no force computation, no transport contribution).
pub const MIN_MASS: f32 = 1e-4;

/// Living mass below this threshold is folded into waste and the cell's
/// species identity is cleared. Keeps the `mass == 0 => species == 0`
/// invariant exact at the living/void boundary.
pub const VOID_THRESHOLD: f32 = 1e-3;

/// Velocity magnitude ceiling in cells per time unit.
///
/// Guarantees the advection search window bounds the maximum single-step
/// displacement.
pub const MAX_SPEED: f32 = 5.0;

/// Base decay multiplier on the configured decay rate.
pub const BASE_DEATH_MULTIPLIER: f32 = 1.5;

/// Overcrowding penalty multiplier.
pub const CROWDING_MULTIPLIER: f32 = 2.0;

/// Mass above this level starts accruing the superlinear crowding penalty.
pub const CROWDING_THRESHOLD: f32 = 1.0;

/// Death-rate contribution per unit of negative growth while edible food
/// is locally present but cannot be digested.
pub const STARVATION_FACTOR: f32 = 0.3;

/// Scale on environmental hazard damage after defense mitigation.
pub const HAZARD_FACTOR: f32 = 0.5;

/// How much of the hazard a fully-developed defense gene cancels.
pub const DEFENSE_MITIGATION: f32 = 0.8;

/// Minimum mass required before a cell may mutate.
pub const MUTATION_MASS_GATE: f32 = 0.05;

/// Genetic displacement (summed over genes) beyond which a mutation may
/// qualify as a speciation event.
pub const SPECIATION_DRIFT_THRESHOLD: f32 = 0.04;

/// Probability that a qualifying mutation actually founds a new species.
/// Deliberately much rarer than mutation itself so species identities do
/// not churn on every minor drift.
pub const SPECIATION_RATE: f32 = 0.02;

/// Waste diffusion coefficient (4-neighbor Laplacian blur per step).
pub const WASTE_DIFFUSION: f32 = 0.5;

/// Width of the Gaussian thermal-niche match between the preferred
/// temperature gene and the local environment temperature.
pub const THERMAL_NICHE_WIDTH: f32 = 0.25;

/// Scale used to encode floating-point mass as integers for atomic
/// accumulation (multiply, truncate, atomic add, divide on readback).
pub const FIXED_POINT_SCALE: f32 = 1000.0;

/// Per-step soft clamp on the global normalization factor.
pub const NORMALIZATION_CLAMP: (f32, f32) = (0.9, 1.1);
