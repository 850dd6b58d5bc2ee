//! Flow Lenia - Simulation Library
//!
//! Mass-conserving continuous cellular automaton with:
//! - Convolution-based potential field (species-dependent sensing kernels)
//! - Gradient-driven velocity field with chemotaxis
//! - Gather-style semi-Lagrangian advection (winner-takes-all genetics)
//! - Predator/waste metabolic cycle with mutation and speciation
//! - Global mass normalization and concurrent species statistics
//!
//! This crate is framework-agnostic - it handles simulation only.
//! Rendering, input handling and persistence are the driver's responsibility;
//! the driver supplies a [`Params`] block and consumes the cell buffers
//! exposed by [`Simulation`].

pub mod advect;
pub mod genome;
pub mod init;
pub mod noise;
pub mod params;
pub mod physics;
pub mod potential;
pub mod reduce;
pub mod resolve;
pub mod sim;
pub mod stats;
pub mod velocity;
pub mod world;

pub use advect::AdvectCell;
pub use genome::{AuxTraits, Genome};
pub use params::{BrushMode, BrushStroke, Params, ParamsError};
pub use sim::Simulation;
pub use stats::{SpeciesStat, SpeciesTable};
pub use world::{Cell, EnvCell, Waste, World};
