//! Double-buffered grid state.
//!
//! The grid is allocated once: two full cell buffers ("A" and "B") plus the
//! immutable environment field. A step parity flag carried by the
//! orchestrator selects which copy is the read snapshot and which is the
//! write target; stages never mutate the buffer they read. Cells are never
//! created or destroyed as objects - organisms are born and die by mass
//! flowing to and from zero inside a fixed-size array.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::genome::{AuxTraits, Genome};

/// Co-located decomposer pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Waste {
    /// Decomposing mass, always >= 0.
    pub mass: f32,
    /// Dominant genome-structure of the organisms that died into this pool,
    /// in [0,1].
    pub kind: f32,
    /// Pool drift velocity. Exported state; integrates gravity, friction and
    /// stirring by the living flow.
    pub velocity: Vec2,
}

/// One grid cell. Everything by value, no inter-cell ownership.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Living mass, always >= 0.
    pub mass: f32,
    pub genome: Genome,
    /// Species identifier; 0 means void (no organism).
    pub species: u32,
    pub aux: AuxTraits,
    pub waste: Waste,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            mass: 0.0,
            genome: Genome::EMPTY,
            species: 0,
            aux: AuxTraits::default(),
            waste: Waste::default(),
        }
    }
}

/// Static per-cell environment, written once at initialization.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EnvCell {
    pub temperature: f32,
    pub resource_capacity: f32,
    pub hazard: f32,
}

impl Default for EnvCell {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            resource_capacity: 1.0,
            hazard: 0.0,
        }
    }
}

/// Fixed-size world: two cell buffers and the environment field.
pub struct World {
    pub width: usize,
    pub height: usize,
    buffer_a: Vec<Cell>,
    buffer_b: Vec<Cell>,
    env: Vec<EnvCell>,
}

impl World {
    pub fn new(width: usize, height: usize) -> Self {
        let n = width * height;
        Self {
            width,
            height,
            buffer_a: vec![Cell::default(); n],
            buffer_b: vec![Cell::default(); n],
            env: vec![EnvCell::default(); n],
        }
    }

    #[inline]
    pub fn cell_index(&self, i: usize, j: usize) -> usize {
        j * self.width + i
    }

    /// Read snapshot for the given step parity.
    #[inline]
    pub fn read(&self, parity: bool) -> &[Cell] {
        if parity {
            &self.buffer_b
        } else {
            &self.buffer_a
        }
    }

    /// Mutable access to the read-side buffer. Only used between steps
    /// (initialization, brush strokes) - never while a stage is running.
    #[inline]
    pub fn read_mut(&mut self, parity: bool) -> &mut [Cell] {
        if parity {
            &mut self.buffer_b
        } else {
            &mut self.buffer_a
        }
    }

    /// Split into (read snapshot, write target, environment) for one step.
    /// The write target is always the opposite buffer of the pair.
    #[inline]
    pub fn split(&mut self, parity: bool) -> (&[Cell], &mut [Cell], &[EnvCell]) {
        if parity {
            (&self.buffer_b, &mut self.buffer_a, &self.env)
        } else {
            (&self.buffer_a, &mut self.buffer_b, &self.env)
        }
    }

    #[inline]
    pub fn env(&self) -> &[EnvCell] {
        &self.env
    }

    /// Environment is generated exactly once, by the init pass.
    #[inline]
    pub fn env_mut(&mut self) -> &mut [EnvCell] {
        &mut self.env
    }
}

/// Resolve a (possibly out-of-range) cell coordinate under the grid
/// topology: x always wraps; y wraps on the torus and clamps out to `None`
/// when the floor boundary is active.
#[inline]
pub fn cell_at(width: usize, height: usize, floor: bool, i: i32, j: i32) -> Option<usize> {
    let x = i.rem_euclid(width as i32) as usize;
    let y = if floor {
        if j < 0 || j >= height as i32 {
            return None;
        }
        j as usize
    } else {
        j.rem_euclid(height as i32) as usize
    };
    Some(y * width + x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn torus_wraps_both_axes() {
        assert_eq!(cell_at(8, 8, false, -1, -1), Some(7 * 8 + 7));
        assert_eq!(cell_at(8, 8, false, 8, 8), Some(0));
    }

    #[test]
    fn floor_boundary_clamps_y_only() {
        assert_eq!(cell_at(8, 8, true, -1, 3), Some(3 * 8 + 7));
        assert_eq!(cell_at(8, 8, true, 3, -1), None);
        assert_eq!(cell_at(8, 8, true, 3, 8), None);
    }

    #[test]
    fn split_returns_opposite_buffers() {
        let mut world = World::new(4, 4);
        world.read_mut(false)[5].mass = 1.0;
        let (src, dst, _) = world.split(false);
        assert_eq!(src[5].mass, 1.0);
        assert_eq!(dst[5].mass, 0.0);
    }
}
