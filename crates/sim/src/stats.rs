//! Stage 6: concurrent species statistics.
//!
//! A fixed-capacity open-addressing hash table with linear probing. Cells
//! claim a slot for their species ID with a compare-and-swap against the
//! empty sentinel 0 - the only state transition a slot's identity can
//! undergo - then accumulate counters with atomic adds. Trait sums are
//! fixed-point encoded (x1000) so integer atomics suffice. If more
//! distinct species are alive than the table holds, low-frequency species
//! are silently dropped once their probe sequence is exhausted: an
//! accepted approximation, not an error.

use std::hash::Hasher;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use rayon::prelude::*;
use rustc_hash::FxHasher;
use serde::Serialize;

use crate::physics::FIXED_POINT_SCALE;
use crate::world::Cell;

/// Aggregate statistics for one species, decoded for the driver.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SpeciesStat {
    pub id: u32,
    pub count: u32,
    pub avg_speed: f32,
    pub avg_aggression: f32,
    pub avg_structure: f32,
}

struct Slot {
    id: AtomicU32,
    count: AtomicU32,
    speed_sum: AtomicU64,
    aggression_sum: AtomicU64,
    structure_sum: AtomicU64,
}

impl Slot {
    fn empty() -> Self {
        Self {
            id: AtomicU32::new(0),
            count: AtomicU32::new(0),
            speed_sum: AtomicU64::new(0),
            aggression_sum: AtomicU64::new(0),
            structure_sum: AtomicU64::new(0),
        }
    }
}

/// Concurrent species census table.
pub struct SpeciesTable {
    slots: Vec<Slot>,
}

#[inline]
fn hash_id(id: u32) -> usize {
    let mut hasher = FxHasher::default();
    hasher.write_u32(id);
    hasher.finish() as usize
}

#[inline]
fn encode(value: f32) -> u64 {
    (value.max(0.0) * FIXED_POINT_SCALE) as u64
}

impl SpeciesTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity.max(1)).map(|_| Slot::empty()).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Reset all slots to empty.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = Slot::empty();
        }
    }

    /// Aggregate every non-void cell into the table. Read-only over the
    /// grid; returns how many cells were dropped because their probe
    /// sequence found no slot.
    pub fn aggregate(&self, cells: &[Cell], width: usize) -> usize {
        cells
            .par_chunks(width)
            .map(|row| {
                let mut dropped = 0usize;
                for cell in row {
                    if cell.species == 0 {
                        continue;
                    }
                    if !self.record(cell) {
                        dropped += 1;
                    }
                }
                dropped
            })
            .sum()
    }

    /// Probe for the cell's species slot and accumulate. Correct under any
    /// interleaving: a slot's identity only ever transitions 0 -> id, so a
    /// failed CAS that reveals our own ID is as good as a successful claim.
    fn record(&self, cell: &Cell) -> bool {
        let capacity = self.slots.len();
        let id = cell.species;
        let start = hash_id(id) % capacity;

        for probe in 0..capacity {
            let slot = &self.slots[(start + probe) % capacity];
            let claimed =
                slot.id
                    .compare_exchange(0, id, Ordering::AcqRel, Ordering::Acquire);
            match claimed {
                Ok(_) => {}
                Err(current) if current == id => {}
                Err(_) => continue,
            }
            slot.count.fetch_add(1, Ordering::Relaxed);
            slot.speed_sum
                .fetch_add(encode(cell.aux.speed), Ordering::Relaxed);
            slot.aggression_sum
                .fetch_add(encode(cell.aux.aggression), Ordering::Relaxed);
            slot.structure_sum
                .fetch_add(encode(cell.genome.structure), Ordering::Relaxed);
            return true;
        }
        false
    }

    /// Decode the top `n` species by population.
    pub fn top(&self, n: usize) -> Vec<SpeciesStat> {
        let mut stats: Vec<SpeciesStat> = self
            .slots
            .iter()
            .filter_map(|slot| {
                let id = slot.id.load(Ordering::Acquire);
                let count = slot.count.load(Ordering::Relaxed);
                if id == 0 || count == 0 {
                    return None;
                }
                let decode = |sum: &AtomicU64| {
                    sum.load(Ordering::Relaxed) as f32 / FIXED_POINT_SCALE / count as f32
                };
                Some(SpeciesStat {
                    id,
                    count,
                    avg_speed: decode(&slot.speed_sum),
                    avg_aggression: decode(&slot.aggression_sum),
                    avg_structure: decode(&slot.structure_sum),
                })
            })
            .collect();
        stats.sort_by(|a, b| b.count.cmp(&a.count).then(a.id.cmp(&b.id)));
        stats.truncate(n);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::Genome;

    fn cell(species: u32, speed: f32, structure: f32) -> Cell {
        let mut c = Cell::default();
        c.mass = 0.5;
        c.species = species;
        c.aux.speed = speed;
        c.genome = Genome {
            structure,
            ..Genome::DEFAULT
        };
        c
    }

    #[test]
    fn same_id_lands_in_one_slot() {
        let table = SpeciesTable::new(16);
        let cells = vec![cell(7, 0.2, 0.4), cell(7, 0.4, 0.6), cell(7, 0.6, 0.8)];
        let dropped = table.aggregate(&cells, 3);
        assert_eq!(dropped, 0);
        let stats = table.top(16);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].id, 7);
        assert_eq!(stats[0].count, 3);
        assert!((stats[0].avg_speed - 0.4).abs() < 0.002);
        assert!((stats[0].avg_structure - 0.6).abs() < 0.002);
    }

    #[test]
    fn void_cells_are_ignored() {
        let table = SpeciesTable::new(8);
        let cells = vec![Cell::default(); 10];
        assert_eq!(table.aggregate(&cells, 5), 0);
        assert!(table.top(8).is_empty());
    }

    #[test]
    fn overflow_drops_silently() {
        let table = SpeciesTable::new(4);
        let cells: Vec<Cell> = (1..=20).map(|s| cell(s, 0.5, 0.5)).collect();
        let dropped = table.aggregate(&cells, 5);
        assert!(dropped > 0);
        assert_eq!(table.top(20).len(), 4);
    }
}
