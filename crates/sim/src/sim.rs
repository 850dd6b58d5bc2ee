//! Simulation orchestrator.
//!
//! Ties the six pipeline stages together over the double-buffered world:
//! 1. Potential field convolution
//! 2. Velocity field
//! 3. Gather advection (mass + winner genetics)
//! 4. Growth/metabolism resolve
//! 5. Global mass reduction (feeds the NEXT step's normalization)
//! 6. Species statistics (periodic, driver-paced, read-only)
//!
//! Stages are bulk-synchronous: each consumes the complete output of the
//! previous one, writes never target the buffer being read, and the step
//! parity flag is explicit state here, not an ambient global.

use glam::Vec2;

use crate::advect::{self, AdvectCell, MAX_SEARCH_RADIUS};
use crate::genome::Genome;
use crate::init;
use crate::params::{BrushMode, BrushStroke, Params, ParamsError};
use crate::potential;
use crate::reduce;
use crate::resolve::{self, WasteSample};
use crate::stats::{SpeciesStat, SpeciesTable};
use crate::velocity;
use crate::world::{cell_at, Cell, EnvCell, World};

pub struct Simulation {
    params: Params,
    world: World,
    /// Selects which buffer of the pair is the read snapshot.
    parity: bool,
    step_count: u64,
    /// Normalization factor computed from the previous step's reduction.
    norm_factor: f32,
    next_species: u32,

    // Pre-allocated per-step scratch (no allocation inside the pipeline).
    potential: Vec<f32>,
    velocity: Vec<Vec2>,
    advected: Vec<AdvectCell>,
    diffused: Vec<WasteSample>,

    stats: SpeciesTable,
    warned_table_overflow: bool,
}

impl Simulation {
    /// Build and deterministically initialize a simulation. Fatal
    /// configuration problems are returned; degraded-but-valid settings
    /// are logged as warnings and clamped.
    pub fn new(params: Params) -> Result<Self, ParamsError> {
        params.validate()?;

        if advect::required_radius(&params) > MAX_SEARCH_RADIUS {
            log::warn!(
                "advection needs radius {} but the search window caps at {}; \
                 fast mass may be truncated (reduce dt)",
                advect::required_radius(&params),
                MAX_SEARCH_RADIUS
            );
        }

        let n = params.cell_count();
        let mut world = World::new(params.width, params.height);
        let next_species = init::populate(&mut world, &params);
        let stats = SpeciesTable::new(params.stats_capacity);

        Ok(Self {
            world,
            parity: false,
            step_count: 0,
            norm_factor: 1.0,
            next_species,
            potential: vec![0.0; n],
            velocity: vec![Vec2::ZERO; n],
            advected: vec![AdvectCell::default(); n],
            diffused: vec![WasteSample::default(); n],
            stats,
            warned_table_overflow: false,
            params,
        })
    }

    /// Advance one step. The optional brush stroke is consumed before the
    /// pipeline runs, painting into the snapshot the stages will read.
    pub fn step(&mut self, brush: Option<&BrushStroke>) {
        if let Some(stroke) = brush {
            self.apply_brush(stroke);
        }

        let (src, dst, env) = self.world.split(self.parity);

        // Stage 1: potential from the previous living grid.
        potential::compute(src, &self.params, &mut self.potential);

        // Stage 2: velocity from potential + living + waste.
        velocity::compute(src, &self.potential, &self.params, &mut self.velocity);

        // Stage 3: mass-conserving gather with winner-takes-all genetics.
        advect::gather(src, &self.velocity, &self.params, &mut self.advected);

        // Stage 4: metabolism, applied to the advected intermediate with
        // the previous snapshot as fallback and the previous step's
        // normalization factor.
        resolve::diffuse_waste(src, &self.params, &mut self.diffused);
        resolve::apply(
            &self.advected,
            src,
            &self.potential,
            &self.velocity,
            &self.diffused,
            env,
            self.norm_factor,
            &self.params,
            self.step_count,
            dst,
        );

        // Stage 5: reduction over the freshly written state; the factor
        // applies at the start of the NEXT step's resolve.
        let total = reduce::total_mass(dst, self.params.width);
        self.norm_factor = reduce::normalization_factor(total, self.params.target_mass);

        self.parity = !self.parity;
        self.step_count += 1;
    }

    /// Advance `n` steps without brush input.
    pub fn step_n(&mut self, n: usize) {
        for _ in 0..n {
            self.step(None);
        }
    }

    /// Stage 6: aggregate per-species statistics and return the top `n`
    /// by population. Read-only over the grid; intended to run on a
    /// throttled cadence (e.g. once per 10 steps), paced by the driver.
    pub fn census(&mut self, n: usize) -> Vec<SpeciesStat> {
        self.stats.clear();
        let dropped = self
            .stats
            .aggregate(self.world.read(self.parity), self.params.width);
        if dropped > 0 && !self.warned_table_overflow {
            self.warned_table_overflow = true;
            log::warn!(
                "species table full ({} slots): {dropped} cells dropped from statistics",
                self.stats.capacity()
            );
        }
        self.stats.top(n)
    }

    /// Paint mass into (or erase it from) the current read snapshot. The
    /// stroke footprint follows the grid topology: x wraps, y wraps on the
    /// torus and truncates at the edges under the floor boundary.
    pub fn apply_brush(&mut self, stroke: &BrushStroke) {
        let width = self.params.width;
        let height = self.params.height;
        let floor = self.params.floor_boundary;
        let species = match stroke.mode {
            BrushMode::Create => {
                let id = self.next_species;
                self.next_species += 1;
                id
            }
            BrushMode::Erase => 0,
        };
        let genome = Genome {
            structure: stroke.hue,
            diet: stroke.hue,
            sigma: Genome::DEFAULT.sigma,
        }
        .clamped();

        let cells = self.world.read_mut(self.parity);
        let r = stroke.radius.max(0.5);
        let ir = r.ceil() as i32;
        let cx = stroke.x.round() as i32;
        let cy = stroke.y.round() as i32;

        for dy in -ir..=ir {
            for dx in -ir..=ir {
                let dist = ((dx * dx + dy * dy) as f32).sqrt();
                if dist > r {
                    continue;
                }
                let Some(idx) = cell_at(width, height, floor, cx + dx, cy + dy) else {
                    continue;
                };
                let cell = &mut cells[idx];
                match stroke.mode {
                    BrushMode::Create => {
                        let falloff = 1.0 - dist / r;
                        cell.mass = (cell.mass + falloff).min(1.5);
                        cell.genome = genome;
                        cell.species = species;
                    }
                    BrushMode::Erase => {
                        *cell = Cell::default();
                    }
                }
            }
        }
    }

    /// Replace the living pattern with a uniform fill and a benign
    /// environment. Meant for drivers and tests that need an exactly
    /// reproducible dense start.
    pub fn fill_uniform(&mut self, mass: f32, genome: Genome, species: u32) {
        for cell in self.world.read_mut(self.parity) {
            *cell = Cell {
                mass: mass.max(0.0),
                genome: genome.clamped(),
                species,
                ..Cell::default()
            };
        }
        for env in self.world.env_mut() {
            *env = EnvCell::default();
        }
        self.next_species = self.next_species.max(species + 1);
    }

    // ---- State out --------------------------------------------------

    /// The current snapshot: living mass + genome, species IDs, aux
    /// traits, and the waste grid, all per cell.
    pub fn cells(&self) -> &[Cell] {
        self.world.read(self.parity)
    }

    pub fn environment(&self) -> &[EnvCell] {
        self.world.env()
    }

    /// Total living + waste mass of the current snapshot.
    pub fn total_mass(&self) -> f32 {
        reduce::total_mass(self.cells(), self.params.width)
    }

    /// The normalization factor that will be applied on the next step.
    pub fn normalization_factor(&self) -> f32 {
        self.norm_factor
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn width(&self) -> usize {
        self.params.width
    }

    pub fn height(&self) -> usize {
        self.params.height
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }
}
