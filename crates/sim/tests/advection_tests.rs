//! Gather-advection contracts: winner-takes-all identity selection and
//! exact transport conservation under arbitrary velocity fields.

use glam::Vec2;
use lenia_sim::advect::{gather, AdvectCell};
use lenia_sim::{Cell, Genome, Params};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn source(mass: f32, structure: f32, species: u32) -> Cell {
    let mut cell = Cell::default();
    cell.mass = mass;
    cell.genome = Genome {
        structure,
        diet: structure,
        sigma: 0.05,
    };
    cell.species = species;
    cell
}

#[test]
fn largest_weighted_contribution_wins_whole() {
    let params = Params {
        width: 10,
        height: 10,
        kernel_radius: 3.0,
        dt: 0.2,
        ..Params::default()
    };
    let mut src = vec![Cell::default(); 100];
    let mut velocity = vec![Vec2::ZERO; 100];
    let at = |x: usize, y: usize| y * 10 + x;

    // Three sources whose tent footprints overlap cell (4,4) with weights
    // 0.1, 0.4 and 0.2. Weighted masses 0.02, 0.20 and 0.06: the middle
    // source dominates.
    src[at(4, 3)] = source(0.2, 0.1, 1);
    velocity[at(4, 3)] = Vec2::new(0.0, 0.5); // lands at y = 3.1
    src[at(4, 5)] = source(0.5, 0.5, 2);
    velocity[at(4, 5)] = Vec2::new(0.0, -2.0); // lands at y = 4.6
    src[at(3, 4)] = source(0.3, 0.9, 3);
    velocity[at(3, 4)] = Vec2::new(1.0, 0.0); // lands at x = 3.2

    let mut out = vec![AdvectCell::default(); 100];
    gather(&src, &velocity, &params, &mut out);

    let dest = &out[at(4, 4)];
    assert!((dest.mass - 0.28).abs() < 1e-5, "incoming {}", dest.mass);
    // Identity is adopted wholesale from the dominant source, never blended.
    assert_eq!(dest.species, 2);
    assert_eq!(dest.genome, src[at(4, 5)].genome);

    // Re-running the gather gives the identical result.
    let mut again = vec![AdvectCell::default(); 100];
    gather(&src, &velocity, &params, &mut again);
    assert_eq!(again[at(4, 4)].species, 2);
    assert_eq!(again[at(4, 4)].mass, dest.mass);
}

#[test]
fn random_flow_conserves_transported_mass() {
    let params = Params {
        width: 24,
        height: 24,
        kernel_radius: 6.0,
        ..Params::default()
    };
    let mut rng = SmallRng::seed_from_u64(17);
    let mut src = vec![Cell::default(); 24 * 24];
    let mut velocity = vec![Vec2::ZERO; 24 * 24];
    for (cell, v) in src.iter_mut().zip(velocity.iter_mut()) {
        *cell = source(rng.gen_range(0.2..1.0), rng.gen_range(0.0..1.0), 1);
        *v = Vec2::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0))
            .clamp_length_max(5.0);
    }

    let mut out = vec![AdvectCell::default(); 24 * 24];
    gather(&src, &velocity, &params, &mut out);

    let before: f32 = src.iter().map(|c| c.mass).sum();
    let after: f32 = out.iter().map(|c| c.mass).sum();
    assert!(
        (before - after).abs() / before < 1e-4,
        "before {before} after {after}"
    );
}

#[test]
fn floor_boundary_keeps_falling_mass_inside() {
    let params = Params {
        width: 12,
        height: 12,
        kernel_radius: 3.0,
        floor_boundary: true,
        ..Params::default()
    };
    let mut src = vec![Cell::default(); 144];
    let mut velocity = vec![Vec2::ZERO; 144];
    // Bottom-row mass pushed further down: the landing clamps onto the row.
    src[11 * 12 + 6] = source(0.9, 0.4, 5);
    velocity[11 * 12 + 6] = Vec2::new(0.0, 5.0);

    let mut out = vec![AdvectCell::default(); 144];
    gather(&src, &velocity, &params, &mut out);

    let total: f32 = out.iter().map(|c| c.mass).sum();
    assert!((total - 0.9).abs() < 1e-5, "total {total}");
    assert!((out[11 * 12 + 6].mass - 0.9).abs() < 1e-5);
}
