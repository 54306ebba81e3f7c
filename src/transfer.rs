use crate::error::{try_filled, Result, SimError};
use crate::mac::{touches, CellFlags, CellType, FluidGrid, StaggeredField2, StaggeredGrid2};
use crate::parallel::should_parallel_particles;
use crate::particles::ParticleSystem;
use glam::Vec2;
use rayon::prelude::*;

const MIN_CHUNK: usize = 1024;
const MAX_CHUNKS: usize = 64;
const MAX_SCRATCH_SLOTS: usize = 8;
const SCRATCH_BUDGET: usize = 1 << 24;

// Chunk length depends only on the particle count, so every chunk is summed
// into the grid in the same order for any thread count.
fn chunk_len(particles: usize) -> usize {
    particles.div_ceil(MAX_CHUNKS).max(MIN_CHUNK)
}

#[derive(Clone, Debug)]
struct Accumulator {
    u: Vec<f32>,
    u_weight: Vec<f32>,
    v: Vec<f32>,
    v_weight: Vec<f32>,
}

impl Accumulator {
    fn try_new(u_len: usize, v_len: usize) -> Result<Self> {
        Ok(Self {
            u: try_filled(u_len, 0.0, "transfer scratch")?,
            u_weight: try_filled(u_len, 0.0, "transfer scratch")?,
            v: try_filled(v_len, 0.0, "transfer scratch")?,
            v_weight: try_filled(v_len, 0.0, "transfer scratch")?,
        })
    }

    fn clear(&mut self) {
        self.u.fill(0.0);
        self.u_weight.fill(0.0);
        self.v.fill(0.0);
        self.v_weight.fill(0.0);
    }

    fn scatter(&mut self, u_grid: StaggeredGrid2, v_grid: StaggeredGrid2, positions: &[Vec2], velocities: &[Vec2]) {
        for (pos, vel) in positions.iter().zip(velocities) {
            splat_component(&mut self.u, &mut self.u_weight, u_grid, *pos, vel.x);
            splat_component(&mut self.v, &mut self.v_weight, v_grid, *pos, vel.y);
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct TransferScratch {
    slots: Vec<Accumulator>,
}

impl TransferScratch {
    pub(crate) fn try_new(u_len: usize, v_len: usize) -> Result<Self> {
        let per_slot = 2 * (u_len + v_len);
        let count = (SCRATCH_BUDGET / per_slot.max(1)).clamp(1, MAX_SCRATCH_SLOTS);
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(count)
            .map_err(|_| SimError::Allocation { what: "transfer scratch", requested: count })?;
        for _ in 0..count {
            slots.push(Accumulator::try_new(u_len, v_len)?);
        }
        Ok(Self { slots })
    }

    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

fn splat_component(accum: &mut [f32], weights: &mut [f32], grid: StaggeredGrid2, pos: Vec2, value: f32) {
    grid.for_each_neighbor(pos, |idx, w| {
        accum[idx] += value * w;
        weights[idx] += w;
    });
}

fn add_into(total: &mut [f32], partial: &[f32]) {
    for (t, p) in total.iter_mut().zip(partial) {
        *t += *p;
    }
}

fn normalize_staggered(data: &mut [f32], weights: &[f32]) {
    for (value, weight) in data.iter_mut().zip(weights) {
        if *weight > 0.0 {
            *value /= *weight;
        }
    }
}

pub fn particles_to_grid(particles: &ParticleSystem, grid: &mut FluidGrid) {
    let parallel = should_parallel_particles(particles.len());
    scatter_to_grid(particles, grid, parallel);
}

fn scatter_to_grid(particles: &ParticleSystem, grid: &mut FluidGrid, parallel: bool) {
    let mac = grid.mac();
    let u_grid = mac.u_grid();
    let v_grid = mac.v_grid();
    let cells = mac.cell_grid();
    let positions = particles.positions();
    let velocities = particles.velocities();
    let chunk = chunk_len(positions.len());

    let (velocity, weight_u, weight_v, flags, scratch) = grid.transfer_targets_mut();
    let width = if parallel { scratch.slots.len() } else { 1 };
    let batch = chunk * width;
    for (pos_batch, vel_batch) in positions.chunks(batch).zip(velocities.chunks(batch)) {
        let used = pos_batch.len().div_ceil(chunk);
        let active = &mut scratch.slots[..used];
        if used > 1 {
            active
                .par_iter_mut()
                .zip(pos_batch.par_chunks(chunk))
                .zip(vel_batch.par_chunks(chunk))
                .for_each(|((acc, pos), vel)| {
                    acc.clear();
                    acc.scatter(u_grid, v_grid, pos, vel);
                });
        } else {
            active[0].clear();
            active[0].scatter(u_grid, v_grid, pos_batch, vel_batch);
        }
        for partial in active.iter() {
            add_into(velocity.u_mut().as_mut_slice(), &partial.u);
            add_into(weight_u.as_mut_slice(), &partial.u_weight);
            add_into(velocity.v_mut().as_mut_slice(), &partial.v);
            add_into(weight_v.as_mut_slice(), &partial.v_weight);
        }
    }

    for pos in positions {
        let (x, y) = cells.cell_of(*pos);
        if flags.get(x, y) != CellType::Solid {
            flags.set(x, y, CellType::Fluid);
        }
    }

    normalize_staggered(velocity.u_mut().as_mut_slice(), weight_u.as_slice());
    normalize_staggered(velocity.v_mut().as_mut_slice(), weight_v.as_slice());
    grid.save_velocity();
    log::trace!(
        "p2g: {} particles, {} fluid cells",
        positions.len(),
        grid.flags().count(CellType::Fluid)
    );
}

#[derive(Clone, Copy)]
enum Component {
    U,
    V,
}

fn sample_fluid_faces(
    after: &StaggeredField2,
    before: &StaggeredField2,
    flags: &CellFlags,
    component: Component,
    pos: Vec2,
) -> Option<(f32, f32)> {
    let grid = after.grid();
    let width = grid.width();
    let mut sum_after = 0.0;
    let mut sum_before = 0.0;
    let mut sum_w = 0.0;
    grid.for_each_neighbor(pos, |idx, w| {
        let (x, y) = (idx % width, idx / width);
        let sides = match component {
            Component::U => flags.u_face_sides(x, y),
            Component::V => flags.v_face_sides(x, y),
        };
        if !touches(sides, CellType::Fluid) {
            return;
        }
        sum_after += after.as_slice()[idx] * w;
        sum_before += before.as_slice()[idx] * w;
        sum_w += w;
    });
    (sum_w > 0.0).then(|| (sum_after / sum_w, sum_before / sum_w))
}

fn blend(old: f32, sample: Option<(f32, f32)>, flipness: f32) -> f32 {
    match sample {
        Some((after, before)) => flipness * (old + (after - before)) + (1.0 - flipness) * after,
        None => old,
    }
}

/// Gathers the projected grid velocity back onto the particles and writes
/// `f·(old + Δgrid) + (1 − f)·grid` into the shadow velocity slot.
pub fn grid_to_particles(particles: &mut ParticleSystem, grid: &FluidGrid, flipness: f32) {
    let flipness = flipness.clamp(0.0, 1.0);
    let after = grid.velocity();
    let before = grid.saved_velocity();
    let flags = grid.flags();
    let buffers = particles.split_for_write();
    let positions = buffers.positions;
    let velocities = buffers.velocities;
    let update = |i: usize| {
        let pos = positions[i];
        let old = velocities[i];
        let u = sample_fluid_faces(after.u(), before.u(), flags, Component::U, pos);
        let v = sample_fluid_faces(after.v(), before.v(), flags, Component::V, pos);
        Vec2::new(blend(old.x, u, flipness), blend(old.y, v, flipness))
    };
    if should_parallel_particles(positions.len()) {
        buffers
            .next_velocities
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, vel)| *vel = update(i));
    } else {
        for (i, vel) in buffers.next_velocities.iter_mut().enumerate() {
            *vel = update(i);
        }
    }
}
