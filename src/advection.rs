use crate::parallel::should_parallel_particles;
use crate::particles::ParticleSystem;
use glam::Vec2;
use rayon::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleBounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl ParticleBounds {
    pub fn from_domain(domain: Vec2, epsilon: f32) -> Self {
        let epsilon = epsilon.max(0.0);
        let min = Vec2::splat(epsilon);
        let max = (domain - Vec2::splat(epsilon)).max(min);
        Self { min, max }
    }

    pub fn contains(&self, pos: Vec2) -> bool {
        pos.cmpge(self.min).all() && pos.cmple(self.max).all()
    }
}

fn apply_bounds(pos: &mut Vec2, vel: &mut Vec2, bounds: ParticleBounds, restitution: f32) {
    if pos.x < bounds.min.x {
        pos.x = bounds.min.x;
        if vel.x < 0.0 {
            vel.x = -vel.x * restitution;
        }
    } else if pos.x > bounds.max.x {
        pos.x = bounds.max.x;
        if vel.x > 0.0 {
            vel.x = -vel.x * restitution;
        }
    }
    if pos.y < bounds.min.y {
        pos.y = bounds.min.y;
        if vel.y < 0.0 {
            vel.y = -vel.y * restitution;
        }
    } else if pos.y > bounds.max.y {
        pos.y = bounds.max.y;
        if vel.y > 0.0 {
            vel.y = -vel.y * restitution;
        }
    }
}

pub fn advect_particles(particles: &mut ParticleSystem, dt: f32, bounds: ParticleBounds, restitution: f32) {
    let buffers = particles.split_for_write();
    let positions = buffers.positions;
    let step = |pos: &Vec2, next_pos: &mut Vec2, vel: &mut Vec2| {
        let mut moved = *pos + *vel * dt;
        apply_bounds(&mut moved, vel, bounds, restitution);
        *next_pos = moved;
    };
    if should_parallel_particles(positions.len()) {
        positions
            .par_iter()
            .zip(buffers.next_positions.par_iter_mut())
            .zip(buffers.next_velocities.par_iter_mut())
            .for_each(|((pos, next_pos), vel)| step(pos, next_pos, vel));
    } else {
        for ((pos, next_pos), vel) in positions
            .iter()
            .zip(buffers.next_positions.iter_mut())
            .zip(buffers.next_velocities.iter_mut())
        {
            step(pos, next_pos, vel);
        }
    }
}
