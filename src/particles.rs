use crate::error::{try_filled, Result, SimError};
use glam::Vec2;

#[derive(Clone, Debug)]
pub struct ParticleSystem {
    positions: [Vec<Vec2>; 2],
    velocities: [Vec<Vec2>; 2],
    active: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct ParticleView<'a> {
    pub positions: &'a [Vec2],
    pub velocities: &'a [Vec2],
}

impl ParticleView<'_> {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

pub(crate) struct ParticleBuffers<'a> {
    pub positions: &'a [Vec2],
    pub velocities: &'a [Vec2],
    pub next_positions: &'a mut [Vec2],
    pub next_velocities: &'a mut [Vec2],
}

impl ParticleSystem {
    pub fn try_from_positions(positions: Vec<Vec2>) -> Result<Self> {
        let len = positions.len();
        let velocities = try_filled(len, Vec2::ZERO, "particle velocities")?;
        let shadow_positions = try_filled(len, Vec2::ZERO, "particle positions")?;
        let shadow_velocities = try_filled(len, Vec2::ZERO, "particle velocities")?;
        Ok(Self {
            positions: [positions, shadow_positions],
            velocities: [velocities, shadow_velocities],
            active: 0,
        })
    }

    pub fn try_reserve_positions(len: usize, limit: usize) -> Result<Vec<Vec2>> {
        if len > limit {
            return Err(SimError::Capacity {
                what: "particles",
                requested: len,
                limit,
            });
        }
        let mut positions = Vec::new();
        positions
            .try_reserve_exact(len)
            .map_err(|_| SimError::Allocation {
                what: "particle positions",
                requested: len,
            })?;
        Ok(positions)
    }

    pub fn len(&self) -> usize {
        self.positions[self.active].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn active_slot(&self) -> usize {
        self.active
    }

    pub fn positions(&self) -> &[Vec2] {
        &self.positions[self.active]
    }

    pub fn velocities(&self) -> &[Vec2] {
        &self.velocities[self.active]
    }

    pub fn view(&self) -> ParticleView<'_> {
        ParticleView {
            positions: self.positions(),
            velocities: self.velocities(),
        }
    }

    /// Overwrites the active velocities. Returns `false` on a length mismatch.
    pub fn set_velocities(&mut self, velocities: &[Vec2]) -> bool {
        let active = &mut self.velocities[self.active];
        if velocities.len() != active.len() {
            return false;
        }
        active.copy_from_slice(velocities);
        true
    }

    pub(crate) fn split_for_write(&mut self) -> ParticleBuffers<'_> {
        let (positions, next_positions) = split_slots(&mut self.positions, self.active);
        let (velocities, next_velocities) = split_slots(&mut self.velocities, self.active);
        ParticleBuffers {
            positions,
            velocities,
            next_positions,
            next_velocities,
        }
    }

    pub fn swap_buffers(&mut self) {
        self.active ^= 1;
    }

    pub fn mean_velocity(&self) -> Vec2 {
        let velocities = self.velocities();
        if velocities.is_empty() {
            return Vec2::ZERO;
        }
        let sum = velocities
            .iter()
            .fold((0.0_f64, 0.0_f64), |(sx, sy), vel| (sx + vel.x as f64, sy + vel.y as f64));
        let n = velocities.len() as f64;
        Vec2::new((sum.0 / n) as f32, (sum.1 / n) as f32)
    }

    pub fn max_speed(&self) -> f32 {
        let mut max_sq = 0.0_f32;
        for vel in self.velocities() {
            if !vel.is_finite() {
                return f32::INFINITY;
            }
            max_sq = max_sq.max(vel.length_squared());
        }
        max_sq.sqrt()
    }
}

fn split_slots(pair: &mut [Vec<Vec2>; 2], active: usize) -> (&[Vec2], &mut [Vec2]) {
    let (first, second) = pair.split_at_mut(1);
    if active == 0 {
        (first[0].as_slice(), second[0].as_mut_slice())
    } else {
        (second[0].as_slice(), first[0].as_mut_slice())
    }
}
