use crate::mac::{
    apply_domain_boundaries, apply_solid_boundaries, touches, BoundaryConfig, CellType, FluidGrid,
};
use glam::Vec2;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerImpulse {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
}

impl PointerImpulse {
    pub fn falloff(&self, point: Vec2) -> f32 {
        if self.radius <= 0.0 {
            return 0.0;
        }
        let d = point.distance(self.position);
        if d >= self.radius {
            0.0
        } else {
            1.0 - d / self.radius
        }
    }
}

pub fn apply_gravity(grid: &mut FluidGrid, gravity: f32, dt: f32) {
    let delta = gravity * dt;
    if delta == 0.0 {
        return;
    }
    let (velocity, flags) = grid.velocity_with_flags_mut();
    velocity.v_mut().update_with_index(|x, y, value| {
        if touches(flags.v_face_sides(x, y), CellType::Fluid) {
            value - delta
        } else {
            value
        }
    });
}

pub fn apply_interaction(grid: &mut FluidGrid, impulse: &PointerImpulse) {
    let mac = grid.mac();
    let u_grid = mac.u_grid();
    let v_grid = mac.v_grid();
    let (velocity, flags) = grid.velocity_with_flags_mut();
    velocity.u_mut().update_with_index(|x, y, value| {
        if !touches(flags.u_face_sides(x, y), CellType::Fluid) {
            return value;
        }
        value + impulse.velocity.x * impulse.falloff(u_grid.index_position(x, y))
    });
    velocity.v_mut().update_with_index(|x, y, value| {
        if !touches(flags.v_face_sides(x, y), CellType::Fluid) {
            return value;
        }
        value + impulse.velocity.y * impulse.falloff(v_grid.index_position(x, y))
    });
}

pub fn enforce_boundaries(grid: &mut FluidGrid, config: BoundaryConfig) {
    let (velocity, flags) = grid.velocity_with_flags_mut();
    apply_solid_boundaries(velocity, flags);
    apply_domain_boundaries(velocity, config);
}
