use crate::field::Field2;
use crate::mac::{CellFlags, CellType, FluidGrid, MacVelocity2};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProjectionStats {
    pub divergence_before: f32,
    pub divergence_after: f32,
}

fn divergence_into(out: &mut Field2, velocity: &MacVelocity2, flags: &CellFlags) {
    let grid = velocity.grid();
    let inv_dx = 1.0 / grid.dx();
    let inv_dy = 1.0 / grid.dy();
    out.fill_with_index(|x, y| {
        if flags.get(x, y) != CellType::Fluid {
            return 0.0;
        }
        let u_r = velocity.u().get(x + 1, y);
        let u_l = velocity.u().get(x, y);
        let v_t = velocity.v().get(x, y + 1);
        let v_b = velocity.v().get(x, y);
        (u_r - u_l) * inv_dx + (v_t - v_b) * inv_dy
    });
}

pub fn compute_divergence(grid: &mut FluidGrid) {
    let (divergence, velocity, flags) = grid.divergence_mut();
    divergence_into(divergence, velocity, flags);
}

pub fn total_divergence(grid: &FluidGrid) -> f32 {
    grid.total_divergence()
}

fn neighbor_pressure(pressure: &Field2, flags: &CellFlags, own: f32, nx: i32, ny: i32) -> f32 {
    match flags.get_or_solid(nx, ny) {
        CellType::Solid => own,
        CellType::Air => 0.0,
        CellType::Fluid => pressure.get(nx as usize, ny as usize),
    }
}

/// Fixed-count Jacobi relaxation of the 5-point Poisson stencil, starting
/// from zero pressure. Every sweep reads the previous sweep's buffer only.
pub fn solve_pressure_jacobi(grid: &mut FluidGrid, iterations: usize) {
    grid.reset_pressure();
    let mac = grid.mac();
    let wx = 1.0 / (mac.dx() * mac.dx());
    let wy = 1.0 / (mac.dy() * mac.dy());
    let diag = 2.0 * wx + 2.0 * wy;
    for _ in 0..iterations {
        let (read, write, divergence, flags) = grid.pressure_sweep_buffers();
        write.fill_with_index(|x, y| {
            if flags.get(x, y) != CellType::Fluid {
                return 0.0;
            }
            let own = read.get(x, y);
            let (xi, yi) = (x as i32, y as i32);
            let p_l = neighbor_pressure(read, flags, own, xi - 1, yi);
            let p_r = neighbor_pressure(read, flags, own, xi + 1, yi);
            let p_b = neighbor_pressure(read, flags, own, xi, yi - 1);
            let p_t = neighbor_pressure(read, flags, own, xi, yi + 1);
            (wx * (p_l + p_r) + wy * (p_b + p_t) - divergence.get(x, y)) / diag
        });
        grid.flip_pressure();
    }
}

fn cell_pressure(pressure: &Field2, kind: CellType, x: i32, y: i32) -> f32 {
    if kind == CellType::Fluid {
        pressure.get(x as usize, y as usize)
    } else {
        0.0
    }
}

pub fn apply_pressure_gradient(grid: &mut FluidGrid) {
    let mac = grid.mac();
    let inv_dx = 1.0 / mac.dx();
    let inv_dy = 1.0 / mac.dy();
    let (velocity, pressure, flags) = grid.gradient_targets_mut();
    velocity.u_mut().update_with_index(|x, y, value| {
        let (xi, yi) = (x as i32, y as i32);
        let left = flags.get_or_solid(xi - 1, yi);
        let right = flags.get_or_solid(xi, yi);
        if left == CellType::Solid || right == CellType::Solid {
            return 0.0;
        }
        if left != CellType::Fluid && right != CellType::Fluid {
            return value;
        }
        let p_l = cell_pressure(pressure, left, xi - 1, yi);
        let p_r = cell_pressure(pressure, right, xi, yi);
        value - (p_r - p_l) * inv_dx
    });
    velocity.v_mut().update_with_index(|x, y, value| {
        let (xi, yi) = (x as i32, y as i32);
        let below = flags.get_or_solid(xi, yi - 1);
        let above = flags.get_or_solid(xi, yi);
        if below == CellType::Solid || above == CellType::Solid {
            return 0.0;
        }
        if below != CellType::Fluid && above != CellType::Fluid {
            return value;
        }
        let p_b = cell_pressure(pressure, below, xi, yi - 1);
        let p_t = cell_pressure(pressure, above, xi, yi);
        value - (p_t - p_b) * inv_dy
    });
}

pub fn project(grid: &mut FluidGrid, iterations: usize) -> ProjectionStats {
    compute_divergence(grid);
    let divergence_before = grid.total_divergence();
    solve_pressure_jacobi(grid, iterations);
    apply_pressure_gradient(grid);
    compute_divergence(grid);
    let divergence_after = grid.total_divergence();
    log::trace!(
        "projection: |div| {:.4} -> {:.4} after {} sweeps",
        divergence_before,
        divergence_after,
        iterations
    );
    ProjectionStats {
        divergence_before,
        divergence_after,
    }
}
