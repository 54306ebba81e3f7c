use crate::error::{try_filled, Result, SimError};
use crate::field::Field2;
use crate::grid::Grid2;
use crate::parallel::should_parallel_cells;
use crate::transfer::TransferScratch;
use glam::Vec2;
use rayon::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MacGrid2 {
    width: usize,
    height: usize,
    dx: f32,
    dy: f32,
}

impl MacGrid2 {
    pub fn new(width: usize, height: usize, dx: f32, dy: f32) -> Self {
        assert!(width > 0, "width must be > 0");
        assert!(height > 0, "height must be > 0");
        assert!(dx > 0.0 && dy > 0.0, "cell size must be > 0");
        Self {
            width,
            height,
            dx,
            dy,
        }
    }

    pub fn from_domain(domain: Vec2, resolution: (usize, usize)) -> Self {
        let (rx, ry) = resolution;
        Self::new(rx, ry, domain.x / rx as f32, domain.y / ry as f32)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dx(&self) -> f32 {
        self.dx
    }

    pub fn dy(&self) -> f32 {
        self.dy
    }

    pub fn domain(&self) -> Vec2 {
        Vec2::new(self.width as f32 * self.dx, self.height as f32 * self.dy)
    }

    pub fn cell_grid(&self) -> Grid2 {
        Grid2::new(self.width, self.height, self.dx, self.dy)
    }

    pub fn u_grid(&self) -> StaggeredGrid2 {
        StaggeredGrid2::new(
            self.width + 1,
            self.height,
            self.dx,
            self.dy,
            Vec2::new(0.0, 0.5 * self.dy),
        )
    }

    pub fn v_grid(&self) -> StaggeredGrid2 {
        StaggeredGrid2::new(
            self.width,
            self.height + 1,
            self.dx,
            self.dy,
            Vec2::new(0.5 * self.dx, 0.0),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StaggeredGrid2 {
    width: usize,
    height: usize,
    dx: f32,
    dy: f32,
    origin: Vec2,
}

impl StaggeredGrid2 {
    pub fn new(width: usize, height: usize, dx: f32, dy: f32, origin: Vec2) -> Self {
        assert!(width > 0, "width must be > 0");
        assert!(height > 0, "height must be > 0");
        assert!(dx > 0.0 && dy > 0.0, "cell size must be > 0");
        Self {
            width,
            height,
            dx,
            dy,
            origin,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dx(&self) -> f32 {
        self.dx
    }

    pub fn dy(&self) -> f32 {
        self.dy
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn size(&self) -> usize {
        self.width * self.height
    }

    pub fn idx(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y * self.width + x
    }

    pub fn clamp_coord(&self, x: i32, y: i32) -> (usize, usize) {
        let max_x = (self.width - 1) as i32;
        let max_y = (self.height - 1) as i32;
        (x.clamp(0, max_x) as usize, y.clamp(0, max_y) as usize)
    }

    pub fn index_position(&self, x: usize, y: usize) -> Vec2 {
        self.origin + Vec2::new(x as f32 * self.dx, y as f32 * self.dy)
    }

    pub fn for_each_neighbor(&self, pos: Vec2, mut f: impl FnMut(usize, f32)) {
        let gx = (pos.x - self.origin.x) / self.dx;
        let gy = (pos.y - self.origin.y) / self.dy;
        let x0 = gx.floor() as i32;
        let y0 = gy.floor() as i32;
        let fx = gx - x0 as f32;
        let fy = gy - y0 as f32;
        for oy in 0..=1 {
            let wy = if oy == 0 { 1.0 - fy } else { fy };
            for ox in 0..=1 {
                let wx = if ox == 0 { 1.0 - fx } else { fx };
                let ix = x0 + ox;
                let iy = y0 + oy;
                if ix < 0 || iy < 0 {
                    continue;
                }
                let (ix, iy) = (ix as usize, iy as usize);
                if ix >= self.width || iy >= self.height {
                    continue;
                }
                let w = wx * wy;
                if w == 0.0 {
                    continue;
                }
                f(self.idx(ix, iy), w);
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StaggeredField2 {
    grid: StaggeredGrid2,
    data: Vec<f32>,
}

impl StaggeredField2 {
    pub fn new(grid: StaggeredGrid2, fill: f32) -> Self {
        let data = vec![fill; grid.size()];
        Self { grid, data }
    }

    pub fn from_data(grid: StaggeredGrid2, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), grid.size(), "staggered field data mismatch");
        Self { grid, data }
    }

    pub fn grid(&self) -> StaggeredGrid2 {
        self.grid
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[self.grid.idx(x, y)]
    }

    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        let idx = self.grid.idx(x, y);
        self.data[idx] = value;
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    pub fn sample_clamped(&self, x: i32, y: i32) -> f32 {
        let (cx, cy) = self.grid.clamp_coord(x, y);
        self.get(cx, cy)
    }

    pub fn sample_linear(&self, pos: Vec2) -> f32 {
        let origin = self.grid.origin();
        let gx = (pos.x - origin.x) / self.grid.dx();
        let gy = (pos.y - origin.y) / self.grid.dy();
        let x0 = gx.floor() as i32;
        let y0 = gy.floor() as i32;
        let sx = gx - x0 as f32;
        let sy = gy - y0 as f32;
        let v00 = self.sample_clamped(x0, y0);
        let v10 = self.sample_clamped(x0 + 1, y0);
        let v01 = self.sample_clamped(x0, y0 + 1);
        let v11 = self.sample_clamped(x0 + 1, y0 + 1);
        let vx0 = v00 + (v10 - v00) * sx;
        let vx1 = v01 + (v11 - v01) * sx;
        vx0 + (vx1 - vx0) * sy
    }

    pub fn update_with_index(&mut self, f: impl Fn(usize, usize, f32) -> f32 + Sync) {
        let width = self.grid.width();
        if should_parallel_cells(self.data.len()) {
            self.data.par_iter_mut().enumerate().for_each(|(i, value)| {
                *value = f(i % width, i / width, *value);
            });
        } else {
            for (i, value) in self.data.iter_mut().enumerate() {
                *value = f(i % width, i / width, *value);
            }
        }
    }

    pub fn copy_from(&mut self, other: &Self) {
        assert_eq!(self.grid, other.grid, "staggered grid mismatch");
        self.data.copy_from_slice(&other.data);
    }

    pub fn max_abs(&self) -> f32 {
        self.data
            .iter()
            .map(|value| value.abs())
            .fold(0.0_f32, f32::max)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CellType {
    Air,
    Fluid,
    Solid,
}

/// Per-cell marker. Cells outside the lattice are the domain walls and read
/// as [`CellType::Solid`] through [`CellFlags::get_or_solid`].
#[derive(Clone, Debug, PartialEq)]
pub struct CellFlags {
    grid: Grid2,
    data: Vec<CellType>,
}

impl CellFlags {
    pub fn new(grid: Grid2, fill: CellType) -> Self {
        let data = vec![fill; grid.size()];
        Self { grid, data }
    }

    pub(crate) fn from_data(grid: Grid2, data: Vec<CellType>) -> Self {
        assert_eq!(data.len(), grid.size(), "cell flag data mismatch");
        Self { grid, data }
    }

    pub fn grid(&self) -> Grid2 {
        self.grid
    }

    pub fn get(&self, x: usize, y: usize) -> CellType {
        self.data[self.grid.idx(x, y)]
    }

    pub fn get_or_solid(&self, x: i32, y: i32) -> CellType {
        if self.grid.contains(x, y) {
            self.get(x as usize, y as usize)
        } else {
            CellType::Solid
        }
    }

    pub fn set(&mut self, x: usize, y: usize, value: CellType) {
        let idx = self.grid.idx(x, y);
        self.data[idx] = value;
    }

    pub fn reset(&mut self) {
        for cell in &mut self.data {
            if *cell != CellType::Solid {
                *cell = CellType::Air;
            }
        }
    }

    pub fn count(&self, kind: CellType) -> usize {
        self.data.iter().filter(|cell| **cell == kind).count()
    }

    pub fn u_face_sides(&self, x: usize, y: usize) -> (CellType, CellType) {
        let (x, y) = (x as i32, y as i32);
        (self.get_or_solid(x - 1, y), self.get_or_solid(x, y))
    }

    pub fn v_face_sides(&self, x: usize, y: usize) -> (CellType, CellType) {
        let (x, y) = (x as i32, y as i32);
        (self.get_or_solid(x, y - 1), self.get_or_solid(x, y))
    }
}

pub(crate) fn touches(sides: (CellType, CellType), kind: CellType) -> bool {
    sides.0 == kind || sides.1 == kind
}

#[derive(Clone, Debug, PartialEq)]
pub struct MacVelocity2 {
    grid: MacGrid2,
    u: StaggeredField2,
    v: StaggeredField2,
}

impl MacVelocity2 {
    pub fn new(grid: MacGrid2, fill: Vec2) -> Self {
        let u = StaggeredField2::new(grid.u_grid(), fill.x);
        let v = StaggeredField2::new(grid.v_grid(), fill.y);
        Self { grid, u, v }
    }

    pub fn from_components(grid: MacGrid2, u: StaggeredField2, v: StaggeredField2) -> Self {
        assert_eq!(u.grid(), grid.u_grid(), "u grid mismatch");
        assert_eq!(v.grid(), grid.v_grid(), "v grid mismatch");
        Self { grid, u, v }
    }

    pub fn grid(&self) -> MacGrid2 {
        self.grid
    }

    pub fn u(&self) -> &StaggeredField2 {
        &self.u
    }

    pub fn v(&self) -> &StaggeredField2 {
        &self.v
    }

    pub fn u_mut(&mut self) -> &mut StaggeredField2 {
        &mut self.u
    }

    pub fn v_mut(&mut self) -> &mut StaggeredField2 {
        &mut self.v
    }

    pub fn fill(&mut self, value: Vec2) {
        self.u.fill(value.x);
        self.v.fill(value.y);
    }

    pub fn copy_from(&mut self, other: &Self) {
        self.u.copy_from(&other.u);
        self.v.copy_from(&other.v);
    }

    pub fn sample_linear(&self, pos: Vec2) -> Vec2 {
        Vec2::new(self.u.sample_linear(pos), self.v.sample_linear(pos))
    }

    pub fn max_abs(&self) -> f32 {
        self.u.max_abs().max(self.v.max_abs())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryCondition {
    FreeSlip,
    NoSlip,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundaryConfig {
    pub left: BoundaryCondition,
    pub right: BoundaryCondition,
    pub bottom: BoundaryCondition,
    pub top: BoundaryCondition,
}

impl BoundaryConfig {
    pub fn uniform(condition: BoundaryCondition) -> Self {
        Self {
            left: condition,
            right: condition,
            bottom: condition,
            top: condition,
        }
    }

    pub fn no_slip() -> Self {
        Self::uniform(BoundaryCondition::NoSlip)
    }

    pub fn free_slip() -> Self {
        Self::uniform(BoundaryCondition::FreeSlip)
    }
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self::free_slip()
    }
}

pub fn apply_solid_boundaries(velocity: &mut MacVelocity2, flags: &CellFlags) {
    assert_eq!(flags.grid(), velocity.grid().cell_grid(), "cell grid mismatch");
    velocity.u_mut().update_with_index(|x, y, value| {
        if touches(flags.u_face_sides(x, y), CellType::Solid) {
            0.0
        } else {
            value
        }
    });
    velocity.v_mut().update_with_index(|x, y, value| {
        if touches(flags.v_face_sides(x, y), CellType::Solid) {
            0.0
        } else {
            value
        }
    });
}

pub fn apply_domain_boundaries(velocity: &mut MacVelocity2, config: BoundaryConfig) {
    let grid = velocity.grid();
    let w = grid.width();
    let h = grid.height();
    let no_slip = |condition: BoundaryCondition| condition == BoundaryCondition::NoSlip;
    velocity.u_mut().update_with_index(|x, y, value| {
        if x == 0 || x == w {
            return 0.0;
        }
        if (y == 0 && no_slip(config.bottom)) || (y + 1 == h && no_slip(config.top)) {
            return 0.0;
        }
        value
    });
    velocity.v_mut().update_with_index(|x, y, value| {
        if y == 0 || y == h {
            return 0.0;
        }
        if (x == 0 && no_slip(config.left)) || (x + 1 == w && no_slip(config.right)) {
            return 0.0;
        }
        value
    });
}

#[derive(Clone, Debug)]
pub struct FluidGrid {
    mac: MacGrid2,
    velocity: MacVelocity2,
    saved: MacVelocity2,
    weight_u: StaggeredField2,
    weight_v: StaggeredField2,
    flags: CellFlags,
    divergence: Field2,
    pressure: [Field2; 2],
    pressure_read: usize,
    scratch: TransferScratch,
}

impl FluidGrid {
    pub fn try_new(domain: Vec2, resolution: (usize, usize)) -> Result<Self> {
        let (rx, ry) = resolution;
        if rx == 0 || ry == 0 {
            return Err(SimError::InvalidResolution(rx, ry));
        }
        if !(domain.x.is_finite() && domain.y.is_finite() && domain.x > 0.0 && domain.y > 0.0) {
            return Err(SimError::InvalidDomain(domain));
        }
        let mac = MacGrid2::from_domain(domain, resolution);
        let cells = mac.cell_grid();
        let u_grid = mac.u_grid();
        let v_grid = mac.v_grid();
        let staggered = |grid: StaggeredGrid2, what| {
            try_filled(grid.size(), 0.0, what).map(|data| StaggeredField2::from_data(grid, data))
        };
        let scalar = |what| try_filled(cells.size(), 0.0, what).map(|data| Field2::from_data(cells, data));
        let velocity = MacVelocity2::from_components(
            mac,
            staggered(u_grid, "grid velocity")?,
            staggered(v_grid, "grid velocity")?,
        );
        let saved = MacVelocity2::from_components(
            mac,
            staggered(u_grid, "saved grid velocity")?,
            staggered(v_grid, "saved grid velocity")?,
        );
        let flags = CellFlags::from_data(cells, try_filled(cells.size(), CellType::Air, "cell markers")?);
        Ok(Self {
            mac,
            velocity,
            saved,
            weight_u: staggered(u_grid, "grid weights")?,
            weight_v: staggered(v_grid, "grid weights")?,
            flags,
            divergence: scalar("divergence")?,
            pressure: [scalar("pressure")?, scalar("pressure")?],
            pressure_read: 0,
            scratch: TransferScratch::try_new(u_grid.size(), v_grid.size())?,
        })
    }

    pub fn clear(&mut self) {
        self.velocity.fill(Vec2::ZERO);
        self.saved.fill(Vec2::ZERO);
        self.weight_u.fill(0.0);
        self.weight_v.fill(0.0);
        self.flags.reset();
        self.divergence.fill(0.0);
        self.reset_pressure();
    }

    pub(crate) fn reset_pressure(&mut self) {
        for buffer in &mut self.pressure {
            buffer.fill(0.0);
        }
        self.pressure_read = 0;
    }

    pub fn mac(&self) -> MacGrid2 {
        self.mac
    }

    pub fn velocity(&self) -> &MacVelocity2 {
        &self.velocity
    }

    pub fn velocity_mut(&mut self) -> &mut MacVelocity2 {
        &mut self.velocity
    }

    pub fn saved_velocity(&self) -> &MacVelocity2 {
        &self.saved
    }

    pub fn save_velocity(&mut self) {
        self.saved.copy_from(&self.velocity);
    }

    pub fn weights(&self) -> (&StaggeredField2, &StaggeredField2) {
        (&self.weight_u, &self.weight_v)
    }

    pub(crate) fn transfer_targets_mut(
        &mut self,
    ) -> (
        &mut MacVelocity2,
        &mut StaggeredField2,
        &mut StaggeredField2,
        &mut CellFlags,
        &mut TransferScratch,
    ) {
        (
            &mut self.velocity,
            &mut self.weight_u,
            &mut self.weight_v,
            &mut self.flags,
            &mut self.scratch,
        )
    }

    pub(crate) fn velocity_with_flags_mut(&mut self) -> (&mut MacVelocity2, &CellFlags) {
        (&mut self.velocity, &self.flags)
    }

    pub fn flags(&self) -> &CellFlags {
        &self.flags
    }

    pub fn flags_mut(&mut self) -> &mut CellFlags {
        &mut self.flags
    }

    pub fn divergence(&self) -> &Field2 {
        &self.divergence
    }

    pub(crate) fn divergence_mut(&mut self) -> (&mut Field2, &MacVelocity2, &CellFlags) {
        (&mut self.divergence, &self.velocity, &self.flags)
    }

    pub fn pressure(&self) -> &Field2 {
        &self.pressure[self.pressure_read]
    }

    pub(crate) fn pressure_sweep_buffers(&mut self) -> (&Field2, &mut Field2, &Field2, &CellFlags) {
        let (first, second) = self.pressure.split_at_mut(1);
        let (read, write) = if self.pressure_read == 0 {
            (&first[0], &mut second[0])
        } else {
            (&second[0], &mut first[0])
        };
        (read, write, &self.divergence, &self.flags)
    }

    pub(crate) fn flip_pressure(&mut self) {
        self.pressure_read ^= 1;
    }

    pub(crate) fn gradient_targets_mut(&mut self) -> (&mut MacVelocity2, &Field2, &CellFlags) {
        (
            &mut self.velocity,
            &self.pressure[self.pressure_read],
            &self.flags,
        )
    }

    pub fn total_divergence(&self) -> f32 {
        let cells = self.mac.cell_grid();
        let mut total = 0.0;
        for y in 0..cells.height() {
            for x in 0..cells.width() {
                if self.flags.get(x, y) == CellType::Fluid {
                    total += self.divergence.get(x, y).abs();
                }
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_grid_sizes() {
        let grid = MacGrid2::new(4, 3, 1.0, 1.0);
        let u_grid = grid.u_grid();
        let v_grid = grid.v_grid();
        assert_eq!(u_grid.width(), 5);
        assert_eq!(u_grid.height(), 3);
        assert_eq!(v_grid.width(), 4);
        assert_eq!(v_grid.height(), 4);
    }

    #[test]
    fn from_domain_derives_cell_size() {
        let grid = MacGrid2::from_domain(Vec2::new(40.0, 20.0), (80, 10));
        assert_eq!(grid.dx(), 0.5);
        assert_eq!(grid.dy(), 2.0);
        assert_eq!(grid.domain(), Vec2::new(40.0, 20.0));
    }

    #[test]
    fn staggered_field_samples_face_positions() {
        let grid = MacGrid2::new(2, 2, 1.0, 1.0);
        let mut field = StaggeredField2::new(grid.u_grid(), 0.0);
        field.set(1, 0, 4.0);
        assert_eq!(field.sample_linear(Vec2::new(1.0, 0.5)), 4.0);
        assert_eq!(field.sample_linear(Vec2::new(0.5, 0.5)), 2.0);
    }

    #[test]
    fn neighbor_weights_sum_to_one_inside() {
        let grid = MacGrid2::new(8, 8, 1.0, 1.0);
        let mut total = 0.0;
        let mut visited = 0;
        grid.v_grid().for_each_neighbor(Vec2::new(3.3, 4.7), |_, w| {
            total += w;
            visited += 1;
        });
        assert_eq!(visited, 4);
        assert!((total - 1.0_f32).abs() < 1e-6);
    }

    #[test]
    fn walls_read_as_solid() {
        let flags = CellFlags::new(Grid2::new(3, 3, 1.0, 1.0), CellType::Fluid);
        assert_eq!(flags.get_or_solid(-1, 1), CellType::Solid);
        assert_eq!(flags.get_or_solid(1, 3), CellType::Solid);
        assert_eq!(flags.u_face_sides(0, 1), (CellType::Solid, CellType::Fluid));
        assert_eq!(flags.v_face_sides(1, 3), (CellType::Fluid, CellType::Solid));
    }

    #[test]
    fn apply_solid_boundaries_zeroes_adjacent_faces() {
        let grid = MacGrid2::new(3, 3, 1.0, 1.0);
        let mut flags = CellFlags::new(grid.cell_grid(), CellType::Fluid);
        flags.set(1, 1, CellType::Solid);
        let mut velocity = MacVelocity2::new(grid, Vec2::new(1.0, 1.0));
        apply_solid_boundaries(&mut velocity, &flags);
        assert_eq!(velocity.u().get(1, 1), 0.0);
        assert_eq!(velocity.u().get(2, 1), 0.0);
        assert_eq!(velocity.v().get(1, 1), 0.0);
        assert_eq!(velocity.v().get(1, 2), 0.0);
        assert_eq!(velocity.u().get(0, 0), 0.0);
        assert_eq!(velocity.u().get(1, 0), 1.0);
    }

    #[test]
    fn no_slip_zeroes_tangential_rows_free_slip_keeps_them() {
        let grid = MacGrid2::new(4, 4, 1.0, 1.0);
        let mut velocity = MacVelocity2::new(grid, Vec2::new(1.0, 2.0));
        apply_domain_boundaries(&mut velocity, BoundaryConfig::free_slip());
        assert_eq!(velocity.u().get(0, 1), 0.0);
        assert_eq!(velocity.u().get(4, 1), 0.0);
        assert_eq!(velocity.v().get(1, 0), 0.0);
        assert_eq!(velocity.v().get(1, 4), 0.0);
        assert_eq!(velocity.u().get(2, 0), 1.0);
        assert_eq!(velocity.v().get(0, 2), 2.0);

        let mut velocity = MacVelocity2::new(grid, Vec2::new(1.0, 2.0));
        apply_domain_boundaries(&mut velocity, BoundaryConfig::no_slip());
        assert_eq!(velocity.u().get(2, 0), 0.0);
        assert_eq!(velocity.u().get(2, 3), 0.0);
        assert_eq!(velocity.v().get(0, 2), 0.0);
        assert_eq!(velocity.v().get(3, 2), 0.0);
        assert_eq!(velocity.u().get(2, 1), 1.0);
        assert_eq!(velocity.v().get(1, 2), 2.0);
    }

    #[test]
    fn clear_resets_state_but_keeps_solids() {
        let mut grid = FluidGrid::try_new(Vec2::new(4.0, 4.0), (4, 4)).unwrap();
        grid.velocity_mut().fill(Vec2::new(3.0, -1.0));
        grid.flags_mut().set(0, 0, CellType::Solid);
        grid.flags_mut().set(1, 0, CellType::Fluid);
        grid.clear();
        assert_eq!(grid.velocity().max_abs(), 0.0);
        assert_eq!(grid.flags().get(0, 0), CellType::Solid);
        assert_eq!(grid.flags().get(1, 0), CellType::Air);
        assert_eq!(grid.pressure().max_abs(), 0.0);
    }

    #[test]
    fn try_new_rejects_degenerate_sizes() {
        assert_eq!(
            FluidGrid::try_new(Vec2::new(4.0, 4.0), (0, 4)).unwrap_err(),
            SimError::InvalidResolution(0, 4)
        );
        assert!(matches!(
            FluidGrid::try_new(Vec2::new(-1.0, 4.0), (4, 4)),
            Err(SimError::InvalidDomain(_))
        ));
    }
}
