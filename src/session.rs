use crate::error::{Result, SeedError, SimError};
use crate::forces::PointerImpulse;
use crate::render::{Invalidation, ParticleInstance, RenderMode, RenderResources};
use crate::seeding::{SeedPreset, SeedRect};
use crate::sim::{FluidSimulator, ResetConfig, SimParams, TickReport};
use glam::Vec2;

pub const PARTICLES_PER_CELL: f32 = 10.0;

pub const MIN_REGION_AREA: f32 = 0.1;

const DENSITY_RANGE: (f32, f32) = (0.2, 3.0);
const RESOLUTION_SCALE_RANGE: (f32, f32) = (0.5, 2.0);
const FLIPNESS_RANGE: (f32, f32) = (0.5, 0.99);
const TIME_STEP_RANGE: (f32, f32) = (0.0, 1.0 / 60.0);
const MIN_PARTICLE_COUNT: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteractionMode {
    Editing,
    Simulating,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionConfig {
    pub domain: Vec2,
    pub grid_cell_density: f32,
    pub grid_resolution_scale: f32,
    pub particle_count: Option<usize>,
    pub max_particle_count: usize,
    pub seed: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            domain: Vec2::new(40.0, 20.0),
            grid_cell_density: 1.0,
            grid_resolution_scale: 1.0,
            particle_count: Some(160_000),
            max_particle_count: 300_000,
            seed: 0x5eed,
        }
    }
}

fn clamp_range(value: f32, range: (f32, f32)) -> f32 {
    if value.is_nan() {
        range.0
    } else {
        value.clamp(range.0, range.1)
    }
}

fn resolution_for_cells(cells: f32) -> (usize, usize) {
    let ry = (cells / 2.0).sqrt().ceil().max(1.0);
    let rx = (ry * 2.0).ceil();
    (rx as usize, ry as usize)
}

#[derive(Debug)]
pub struct Session {
    mode: InteractionMode,
    config: SessionConfig,
    regions: Vec<SeedRect>,
    next_preset: SeedPreset,
    edited_since_preset: bool,
    params: SimParams,
    simulator: FluidSimulator,
    render: RenderResources,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let mut session = Self {
            mode: InteractionMode::Editing,
            config,
            regions: Vec::new(),
            next_preset: SeedPreset::Column,
            edited_since_preset: false,
            params: SimParams::default(),
            simulator: FluidSimulator::new(),
            render: RenderResources::new(RenderMode::Circles),
        };
        session.set_grid_cell_density(config.grid_cell_density);
        session.set_grid_resolution_scale(config.grid_resolution_scale);
        if let Some(count) = config.particle_count {
            session.set_particle_count(count);
        }
        session.apply_next_preset();
        session
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn simulator(&self) -> &FluidSimulator {
        &self.simulator
    }

    pub fn regions(&self) -> &[SeedRect] {
        &self.regions
    }

    pub fn edited_since_preset(&self) -> bool {
        self.edited_since_preset
    }

    fn ensure_editing(&self) -> Result<()> {
        match self.mode {
            InteractionMode::Editing => Ok(()),
            InteractionMode::Simulating => Err(SimError::Busy),
        }
    }

    pub fn apply_next_preset(&mut self) -> SeedPreset {
        let preset = self.next_preset;
        self.regions = preset.regions();
        self.next_preset = preset.next();
        self.edited_since_preset = false;
        preset
    }

    /// Adds the rectangle spanned by two corners, clamped to the domain.
    /// Returns `false` when the clamped rectangle is too small to keep.
    pub fn add_region(&mut self, a: Vec2, b: Vec2) -> Result<bool> {
        self.ensure_editing()?;
        let domain = self.config.domain;
        let a = a.clamp(Vec2::ZERO, domain);
        let b = b.clamp(Vec2::ZERO, domain);
        let rect = match SeedRect::from_corners(a, b) {
            Ok(rect) => rect,
            Err(SeedError::InvalidRect { .. }) => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        if rect.area() <= MIN_REGION_AREA {
            return Ok(false);
        }
        self.regions.push(rect);
        self.edited_since_preset = true;
        Ok(true)
    }

    pub fn remove_region_at(&mut self, point: Vec2) -> Result<Option<SeedRect>> {
        self.ensure_editing()?;
        let Some(index) = self.regions.iter().position(|rect| rect.contains(point)) else {
            return Ok(None);
        };
        self.edited_since_preset = true;
        Ok(Some(self.regions.remove(index)))
    }

    pub fn move_region(&mut self, index: usize, delta: Vec2) -> Result<bool> {
        self.ensure_editing()?;
        let domain = self.config.domain;
        let Some(rect) = self.regions.get_mut(index) else {
            return Ok(false);
        };
        let size = rect.size();
        let min = (rect.min + delta).clamp(Vec2::ZERO, (domain - size).max(Vec2::ZERO));
        rect.min = min;
        rect.max = min + size;
        self.edited_since_preset = true;
        Ok(true)
    }

    pub fn clear_regions(&mut self) -> Result<()> {
        self.ensure_editing()?;
        self.regions.clear();
        self.edited_since_preset = true;
        Ok(())
    }

    pub fn set_grid_cell_density(&mut self, density: f32) {
        self.config.grid_cell_density = clamp_range(density, DENSITY_RANGE);
    }

    pub fn set_grid_resolution_scale(&mut self, scale: f32) {
        self.config.grid_resolution_scale = clamp_range(scale, RESOLUTION_SCALE_RANGE);
    }

    pub fn set_particle_count(&mut self, count: usize) {
        let max = self.config.max_particle_count.max(MIN_PARTICLE_COUNT);
        self.config.particle_count = Some(count.clamp(MIN_PARTICLE_COUNT, max));
    }

    pub fn set_flipness(&mut self, flipness: f32) {
        self.params.flipness = clamp_range(flipness, FLIPNESS_RANGE);
    }

    pub fn set_time_step(&mut self, time_step: f32) {
        self.params.time_step = clamp_range(time_step, TIME_STEP_RANGE);
    }

    pub fn set_pointer(&mut self, impulse: Option<PointerImpulse>) {
        self.simulator.set_interaction(impulse);
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render.mode()
    }

    pub fn toggle_render_mode(&mut self) -> RenderMode {
        let mode = self.render.mode().toggle();
        self.render.set_mode(mode);
        mode
    }

    pub fn grid_resolution(&self) -> (usize, usize) {
        let domain = self.config.domain;
        let cells = domain.x * domain.y * self.config.grid_cell_density * self.config.grid_resolution_scale;
        resolution_for_cells(cells)
    }

    pub fn desired_particle_count(&self) -> usize {
        let domain = self.config.domain;
        let (rx, ry) = resolution_for_cells(domain.x * domain.y * self.config.grid_cell_density);
        let filled: f32 = self.regions.iter().map(SeedRect::area).sum();
        let fraction = filled / (domain.x * domain.y);
        let desired = (fraction * rx as f32 * ry as f32 * PARTICLES_PER_CELL).round() as usize;
        desired.min(self.config.max_particle_count)
    }

    pub fn particle_count(&self) -> usize {
        self.config
            .particle_count
            .unwrap_or_else(|| self.desired_particle_count())
    }

    pub fn toggle(&mut self) -> Result<InteractionMode> {
        match self.mode {
            InteractionMode::Editing => {
                if self.regions.is_empty() {
                    log::info!("nothing to simulate: no regions");
                    return Ok(self.mode);
                }
                self.start()?;
            }
            InteractionMode::Simulating => self.stop(),
        }
        Ok(self.mode)
    }

    fn start(&mut self) -> Result<()> {
        let resolution = self.grid_resolution();
        let config = ResetConfig {
            domain: self.config.domain,
            resolution,
            particle_count: self.particle_count(),
            seed: self.config.seed,
            max_particles: self.config.max_particle_count,
            ..ResetConfig::default()
        };
        self.simulator.reset(&config, &self.regions)?;
        self.render.configure(self.config.domain, resolution.0);
        self.mode = InteractionMode::Simulating;
        Ok(())
    }

    fn stop(&mut self) {
        self.simulator.stop();
        self.render.invalidate(Invalidation::Reset);
        self.mode = InteractionMode::Editing;
    }

    pub fn update(&mut self) -> Result<Option<TickReport>> {
        match self.mode {
            InteractionMode::Editing => Ok(None),
            InteractionMode::Simulating => {
                let report = self.simulator.step(&self.params)?;
                self.render.invalidate(Invalidation::BufferSwap);
                Ok(Some(report))
            }
        }
    }

    pub fn render_instances(&mut self) -> Option<&[ParticleInstance]> {
        let view = self.simulator.particles()?;
        Some(self.render.instances(view))
    }

    pub fn render_resources(&self) -> &RenderResources {
        &self.render
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_session() -> Session {
        Session::new(SessionConfig {
            particle_count: Some(10_000),
            ..SessionConfig::default()
        })
    }

    #[test]
    fn default_resolution_matches_domain() {
        let mut session = small_session();
        assert_eq!(session.grid_resolution(), (40, 20));
        session.set_grid_resolution_scale(2.0);
        assert_eq!(session.grid_resolution(), (58, 29));
        session.set_grid_cell_density(100.0);
        assert_eq!(session.config().grid_cell_density, 3.0);
    }

    #[test]
    fn desired_count_scales_with_filled_area() {
        let mut session = Session::new(SessionConfig {
            particle_count: None,
            ..SessionConfig::default()
        });
        assert_eq!(session.regions(), &SeedPreset::Column.regions()[..]);
        assert_eq!(session.desired_particle_count(), 3000);
        assert_eq!(session.particle_count(), 3000);
        session.set_grid_cell_density(3.0);
        assert!(session.desired_particle_count() > 3000);
    }

    #[test]
    fn presets_cycle() {
        let mut session = small_session();
        assert_eq!(session.apply_next_preset(), SeedPreset::DamAndBlock);
        assert_eq!(session.regions().len(), 2);
        assert_eq!(session.apply_next_preset(), SeedPreset::TwoColumns);
        assert_eq!(session.apply_next_preset(), SeedPreset::Column);
    }

    #[test]
    fn editor_clamps_and_filters_regions() {
        let mut session = small_session();
        session.clear_regions().unwrap();
        assert!(!session.add_region(Vec2::new(1.0, 1.0), Vec2::new(1.2, 1.2)).unwrap());
        assert!(session.add_region(Vec2::new(35.0, -4.0), Vec2::new(50.0, 6.0)).unwrap());
        assert_eq!(session.regions()[0].max, Vec2::new(40.0, 6.0));
        assert_eq!(session.regions()[0].min, Vec2::new(35.0, 0.0));
        assert!(session.move_region(0, Vec2::new(10.0, 0.0)).unwrap());
        assert_eq!(session.regions()[0].min, Vec2::new(35.0, 0.0));
        assert!(session.edited_since_preset());
        assert!(session.remove_region_at(Vec2::new(36.0, 1.0)).unwrap().is_some());
        assert!(session.regions().is_empty());
    }

    #[test]
    fn toggle_runs_and_stops_simulation() {
        let mut session = small_session();
        assert_eq!(session.update().unwrap(), None);
        assert_eq!(session.toggle().unwrap(), InteractionMode::Simulating);
        assert_eq!(
            session.add_region(Vec2::ZERO, Vec2::ONE),
            Err(SimError::Busy)
        );
        let report = session.update().unwrap().unwrap();
        assert_eq!(report.frame, 1);
        assert_eq!(session.render_instances().unwrap().len(), 10_000);
        assert_eq!(session.render_resources().particle_radius(), 0.1);
        session.update().unwrap();
        assert!(!session.render_resources().is_built());
        assert_eq!(session.toggle().unwrap(), InteractionMode::Editing);
        assert!(session.render_instances().is_none());
    }

    #[test]
    fn start_without_regions_stays_editing() {
        let mut session = small_session();
        session.clear_regions().unwrap();
        assert_eq!(session.toggle().unwrap(), InteractionMode::Editing);
    }

    #[test]
    fn live_parameters_use_slider_ranges() {
        let mut session = small_session();
        session.set_flipness(0.1);
        assert_eq!(session.params().flipness, 0.5);
        session.set_time_step(1.0);
        assert_eq!(session.params().time_step, 1.0 / 60.0);
        session.set_particle_count(1);
        assert_eq!(session.particle_count(), 10_000);
        assert_eq!(session.toggle_render_mode(), RenderMode::Metaballs);
    }
}
