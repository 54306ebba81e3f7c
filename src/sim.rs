use crate::advection::{advect_particles, ParticleBounds};
use crate::error::{Result, SeedError, SimError};
use crate::forces::{apply_gravity, apply_interaction, enforce_boundaries, PointerImpulse};
use crate::mac::{apply_domain_boundaries, BoundaryConfig, CellType, FluidGrid};
use crate::particles::{ParticleSystem, ParticleView};
use crate::pressure::{project, ProjectionStats};
use crate::seeding::{seed_particles_into, validate_regions, SeedRect};
use crate::transfer::{grid_to_particles, particles_to_grid};
use glam::Vec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub const MAX_TIME_STEP: f32 = 1.0 / 30.0;

const STATS_INTERVAL: u64 = 60;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimParams {
    pub flipness: f32,
    pub time_step: f32,
    pub gravity: f32,
    pub restitution: f32,
    pub jacobi_iterations: usize,
    pub boundary: BoundaryConfig,
    pub wall_epsilon: f32,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            flipness: 0.99,
            time_step: 1.0 / 60.0,
            gravity: 9.8,
            restitution: 0.5,
            jacobi_iterations: 50,
            boundary: BoundaryConfig::default(),
            wall_epsilon: 0.1,
        }
    }
}

fn clamp_finite(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

impl SimParams {
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        Self {
            flipness: clamp_finite(self.flipness, 0.0, 1.0, defaults.flipness),
            time_step: clamp_finite(self.time_step, 0.0, MAX_TIME_STEP, defaults.time_step),
            gravity: clamp_finite(self.gravity, f32::MIN, f32::MAX, defaults.gravity),
            restitution: clamp_finite(self.restitution, 0.0, 1.0, defaults.restitution),
            jacobi_iterations: self.jacobi_iterations,
            boundary: self.boundary,
            wall_epsilon: clamp_finite(self.wall_epsilon, 0.0, f32::MAX, defaults.wall_epsilon),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResetConfig {
    pub domain: Vec2,
    pub resolution: (usize, usize),
    pub particle_count: usize,
    pub seed: u64,
    pub max_particles: usize,
    pub max_grid_cells: usize,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            domain: Vec2::new(40.0, 20.0),
            resolution: (40, 20),
            particle_count: 8_000,
            seed: 0x5eed,
            max_particles: 300_000,
            max_grid_cells: 4_194_304,
        }
    }
}

impl ResetConfig {
    fn validate(&self, particle_count: usize) -> Result<()> {
        let domain = self.domain;
        if !(domain.is_finite() && domain.x > 0.0 && domain.y > 0.0) {
            return Err(SimError::InvalidDomain(domain));
        }
        let (rx, ry) = self.resolution;
        if rx == 0 || ry == 0 {
            return Err(SimError::InvalidResolution(rx, ry));
        }
        let cells = rx.checked_mul(ry).unwrap_or(usize::MAX);
        if cells > self.max_grid_cells {
            return Err(SimError::Capacity {
                what: "grid cells",
                requested: cells,
                limit: self.max_grid_cells,
            });
        }
        if particle_count == 0 {
            return Err(SeedError::ZeroParticles.into());
        }
        if particle_count > self.max_particles {
            return Err(SimError::Capacity {
                what: "particles",
                requested: particle_count,
                limit: self.max_particles,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimState {
    Uninitialized,
    Ready,
    Stepping,
}

#[derive(Clone, Debug)]
pub struct SimContext {
    pub grid: FluidGrid,
    pub particles: ParticleSystem,
    pub frame: u64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickReport {
    pub frame: u64,
    pub time_step: f32,
    pub fluid_cells: usize,
    pub projection: ProjectionStats,
}

#[derive(Debug, Default)]
pub struct FluidSimulator {
    context: Option<SimContext>,
    interaction: Option<PointerImpulse>,
    last_clamped: Option<SimParams>,
}

impl FluidSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SimState {
        match &self.context {
            None => SimState::Uninitialized,
            Some(context) if context.frame == 0 => SimState::Ready,
            Some(_) => SimState::Stepping,
        }
    }

    /// Seeds `config.particle_count` particles inside `regions` and replaces
    /// the current run. On error the previous run (if any) is untouched.
    pub fn reset(&mut self, config: &ResetConfig, regions: &[SeedRect]) -> Result<()> {
        config.validate(config.particle_count)?;
        validate_regions(regions, config.domain)?;
        let mut positions =
            ParticleSystem::try_reserve_positions(config.particle_count, config.max_particles)?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        seed_particles_into(regions, config.particle_count, &mut rng, &mut positions)?;
        self.install(config, positions)?;
        log::info!(
            "reset: {} particles in {} regions, {}x{} grid over {}x{}",
            config.particle_count,
            regions.len(),
            config.resolution.0,
            config.resolution.1,
            config.domain.x,
            config.domain.y
        );
        Ok(())
    }

    pub fn reset_with_positions(&mut self, config: &ResetConfig, mut positions: Vec<Vec2>) -> Result<()> {
        config.validate(positions.len())?;
        let bounds = ParticleBounds::from_domain(config.domain, 0.0);
        for pos in &mut positions {
            *pos = pos.clamp(bounds.min, bounds.max);
        }
        let count = positions.len();
        self.install(config, positions)?;
        log::info!(
            "reset: {} caller-seeded particles, {}x{} grid",
            count,
            config.resolution.0,
            config.resolution.1
        );
        Ok(())
    }

    fn install(&mut self, config: &ResetConfig, positions: Vec<Vec2>) -> Result<()> {
        let grid = FluidGrid::try_new(config.domain, config.resolution)?;
        let particles = ParticleSystem::try_from_positions(positions)?;
        self.context = Some(SimContext {
            grid,
            particles,
            frame: 0,
        });
        Ok(())
    }

    pub fn step(&mut self, params: &SimParams) -> Result<TickReport> {
        let clean = params.sanitized();
        if clean != *params && self.last_clamped != Some(*params) {
            log::warn!("simulation parameters clamped: {:?} -> {:?}", params, clean);
            self.last_clamped = Some(*params);
        }
        let interaction = self.interaction;
        let context = self.context.as_mut().ok_or(SimError::NotInitialized)?;
        let report = tick(context, &clean, interaction.as_ref());
        if report.frame % STATS_INTERVAL == 0 {
            log::debug!(
                "frame {}: {} fluid cells, |div| {:.4} -> {:.4}, mean velocity {:?}",
                report.frame,
                report.fluid_cells,
                report.projection.divergence_before,
                report.projection.divergence_after,
                context.particles.mean_velocity()
            );
        }
        Ok(report)
    }

    pub fn stop(&mut self) {
        if let Some(context) = self.context.take() {
            log::info!("stopped after {} frames", context.frame);
        }
        self.interaction = None;
    }

    pub fn set_interaction(&mut self, impulse: Option<PointerImpulse>) {
        self.interaction = impulse;
    }

    pub fn interaction(&self) -> Option<PointerImpulse> {
        self.interaction
    }

    pub fn context(&self) -> Option<&SimContext> {
        self.context.as_ref()
    }

    pub fn particles(&self) -> Option<ParticleView<'_>> {
        self.context.as_ref().map(|context| context.particles.view())
    }

    pub fn particle_system(&self) -> Option<&ParticleSystem> {
        self.context.as_ref().map(|context| &context.particles)
    }

    pub fn grid(&self) -> Option<&FluidGrid> {
        self.context.as_ref().map(|context| &context.grid)
    }

    pub fn frame(&self) -> u64 {
        self.context.as_ref().map_or(0, |context| context.frame)
    }
}

fn tick(context: &mut SimContext, params: &SimParams, interaction: Option<&PointerImpulse>) -> TickReport {
    let dt = params.time_step;
    let grid = &mut context.grid;
    let particles = &mut context.particles;

    grid.clear();
    particles_to_grid(particles, grid);

    apply_gravity(grid, params.gravity, dt);
    if let Some(impulse) = interaction {
        apply_interaction(grid, impulse);
    }
    enforce_boundaries(grid, params.boundary);

    let projection = project(grid, params.jacobi_iterations);
    // The gradient step rewrites wall-tangential faces.
    apply_domain_boundaries(grid.velocity_mut(), params.boundary);

    grid_to_particles(particles, grid, params.flipness);
    let bounds = ParticleBounds::from_domain(grid.mac().domain(), params.wall_epsilon);
    advect_particles(particles, dt, bounds, params.restitution);
    particles.swap_buffers();

    context.frame += 1;
    TickReport {
        frame: context.frame,
        time_step: dt,
        fluid_cells: grid.flags().count(CellType::Fluid),
        projection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeding::SeedPreset;

    fn small_config() -> ResetConfig {
        ResetConfig {
            particle_count: 400,
            ..ResetConfig::default()
        }
    }

    #[test]
    fn step_requires_reset() {
        let mut sim = FluidSimulator::new();
        assert_eq!(sim.state(), SimState::Uninitialized);
        assert_eq!(sim.step(&SimParams::default()), Err(SimError::NotInitialized));
    }

    #[test]
    fn lifecycle_moves_through_states() {
        let mut sim = FluidSimulator::new();
        sim.reset(&small_config(), &SeedPreset::Column.regions()).unwrap();
        assert_eq!(sim.state(), SimState::Ready);
        assert_eq!(sim.particles().unwrap().len(), 400);
        let report = sim.step(&SimParams::default()).unwrap();
        assert_eq!(report.frame, 1);
        assert!(report.fluid_cells > 0);
        assert_eq!(sim.state(), SimState::Stepping);
        sim.reset(&small_config(), &SeedPreset::Column.regions()).unwrap();
        assert_eq!(sim.state(), SimState::Ready);
        assert_eq!(sim.frame(), 0);
        sim.stop();
        assert_eq!(sim.state(), SimState::Uninitialized);
        assert!(sim.particles().is_none());
    }

    #[test]
    fn failed_reset_keeps_previous_run() {
        let mut sim = FluidSimulator::new();
        sim.reset(&small_config(), &SeedPreset::Column.regions()).unwrap();
        sim.step(&SimParams::default()).unwrap();
        let before = sim.particles().unwrap().positions.to_vec();

        let too_many = ResetConfig {
            particle_count: 1_000_000,
            ..small_config()
        };
        let err = sim.reset(&too_many, &SeedPreset::Column.regions()).unwrap_err();
        assert!(matches!(err, SimError::Capacity { what: "particles", .. }));
        let bad_rect = [SeedRect {
            min: Vec2::new(5.0, 5.0),
            max: Vec2::new(5.0, 9.0),
        }];
        assert!(matches!(
            sim.reset(&small_config(), &bad_rect),
            Err(SimError::Seed(SeedError::InvalidRect { .. }))
        ));
        let huge_grid = ResetConfig {
            resolution: (4096, 4096),
            ..small_config()
        };
        assert!(matches!(
            sim.reset(&huge_grid, &SeedPreset::Column.regions()),
            Err(SimError::Capacity { what: "grid cells", .. })
        ));

        assert_eq!(sim.state(), SimState::Stepping);
        assert_eq!(sim.frame(), 1);
        assert_eq!(sim.particles().unwrap().positions, &before[..]);
    }

    #[test]
    fn sanitized_clamps_time_step_and_flipness() {
        let params = SimParams {
            time_step: 1.0,
            flipness: 1.5,
            restitution: f32::NAN,
            ..SimParams::default()
        };
        let clean = params.sanitized();
        assert_eq!(clean.time_step, MAX_TIME_STEP);
        assert_eq!(clean.flipness, 1.0);
        assert_eq!(clean.restitution, 0.5);
        assert_eq!(SimParams::default().sanitized(), SimParams::default());
    }

    #[test]
    fn caller_positions_are_clamped_into_domain() {
        let mut sim = FluidSimulator::new();
        let positions = vec![Vec2::new(-5.0, 3.0), Vec2::new(10.0, 50.0)];
        sim.reset_with_positions(&ResetConfig::default(), positions).unwrap();
        let view = sim.particles().unwrap();
        assert_eq!(view.positions[0], Vec2::new(0.0, 3.0));
        assert_eq!(view.positions[1], Vec2::new(10.0, 20.0));
        assert_eq!(
            sim.reset_with_positions(&ResetConfig::default(), Vec::new()),
            Err(SimError::Seed(SeedError::ZeroParticles))
        );
    }

    #[test]
    fn gravity_pulls_fluid_down() {
        let mut sim = FluidSimulator::new();
        sim.reset(&small_config(), &SeedPreset::DamAndBlock.regions()).unwrap();
        for _ in 0..10 {
            sim.step(&SimParams::default()).unwrap();
        }
        let mean = sim.particle_system().unwrap().mean_velocity();
        assert!(mean.y < 0.0, "mean velocity {mean:?}");
    }

    #[test]
    fn zero_time_step_leaves_positions_unchanged() {
        let mut sim = FluidSimulator::new();
        sim.reset(&small_config(), &SeedPreset::Column.regions()).unwrap();
        let before = sim.particles().unwrap().positions.to_vec();
        let params = SimParams {
            time_step: 0.0,
            wall_epsilon: 0.0,
            ..SimParams::default()
        };
        sim.step(&params).unwrap();
        assert_eq!(sim.particles().unwrap().positions, &before[..]);
    }

    #[test]
    fn no_slip_walls_hold_after_projection() {
        let mut sim = FluidSimulator::new();
        sim.reset(&small_config(), &SeedPreset::DamAndBlock.regions()).unwrap();
        let params = SimParams {
            boundary: BoundaryConfig::no_slip(),
            ..SimParams::default()
        };
        for _ in 0..3 {
            sim.step(&params).unwrap();
        }
        let velocity = sim.grid().unwrap().velocity();
        let (rx, ry) = (velocity.u().grid().width() - 1, velocity.u().grid().height());
        for x in 0..=rx {
            assert_eq!(velocity.u().get(x, 0), 0.0, "bottom u face {x}");
            assert_eq!(velocity.u().get(x, ry - 1), 0.0, "top u face {x}");
        }
        for y in 0..=ry {
            assert_eq!(velocity.v().get(0, y), 0.0, "left v face {y}");
            assert_eq!(velocity.v().get(rx - 1, y), 0.0, "right v face {y}");
        }
    }

    #[test]
    fn pointer_impulse_pushes_fluid() {
        let params = SimParams {
            gravity: 0.0,
            ..SimParams::default()
        };
        let mut still = FluidSimulator::new();
        still.reset(&small_config(), &SeedPreset::Column.regions()).unwrap();
        still.step(&params).unwrap();

        let mut pushed = FluidSimulator::new();
        pushed.reset(&small_config(), &SeedPreset::Column.regions()).unwrap();
        pushed.set_interaction(Some(PointerImpulse {
            position: Vec2::new(7.5, 10.0),
            velocity: Vec2::new(5.0, 0.0),
            radius: 60.0,
        }));
        pushed.step(&params).unwrap();

        let base = still.particle_system().unwrap().mean_velocity();
        let moved = pushed.particle_system().unwrap().mean_velocity();
        assert!(moved.x > base.x + 0.5, "pushed {moved:?} vs still {base:?}");
    }

    #[test]
    fn large_grid_steps_with_bounded_scratch() {
        let config = ResetConfig {
            resolution: (1024, 512),
            particle_count: 100_000,
            ..ResetConfig::default()
        };
        let params = SimParams {
            jacobi_iterations: 4,
            ..SimParams::default()
        };
        let mut sim = FluidSimulator::new();
        sim.reset(&config, &SeedPreset::DamAndBlock.regions()).unwrap();
        let report = sim.step(&params).unwrap();
        assert_eq!(report.frame, 1);
        assert!(report.fluid_cells > 0);
        assert_eq!(sim.particles().unwrap().len(), 100_000);
    }
}
