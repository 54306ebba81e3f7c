mod advection;
mod error;
mod field;
mod forces;
mod grid;
mod mac;
mod parallel;
mod particles;
mod pressure;
mod render;
mod seeding;
mod session;
mod sim;
mod transfer;

pub use advection::{advect_particles, ParticleBounds};
pub use error::{Result, SeedError, SimError};
pub use field::Field2;
pub use forces::{apply_gravity, apply_interaction, enforce_boundaries, PointerImpulse};
pub use glam::Vec2;
pub use grid::Grid2;
pub use mac::{
    apply_domain_boundaries, apply_solid_boundaries, BoundaryCondition, BoundaryConfig, CellFlags,
    CellType, FluidGrid, MacGrid2, MacVelocity2, StaggeredField2, StaggeredGrid2,
};
pub use parallel::THRESHOLD_ENV;
pub use particles::{ParticleSystem, ParticleView};
pub use pressure::{
    apply_pressure_gradient, compute_divergence, project, solve_pressure_jacobi,
    total_divergence, ProjectionStats,
};
pub use render::{
    Invalidation, ParticleInstance, RenderMode, RenderResources, RenderUniforms,
    PARTICLE_RADIUS_CELLS,
};
pub use seeding::{
    allocate_counts, seed_particles, seed_particles_into, validate_regions, SeedPreset, SeedRect,
};
pub use session::{InteractionMode, Session, SessionConfig, MIN_REGION_AREA, PARTICLES_PER_CELL};
pub use sim::{
    FluidSimulator, ResetConfig, SimContext, SimParams, SimState, TickReport, MAX_TIME_STEP,
};
pub use transfer::{grid_to_particles, particles_to_grid};
