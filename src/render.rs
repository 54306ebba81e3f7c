use crate::particles::ParticleView;
use bytemuck::{Pod, Zeroable};
use glam::Vec2;

pub const PARTICLE_RADIUS_CELLS: f32 = 4.0;

const METABALL_THRESHOLD: f32 = 10.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RenderMode {
    #[default]
    Circles,
    Metaballs,
}

impl RenderMode {
    pub fn toggle(self) -> Self {
        match self {
            RenderMode::Circles => RenderMode::Metaballs,
            RenderMode::Metaballs => RenderMode::Circles,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RenderMode::Circles => "Circles",
            RenderMode::Metaballs => "Metaballs",
        }
    }

    pub fn threshold(self) -> f32 {
        match self {
            RenderMode::Circles => 0.0,
            RenderMode::Metaballs => METABALL_THRESHOLD,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ParticleInstance {
    pub position: [f32; 2],
    pub velocity: [f32; 2],
    pub speed: f32,
}

impl ParticleInstance {
    pub fn new(position: Vec2, velocity: Vec2) -> Self {
        Self {
            position: position.to_array(),
            velocity: velocity.to_array(),
            speed: velocity.length(),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct RenderUniforms {
    pub domain: [f32; 2],
    pub particle_radius: f32,
    pub threshold: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Invalidation {
    BufferSwap,
    ModeChange,
    Reset,
}

#[derive(Clone, Debug, Default)]
pub struct RenderResources {
    mode: RenderMode,
    particle_radius: f32,
    domain: Vec2,
    instances: Option<Vec<ParticleInstance>>,
    builds: u64,
}

impl RenderResources {
    pub fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: RenderMode) {
        if mode != self.mode {
            self.mode = mode;
            self.invalidate(Invalidation::ModeChange);
        }
    }

    pub fn configure(&mut self, domain: Vec2, resolution_x: usize) {
        self.domain = domain;
        self.particle_radius = PARTICLE_RADIUS_CELLS / resolution_x.max(1) as f32;
        self.invalidate(Invalidation::Reset);
    }

    pub fn particle_radius(&self) -> f32 {
        self.particle_radius
    }

    pub fn invalidate(&mut self, reason: Invalidation) {
        if self.instances.take().is_some() {
            log::trace!("render instances invalidated: {:?}", reason);
        }
    }

    pub fn is_built(&self) -> bool {
        self.instances.is_some()
    }

    pub fn build_count(&self) -> u64 {
        self.builds
    }

    pub fn instances(&mut self, view: ParticleView<'_>) -> &[ParticleInstance] {
        if self.instances.is_none() {
            self.builds += 1;
        }
        self.instances.get_or_insert_with(|| {
            view.positions
                .iter()
                .zip(view.velocities)
                .map(|(pos, vel)| ParticleInstance::new(*pos, *vel))
                .collect()
        })
    }

    pub fn instance_bytes(&mut self, view: ParticleView<'_>) -> &[u8] {
        bytemuck::cast_slice(self.instances(view))
    }

    pub fn uniforms(&self) -> RenderUniforms {
        RenderUniforms {
            domain: self.domain.to_array(),
            particle_radius: self.particle_radius,
            threshold: self.mode.threshold(),
        }
    }
}
