use anyhow::{bail, Context, Result};
use flip_fluid_sim::{InteractionMode, RenderMode, SeedPreset, Session, SessionConfig};

#[derive(Clone, Copy, Debug)]
struct DemoConfig {
    frames: u64,
    presets: usize,
    particles: usize,
}

impl DemoConfig {
    fn from_args() -> Result<Self> {
        let mut config = Self {
            frames: 300,
            presets: 1,
            particles: 20_000,
        };
        let mut args = std::env::args().skip(1);
        while let Some(flag) = args.next() {
            let value = args
                .next()
                .with_context(|| format!("missing value for {flag}"))?;
            match flag.as_str() {
                "--frames" => config.frames = value.parse().context("--frames")?,
                "--presets" => config.presets = value.parse().context("--presets")?,
                "--particles" => config.particles = value.parse().context("--particles")?,
                other => bail!("unknown argument {other}"),
            }
        }
        Ok(config)
    }
}

fn run_preset(session: &mut Session, preset: SeedPreset, frames: u64) -> Result<()> {
    log::info!(
        "preset {:?}: {} particles on a {:?} grid",
        preset,
        session.particle_count(),
        session.grid_resolution()
    );
    if session.toggle()? != InteractionMode::Simulating {
        bail!("preset {preset:?} did not start");
    }
    for _ in 0..frames {
        let Some(report) = session.update()? else {
            break;
        };
        if report.frame == frames / 2 && session.render_mode() == RenderMode::Circles {
            session.toggle_render_mode();
        }
        if report.frame % 60 == 0 {
            let instances = session.render_instances().map_or(0, |instances| instances.len());
            log::info!(
                "frame {}: {} fluid cells, |div| {:.3} -> {:.3}, {} instances ({})",
                report.frame,
                report.fluid_cells,
                report.projection.divergence_before,
                report.projection.divergence_after,
                instances,
                session.render_mode().label()
            );
        }
    }
    if let Some(particles) = session.simulator().particle_system() {
        log::info!(
            "preset {:?} done: mean velocity {:?}, max speed {:.3}",
            preset,
            particles.mean_velocity(),
            particles.max_speed()
        );
    }
    session.toggle()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let demo = DemoConfig::from_args()?;
    let mut session = Session::new(SessionConfig {
        particle_count: Some(demo.particles),
        ..SessionConfig::default()
    });
    let mut preset = SeedPreset::Column;
    for i in 0..demo.presets {
        if i > 0 {
            preset = session.apply_next_preset();
        }
        run_preset(&mut session, preset, demo.frames)?;
    }
    Ok(())
}
