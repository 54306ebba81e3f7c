use glam::Vec2;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeedError {
    #[error("no seed regions supplied")]
    NoRegions,
    #[error("seed rectangle {min:?}..{max:?} has no positive area")]
    InvalidRect { min: Vec2, max: Vec2 },
    #[error("seed rectangle {min:?}..{max:?} lies outside the {domain:?} domain")]
    OutsideDomain { min: Vec2, max: Vec2, domain: Vec2 },
    #[error("particle count must be at least 1")]
    ZeroParticles,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error(transparent)]
    Seed(#[from] SeedError),
    #[error("domain size {0:?} must be finite and positive")]
    InvalidDomain(Vec2),
    #[error("grid resolution {0}x{1} must be at least 1x1")]
    InvalidResolution(usize, usize),
    #[error("{what}: requested {requested} exceeds the limit of {limit}")]
    Capacity {
        what: &'static str,
        requested: usize,
        limit: usize,
    },
    #[error("{what}: could not allocate {requested} elements")]
    Allocation { what: &'static str, requested: usize },
    #[error("simulation has not been reset")]
    NotInitialized,
    #[error("regions cannot be edited while simulating")]
    Busy,
}

pub type Result<T, E = SimError> = std::result::Result<T, E>;

pub(crate) fn try_filled<T: Clone>(len: usize, fill: T, what: &'static str) -> Result<Vec<T>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| SimError::Allocation { what, requested: len })?;
    data.resize(len, fill);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_errors_convert_into_sim_errors() {
        let err: SimError = SeedError::ZeroParticles.into();
        assert_eq!(err, SimError::Seed(SeedError::ZeroParticles));
        assert_eq!(err.to_string(), "particle count must be at least 1");
    }

    #[test]
    fn impossible_allocation_is_reported() {
        let result = try_filled(usize::MAX / 2, 0.0_f32, "pressure");
        assert!(matches!(
            result,
            Err(SimError::Allocation { what: "pressure", .. })
        ));
    }
}
