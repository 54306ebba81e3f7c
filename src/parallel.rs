use std::sync::OnceLock;

const CELL_THRESHOLD_DEFAULT: usize = 262_144;
const CELL_MIN_WORK_PER_THREAD: usize = 4096;
const PARTICLE_THRESHOLD_DEFAULT: usize = 32_768;
const PARTICLE_MIN_WORK_PER_THREAD: usize = 2048;

pub const THRESHOLD_ENV: &str = "FLIP_PAR_THRESHOLD";

fn env_threshold() -> Option<usize> {
    static THRESHOLD: OnceLock<Option<usize>> = OnceLock::new();
    *THRESHOLD.get_or_init(|| {
        std::env::var(THRESHOLD_ENV)
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value > 0)
    })
}

fn worth_splitting(len: usize, threshold: usize, min_per_thread: usize) -> bool {
    if len < threshold {
        return false;
    }
    let threads = rayon::current_num_threads().max(1);
    len / threads >= min_per_thread
}

pub(crate) fn should_parallel_cells(len: usize) -> bool {
    let threshold = env_threshold().unwrap_or(CELL_THRESHOLD_DEFAULT);
    worth_splitting(len, threshold, CELL_MIN_WORK_PER_THREAD)
}

pub(crate) fn should_parallel_particles(len: usize) -> bool {
    let threshold = env_threshold().unwrap_or(PARTICLE_THRESHOLD_DEFAULT);
    worth_splitting(len, threshold, PARTICLE_MIN_WORK_PER_THREAD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_work_stays_serial() {
        assert!(!should_parallel_cells(16));
        assert!(!should_parallel_particles(16));
    }
}
