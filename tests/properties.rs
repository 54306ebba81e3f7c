use flip_fluid_sim::{
    allocate_counts, seed_particles, FluidSimulator, ParticleBounds, ResetConfig, SeedRect,
    SimParams, Vec2,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const DOMAIN: Vec2 = Vec2::new(40.0, 20.0);

fn rect() -> impl Strategy<Value = SeedRect> {
    (0.0f32..39.0, 0.0f32..19.0, 0.05f32..1.0, 0.05f32..1.0).prop_map(|(x, y, fw, fh)| {
        let max = Vec2::new(x + fw * (DOMAIN.x - x), y + fh * (DOMAIN.y - y));
        SeedRect::new(Vec2::new(x, y), max).unwrap()
    })
}

fn position() -> impl Strategy<Value = Vec2> {
    (0.0f32..=40.0, 0.0f32..=20.0).prop_map(|(x, y)| Vec2::new(x, y))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn seeding_allocates_exactly_n(rects in prop::collection::vec(rect(), 1..6), n in 1usize..5000, seed in any::<u64>()) {
        let counts = allocate_counts(&rects, n).unwrap();
        prop_assert_eq!(counts.len(), rects.len());
        prop_assert_eq!(counts.iter().sum::<usize>(), n);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let positions = seed_particles(&rects, n, &mut rng).unwrap();
        prop_assert_eq!(positions.len(), n);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn particles_never_leave_the_domain(
        positions in prop::collection::vec(position(), 1..200),
        flipness in 0.0f32..=1.0,
        time_step in 0.0f32..0.1,
        restitution in 0.0f32..=1.0,
    ) {
        let config = ResetConfig {
            domain: DOMAIN,
            resolution: (20, 10),
            ..ResetConfig::default()
        };
        let params = SimParams {
            flipness,
            time_step,
            restitution,
            jacobi_iterations: 20,
            ..SimParams::default()
        };
        let bounds = ParticleBounds::from_domain(DOMAIN, params.wall_epsilon);
        let mut sim = FluidSimulator::new();
        sim.reset_with_positions(&config, positions).unwrap();
        for _ in 0..8 {
            sim.step(&params).unwrap();
            for pos in sim.particles().unwrap().positions {
                prop_assert!(bounds.contains(*pos), "{:?} escaped", pos);
            }
        }
    }
}
