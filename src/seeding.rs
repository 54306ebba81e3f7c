use crate::error::SeedError;
use glam::Vec2;
use rand::Rng;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeedRect {
    pub min: Vec2,
    pub max: Vec2,
}

impl SeedRect {
    pub fn new(min: Vec2, max: Vec2) -> Result<Self, SeedError> {
        let finite = min.is_finite() && max.is_finite();
        if !finite || max.x <= min.x || max.y <= min.y {
            return Err(SeedError::InvalidRect { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn from_corners(a: Vec2, b: Vec2) -> Result<Self, SeedError> {
        Self::new(a.min(b), a.max(b))
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn area(&self) -> f32 {
        let size = self.size();
        size.x * size.y
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    pub fn random_point(&self, rng: &mut impl Rng) -> Vec2 {
        let t = Vec2::new(rng.gen::<f32>(), rng.gen::<f32>());
        self.min + self.size() * t
    }
}

pub fn validate_regions(rects: &[SeedRect], domain: Vec2) -> Result<(), SeedError> {
    if rects.is_empty() {
        return Err(SeedError::NoRegions);
    }
    for rect in rects {
        SeedRect::new(rect.min, rect.max)?;
        let inside = rect.min.x >= 0.0 && rect.min.y >= 0.0 && rect.max.x <= domain.x && rect.max.y <= domain.y;
        if !inside {
            return Err(SeedError::OutsideDomain {
                min: rect.min,
                max: rect.max,
                domain,
            });
        }
    }
    Ok(())
}

/// Particles per rectangle. Every rectangle but the last gets
/// `floor(total · area / Σarea)`; the last takes the remainder.
pub fn allocate_counts(rects: &[SeedRect], total: usize) -> Result<Vec<usize>, SeedError> {
    if rects.is_empty() {
        return Err(SeedError::NoRegions);
    }
    if total == 0 {
        return Err(SeedError::ZeroParticles);
    }
    let total_area: f64 = rects.iter().map(|rect| rect.area() as f64).sum();
    let mut counts = Vec::with_capacity(rects.len());
    let mut assigned = 0usize;
    for rect in &rects[..rects.len() - 1] {
        let share = (total as f64 * rect.area() as f64 / total_area).floor() as usize;
        let share = share.min(total - assigned);
        counts.push(share);
        assigned += share;
    }
    counts.push(total - assigned);
    Ok(counts)
}

pub fn seed_particles(
    rects: &[SeedRect],
    total: usize,
    rng: &mut impl Rng,
) -> Result<Vec<Vec2>, SeedError> {
    let mut positions = Vec::with_capacity(total);
    seed_particles_into(rects, total, rng, &mut positions)?;
    Ok(positions)
}

pub fn seed_particles_into(
    rects: &[SeedRect],
    total: usize,
    rng: &mut impl Rng,
    out: &mut Vec<Vec2>,
) -> Result<(), SeedError> {
    let counts = allocate_counts(rects, total)?;
    for (rect, count) in rects.iter().zip(counts) {
        out.extend((0..count).map(|_| rect.random_point(rng)));
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedPreset {
    Column,
    DamAndBlock,
    TwoColumns,
}

impl SeedPreset {
    pub fn all() -> [SeedPreset; 3] {
        [SeedPreset::Column, SeedPreset::DamAndBlock, SeedPreset::TwoColumns]
    }

    pub fn next(self) -> Self {
        match self {
            SeedPreset::Column => SeedPreset::DamAndBlock,
            SeedPreset::DamAndBlock => SeedPreset::TwoColumns,
            SeedPreset::TwoColumns => SeedPreset::Column,
        }
    }

    pub fn corners(self) -> &'static [([f32; 2], [f32; 2])] {
        match self {
            SeedPreset::Column => &[([0.0, 0.0], [15.0, 20.0])],
            SeedPreset::DamAndBlock => &[([0.0, 0.0], [40.0, 7.0]), ([12.0, 12.0], [28.0, 20.0])],
            SeedPreset::TwoColumns => &[([0.0, 0.0], [10.0, 15.0]), ([30.0, 5.0], [40.0, 20.0])],
        }
    }

    pub fn regions(self) -> Vec<SeedRect> {
        self.corners()
            .iter()
            .map(|(min, max)| SeedRect {
                min: Vec2::from_array(*min),
                max: Vec2::from_array(*max),
            })
            .collect()
    }
}
