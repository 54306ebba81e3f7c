use glam::Vec2;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grid2 {
    width: usize,
    height: usize,
    dx: f32,
    dy: f32,
}

impl Grid2 {
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

    pub fn size(&self) -> usize {
        self.width * self.height
    }

    pub fn idx(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y * self.width + x
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    pub fn clamp_coord(&self, x: i32, y: i32) -> (usize, usize) {
        let max_x = (self.width - 1) as i32;
        let max_y = (self.height - 1) as i32;
        let cx = x.clamp(0, max_x) as usize;
        let cy = y.clamp(0, max_y) as usize;
        (cx, cy)
    }

    pub fn cell_center(&self, x: usize, y: usize) -> Vec2 {
        Vec2::new((x as f32 + 0.5) * self.dx, (y as f32 + 0.5) * self.dy)
    }

    pub fn cell_of(&self, pos: Vec2) -> (usize, usize) {
        let x = (pos.x / self.dx).floor() as i32;
        let y = (pos.y / self.dy).floor() as i32;
        self.clamp_coord(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_of_clamps_outside_positions() {
        let grid = Grid2::new(4, 2, 0.5, 1.0);
        assert_eq!(grid.cell_of(Vec2::new(0.75, 1.5)), (1, 1));
        assert_eq!(grid.cell_of(Vec2::new(-3.0, 9.0)), (0, 1));
        assert_eq!(grid.cell_of(Vec2::new(2.0, 0.0)), (3, 0));
    }

    #[test]
    fn cell_center_uses_both_spacings() {
        let grid = Grid2::new(4, 4, 2.0, 0.5);
        assert_eq!(grid.cell_center(1, 2), Vec2::new(3.0, 1.25));
    }
}
