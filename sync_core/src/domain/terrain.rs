// World/terrain provider interface consumed by the movement step.

/// Walkability and bounds queries. World generation lives elsewhere; the
/// movement formula only needs these two lookups.
pub trait Terrain: Send + Sync {
    fn is_walkable(&self, x: f32, y: f32) -> bool;
    fn clamp_to_bounds(&self, x: f32, y: f32) -> (f32, f32);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl WorldBounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            min_x: 0.0,
            max_x: width,
            min_y: 0.0,
            max_y: height,
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }

    pub fn clamp(&self, x: f32, y: f32) -> (f32, f32) {
        (x.clamp(self.min_x, self.max_x), y.clamp(self.min_y, self.max_y))
    }
}

/// Obstacle-free rectangle.
#[derive(Debug, Clone, Copy)]
pub struct OpenField {
    pub bounds: WorldBounds,
}

impl OpenField {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            bounds: WorldBounds::new(width, height),
        }
    }
}

impl Terrain for OpenField {
    fn is_walkable(&self, _x: f32, _y: f32) -> bool {
        true
    }

    fn clamp_to_bounds(&self, x: f32, y: f32) -> (f32, f32) {
        self.bounds.clamp(x, y)
    }
}

/// Square-tile grid; blocked tiles and everything outside the grid are not walkable.
#[derive(Debug, Clone)]
pub struct TileGrid {
    tile_size: f32,
    columns: usize,
    rows: usize,
    blocked: Vec<bool>,
}

impl TileGrid {
    /// Builds a grid from text rows where `#` marks a blocked tile.
    pub fn from_rows(tile_size: f32, rows: &[&str]) -> Self {
        let columns = rows.iter().map(|row| row.len()).max().unwrap_or(0);
        let mut blocked = vec![false; columns * rows.len()];
        for (r, row) in rows.iter().enumerate() {
            for (c, ch) in row.chars().enumerate() {
                blocked[r * columns + c] = ch == '#';
            }
        }
        Self {
            tile_size,
            columns,
            rows: rows.len(),
            blocked,
        }
    }

    pub fn bounds(&self) -> WorldBounds {
        WorldBounds::new(
            self.columns as f32 * self.tile_size,
            self.rows as f32 * self.tile_size,
        )
    }

    fn tile_at(&self, x: f32, y: f32) -> Option<usize> {
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let c = (x / self.tile_size) as usize;
        let r = (y / self.tile_size) as usize;
        (c < self.columns && r < self.rows).then_some(r * self.columns + c)
    }
}

impl Terrain for TileGrid {
    fn is_walkable(&self, x: f32, y: f32) -> bool {
        self.tile_at(x, y).is_some_and(|index| !self.blocked[index])
    }

    fn clamp_to_bounds(&self, x: f32, y: f32) -> (f32, f32) {
        // Keep strictly inside the last tile so clamped positions stay walkable.
        let bounds = self.bounds();
        let edge = 0.001;
        (
            x.clamp(bounds.min_x, (bounds.max_x - edge).max(bounds.min_x)),
            y.clamp(bounds.min_y, (bounds.max_y - edge).max(bounds.min_y)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_point_is_on_blocked_tile_then_not_walkable() {
        let grid = TileGrid::from_rows(32.0, &["..#", "...", "#.."]);
        assert!(grid.is_walkable(10.0, 10.0));
        assert!(!grid.is_walkable(70.0, 10.0));
        assert!(!grid.is_walkable(10.0, 70.0));
        assert!(!grid.is_walkable(-1.0, 10.0));
        assert!(!grid.is_walkable(10.0, 200.0));
    }

    #[test]
    fn when_clamping_outside_point_then_result_is_inside_bounds() {
        let field = OpenField::new(100.0, 50.0);
        assert_eq!(field.clamp_to_bounds(-5.0, 70.0), (0.0, 50.0));
        let grid = TileGrid::from_rows(10.0, &["...", "..."]);
        let (x, y) = grid.clamp_to_bounds(500.0, 500.0);
        assert!(grid.is_walkable(x, y));
    }
}
