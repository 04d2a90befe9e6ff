//! Path-aware distances for anchor selection and retreat.
//!
//! The decision pass only sees the [`PathService`] trait. [`StraightLine`]
//! treats the map as open ground; [`NavGrid`] runs a deterministic A* over a
//! walkability grid.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, ratio, Fixed, Vec2Fixed};

/// Path distance and pathability queries.
pub trait PathService {
    /// Length of the ground path between two points, `None` if unreachable.
    fn path_distance(&self, from: Vec2Fixed, to: Vec2Fixed) -> Option<Fixed>;

    /// Whether a ground unit can stand at `point`.
    fn is_pathable(&self, point: Vec2Fixed) -> bool;
}

/// Ground distance when reachable, straight-line distance otherwise.
///
/// Flying units always use straight-line distance.
#[must_use]
pub fn distance_or_straight(
    path: &dyn PathService,
    from: Vec2Fixed,
    to: Vec2Fixed,
    flying: bool,
) -> Fixed {
    if flying {
        return from.distance(to);
    }
    path.path_distance(from, to)
        .unwrap_or_else(|| from.distance(to))
}

/// Open map: every point is pathable and paths are straight lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct StraightLine;

impl PathService for StraightLine {
    fn path_distance(&self, from: Vec2Fixed, to: Vec2Fixed) -> Option<Fixed> {
        Some(from.distance(to))
    }

    fn is_pathable(&self, _point: Vec2Fixed) -> bool {
        true
    }
}

// ============================================================================
// Navigation Grid
// ============================================================================

/// Cell types for the navigation grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellType {
    /// Normal terrain (cost 1).
    #[default]
    Walkable,
    /// Impassable terrain.
    Blocked,
    /// Slow terrain (cost 2).
    SlowTerrain,
}

impl CellType {
    /// Movement cost, `None` when blocked.
    #[must_use]
    pub const fn movement_cost(self) -> Option<Fixed> {
        match self {
            Self::Walkable => Some(Fixed::ONE),
            Self::Blocked => None,
            Self::SlowTerrain => Some(Fixed::const_from_int(2)),
        }
    }

    fn from_symbol(symbol: char) -> Self {
        match symbol {
            '#' => Self::Blocked,
            '~' => Self::SlowTerrain,
            _ => Self::Walkable,
        }
    }
}

/// Walkability grid with A* pathing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavGrid {
    width: u32,
    height: u32,
    /// Row-major cells.
    cells: Vec<CellType>,
    #[serde(with = "fixed_serde")]
    cell_size: Fixed,
}

impl NavGrid {
    /// Create an all-walkable grid.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero, or if `cell_size` is not positive.
    #[must_use]
    pub fn new(width: u32, height: u32, cell_size: Fixed) -> Self {
        assert!(width > 0 && height > 0, "NavGrid dimensions must be positive");
        assert!(cell_size > Fixed::ZERO, "NavGrid cell_size must be positive");
        Self {
            width,
            height,
            cells: vec![CellType::Walkable; (width as usize) * (height as usize)],
            cell_size,
        }
    }

    /// Build a grid from text rows: `#` blocked, `~` slow, anything else walkable.
    ///
    /// The first row is `y = 0`. Short rows are padded with walkable cells.
    /// Returns `None` for an empty layout or a non-positive cell size.
    #[must_use]
    pub fn from_rows<S: AsRef<str>>(rows: &[S], cell_size: Fixed) -> Option<Self> {
        let height = u32::try_from(rows.len()).ok()?;
        let width = rows
            .iter()
            .map(|r| r.as_ref().chars().count())
            .max()
            .and_then(|w| u32::try_from(w).ok())?;
        if width == 0 || height == 0 || cell_size <= Fixed::ZERO {
            return None;
        }
        let mut grid = Self::new(width, height, cell_size);
        for (y, row) in rows.iter().enumerate() {
            for (x, symbol) in row.as_ref().chars().enumerate() {
                grid.set_cell(x as u32, y as u32, CellType::from_symbol(symbol));
            }
        }
        Some(grid)
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height)
            .then(|| (y as usize) * (self.width as usize) + (x as usize))
    }

    /// Cell at grid coordinates, `None` out of bounds.
    #[must_use]
    pub fn cell(&self, x: u32, y: u32) -> Option<CellType> {
        self.index(x, y).map(|i| self.cells[i])
    }

    /// Set a cell. Returns `false` out of bounds.
    pub fn set_cell(&mut self, x: u32, y: u32, cell: CellType) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.cells[i] = cell;
                true
            }
            None => false,
        }
    }

    fn cost(&self, x: u32, y: u32) -> Option<Fixed> {
        self.cell(x, y).and_then(CellType::movement_cost)
    }

    fn walkable(&self, x: u32, y: u32) -> bool {
        self.cost(x, y).is_some()
    }

    /// World position to grid coordinates, `None` outside the grid.
    #[must_use]
    pub fn world_to_grid(&self, pos: Vec2Fixed) -> Option<(u32, u32)> {
        if pos.x < Fixed::ZERO || pos.y < Fixed::ZERO {
            return None;
        }
        let x = u32::try_from((pos.x / self.cell_size).to_num::<i64>()).ok()?;
        let y = u32::try_from((pos.y / self.cell_size).to_num::<i64>()).ok()?;
        (x < self.width && y < self.height).then_some((x, y))
    }

    /// Center of a grid cell in world space.
    #[must_use]
    pub fn grid_to_world(&self, x: u32, y: u32) -> Vec2Fixed {
        let half = self.cell_size / Fixed::const_from_int(2);
        Vec2Fixed::new(
            Fixed::from_num(x) * self.cell_size + half,
            Fixed::from_num(y) * self.cell_size + half,
        )
    }

    /// Waypoints from `start` to `goal`, `None` if either end is blocked or
    /// no route exists. Ties are broken by cell coordinates so repeated
    /// queries return identical paths.
    #[must_use]
    pub fn find_path(&self, start: Vec2Fixed, goal: Vec2Fixed) -> Option<Vec<Vec2Fixed>> {
        let from = self.world_to_grid(start)?;
        let to = self.world_to_grid(goal)?;
        if !self.walkable(from.0, from.1) || !self.walkable(to.0, to.1) {
            return None;
        }
        if from == to {
            return Some(vec![start, goal]);
        }
        let cells = self.search(from, to)?;
        let mut waypoints = Vec::with_capacity(cells.len() + 2);
        waypoints.push(start);
        // Interior cells only; the exact endpoints replace the first and last centers.
        waypoints.extend(
            cells[1..cells.len() - 1]
                .iter()
                .map(|&(x, y)| self.grid_to_world(x, y)),
        );
        waypoints.push(goal);
        Some(self.smooth(waypoints))
    }

    fn search(&self, from: (u32, u32), to: (u32, u32)) -> Option<Vec<(u32, u32)>> {
        let mut open = BinaryHeap::new();
        let mut came_from: HashMap<(u32, u32), (u32, u32)> = HashMap::new();
        let mut g_score: HashMap<(u32, u32), Fixed> = HashMap::new();

        g_score.insert(from, Fixed::ZERO);
        open.push(OpenNode::new(from, octile(from, to)));

        while let Some(current) = open.pop() {
            if current.cell == to {
                let mut route = vec![to];
                let mut cursor = to;
                while let Some(&prev) = came_from.get(&cursor) {
                    route.push(prev);
                    cursor = prev;
                }
                route.reverse();
                return Some(route);
            }
            let current_g = g_score.get(&current.cell).copied().unwrap_or(Fixed::MAX);
            let (cx, cy) = current.cell;

            for (dx, dy) in NEIGHBORS {
                let (Some(nx), Some(ny)) = (cx.checked_add_signed(dx), cy.checked_add_signed(dy))
                else {
                    continue;
                };
                let Some(cell_cost) = self.cost(nx, ny) else {
                    continue;
                };
                let diagonal = dx != 0 && dy != 0;
                // No corner cutting past blocked cells.
                if diagonal && !(self.walkable(nx, cy) && self.walkable(cx, ny)) {
                    continue;
                }
                let step = if diagonal {
                    cell_cost * diagonal_cost()
                } else {
                    cell_cost
                };
                let tentative = current_g.saturating_add(step);
                if tentative < g_score.get(&(nx, ny)).copied().unwrap_or(Fixed::MAX) {
                    came_from.insert((nx, ny), current.cell);
                    g_score.insert((nx, ny), tentative);
                    open.push(OpenNode::new((nx, ny), tentative + octile((nx, ny), to)));
                }
            }
        }
        None
    }

    /// Drop waypoints that have a clear line of sight past them.
    fn smooth(&self, path: Vec<Vec2Fixed>) -> Vec<Vec2Fixed> {
        if path.len() <= 2 {
            return path;
        }
        let mut smoothed = vec![path[0]];
        let mut anchor = 0;
        while anchor < path.len() - 1 {
            let mut furthest = anchor + 1;
            for candidate in (anchor + 2)..path.len() {
                if self.line_of_sight(path[anchor], path[candidate]) {
                    furthest = candidate;
                }
            }
            smoothed.push(path[furthest]);
            anchor = furthest;
        }
        smoothed
    }

    fn line_of_sight(&self, start: Vec2Fixed, end: Vec2Fixed) -> bool {
        let (Some((x0, y0)), Some((x1, y1))) = (self.world_to_grid(start), self.world_to_grid(end))
        else {
            return false;
        };
        let (x0, y0, x1, y1) = (x0 as i64, y0 as i64, x1 as i64, y1 as i64);
        let dx = (x1 - x0).abs();
        let dy = (y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx - dy;
        let (mut x, mut y) = (x0, y0);
        let open = |x: i64, y: i64| {
            u32::try_from(x).is_ok_and(|x| u32::try_from(y).is_ok_and(|y| self.walkable(x, y)))
        };

        loop {
            if !open(x, y) {
                return false;
            }
            if x == x1 && y == y1 {
                return true;
            }
            let e2 = 2 * err;
            if e2 > -dy && e2 < dx && !(open(x + sx, y) && open(x, y + sy)) {
                return false;
            }
            if e2 > -dy {
                err -= dy;
                x += sx;
            }
            if e2 < dx {
                err += dx;
                y += sy;
            }
        }
    }
}

impl PathService for NavGrid {
    fn path_distance(&self, from: Vec2Fixed, to: Vec2Fixed) -> Option<Fixed> {
        let waypoints = self.find_path(from, to)?;
        Some(
            waypoints
                .windows(2)
                .fold(Fixed::ZERO, |acc, w| acc + w[0].distance(w[1])),
        )
    }

    fn is_pathable(&self, point: Vec2Fixed) -> bool {
        self.world_to_grid(point)
            .is_some_and(|(x, y)| self.walkable(x, y))
    }
}

const NEIGHBORS: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

fn diagonal_cost() -> Fixed {
    ratio(1414, 1000)
}

/// Octile distance in cells, admissible for 8-directional movement.
fn octile(a: (u32, u32), b: (u32, u32)) -> Fixed {
    let dx = a.0.abs_diff(b.0);
    let dy = a.1.abs_diff(b.1);
    let (long, short) = if dx > dy { (dx, dy) } else { (dy, dx) };
    Fixed::from_num(long - short) + Fixed::from_num(short) * diagonal_cost()
}

/// Open-set entry ordered for a min-heap, ties broken by coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenNode {
    cell: (u32, u32),
    f_score: Fixed,
}

impl OpenNode {
    fn new(cell: (u32, u32), f_score: Fixed) -> Self {
        Self { cell, f_score }
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| (other.cell.1, other.cell.0).cmp(&(self.cell.1, self.cell.0)))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
