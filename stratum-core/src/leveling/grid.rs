//! Regular height grids
//!
//! A grid is a lattice of Z values over raw XY. Unprobed nodes hold NaN.
//! The same type backs both the probed grid and the spline-densified
//! virtual grid; only the capacity differs.

use super::LevelingError;
use crate::math;

/// Maximum probe points per grid axis
pub const MAX_GRID_POINTS: usize = 7;

/// Largest spline subdivision factor
pub const MAX_SUBDIVISION: usize = 4;

/// Maximum points per axis of the subdivided grid
pub const MAX_VIRTUAL_POINTS: usize = (MAX_GRID_POINTS - 1) * MAX_SUBDIVISION + 1;

/// Geometry of a grid: where its nodes and cell boundaries are
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GridLayout {
    /// Node count along X and Y
    pub points: [usize; 2],
    /// Raw XY of node (0, 0)
    pub origin: [f32; 2],
    /// Distance between nodes along X and Y
    pub spacing: [f32; 2],
}

impl GridLayout {
    /// Cell containing `coord` on axis 0 (X) or 1 (Y), clamped to the grid
    pub fn cell_index(&self, dim: usize, coord: f32) -> usize {
        let cells = self.points[dim].saturating_sub(1).max(1);
        let idx = math::floor((coord - self.origin[dim]) / self.spacing[dim]);
        if idx <= 0.0 {
            0
        } else {
            (idx as usize).min(cells - 1)
        }
    }

    /// Coordinate of grid line `index` on axis `dim`
    pub fn line(&self, dim: usize, index: usize) -> f32 {
        self.origin[dim] + self.spacing[dim] * index as f32
    }

    /// Number of cells along axis `dim`
    pub fn cells(&self, dim: usize) -> usize {
        self.points[dim].saturating_sub(1)
    }
}

/// Height grid with a compile-time capacity of `N` × `N` nodes
#[derive(Debug, Clone, PartialEq)]
pub struct HeightGrid<const N: usize> {
    layout: GridLayout,
    z: [[f32; N]; N],
}

/// The probed grid
pub type ProbeGrid = HeightGrid<MAX_GRID_POINTS>;

/// The spline-densified grid
pub type VirtualGrid = HeightGrid<MAX_VIRTUAL_POINTS>;

impl<const N: usize> HeightGrid<N> {
    /// Create an all-unprobed grid
    pub fn new(points: [usize; 2], origin: [f32; 2], spacing: [f32; 2]) -> Result<Self, LevelingError> {
        if points.iter().any(|&n| !(2..=N).contains(&n)) {
            return Err(LevelingError::TooManyPoints);
        }
        if !(spacing[0] > 0.0) || !(spacing[1] > 0.0) {
            return Err(LevelingError::InvalidGrid);
        }
        Ok(Self {
            layout: GridLayout {
                points,
                origin,
                spacing,
            },
            z: [[f32::NAN; N]; N],
        })
    }

    pub fn layout(&self) -> GridLayout {
        self.layout
    }

    pub fn nx(&self) -> usize {
        self.layout.points[0]
    }

    pub fn ny(&self) -> usize {
        self.layout.points[1]
    }

    /// Raw XY of node `(ix, iy)`
    pub fn node_position(&self, ix: usize, iy: usize) -> [f32; 2] {
        [self.layout.line(0, ix), self.layout.line(1, iy)]
    }

    /// Z at a node; NaN if unprobed or outside the grid
    pub fn get(&self, ix: usize, iy: usize) -> f32 {
        if ix < self.nx() && iy < self.ny() {
            self.z[ix][iy]
        } else {
            f32::NAN
        }
    }

    /// Z at a signed node index; NaN outside the grid
    fn get_signed(&self, ix: isize, iy: isize) -> f32 {
        if ix < 0 || iy < 0 {
            return f32::NAN;
        }
        self.get(ix as usize, iy as usize)
    }

    fn contains_signed(&self, ix: isize, iy: isize) -> bool {
        ix >= 0 && iy >= 0 && (ix as usize) < self.nx() && (iy as usize) < self.ny()
    }

    pub fn set(&mut self, ix: usize, iy: usize, z: f32) -> Result<(), LevelingError> {
        if ix >= self.nx() || iy >= self.ny() {
            return Err(LevelingError::InvalidGrid);
        }
        self.z[ix][iy] = z;
        Ok(())
    }

    /// Mark every node unprobed
    pub fn clear(&mut self) {
        self.z = [[f32::NAN; N]; N];
    }

    /// Number of probed nodes
    pub fn probed_count(&self) -> usize {
        self.nodes().filter(|&(ix, iy)| !self.z[ix][iy].is_nan()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.probed_count() == self.nx() * self.ny()
    }

    /// All node indices, X-major
    pub fn nodes(&self) -> impl Iterator<Item = (usize, usize)> + Clone {
        let (nx, ny) = (self.nx(), self.ny());
        (0..nx).flat_map(move |ix| (0..ny).map(move |iy| (ix, iy)))
    }

    /// Bilinear interpolation at raw XY
    ///
    /// Outside the grid the edge cell is used with its ratio clamped, so the
    /// surface holds its edge height rather than extrapolating.
    pub fn interpolate(&self, x: f32, y: f32) -> f32 {
        let cx = self.layout.cell_index(0, x);
        let cy = self.layout.cell_index(1, y);

        let rx = ((x - self.layout.line(0, cx)) / self.layout.spacing[0]).clamp(0.0, 1.0);
        let ry = ((y - self.layout.line(1, cy)) / self.layout.spacing[1]).clamp(0.0, 1.0);

        let z00 = self.z[cx][cy];
        let z10 = self.z[cx + 1][cy];
        let z01 = self.z[cx][cy + 1];
        let z11 = self.z[cx + 1][cy + 1];

        let bottom = z00 + (z10 - z00) * rx;
        let top = z01 + (z11 - z01) * rx;
        bottom + (top - bottom) * ry
    }

    /// Fill every unprobed node by linear extrapolation from its neighbors
    ///
    /// Nodes are visited from the center outward so that filled inner nodes
    /// feed the outer ones.
    pub fn extrapolate_unprobed(&mut self) {
        let (nx, ny) = (self.nx(), self.ny());
        let (ctrx1, ctrx2) = ((nx - 1) / 2, nx / 2);
        let (ctry1, ctry2) = ((ny - 1) / 2, ny / 2);

        for xo in 0..=ctrx1 {
            for yo in 0..=ctry1 {
                let (x1, x2) = (ctrx1 - xo, ctrx2 + xo);
                let (y1, y2) = (ctry1 - yo, ctry2 + yo);
                self.extrapolate_one(x1, y1, 1, 1);
                self.extrapolate_one(x2, y1, -1, 1);
                self.extrapolate_one(x1, y2, 1, -1);
                self.extrapolate_one(x2, y2, -1, -1);
            }
        }
    }

    /// Average of the X, Y and diagonal projections toward the center
    fn extrapolate_one(&mut self, x: usize, y: usize, xdir: isize, ydir: isize) {
        if x >= self.nx() || y >= self.ny() || !self.z[x][y].is_nan() {
            return;
        }
        let (xi, yi) = (x as isize, y as isize);
        // A far node off the grid projects flat from the near node; an
        // unprobed far node inside the grid counts as zero.
        let project = |dx: isize, dy: isize| {
            let near = self.get_signed(xi + dx, yi + dy);
            let far = if self.contains_signed(xi + dx * 2, yi + dy * 2) {
                let far = self.get_signed(xi + dx * 2, yi + dy * 2);
                if far.is_nan() { 0.0 } else { far }
            } else if near.is_nan() {
                0.0
            } else {
                near
            };
            let near = if near.is_nan() { far } else { near };
            2.0 * near - far
        };

        let a = project(xdir, 0);
        let b = project(0, ydir);
        let c = project(xdir, ydir);

        self.z[x][y] = (a + b + c) / 3.0;
        trace!("extrapolated node ({}, {}) = {}", x, y, self.z[x][y]);
    }
}
