//! Bed leveling
//!
//! A [`LevelingSurface`] maps raw XY to a Z correction. Applying it turns a
//! logical (flat bed) point into the raw point the nozzle must reach;
//! unapplying recovers the logical point from a raw one. The correction is
//! optionally faded out linearly up to a fade height.

pub mod grid;
pub mod plane;
pub mod subdivision;

pub use grid::{
    GridLayout, HeightGrid, ProbeGrid, VirtualGrid, MAX_GRID_POINTS, MAX_SUBDIVISION,
    MAX_VIRTUAL_POINTS,
};
pub use plane::Plane;

use crate::config::{LevelingConfig, LevelingMode};
use crate::motion::Xyz;

/// Leveling errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LevelingError {
    /// Not enough probed points for the active mode
    InvalidGrid,
    /// Grid dimensions exceed the compiled capacity
    TooManyPoints,
    /// Samples do not define a plane
    Degenerate,
}

/// The bed compensation surface
#[derive(Debug, Clone)]
pub struct LevelingSurface {
    mode: LevelingMode,
    grid: ProbeGrid,
    virt: Option<VirtualGrid>,
    subdivision: usize,
    plane: Option<Plane>,
    fade_height: Option<f32>,
    enabled: bool,
    valid: bool,
}

impl LevelingSurface {
    /// Empty, disabled surface for the configured grid
    pub fn new(config: &LevelingConfig) -> Result<Self, LevelingError> {
        let points = [
            usize::from(config.grid_points[0].max(2)),
            usize::from(config.grid_points[1].max(2)),
        ];
        let grid = ProbeGrid::new(points, config.grid_min, config.spacing())?;
        let mut surface = Self {
            mode: config.mode,
            grid,
            virt: None,
            subdivision: usize::from(config.subdivision.max(1)),
            plane: None,
            fade_height: None,
            enabled: false,
            valid: false,
        };
        surface.set_fade_height(config.fade_height);
        Ok(surface)
    }

    pub fn mode(&self) -> LevelingMode {
        self.mode
    }

    pub fn grid(&self) -> &ProbeGrid {
        &self.grid
    }

    pub fn plane(&self) -> Option<&Plane> {
        self.plane.as_ref()
    }

    pub fn virtual_grid(&self) -> Option<&VirtualGrid> {
        self.virt.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enabled and backed by a valid surface
    pub fn is_active(&self) -> bool {
        self.enabled && self.valid
    }

    /// Turn compensation on or off
    ///
    /// Enabling an invalid surface leaves compensation off.
    pub fn set_enabled(&mut self, enable: bool) -> Result<(), LevelingError> {
        if enable && !self.valid {
            warn!("leveling not enabled: surface is invalid");
            self.enabled = false;
            return Err(LevelingError::InvalidGrid);
        }
        self.enabled = enable;
        Ok(())
    }

    pub fn fade_height(&self) -> Option<f32> {
        self.fade_height
    }

    /// Set the fade height; `None` or zero disables fading
    pub fn set_fade_height(&mut self, height: Option<f32>) {
        self.fade_height = height.filter(|h| *h > 0.0);
    }

    /// Set one probed node; the surface is invalid until [`finalize`](Self::finalize)
    pub fn set_point(&mut self, ix: usize, iy: usize, z: f32) -> Result<(), LevelingError> {
        self.grid.set(ix, iy, z)?;
        self.invalidate();
        Ok(())
    }

    /// Replace the whole grid and finalize it
    ///
    /// On error the surface is left invalid and disabled.
    pub fn load_grid(&mut self, grid: ProbeGrid) -> Result<(), LevelingError> {
        self.grid = grid;
        self.invalidate();
        self.finalize()
    }

    /// Forget all probed data
    pub fn reset(&mut self) {
        self.grid.clear();
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.valid = false;
        self.enabled = false;
        self.virt = None;
        self.plane = None;
    }

    /// Validate the probed data for the active mode and build derived data
    pub fn finalize(&mut self) -> Result<(), LevelingError> {
        self.valid = false;
        self.plane = None;

        let result = match self.mode {
            LevelingMode::None => Err(LevelingError::InvalidGrid),
            LevelingMode::Mesh => {
                if self.grid.is_complete() {
                    Ok(())
                } else {
                    Err(LevelingError::InvalidGrid)
                }
            }
            LevelingMode::Bilinear => {
                if self.grid.probed_count() == 0 {
                    Err(LevelingError::InvalidGrid)
                } else {
                    self.grid.extrapolate_unprobed();
                    Ok(())
                }
            }
            LevelingMode::Plane => {
                let grid = &self.grid;
                let samples = grid.nodes().filter_map(|(ix, iy)| {
                    let z = grid.get(ix, iy);
                    let [x, y] = grid.node_position(ix, iy);
                    (!z.is_nan()).then_some([x, y, z])
                });
                Plane::fit(samples).map(|plane| self.plane = Some(plane))
            }
        };

        match result {
            Ok(()) => {
                self.valid = true;
                self.refresh()?;
                info!("leveling surface ready");
                Ok(())
            }
            Err(e) => {
                warn!("leveling surface rejected: {}", e);
                self.enabled = false;
                Err(e)
            }
        }
    }

    /// Rebuild caches derived from the grid (the subdivided grid)
    ///
    /// Called after the grid or its spacing changes, never per query.
    pub fn refresh(&mut self) -> Result<(), LevelingError> {
        self.virt = None;
        if self.valid && self.mode == LevelingMode::Bilinear && self.subdivision > 1 {
            self.virt = Some(subdivision::subdivide(&self.grid, self.subdivision)?);
        }
        Ok(())
    }

    /// Unfaded correction at raw XY; zero while the surface is invalid
    pub fn correction(&self, x: f32, y: f32) -> f32 {
        if !self.valid {
            return 0.0;
        }
        match self.mode {
            LevelingMode::None => 0.0,
            LevelingMode::Mesh => self.grid.interpolate(x, y),
            LevelingMode::Bilinear => match &self.virt {
                Some(virt) => virt.interpolate(x, y),
                None => self.grid.interpolate(x, y),
            },
            LevelingMode::Plane => self.plane.map_or(0.0, |p| p.z_at(x, y)),
        }
    }

    /// Fraction of the correction applied at raw height `z`
    pub fn fade_factor(&self, z: f32) -> f32 {
        match self.fade_height {
            None => 1.0,
            Some(h) if z >= h => 0.0,
            Some(h) => (1.0 - z / h).max(0.0),
        }
    }

    /// Correction actually applied at a raw point
    ///
    /// Exactly zero at or above the fade height.
    pub fn query(&self, x: f32, y: f32, z: f32) -> f32 {
        if !self.is_active() {
            return 0.0;
        }
        let factor = self.fade_factor(z);
        if factor == 0.0 {
            return 0.0;
        }
        self.correction(x, y) * factor
    }

    /// Logical → raw: add the faded correction
    pub fn apply(&self, p: Xyz) -> Xyz {
        Xyz::new(p.x, p.y, p.z + self.query(p.x, p.y, p.z))
    }

    /// Raw → logical: exact inverse of [`apply`](Self::apply)
    pub fn unapply(&self, p: Xyz) -> Xyz {
        if !self.is_active() {
            return p;
        }
        let m = self.correction(p.x, p.y);
        let z = match self.fade_height {
            None => p.z - m,
            // For z < h the raw height is z + m·(1 − z/h); solve for z
            Some(h) if p.z < h => (p.z - m) / (1.0 - m / h),
            Some(_) => p.z,
        };
        Xyz::new(p.x, p.y, z)
    }

    /// Cell boundaries moves must be split at, while a grid surface is active
    pub fn split_layout(&self) -> Option<GridLayout> {
        if !self.is_active() {
            return None;
        }
        match self.mode {
            LevelingMode::Mesh => Some(self.grid.layout()),
            LevelingMode::Bilinear => Some(
                self.virt
                    .as_ref()
                    .map_or_else(|| self.grid.layout(), |v| v.layout()),
            ),
            LevelingMode::None | LevelingMode::Plane => None,
        }
    }
}
