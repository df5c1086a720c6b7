//! Catmull-Rom subdivision of a probed grid
//!
//! Produces a denser grid of `(n - 1) * factor + 1` nodes per axis whose
//! values pass through the probed nodes. The probed grid is padded by one
//! node on every side using linear extrapolation `2·edge − inner` so the
//! spline has four control points everywhere.

use super::grid::{ProbeGrid, VirtualGrid, MAX_SUBDIVISION};
use super::LevelingError;

/// Catmull-Rom interpolation between `p[1]` and `p[2]` at `t` in `[0, 1]`
fn catmull_rom(p: [f32; 4], t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * (p[0] * (-t + 2.0 * t2 - t3)
        + p[1] * (2.0 - 5.0 * t2 + 3.0 * t3)
        + p[2] * (t + 4.0 * t2 - 3.0 * t3)
        - p[3] * (t2 - t3))
}

/// Value of the padded grid, where padded index 0 and `n + 1` lie outside
/// the probed grid
fn padded(grid: &ProbeGrid, px: usize, py: usize) -> f32 {
    let (nx, ny) = (grid.nx(), grid.ny());
    let px = px.min(nx + 1);
    let py = py.min(ny + 1);

    if px == 0 || px == nx + 1 {
        let (edge, inner) = if px == 0 { (0, 1) } else { (nx - 1, nx - 2) };
        return if (1..=ny).contains(&py) {
            2.0 * grid.get(edge, py - 1) - grid.get(inner, py - 1)
        } else {
            // Corner of the padding: extrapolate along X from padded column values
            2.0 * padded(grid, edge + 1, py) - padded(grid, inner + 1, py)
        };
    }
    if py == 0 || py == ny + 1 {
        let (edge, inner) = if py == 0 { (0, 1) } else { (ny - 1, ny - 2) };
        return 2.0 * grid.get(px - 1, edge) - grid.get(px - 1, inner);
    }
    grid.get(px - 1, py - 1)
}

/// Spline value inside probed cell `(cx, cy)` at fractions `(tx, ty)`
fn bicubic(grid: &ProbeGrid, cx: usize, cy: usize, tx: f32, ty: f32) -> f32 {
    // Probed node (cx, cy) is padded node (cx + 1, cy + 1); control points
    // run from padded cx .. cx + 3
    let mut row = [0.0; 4];
    for (i, r) in row.iter_mut().enumerate() {
        let mut column = [0.0; 4];
        for (j, c) in column.iter_mut().enumerate() {
            *c = padded(grid, cx + i, cy + j);
        }
        *r = catmull_rom(column, ty);
    }
    catmull_rom(row, tx)
}

/// Build the subdivided grid for `grid`
///
/// `factor` 1 copies the grid unchanged. Every probed node must hold a
/// value.
pub fn subdivide(grid: &ProbeGrid, factor: usize) -> Result<VirtualGrid, LevelingError> {
    if factor == 0 || factor > MAX_SUBDIVISION {
        return Err(LevelingError::InvalidGrid);
    }
    if !grid.is_complete() {
        return Err(LevelingError::InvalidGrid);
    }

    let layout = grid.layout();
    let points = [
        (layout.points[0] - 1) * factor + 1,
        (layout.points[1] - 1) * factor + 1,
    ];
    let spacing = [
        layout.spacing[0] / factor as f32,
        layout.spacing[1] / factor as f32,
    ];
    let mut virt = VirtualGrid::new(points, layout.origin, spacing)?;

    for cx in 0..layout.points[0] {
        for cy in 0..layout.points[1] {
            for tx in 0..factor {
                for ty in 0..factor {
                    let last_x = cx == layout.points[0] - 1;
                    let last_y = cy == layout.points[1] - 1;
                    if (tx > 0 && last_x) || (ty > 0 && last_y) {
                        continue;
                    }
                    let z = if tx == 0 && ty == 0 {
                        grid.get(cx, cy)
                    } else {
                        bicubic(
                            grid,
                            cx,
                            cy,
                            tx as f32 / factor as f32,
                            ty as f32 / factor as f32,
                        )
                    };
                    virt.set(cx * factor + tx, cy * factor + ty, z)?;
                }
            }
        }
    }

    debug!("subdivided {}x{} grid by {}", layout.points[0], layout.points[1], factor);
    Ok(virt)
}
