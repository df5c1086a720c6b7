//! Least-squares bed plane

use super::LevelingError;

/// `z = a·x + b·y + c`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Plane {
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

impl Plane {
    /// Fit a plane through `(x, y, z)` samples
    ///
    /// Needs at least three samples that are not collinear.
    pub fn fit(samples: impl Iterator<Item = [f32; 3]> + Clone) -> Result<Self, LevelingError> {
        let mut n = 0usize;
        let (mut sx, mut sy, mut sz) = (0.0f32, 0.0f32, 0.0f32);
        for [x, y, z] in samples.clone() {
            n += 1;
            sx += x;
            sy += y;
            sz += z;
        }
        if n < 3 {
            return Err(LevelingError::Degenerate);
        }
        let inv_n = 1.0 / n as f32;
        let (mx, my, mz) = (sx * inv_n, sy * inv_n, sz * inv_n);

        // Normal equations on centered data
        let (mut sxx, mut syy, mut sxy, mut sxz, mut syz) = (0.0f32, 0.0f32, 0.0f32, 0.0f32, 0.0f32);
        for [x, y, z] in samples {
            let (dx, dy, dz) = (x - mx, y - my, z - mz);
            sxx += dx * dx;
            syy += dy * dy;
            sxy += dx * dy;
            sxz += dx * dz;
            syz += dy * dz;
        }

        let det = sxx * syy - sxy * sxy;
        if !(det > 1e-6 * sxx * syy) {
            return Err(LevelingError::Degenerate);
        }
        let a = (sxz * syy - syz * sxy) / det;
        let b = (syz * sxx - sxz * sxy) / det;
        Ok(Self {
            a,
            b,
            c: mz - a * mx - b * my,
        })
    }

    pub fn z_at(&self, x: f32, y: f32) -> f32 {
        self.a * x + self.b * y + self.c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_point_fit_is_exact() {
        let pts = [[0.0, 0.0, 0.1], [100.0, 0.0, 0.3], [0.0, 100.0, -0.1]];
        let plane = Plane::fit(pts.iter().copied()).unwrap();
        for [x, y, z] in pts {
            assert!((plane.z_at(x, y) - z).abs() < 1e-5);
        }
        assert!((plane.a - 0.002).abs() < 1e-6);
        assert!((plane.b + 0.002).abs() < 1e-6);
    }

    #[test]
    fn test_least_squares_averages_noise() {
        // Symmetric noise around z = 0.5 cancels out
        let pts = [
            [0.0, 0.0, 0.6],
            [10.0, 0.0, 0.4],
            [0.0, 10.0, 0.4],
            [10.0, 10.0, 0.6],
        ];
        let plane = Plane::fit(pts.iter().copied()).unwrap();
        assert!(plane.a.abs() < 1e-6);
        assert!(plane.b.abs() < 1e-6);
        assert!((plane.c - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_collinear_rejected() {
        let pts = [[0.0, 0.0, 0.0], [10.0, 10.0, 1.0], [20.0, 20.0, 2.0]];
        assert_eq!(Plane::fit(pts.iter().copied()), Err(LevelingError::Degenerate));
    }

    #[test]
    fn test_too_few_points() {
        let pts = [[0.0, 0.0, 0.0], [10.0, 0.0, 1.0]];
        assert_eq!(Plane::fit(pts.iter().copied()), Err(LevelingError::Degenerate));
    }
}
