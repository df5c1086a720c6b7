//! Float helpers
//!
//! `core` has no transcendental functions, so these route through `libm`.

#[inline]
pub fn sqrt(x: f32) -> f32 {
    libm::sqrtf(x)
}

#[inline]
pub fn abs(x: f32) -> f32 {
    libm::fabsf(x)
}

#[inline]
pub fn floor(x: f32) -> f32 {
    libm::floorf(x)
}

#[inline]
pub fn round(x: f32) -> f32 {
    libm::roundf(x)
}

#[inline]
pub fn sin(x: f32) -> f32 {
    libm::sinf(x)
}

#[inline]
pub fn cos(x: f32) -> f32 {
    libm::cosf(x)
}

#[inline]
pub fn atan2(y: f32, x: f32) -> f32 {
    libm::atan2f(y, x)
}

/// Squared length of a 2D vector
#[inline]
pub fn hypot2(x: f32, y: f32) -> f32 {
    x * x + y * y
}

/// Treats magnitudes below a micron-scale threshold as zero
#[inline]
pub fn near_zero(x: f32) -> bool {
    abs(x) < 0.000_01
}
