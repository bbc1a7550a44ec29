// Coordinate transformations for FOC (Field Oriented Control)
// Clarke / Park and their inverses, plus the shared cos/sin evaluation

use core::f32::consts::TAU;

const SQRT3_DIV_2: f32 = 0.866_025_4; // sqrt(3) / 2
const ONE_DIV_SQRT3: f32 = 0.577_350_3; // 1 / sqrt(3)

/// cos/sin of the electrical angle, computed once per cycle and reused
/// by the forward and inverse Park transforms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CosSin {
    pub cos: f32,
    pub sin: f32,
}

impl CosSin {
    /// Evaluate cos/sin of `theta` (radians, any range)
    ///
    /// # Implementation
    /// Uses idsp::cossin() (~40 cycles on Cortex-M) instead of libm::cosf/sinf
    /// (~100-200 cycles). The angle is wrapped to one turn and mapped onto the
    /// full u32 phase range, so large multi-turn electrical angles are fine.
    pub fn new(theta: f32) -> Self {
        let turns = theta / TAU;
        let frac = turns - libm::floorf(turns);

        // [0, 1) turn → [0, 2^32) phase; i32 reinterpretation covers [-π, π)
        const TURN_TO_PHASE: f32 = 4_294_967_296.0;
        let phase = (frac * TURN_TO_PHASE) as u32 as i32;

        let (cos_i32, sin_i32) = idsp::cossin(phase);

        const I32_TO_F32: f32 = 1.0 / 2_147_483_648.0; // 1 / 2^31
        Self {
            cos: cos_i32 as f32 * I32_TO_F32,
            sin: sin_i32 as f32 * I32_TO_F32,
        }
    }
}

/// Clarke transformation (abc → αβ), amplitude invariant
///
/// # Returns
/// Tuple of (alpha, beta)
#[inline]
pub fn clarke(a: f32, b: f32, c: f32) -> (f32, f32) {
    let alpha = (2.0 * a - b - c) / 3.0;
    let beta = (b - c) * ONE_DIV_SQRT3;
    (alpha, beta)
}

/// Inverse Clarke transformation (αβ → abc/uvw)
///
/// # Returns
/// Tuple of (a, b, c) three-phase quantities
#[inline]
pub fn inverse_clarke(alpha: f32, beta: f32) -> (f32, f32, f32) {
    const ONE_DIV_2: f32 = 0.5;

    let a = alpha;
    let b = -ONE_DIV_2 * alpha + SQRT3_DIV_2 * beta;
    let c = -ONE_DIV_2 * alpha - SQRT3_DIV_2 * beta;

    (a, b, c)
}

/// Park transformation (αβ → dq)
///
/// # Returns
/// Tuple of (d, q) in the rotor frame
#[inline]
pub fn park(alpha: f32, beta: f32, angle: CosSin) -> (f32, f32) {
    let d = alpha * angle.cos + beta * angle.sin;
    let q = -alpha * angle.sin + beta * angle.cos;
    (d, q)
}

/// Inverse Park transformation (dq → αβ)
///
/// # Returns
/// Tuple of (alpha, beta) in the stationary frame
#[inline]
pub fn inverse_park(d: f32, q: f32, angle: CosSin) -> (f32, f32) {
    let alpha = d * angle.cos - q * angle.sin;
    let beta = d * angle.sin + q * angle.cos;
    (alpha, beta)
}
