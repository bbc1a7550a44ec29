// Space Vector PWM (SVPWM) generation
//
// Midpoint-clamp strategy: the normalized αβ voltage is expanded to three
// phase voltages, the common mode is shifted so that (max + min) / 2 sits at
// 50% duty, and each duty is clamped to [0, 1]. Inside the linear region
// (|V| / Vbus ≤ 1/√3) the clamp never engages; beyond it the output saturates
// instead of leaving the valid duty range.

use super::transforms::inverse_clarke;

/// Calculate Space Vector PWM duty cycles
///
/// # Arguments
/// * `v_alpha_norm` - Alpha-axis voltage normalized by bus voltage
/// * `v_beta_norm` - Beta-axis voltage normalized by bus voltage
///
/// # Returns
/// Duty cycles [u, v, w], each in 0.0..=1.0
pub fn calculate_svpwm(v_alpha_norm: f32, v_beta_norm: f32) -> [f32; 3] {
    let (va, vb, vc) = inverse_clarke(v_alpha_norm, v_beta_norm);

    let v_max = va.max(vb).max(vc);
    let v_min = va.min(vb).min(vc);
    let shift = 0.5 - (v_max + v_min) / 2.0;

    [
        (va + shift).clamp(0.0, 1.0),
        (vb + shift).clamp(0.0, 1.0),
        (vc + shift).clamp(0.0, 1.0),
    ]
}
