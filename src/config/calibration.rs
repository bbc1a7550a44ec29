//! キャリブレーションパラメータ
//!
//! モーター・制御ループの定数一式。コマンド層が書き込み、制御タスクは毎サイクル読み取り専用で参照します。

use super::params::{self, adc, defaults};
use crate::foc::AngleCorrection;

/// ADC生値から物理量への線形変換係数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdcScale {
    /// 電流ゼロ点のADC値
    pub current_zero: f32,
    /// 1カウントあたりの電流 [A]
    pub amps_per_count: f32,
    /// 1カウントあたりの電圧 [V]
    pub volts_per_count: f32,
}

impl AdcScale {
    /// ボード定数から生成
    pub const fn board() -> Self {
        Self {
            current_zero: adc::CURRENT_ZERO_COUNTS,
            amps_per_count: adc::AMPS_PER_COUNT,
            volts_per_count: adc::VOLTS_PER_COUNT,
        }
    }

    /// ADC平均値 → 相電流 [A]（符号付き、中点基準）
    #[inline]
    pub fn current(&self, counts: f32) -> f32 {
        (counts - self.current_zero) * self.amps_per_count
    }

    /// ADC平均値 → 電圧 [V]
    #[inline]
    pub fn voltage(&self, counts: f32) -> f32 {
        counts * self.volts_per_count
    }

    /// 計測可能な最大電流 [A]（電流ループの入力制限に使用）
    pub fn current_max(&self) -> f32 {
        self.current_zero * self.amps_per_count
    }
}

/// キャリブレーションパラメータ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// 電気角ゼロのエンコーダカウント
    pub erev_start: u16,
    /// 機械1回転あたりの電気回転数（極対数）
    pub erevs_per_mrev: u16,
    /// 相順反転（β軸の符号反転）
    pub flip_phases: bool,

    // === 電流ループ ===
    pub foc_kp_d: f32,
    pub foc_ki_d: f32,
    pub foc_kp_q: f32,
    pub foc_ki_q: f32,

    // === 速度・位置ループ ===
    pub velocity_kp: f32,
    pub velocity_ki: f32,
    pub position_kp: f32,
    pub position_ki: f32,

    /// 速度ループ出力制限 [N·m]
    pub torque_limit: f32,
    /// 位置ループ出力制限 [rad/s]
    pub velocity_limit: f32,

    /// 機械原点オフセット [rad]
    pub position_offset: f32,

    /// 巻線抵抗 [Ω]
    pub motor_resistance: f32,
    /// トルク定数 [N·m/A]
    pub motor_torque_const: f32,

    /// 指令タイムアウト [ms]（0で無効）
    pub control_timeout_ms: u16,

    /// 速度ローパスフィルタ係数 α（0.0～1.0）
    pub velocity_filter_param: f32,

    /// エンコーダ角度補正
    pub angle_correction: AngleCorrection,

    /// ADC変換係数
    pub adc: AdcScale,
}

impl Calibration {
    /// デフォルト設定を生成（params.rsの値を使用）
    pub const fn default() -> Self {
        Self {
            erev_start: 0,
            erevs_per_mrev: defaults::EREVS_PER_MREV,
            flip_phases: false,
            foc_kp_d: defaults::FOC_KP_D,
            foc_ki_d: defaults::FOC_KI_D,
            foc_kp_q: defaults::FOC_KP_Q,
            foc_ki_q: defaults::FOC_KI_Q,
            velocity_kp: defaults::VELOCITY_KP,
            velocity_ki: defaults::VELOCITY_KI,
            position_kp: defaults::POSITION_KP,
            position_ki: defaults::POSITION_KI,
            torque_limit: defaults::TORQUE_LIMIT,
            velocity_limit: defaults::VELOCITY_LIMIT,
            position_offset: 0.0,
            motor_resistance: defaults::MOTOR_RESISTANCE,
            motor_torque_const: defaults::MOTOR_TORQUE_CONST,
            control_timeout_ms: defaults::CONTROL_TIMEOUT_MS,
            velocity_filter_param: defaults::VELOCITY_FILTER_PARAM,
            angle_correction: AngleCorrection::disabled(),
            adc: AdcScale::board(),
        }
    }

    /// 電気角ゼロ位置 [rad]（機械角）
    #[inline]
    pub fn electrical_zero(&self) -> f32 {
        self.erev_start as f32 * params::RAD_PER_ENC_TICK
    }
}
