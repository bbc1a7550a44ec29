//! 位置・速度ループ
//!
//! どちらもモードに含まれる時だけ `Auto`。それ以外は `Manual` に保持して積分を止めます。
//! ゲインと制限は毎サイクルキャリブレーションから読み直します。

use super::estimator::EstimatedState;
use crate::config::params::{CONTROL_PERIOD_S, POSITION_INPUT_LIMIT, VELOCITY_INPUT_LIMIT};
use crate::config::{Calibration, Parameters};
use crate::foc::{LoopMode, PiController};

/// 位置ループ: 位置誤差 → 速度指令
pub struct PositionController {
    pid: PiController,
}

impl PositionController {
    pub const fn new() -> Self {
        Self {
            pid: PiController::new_symmetric(0.0, 0.0, 0.0),
        }
    }

    /// 1サイクル分の更新
    ///
    /// # Returns
    /// 有効なら速度指令 [rad/s]、無効なら `None`（外部の速度指令をそのまま使う）
    pub fn update(
        &mut self,
        active: bool,
        state: &EstimatedState,
        params: &Parameters,
        calib: &Calibration,
    ) -> Option<f32> {
        if !active {
            self.pid.set_mode(LoopMode::Manual);
            return None;
        }

        self.pid.set_mode(LoopMode::Auto);
        self.pid.set_gains(calib.position_kp, calib.position_ki);
        self.pid.set_symmetric_limit(calib.velocity_limit);
        self.pid
            .set_input_limits(-POSITION_INPUT_LIMIT, POSITION_INPUT_LIMIT);
        self.pid.set_bias(0.0);

        // 目標は常に0、プロセス値は（実位置 − 指令位置）
        Some(
            self.pid
                .update(0.0, state.position - params.position_sp, CONTROL_PERIOD_S),
        )
    }

    pub fn controller(&self) -> &PiController {
        &self.pid
    }
}

impl Default for PositionController {
    fn default() -> Self {
        Self::new()
    }
}

/// 速度ループ: 速度誤差 → トルク指令
pub struct VelocityController {
    pid: PiController,
}

impl VelocityController {
    pub const fn new() -> Self {
        Self {
            pid: PiController::new_symmetric(0.0, 0.0, 0.0),
        }
    }

    /// 1サイクル分の更新
    ///
    /// # Arguments
    /// * `velocity_command` - 速度指令（位置ループ出力または外部指令）
    ///
    /// # Returns
    /// 有効ならトルク指令 [N·m]、無効なら `None`
    pub fn update(
        &mut self,
        active: bool,
        velocity_command: f32,
        state: &EstimatedState,
        calib: &Calibration,
    ) -> Option<f32> {
        if !active {
            self.pid.set_mode(LoopMode::Manual);
            return None;
        }

        self.pid.set_mode(LoopMode::Auto);
        self.pid.set_gains(calib.velocity_kp, calib.velocity_ki);
        self.pid.set_symmetric_limit(calib.torque_limit);
        self.pid
            .set_input_limits(-VELOCITY_INPUT_LIMIT, VELOCITY_INPUT_LIMIT);
        self.pid.set_bias(0.0);

        Some(
            self.pid
                .update(velocity_command, state.velocity, CONTROL_PERIOD_S),
        )
    }

    pub fn controller(&self) -> &PiController {
        &self.pid
    }
}

impl Default for VelocityController {
    fn default() -> Self {
        Self::new()
    }
}
