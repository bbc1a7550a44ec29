//! ランタイムパラメータ（制御モードと各指令値）
//!
//! コマンド層が書き込み、制御タスクが毎サイクル1回読み取ります。

use crate::control::ControlMode;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parameters {
    /// 制御モード
    pub control_mode: ControlMode,
    /// 位置指令 [rad]
    pub position_sp: f32,
    /// 速度指令 [rad/s]
    pub velocity_sp: f32,
    /// トルク指令 [N·m]
    pub torque_sp: f32,
    /// d軸電流指令 [A]
    pub foc_d_current_sp: f32,
    /// q軸電流指令 [A]
    pub foc_q_current_sp: f32,
    /// RawPwmモードの相デューティ
    pub phase_duty: [f32; 3],
    /// DirectDriveVoltageモードのq軸電圧 [V]
    pub drive_voltage: f32,
    /// トルク定数に掛ける実行時スケール（ブレーキ時に0）
    pub torque_scale: f32,
}

impl Parameters {
    /// 起動時の設定: FocCurrentで電流指令ゼロ
    pub const fn default() -> Self {
        Self {
            control_mode: ControlMode::FocCurrent,
            position_sp: 0.0,
            velocity_sp: 0.0,
            torque_sp: 0.0,
            foc_d_current_sp: 0.0,
            foc_q_current_sp: 0.0,
            phase_duty: [0.0; 3],
            drive_voltage: 0.0,
            torque_scale: 1.0,
        }
    }

    /// ブレーキ状態を強制
    ///
    /// 電流ループ（バイパスではなく）でトルクゼロに駆動し、逆起電力補償を止めて減衰させる。
    /// `torque_scale` は自動では戻さない（コマンド層が明示的に戻す）。
    pub fn brake(&mut self) {
        self.foc_d_current_sp = 0.0;
        self.foc_q_current_sp = 0.0;
        self.torque_scale = 0.0;
        self.control_mode = ControlMode::FocCurrent;
    }
}
