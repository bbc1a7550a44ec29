//! 制御ループ
//!
//! 1サイクル = ウォッチドッグ → 状態推定 → 位置ループ → 速度ループ → 電流ループ → PWM出力。
//! サイクルは割り込みからの起動通知（`SharedState::trigger_cycle`）だけで駆動されます。

pub mod cascade;
pub mod current;
pub mod estimator;
pub mod mode;
pub mod watchdog;

use embassy_time::Instant;

pub use cascade::{PositionController, VelocityController};
pub use current::{CurrentController, CurrentOutput};
pub use estimator::{EstimatedState, Estimator};
pub use mode::{Cascade, ControlMode, CurrentStage, InvalidControlMode};
pub use watchdog::Watchdog;

use crate::fmt::*;
use crate::ivsense::PhaseSampler;
use crate::motor_driver::PhaseDriver;
use crate::sensor::RotarySensor;
use crate::state::SharedState;
use crate::telemetry::TelemetrySink;

/// 直近サイクルの結果（コマンド層・監視用）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlStatus {
    pub state: EstimatedState,
    pub control_mode: ControlMode,
    /// 速度ループへの指令（位置ループ出力または外部指令）[rad/s]
    pub velocity_command: f32,
    /// 電流ループへのトルク指令 [N·m]
    pub torque_command: f32,
    /// 出力したデューティ
    pub duty: [f32; 3],
    pub watchdog_tripped: bool,
}

impl ControlStatus {
    pub const fn new() -> Self {
        Self {
            state: EstimatedState::new(),
            control_mode: ControlMode::FocCurrent,
            velocity_command: 0.0,
            torque_command: 0.0,
            duty: [0.5; 3],
            watchdog_tripped: false,
        }
    }
}

impl Default for ControlStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// 制御ループ本体
///
/// センサー・ADC・PWM・テレメトリを所有し、共有状態は参照で受け取ります。
pub struct ControlLoop<'a, S, A, D, T> {
    shared: &'a SharedState,
    sensor: S,
    sampler: A,
    driver: D,
    telemetry: T,
    estimator: Estimator,
    position: PositionController,
    velocity: VelocityController,
    current: CurrentController,
    watchdog: Watchdog,
    last_mode: Option<ControlMode>,
}

impl<'a, S, A, D, T> ControlLoop<'a, S, A, D, T>
where
    S: RotarySensor,
    A: PhaseSampler,
    D: PhaseDriver,
    T: TelemetrySink,
{
    pub fn new(shared: &'a SharedState, sensor: S, sampler: A, driver: D, telemetry: T) -> Self {
        Self {
            shared,
            sensor,
            sampler,
            driver,
            telemetry,
            estimator: Estimator::new(),
            position: PositionController::new(),
            velocity: VelocityController::new(),
            current: CurrentController::new(),
            watchdog: Watchdog::new(),
            last_mode: None,
        }
    }

    /// 最初のセンサー読み取りを発行
    pub fn arm(&mut self) {
        self.sensor.begin_read();
    }

    /// 1サイクル実行
    ///
    /// # Arguments
    /// * `now` - サイクル開始時刻（ウォッチドッグ判定に使用）
    pub fn run_cycle(&mut self, now: Instant) -> ControlStatus {
        let calib = self.shared.calibration();

        // === ウォッチドッグ ===
        let tripped =
            self.watchdog
                .check(calib.control_timeout_ms, self.shared.last_command(), now);
        if tripped {
            self.shared.update_parameters(|p| p.brake());
        }

        // このサイクルで使うパラメータを確定
        let params = self.shared.parameters();
        if self.last_mode != Some(params.control_mode) {
            info!("Control mode: {:?}", params.control_mode);
            self.last_mode = Some(params.control_mode);
        }

        // === 状態推定 ===
        let reading = self.sensor.fetch_result();
        self.estimator.update_angle(reading, &calib);
        self.sampler.capture();
        self.estimator.update_phases(&self.sampler, &calib);
        self.telemetry.record(&self.estimator.telemetry_sample());

        let cascade = params.control_mode.cascade();
        let state = *self.estimator.state();

        // === 位置・速度ループ ===
        let velocity_command = self
            .position
            .update(cascade.position, &state, &params, &calib)
            .unwrap_or(params.velocity_sp);
        let torque_command = self
            .velocity
            .update(cascade.velocity, velocity_command, &state, &calib)
            .unwrap_or(params.torque_sp);

        // === 電流ループ ===
        let output = self
            .current
            .update(cascade.current, &params, torque_command, &state, &calib);
        if let Some((id, iq)) = output.dq {
            self.estimator.set_dq_currents(id, iq);
        }

        self.driver.set_duties(output.duties);

        let status = ControlStatus {
            state: *self.estimator.state(),
            control_mode: params.control_mode,
            velocity_command,
            torque_command,
            duty: output.duties,
            watchdog_tripped: tripped,
        };
        self.shared.publish_status(status);
        status
    }

    /// 制御タスク本体（戻らない）
    pub async fn run(mut self) -> ! {
        self.arm();
        self.shared.reset_control_timeout(Instant::now());
        info!("Control loop started");

        loop {
            self.shared.wait_for_trigger().await;
            self.run_cycle(Instant::now());
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn telemetry(&self) -> &T {
        &self.telemetry
    }
}
