//! 状態推定
//!
//! センサー生値 → 補正角度 → 多回転位置・フィルタ済み速度、および相電流・電圧の平均化。

use core::f32::consts::{PI, TAU};

use crate::config::params::{CONTROL_FREQUENCY_HZ, RAD_PER_ENC_TICK, SENSOR_FAULT_LOG_THRESHOLD};
use crate::config::Calibration;
use crate::fmt::*;
use crate::ivsense::{PhaseMeasurements, PhaseSampler};
use crate::sensor::{SensorReading, SensorStatus};
use crate::telemetry::TelemetrySample;

/// 推定状態
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EstimatedState {
    /// センサー生値
    pub raw_angle: u16,
    /// 補正後の機械角 [rad]（0～2π付近）
    pub corrected_angle: f32,
    /// 回転数
    pub revolutions: i32,
    /// 多回転位置 [rad]
    pub position: f32,
    /// フィルタ済み速度 [rad/s]
    pub velocity: f32,
    pub phases: PhaseMeasurements,
    /// d軸電流 [A]
    pub id: f32,
    /// q軸電流 [A]
    pub iq: f32,
    /// 連続したセンサー異常の回数（外部監視用）
    pub sensor_fault_streak: u32,
}

impl EstimatedState {
    pub const fn new() -> Self {
        Self {
            raw_angle: 0,
            corrected_angle: 0.0,
            revolutions: 0,
            position: 0.0,
            velocity: 0.0,
            phases: PhaseMeasurements::zero(),
            id: 0.0,
            iq: 0.0,
            sensor_fault_streak: 0,
        }
    }
}

impl Default for EstimatedState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Estimator {
    state: EstimatedState,
    /// 最初の正常な読み取りで前回角度を初期化済みか
    primed: bool,
}

impl Estimator {
    pub const fn new() -> Self {
        Self {
            state: EstimatedState::new(),
            primed: false,
        }
    }

    pub fn state(&self) -> &EstimatedState {
        &self.state
    }

    /// 角度・位置・速度の更新
    pub fn update_angle(&mut self, reading: SensorReading, calib: &Calibration) {
        let raw = match reading.status {
            SensorStatus::Ok => {
                self.state.sensor_fault_streak = 0;
                reading.raw
            }
            SensorStatus::Fault => {
                self.state.sensor_fault_streak = self.state.sensor_fault_streak.saturating_add(1);
                if self.state.sensor_fault_streak == SENSOR_FAULT_LOG_THRESHOLD {
                    warn!(
                        "Rotor sensor faulted for {} consecutive cycles",
                        self.state.sensor_fault_streak
                    );
                }
                if !self.primed {
                    // 初期化に使える角度がまだない
                    return;
                }
                // 前回の生値をそのまま使う
                self.state.raw_angle
            }
        };

        self.state.raw_angle = raw;

        let raw_rad = raw as f32 * RAD_PER_ENC_TICK;
        let corrected = raw_rad + calib.angle_correction.correction(raw_rad);
        let prev = self.state.corrected_angle;
        self.state.corrected_angle = corrected;

        if self.primed {
            let mut delta = corrected - prev;
            if delta < -PI {
                self.state.revolutions += 1;
                delta += TAU;
            } else if delta > PI {
                self.state.revolutions -= 1;
                delta -= TAU;
            }

            let alpha = calib.velocity_filter_param;
            let velocity_update = delta * CONTROL_FREQUENCY_HZ;
            self.state.velocity = alpha * velocity_update + (1.0 - alpha) * self.state.velocity;
        } else {
            debug!("Rotor angle primed at raw {}", raw);
            self.primed = true;
        }

        self.state.position =
            corrected + self.state.revolutions as f32 * TAU - calib.position_offset;
    }

    /// 相電流・電圧の更新
    ///
    /// サンプルがない場合は前回値を維持します。
    pub fn update_phases<A: PhaseSampler + ?Sized>(&mut self, sampler: &A, calib: &Calibration) {
        if let Some(phases) = PhaseMeasurements::from_sampler(sampler, &calib.adc) {
            self.state.phases = phases;
        }
    }

    /// 電流ループで計算したd/q電流を記録
    pub fn set_dq_currents(&mut self, id: f32, iq: f32) {
        self.state.id = id;
        self.state.iq = iq;
    }

    /// レコーダ用サンプル（ia, ib, ic, va, vb, vc, vbus, position, velocity）
    pub fn telemetry_sample(&self) -> TelemetrySample {
        let p = &self.state.phases;
        TelemetrySample([
            p.ia,
            p.ib,
            p.ic,
            p.va,
            p.vb,
            p.vc,
            p.vbus,
            self.state.position,
            self.state.velocity,
        ])
    }
}

impl Default for Estimator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::params::ENCODER_TICKS_PER_REV;
    use crate::ivsense::{IvChannel, SampleBuffer};
    use crate::telemetry::RecorderChannel;

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() < eps
    }

    fn calib() -> Calibration {
        let mut c = Calibration::default();
        c.velocity_filter_param = 0.5;
        c
    }

    #[test]
    fn test_wrap_forward_increments_revolution() {
        let calib = calib();
        let mut est = Estimator::new();
        est.update_angle(SensorReading::ok(16383), &calib);
        assert_eq!(est.state().revolutions, 0);

        est.update_angle(SensorReading::ok(2), &calib);
        assert_eq!(est.state().revolutions, 1);

        // 正規化後のデルタは3カウント分
        let expected_velocity = 0.5 * 3.0 * RAD_PER_ENC_TICK * CONTROL_FREQUENCY_HZ;
        assert!(approx_eq(est.state().velocity, expected_velocity, 0.05));
        assert!(approx_eq(est.state().position, TAU + 2.0 * RAD_PER_ENC_TICK, EPSILON));
    }

    #[test]
    fn test_wrap_backward_decrements_revolution() {
        let calib = calib();
        let mut est = Estimator::new();
        est.update_angle(SensorReading::ok(1), &calib);
        est.update_angle(SensorReading::ok(16380), &calib);
        assert_eq!(est.state().revolutions, -1);
        assert!(est.state().velocity < 0.0);
    }

    #[test]
    fn test_sweep_is_continuous() {
        let calib = calib();
        for step in [7u16, 311, 4000] {
            for direction in [1i32, -1] {
                let mut est = Estimator::new();
                let mut raw: i32 = 12345;
                est.update_angle(SensorReading::ok(raw as u16), &calib);
                let mut prev_pos = est.state().position;
                let mut prev_revs = est.state().revolutions;

                for _ in 0..200 {
                    let next = raw + direction * step as i32;
                    let wrapped = next.rem_euclid(ENCODER_TICKS_PER_REV as i32);
                    let crossed = wrapped != next;
                    raw = wrapped;

                    est.update_angle(SensorReading::ok(raw as u16), &calib);
                    let s = est.state();
                    assert!((s.position - prev_pos).abs() < PI);
                    let expected_revs = if crossed { prev_revs + direction } else { prev_revs };
                    assert_eq!(s.revolutions, expected_revs);
                    prev_pos = s.position;
                    prev_revs = s.revolutions;
                }
            }
        }
    }

    #[test]
    fn test_velocity_filter_exact() {
        let mut calib = Calibration::default();
        calib.velocity_filter_param = 0.25;
        let mut est = Estimator::new();
        est.update_angle(SensorReading::ok(100), &calib);
        est.update_angle(SensorReading::ok(110), &calib);
        let v0 = est.state().velocity;

        est.update_angle(SensorReading::ok(120), &calib);
        let delta = 120.0 * RAD_PER_ENC_TICK - 110.0 * RAD_PER_ENC_TICK;
        let v = delta * CONTROL_FREQUENCY_HZ;
        assert_eq!(est.state().velocity, 0.25 * v + (1.0 - 0.25) * v0);
    }

    #[test]
    fn test_first_reading_only_primes() {
        let calib = calib();
        let mut est = Estimator::new();
        est.update_angle(SensorReading::ok(16000), &calib);
        assert_eq!(est.state().revolutions, 0);
        assert_eq!(est.state().velocity, 0.0);
        assert!(approx_eq(est.state().position, 16000.0 * RAD_PER_ENC_TICK, EPSILON));
    }

    #[test]
    fn test_fault_reuses_previous_raw() {
        let calib = calib();
        let mut est = Estimator::new();
        est.update_angle(SensorReading::ok(5000), &calib);
        est.update_angle(SensorReading::ok(5010), &calib);

        est.update_angle(SensorReading::fault(9999), &calib);
        assert_eq!(est.state().raw_angle, 5010);
        assert_eq!(est.state().sensor_fault_streak, 1);
        est.update_angle(SensorReading::fault(0), &calib);
        assert_eq!(est.state().raw_angle, 5010);
        assert_eq!(est.state().sensor_fault_streak, 2);

        est.update_angle(SensorReading::ok(5020), &calib);
        assert_eq!(est.state().sensor_fault_streak, 0);
        assert_eq!(est.state().revolutions, 0);
    }

    #[test]
    fn test_fault_before_prime_is_ignored() {
        let calib = calib();
        let mut est = Estimator::new();
        est.update_angle(SensorReading::fault(8000), &calib);
        assert_eq!(est.state().raw_angle, 0);
        est.update_angle(SensorReading::ok(16000), &calib);
        // 初回の正常値は初期化のみ
        assert_eq!(est.state().revolutions, 0);
        assert_eq!(est.state().velocity, 0.0);
    }

    #[test]
    fn test_position_offset_applied() {
        let mut calib = calib();
        calib.position_offset = 1.0;
        let mut est = Estimator::new();
        est.update_angle(SensorReading::ok(4096), &calib);
        assert!(approx_eq(est.state().position, core::f32::consts::FRAC_PI_2 - 1.0, EPSILON));
    }

    #[test]
    fn test_telemetry_sample_order() {
        let mut calib = calib();
        calib.adc.current_zero = 2000.0;
        calib.adc.amps_per_count = 0.01;
        calib.adc.volts_per_count = 0.1;

        let mut buf = SampleBuffer::<2>::new();
        buf.fill([2100, 1900, 2000, 10, 20, 30, 240]);
        buf.set(1, IvChannel::Vbus, 260);

        let mut est = Estimator::new();
        est.update_phases(&buf, &calib);
        est.update_angle(SensorReading::ok(4096), &calib);

        let sample = est.telemetry_sample();
        assert!(approx_eq(sample[RecorderChannel::Ia], 1.0, EPSILON));
        assert!(approx_eq(sample[RecorderChannel::Ib], -1.0, EPSILON));
        assert!(approx_eq(sample[RecorderChannel::Ic], 0.0, EPSILON));
        assert!(approx_eq(sample[RecorderChannel::Vc], 3.0, EPSILON));
        assert!(approx_eq(sample[RecorderChannel::Vbus], 25.0, EPSILON));
        assert_eq!(sample[RecorderChannel::Position], est.state().position);
        assert_eq!(sample[RecorderChannel::Velocity], est.state().velocity);
    }
}
