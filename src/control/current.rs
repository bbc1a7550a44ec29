//! 電流ループ（FOC）
//!
//! 相電流 → Clarke → Park → d/q PI（フィードフォワード付き）→ 逆Park → SVPWM。
//! RawPwmでは相デューティを素通しし、DirectDriveVoltageではq軸電圧を直接指令します。

use super::estimator::EstimatedState;
use super::mode::CurrentStage;
use crate::config::params::{CONTROL_PERIOD_S, MIN_BUS_VOLTAGE};
use crate::config::{Calibration, Parameters};
use crate::foc::{calculate_svpwm, clarke, inverse_park, park, CosSin, LoopMode, PiController};

/// 電流ループの出力
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentOutput {
    /// 3相デューティ
    pub duties: [f32; 3],
    /// 計測したd/q電流（バイパス時は `None`）
    pub dq: Option<(f32, f32)>,
}

pub struct CurrentController {
    pid_d: PiController,
    pid_q: PiController,
}

impl CurrentController {
    pub const fn new() -> Self {
        Self {
            pid_d: PiController::new_symmetric(0.0, 0.0, 0.0),
            pid_q: PiController::new_symmetric(0.0, 0.0, 0.0),
        }
    }

    /// 1サイクル分の更新
    ///
    /// # Arguments
    /// * `stage` - 現在のモードの電流段
    /// * `params` - 今サイクルのパラメータスナップショット
    /// * `torque_command` - トルク指令（速度ループ出力または外部指令）[N·m]
    /// * `state` - 推定状態（補正角度・相電流・バス電圧・速度）
    pub fn update(
        &mut self,
        stage: CurrentStage,
        params: &Parameters,
        torque_command: f32,
        state: &EstimatedState,
        calib: &Calibration,
    ) -> CurrentOutput {
        if stage == CurrentStage::Bypass {
            self.hold();
            return CurrentOutput {
                duties: params.phase_duty,
                dq: None,
            };
        }

        let phases = &state.phases;
        let (i_alpha, mut i_beta) = clarke(phases.ia, phases.ib, phases.ic);
        if calib.flip_phases {
            i_beta = -i_beta;
        }

        let mech_angle = state.corrected_angle - calib.electrical_zero();
        let elec_angle = mech_angle * calib.erevs_per_mrev as f32;
        let angle = CosSin::new(elec_angle);

        let (id, iq) = park(i_alpha, i_beta, angle);

        let vbus = phases.vbus;
        let (vd, vq) = match stage {
            CurrentStage::VoltageDrive => {
                self.hold();
                (0.0, params.drive_voltage)
            }
            _ => {
                // ブレーキ中は torque_scale = 0
                let kt = calib.motor_torque_const * params.torque_scale;
                let (id_sp, iq_sp) = match stage {
                    CurrentStage::CurrentSetpoint => {
                        (params.foc_d_current_sp, params.foc_q_current_sp)
                    }
                    _ if kt != 0.0 => (0.0, torque_command / kt),
                    _ => (0.0, 0.0),
                };

                let current_max = calib.adc.current_max();
                let r = calib.motor_resistance;

                Self::configure(&mut self.pid_d, calib.foc_kp_d, calib.foc_ki_d, vbus, current_max);
                self.pid_d.set_bias(id_sp * r);

                Self::configure(&mut self.pid_q, calib.foc_kp_q, calib.foc_ki_q, vbus, current_max);
                // 逆起電力補償
                self.pid_q.set_bias(iq_sp * r + state.velocity * kt);

                (
                    self.pid_d.update(id_sp, id, CONTROL_PERIOD_S),
                    self.pid_q.update(iq_sp, iq, CONTROL_PERIOD_S),
                )
            }
        };

        // 変調率（バス電圧がない場合は出力しない）
        let (md, mq) = if vbus > MIN_BUS_VOLTAGE {
            (vd / vbus, vq / vbus)
        } else {
            (0.0, 0.0)
        };

        let (m_alpha, mut m_beta) = inverse_park(md, mq, angle);
        if calib.flip_phases {
            m_beta = -m_beta;
        }

        CurrentOutput {
            duties: calculate_svpwm(m_alpha, m_beta),
            dq: Some((id, iq)),
        }
    }

    fn configure(pid: &mut PiController, kp: f32, ki: f32, vbus: f32, current_max: f32) {
        pid.set_mode(LoopMode::Auto);
        pid.set_gains(kp, ki);
        pid.set_symmetric_limit(vbus);
        pid.set_input_limits(-current_max, current_max);
    }

    fn hold(&mut self) {
        self.pid_d.set_mode(LoopMode::Manual);
        self.pid_q.set_mode(LoopMode::Manual);
    }

    pub fn d_controller(&self) -> &PiController {
        &self.pid_d
    }

    pub fn q_controller(&self) -> &PiController {
        &self.pid_q
    }
}

impl Default for CurrentController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlMode;

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn state_with_bus(vbus: f32) -> EstimatedState {
        let mut state = EstimatedState::new();
        state.phases.vbus = vbus;
        state
    }

    fn calib() -> Calibration {
        let mut c = Calibration::default();
        c.erevs_per_mrev = 1;
        c.foc_kp_d = 2.0;
        c.foc_kp_q = 2.0;
        c.foc_ki_d = 100.0;
        c.foc_ki_q = 100.0;
        c
    }

    #[test]
    fn test_bypass_passes_phase_duty() {
        let mut params = Parameters::default();
        params.control_mode = ControlMode::RawPwm;
        params.phase_duty = [0.1, 0.2, 0.95];
        let mut ctrl = CurrentController::new();

        let out = ctrl.update(CurrentStage::Bypass, &params, 0.0, &state_with_bus(12.0), &calib());
        assert_eq!(out.duties, [0.1, 0.2, 0.95]);
        assert_eq!(out.dq, None);
        assert_eq!(ctrl.d_controller().mode(), LoopMode::Manual);
    }

    #[test]
    fn test_zero_setpoint_gives_centered_duties() {
        let params = Parameters::default();
        let mut ctrl = CurrentController::new();
        let out = ctrl.update(
            CurrentStage::CurrentSetpoint,
            &params,
            0.0,
            &state_with_bus(12.0),
            &calib(),
        );
        for d in out.duties {
            assert!(approx_eq(d, 0.5));
        }
        assert_eq!(out.dq, Some((0.0, 0.0)));
    }

    #[test]
    fn test_direct_drive_voltage() {
        let mut params = Parameters::default();
        params.drive_voltage = 6.0;
        let mut ctrl = CurrentController::new();

        // 電気角0: q軸 = β軸
        let out = ctrl.update(
            CurrentStage::VoltageDrive,
            &params,
            0.0,
            &state_with_bus(12.0),
            &calib(),
        );
        let [du, dv, dw] = out.duties;
        assert!(approx_eq(du, 0.5));
        assert!(approx_eq(dv - dw, 0.5 * 3.0f32.sqrt()));
        assert_eq!(ctrl.q_controller().mode(), LoopMode::Manual);
    }

    #[test]
    fn test_measured_dq_currents() {
        let params = Parameters::default();
        let mut ctrl = CurrentController::new();
        let mut state = state_with_bus(12.0);
        // 電気角0で α軸に2A
        state.phases.ia = 2.0;
        state.phases.ib = -1.0;
        state.phases.ic = -1.0;

        let out = ctrl.update(CurrentStage::CurrentSetpoint, &params, 0.0, &state, &calib());
        let (id, iq) = out.dq.unwrap();
        assert!(approx_eq(id, 2.0));
        assert!(approx_eq(iq, 0.0));
    }

    #[test]
    fn test_low_bus_voltage_outputs_center() {
        let mut params = Parameters::default();
        params.drive_voltage = 6.0;
        let mut ctrl = CurrentController::new();

        let out = ctrl.update(
            CurrentStage::VoltageDrive,
            &params,
            0.0,
            &state_with_bus(0.0),
            &calib(),
        );
        assert_eq!(out.duties, [0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_zero_torque_scale_means_zero_q_setpoint() {
        let mut params = Parameters::default();
        params.torque_scale = 0.0;
        let mut ctrl = CurrentController::new();
        let mut state = state_with_bus(12.0);
        state.velocity = 50.0;

        let out = ctrl.update(CurrentStage::TorqueSetpoint, &params, 1.0, &state, &calib());
        // iq_sp = 0、逆起電力補償も0
        for d in out.duties {
            assert!(approx_eq(d, 0.5));
        }
        assert!(!ctrl.q_controller().get_integral().is_nan());
    }

    #[test]
    fn test_torque_command_drives_positive_q_voltage() {
        let params = Parameters::default();
        let mut ctrl = CurrentController::new();

        let out = ctrl.update(
            CurrentStage::TorqueSetpoint,
            &params,
            0.03,
            &state_with_bus(12.0),
            &calib(),
        );
        // iq_sp = 1A、電気角0 → β軸正 → V相 > W相
        let [_, dv, dw] = out.duties;
        assert!(dv > dw);
        assert!(ctrl.q_controller().get_output() > 0.0);
    }

    #[test]
    fn test_voltage_output_saturates_at_bus() {
        let mut params = Parameters::default();
        params.foc_q_current_sp = 1000.0;
        let mut ctrl = CurrentController::new();
        let state = state_with_bus(12.0);

        for _ in 0..100 {
            let out = ctrl.update(CurrentStage::CurrentSetpoint, &params, 0.0, &state, &calib());
            assert!(ctrl.q_controller().get_output().abs() <= 12.0);
            for d in out.duties {
                assert!((0.0..=1.0).contains(&d));
            }
        }
    }

    #[test]
    fn test_flip_phases_mirrors_beta() {
        let params = Parameters::default();
        let mut calib = calib();
        let mut state = state_with_bus(12.0);
        state.phases.ia = 0.0;
        state.phases.ib = 1.0;
        state.phases.ic = -1.0;

        let mut ctrl = CurrentController::new();
        let (_, iq) = ctrl
            .update(CurrentStage::CurrentSetpoint, &params, 0.0, &state, &calib)
            .dq
            .unwrap();

        calib.flip_phases = true;
        let mut flipped = CurrentController::new();
        let (_, iq_flipped) = flipped
            .update(CurrentStage::CurrentSetpoint, &params, 0.0, &state, &calib)
            .dq
            .unwrap();
        assert!(approx_eq(iq, -iq_flipped));
        assert!(iq.abs() > 0.5);
    }
}
