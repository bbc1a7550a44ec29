//! テレメトリタスク
//!
//! 制御タスクからのサンプルを受け取り、間引いてログに出します。

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;

use foc_servo::config::TELEMETRY_QUEUE_DEPTH;
use foc_servo::state::SharedState;
use foc_servo::telemetry::{RecorderChannel, TelemetrySample};

use crate::fmt::*;

/// ログ出力間隔（サンプル数、20kHzで約1秒）
const LOG_DECIMATION: u32 = 20_000;

#[embassy_executor::task]
pub async fn telemetry_task(
    receiver: Receiver<'static, CriticalSectionRawMutex, TelemetrySample, TELEMETRY_QUEUE_DEPTH>,
    shared: &'static SharedState,
) {
    info!("Telemetry task started");

    let mut received = 0u32;
    loop {
        let sample = receiver.receive().await;
        received = received.wrapping_add(1);
        if received % LOG_DECIMATION != 0 {
            continue;
        }

        let status = shared.status();
        info!(
            "pos={} rad, vel={} rad/s, Vbus={} V, Ia={} A, Ib={} A, Ic={} A",
            sample[RecorderChannel::Position],
            sample[RecorderChannel::Velocity],
            sample[RecorderChannel::Vbus],
            sample[RecorderChannel::Ia],
            sample[RecorderChannel::Ib],
            sample[RecorderChannel::Ic]
        );
        info!(
            "  mode={:?}, id={} A, iq={} A, torque_cmd={}, watchdog={}, sensor_faults={}",
            status.control_mode,
            status.state.id,
            status.state.iq,
            status.torque_command,
            status.watchdog_tripped,
            status.state.sensor_fault_streak
        );
    }
}
