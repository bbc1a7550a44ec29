//! 制御タスク
//!
//! TIM1更新割り込み（20kHz）で起動され、1回の起動につき1サイクル実行します。

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use foc_servo::config::adc::DEFAULT_SAMPLES_PER_CYCLE;
use foc_servo::config::{CONTROL_FREQUENCY_HZ, TELEMETRY_QUEUE_DEPTH};
use foc_servo::control::ControlLoop;
use foc_servo::ivsense::FrameSampler;
use foc_servo::sensor::As5047d;
use foc_servo::telemetry::ChannelTelemetry;

use crate::fmt::*;
use crate::hardware::{As5047dLink, MotorDriver};

/// ボード構成の制御ループ
pub type BoardControlLoop = ControlLoop<
    'static,
    As5047d<As5047dLink>,
    FrameSampler<'static, DEFAULT_SAMPLES_PER_CYCLE>,
    MotorDriver,
    ChannelTelemetry<'static, CriticalSectionRawMutex, TELEMETRY_QUEUE_DEPTH>,
>;

/// 制御タスク（戻らない）
#[embassy_executor::task]
pub async fn control_task(control: BoardControlLoop) {
    info!("Control task started ({} Hz)", CONTROL_FREQUENCY_HZ);
    control.run().await
}
