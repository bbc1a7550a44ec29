//! ADCタスク
//!
//! TIM1更新割り込みごとに1フレーム変換し、完了したフレームを制御タスクへ公開します。
//! 制御タスクは変換完了を待たず、直前に完了したフレームを使います。

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use foc_servo::config::adc::DEFAULT_SAMPLES_PER_CYCLE;
use foc_servo::ivsense::SampleBuffer;
use foc_servo::state::Shared;

use crate::fmt::*;
use crate::hardware::AdcReader;

#[embassy_executor::task]
pub async fn adc_task(
    mut reader: AdcReader,
    trigger: &'static Signal<CriticalSectionRawMutex, ()>,
    frames: &'static Shared<SampleBuffer<DEFAULT_SAMPLES_PER_CYCLE>>,
) {
    info!("ADC task started");

    let mut frame = SampleBuffer::new();
    loop {
        trigger.wait().await;
        reader.read_frame(&mut frame).await;
        frames.set(frame);
    }
}
