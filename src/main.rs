#![no_std]
#![no_main]

mod fmt;
mod hardware;
mod tasks;

#[cfg(not(feature = "defmt"))]
use panic_halt as _;
#[cfg(feature = "defmt")]
use {defmt_rtt as _, panic_probe as _};

use embassy_executor::Spawner;
use embassy_stm32::{
    adc::{Adc, AdcChannel},
    gpio::{Level, Output, OutputType, Speed},
    spi::{self, Spi},
    time::Hertz,
    timer::{
        complementary_pwm::{ComplementaryPwm, ComplementaryPwmPin},
        low_level::CountingMode,
        simple_pwm::PwmPin,
        Channel as PwmChannel,
    },
};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};

use foc_servo::config::adc::DEFAULT_SAMPLES_PER_CYCLE;
use foc_servo::config::{pwm, CONTROL_FREQUENCY_HZ, TELEMETRY_QUEUE_DEPTH};
use foc_servo::control::ControlLoop;
use foc_servo::ivsense::{FrameSampler, SampleBuffer};
use foc_servo::motor_driver::PhaseDriver;
use foc_servo::sensor::As5047d;
use foc_servo::state::{Shared, SharedState};
use foc_servo::telemetry::{ChannelTelemetry, TelemetrySample};

use fmt::*;
use tasks::{adc_task, control_task, telemetry_task};

/// 制御タスク・割り込み・コマンド層が共有する状態
pub static SHARED: SharedState = SharedState::new();

/// ADC変換開始（TIM1更新割り込み → ADCタスク）
pub static ADC_TRIGGER: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// 変換完了した最新のADCフレーム（ADCタスク → 制御タスク）
static ADC_FRAMES: Shared<SampleBuffer<DEFAULT_SAMPLES_PER_CYCLE>> =
    Shared::new(SampleBuffer::new());

/// テレメトリキュー（制御タスク → テレメトリタスク）
static TELEMETRY: Channel<CriticalSectionRawMutex, TelemetrySample, TELEMETRY_QUEUE_DEPTH> =
    Channel::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // ハードウェア初期化
    let config = hardware::create_clock_config();
    let p = embassy_stm32::init(config);

    info!("═══════════════════════════════════════════════════════════════════");
    info!("        FOC Servo Drive • STM32G431VB @ 170MHz");
    info!("═══════════════════════════════════════════════════════════════════");

    let calib = SHARED.calibration();
    info!("Calibration:");
    info!(
        "  Pole pairs: {}, Kt={} N·m/A, R={} Ω",
        calib.erevs_per_mrev, calib.motor_torque_const, calib.motor_resistance
    );
    info!(
        "  Current PI: Kp_d={}, Ki_d={}, Kp_q={}, Ki_q={}",
        calib.foc_kp_d, calib.foc_ki_d, calib.foc_kp_q, calib.foc_ki_q
    );
    info!(
        "  Velocity PI: Kp={}, Ki={}, torque limit={} N·m",
        calib.velocity_kp, calib.velocity_ki, calib.torque_limit
    );
    info!(
        "  Position PI: Kp={}, Ki={}, velocity limit={} rad/s",
        calib.position_kp, calib.position_ki, calib.velocity_limit
    );
    info!("  Command timeout: {} ms", calib.control_timeout_ms);

    // PWM初期化（TIM1、3相相補PWM、更新イベント = 制御周期）
    let mut uvw_pwm = ComplementaryPwm::new(
        p.TIM1,
        Some(PwmPin::new(p.PE9, OutputType::PushPull)),
        Some(ComplementaryPwmPin::new(p.PE8, OutputType::PushPull)),
        Some(PwmPin::new(p.PE11, OutputType::PushPull)),
        Some(ComplementaryPwmPin::new(p.PE10, OutputType::PushPull)),
        Some(PwmPin::new(p.PE13, OutputType::PushPull)),
        Some(ComplementaryPwmPin::new(p.PE12, OutputType::PushPull)),
        None,
        None,
        Hertz(CONTROL_FREQUENCY_HZ as u32),
        CountingMode::EdgeAlignedUp,
    );
    uvw_pwm.disable(PwmChannel::Ch1);
    uvw_pwm.disable(PwmChannel::Ch2);
    uvw_pwm.disable(PwmChannel::Ch3);
    uvw_pwm.set_dead_time(pwm::DEAD_TIME);

    let mut driver = hardware::MotorDriver::new(uvw_pwm);
    driver.set_duties([0.5; 3]);
    driver.enable_all_channels();

    // エンコーダ（AS5047D、SPI1 Mode1）
    let mut spi_config = spi::Config::default();
    spi_config.mode = spi::MODE_1;
    spi_config.frequency = Hertz(10_000_000);
    let encoder_spi = Spi::new_blocking(p.SPI1, p.PA5, p.PA7, p.PA6, spi_config);
    let encoder_cs = Output::new(p.PA4, Level::High, Speed::VeryHigh);
    let sensor = As5047d::new(hardware::As5047dLink::new(encoder_spi, encoder_cs));
    info!("AS5047D encoder on SPI1 (CS=PA4)");

    // ADC初期化（Ia, Ib, Ic, Va, Vb, Vc, Vbus、DMA1_CH1）
    let adc1 = Adc::new(p.ADC1);
    let adc_reader = hardware::AdcReader::new(
        adc1,
        p.DMA1_CH1,
        [
            p.PA0.degrade_adc(),
            p.PA1.degrade_adc(),
            p.PA2.degrade_adc(),
            p.PC0.degrade_adc(),
            p.PC2.degrade_adc(),
            p.PC3.degrade_adc(),
            p.PC1.degrade_adc(),
        ],
    );

    let sampler = FrameSampler::new(&ADC_FRAMES);

    let telemetry = ChannelTelemetry::new(TELEMETRY.sender());
    let control = ControlLoop::new(&SHARED, sensor, sampler, driver, telemetry);

    spawner
        .spawn(adc_task(adc_reader, &ADC_TRIGGER, &ADC_FRAMES))
        .unwrap();
    spawner
        .spawn(telemetry_task(TELEMETRY.receiver(), &SHARED))
        .unwrap();

    info!("Starting FOC servo control...");
    spawner.spawn(control_task(control)).unwrap();

    // 制御サイクル割り込み開始
    unsafe {
        hardware::enable_cycle_interrupt();
    }

    // メインループ（コマンド層は別途）
    loop {
        Timer::after(Duration::from_millis(100)).await;
    }
}
