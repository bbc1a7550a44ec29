//! ハードウェア初期化モジュール
//!
//! クロック設定、PWM出力、エンコーダSPI、ADCサンプリング、制御サイクル起動割り込み。

use core::ptr;

use embassy_stm32::{
    adc::{Adc, AnyAdcChannel, SampleTime},
    gpio::Output,
    mode::Blocking,
    pac, peripherals,
    spi::Spi,
    timer::{complementary_pwm::ComplementaryPwm, Channel},
    Config, Peri,
};

use foc_servo::config::adc::DEFAULT_SAMPLES_PER_CYCLE;
use foc_servo::ivsense::{IvChannel, SampleBuffer};
use foc_servo::motor_driver::{duty_to_compare, PhaseDriver};
use foc_servo::sensor::{as5047d, PipelinedRegisterLink, SensorFault};

use crate::fmt::*;
use crate::{ADC_TRIGGER, SHARED};

/// RCCクロック設定を初期化
///
/// HSI → PLL（÷4 × 85 ÷ 2）で170MHz生成
pub fn create_clock_config() -> Config {
    let mut config = Config::default();
    {
        use embassy_stm32::rcc::mux::{Adcsel, ClockMux};
        use embassy_stm32::rcc::{Pll, PllMul, PllPreDiv, PllRDiv, PllSource, Sysclk};

        config.rcc.hsi = true;
        config.rcc.pll = Some(Pll {
            source: PllSource::HSI,
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL85,
            divp: None,
            divq: None,
            divr: Some(PllRDiv::DIV2),
        });
        config.rcc.sys = Sysclk::PLL1_R;

        let mut clock_mux = ClockMux::default();
        clock_mux.adc12sel = Adcsel::SYS;
        config.rcc.mux = clock_mux;
    }
    config
}

/// 3相モータードライバー（TIM1 相補PWM）
pub struct MotorDriver {
    pwm: ComplementaryPwm<'static, peripherals::TIM1>,
    max_duty: u16,
}

impl MotorDriver {
    /// # 引数
    /// * `pwm` - PWMペリフェラル（TIM1）
    pub fn new(pwm: ComplementaryPwm<'static, peripherals::TIM1>) -> Self {
        let max_duty = pwm.get_max_duty();
        Self { pwm, max_duty }
    }

    /// 全チャネルを有効化
    pub fn enable_all_channels(&mut self) {
        self.pwm.enable(Channel::Ch1);
        self.pwm.enable(Channel::Ch2);
        self.pwm.enable(Channel::Ch3);
    }
}

impl PhaseDriver for MotorDriver {
    fn set_duty(&mut self, channel: usize, duty: f32) {
        let channel = match channel {
            0 => Channel::Ch1,
            1 => Channel::Ch2,
            2 => Channel::Ch3,
            _ => return,
        };
        self.pwm
            .set_duty(channel, duty_to_compare(duty, self.max_duty));
    }
}

/// AS5047D NOPコマンド
const AS5047D_NOP: u16 = 0xc000;

/// CSのHigh保持時間（tCSn ≥ 350ns @ 170MHz）
const CS_HIGH_CYCLES: u32 = 64;

/// AS5047D用SPIトランスポート（SPI1、16ビットフレーム）
///
/// 読み取り要求はDRへの書き込みだけで返り、応答は次の制御周期に回収します。
pub struct As5047dLink {
    _spi: Spi<'static, Blocking>,
    cs: Output<'static>,
}

impl As5047dLink {
    pub fn new(mut spi: Spi<'static, Blocking>, cs: Output<'static>) -> Self {
        // ワードサイズを16ビットに設定（CSはHighのまま）
        let mut frame = [AS5047D_NOP];
        if spi.blocking_transfer_in_place::<u16>(&mut frame).is_err() {
            error!("AS5047D SPI setup failed");
        }
        Self { _spi: spi, cs }
    }
}

impl PipelinedRegisterLink for As5047dLink {
    fn start_read(&mut self, register: u16) {
        cortex_m::asm::delay(CS_HIGH_CYCLES);
        self.cs.set_low();
        // SAFETY: SPI1はこのリンクが所有している
        unsafe {
            ptr::write_volatile(
                pac::SPI1.dr().as_ptr() as *mut u16,
                as5047d::read_command(register),
            );
        }
    }

    fn read_result(&mut self) -> Result<u16, SensorFault> {
        let spi = pac::SPI1;
        let result = if spi.sr().read().rxne() {
            // SAFETY: 同上
            let word = unsafe { ptr::read_volatile(spi.dr().as_ptr() as *const u16) };
            as5047d::check_response(word)
        } else {
            Err(SensorFault::NotReady)
        };
        self.cs.set_high();
        result
    }
}

/// 相電流・電圧のADCサンプリング（ADC1 + DMA1_CH1、7チャンネル）
///
/// 変換はDMAで行い、待っている間CPUは他のタスクを実行します。
pub struct AdcReader {
    adc: Adc<'static, peripherals::ADC1>,
    dma: Peri<'static, peripherals::DMA1_CH1>,
    channels: [AnyAdcChannel<peripherals::ADC1>; IvChannel::COUNT],
}

impl AdcReader {
    /// # 引数
    /// * `channels` - `IvChannel` の並び順（Ia, Ib, Ic, Va, Vb, Vc, Vbus）
    pub fn new(
        adc: Adc<'static, peripherals::ADC1>,
        dma: Peri<'static, peripherals::DMA1_CH1>,
        channels: [AnyAdcChannel<peripherals::ADC1>; IvChannel::COUNT],
    ) -> Self {
        Self { adc, dma, channels }
    }

    /// 1フレーム（`DEFAULT_SAMPLES_PER_CYCLE` 回 × 全チャンネル）を変換
    pub async fn read_frame(&mut self, frame: &mut SampleBuffer<DEFAULT_SAMPLES_PER_CYCLE>) {
        frame.clear();
        for _ in 0..DEFAULT_SAMPLES_PER_CYCLE {
            let mut sample = [0u16; IvChannel::COUNT];
            self.adc
                .read(
                    self.dma.reborrow(),
                    self.channels
                        .iter_mut()
                        .map(|channel| (channel, SampleTime::CYCLES12_5)),
                    &mut sample,
                )
                .await;
            frame.push(sample);
        }
    }
}

/// TIM1更新割り込みを有効化（PWM周期ごとに制御サイクルを起動）
///
/// # Safety
/// PACを使用した直接レジスタ操作を含む
pub unsafe fn enable_cycle_interrupt() {
    let tim1 = pac::TIM1;
    tim1.sr().modify(|w| w.set_uif(false));
    tim1.dier().modify(|w| w.set_uie(true));

    // Priority 2 = 0x20
    cortex_m::peripheral::NVIC::unmask(pac::Interrupt::TIM1_UP_TIM16);
    let mut cp = cortex_m::Peripherals::steal();
    cp.NVIC.set_priority(pac::Interrupt::TIM1_UP_TIM16, 0x20);

    info!("TIM1 update interrupt enabled");
}

/// TIM1更新割り込み: 制御タスクとADCタスクを起動するだけ
#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn TIM1_UP_TIM16() {
    pac::TIM1.sr().modify(|w| w.set_uif(false));
    SHARED.trigger_cycle();
    ADC_TRIGGER.signal(());
}
