//! 相電流・相電圧・バス電圧のサンプリング
//!
//! ADCはPWM周期中に複数回サンプリングし、制御サイクルごとに平均して物理量へ変換します。

use crate::config::AdcScale;
use crate::state::Shared;

/// サンプリングチャンネル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(usize)]
pub enum IvChannel {
    Ia = 0,
    Ib = 1,
    Ic = 2,
    Va = 3,
    Vb = 4,
    Vc = 5,
    Vbus = 6,
}

impl IvChannel {
    pub const COUNT: usize = 7;

    pub const ALL: [IvChannel; Self::COUNT] = [
        IvChannel::Ia,
        IvChannel::Ib,
        IvChannel::Ic,
        IvChannel::Va,
        IvChannel::Vb,
        IvChannel::Vc,
        IvChannel::Vbus,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// 1サイクル分の生ADCサンプル
pub trait PhaseSampler {
    /// 今サイクルのサンプルを確定（DMAバッファの切り替え等）
    fn capture(&mut self) {}

    /// 今サイクルのサンプル数
    fn samples_per_cycle(&self) -> usize;

    /// `sample` 番目のサンプルの生値
    fn raw(&self, sample: usize, channel: IvChannel) -> u16;
}

impl<T: PhaseSampler + ?Sized> PhaseSampler for &mut T {
    fn capture(&mut self) {
        (**self).capture()
    }

    fn samples_per_cycle(&self) -> usize {
        (**self).samples_per_cycle()
    }

    fn raw(&self, sample: usize, channel: IvChannel) -> u16 {
        (**self).raw(sample, channel)
    }
}

/// 相ごとの物理量 [A], [V]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhaseMeasurements {
    pub ia: f32,
    pub ib: f32,
    pub ic: f32,
    pub va: f32,
    pub vb: f32,
    pub vc: f32,
    pub vbus: f32,
}

impl PhaseMeasurements {
    pub const fn zero() -> Self {
        Self {
            ia: 0.0,
            ib: 0.0,
            ic: 0.0,
            va: 0.0,
            vb: 0.0,
            vc: 0.0,
            vbus: 0.0,
        }
    }

    /// サンプルを平均して変換
    ///
    /// サンプル数が0の場合は `None`（呼び出し側で前回値を維持）。
    pub fn from_sampler<A: PhaseSampler + ?Sized>(sampler: &A, scale: &AdcScale) -> Option<Self> {
        let n = sampler.samples_per_cycle();
        if n == 0 {
            return None;
        }

        let mut sums = [0u32; IvChannel::COUNT];
        for sample in 0..n {
            for channel in IvChannel::ALL {
                sums[channel.index()] += sampler.raw(sample, channel) as u32;
            }
        }
        let avg = |channel: IvChannel| sums[channel.index()] as f32 / n as f32;

        Some(Self {
            ia: scale.current(avg(IvChannel::Ia)),
            ib: scale.current(avg(IvChannel::Ib)),
            ic: scale.current(avg(IvChannel::Ic)),
            va: scale.voltage(avg(IvChannel::Va)),
            vb: scale.voltage(avg(IvChannel::Vb)),
            vc: scale.voltage(avg(IvChannel::Vc)),
            vbus: scale.voltage(avg(IvChannel::Vbus)),
        })
    }
}

/// メモリ上のサンプルバッファ
///
/// DMA転送先や、テストでの固定入力として使います。
#[derive(Debug, Clone, Copy)]
pub struct SampleBuffer<const N: usize> {
    samples: [[u16; IvChannel::COUNT]; N],
    len: usize,
}

impl<const N: usize> SampleBuffer<N> {
    pub const fn new() -> Self {
        Self {
            samples: [[0; IvChannel::COUNT]; N],
            len: 0,
        }
    }

    /// バッファを空にする
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// 1サンプル（全チャンネル）を追加。満杯なら `false`
    pub fn push(&mut self, sample: [u16; IvChannel::COUNT]) -> bool {
        if self.len >= N {
            return false;
        }
        self.samples[self.len] = sample;
        self.len += 1;
        true
    }

    /// 全サンプルを同じ値で埋める
    pub fn fill(&mut self, sample: [u16; IvChannel::COUNT]) {
        self.samples = [sample; N];
        self.len = N;
    }

    /// 1チャンネルの値を書き換える
    pub fn set(&mut self, sample: usize, channel: IvChannel, value: u16) {
        if sample < self.len {
            self.samples[sample][channel.index()] = value;
        }
    }
}

impl<const N: usize> Default for SampleBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PhaseSampler for SampleBuffer<N> {
    fn samples_per_cycle(&self) -> usize {
        self.len
    }

    fn raw(&self, sample: usize, channel: IvChannel) -> u16 {
        self.samples[sample][channel.index()]
    }
}

/// サンプリング側が公開した最新フレームを読むサンプラー
///
/// ADCの変換完了を待たず、`capture()` は最後に完了したフレームをコピーするだけです。
/// 新しいフレームがなければ前回のフレームを使い続けます。
pub struct FrameSampler<'a, const N: usize> {
    frames: &'a Shared<SampleBuffer<N>>,
    current: SampleBuffer<N>,
}

impl<'a, const N: usize> FrameSampler<'a, N> {
    pub fn new(frames: &'a Shared<SampleBuffer<N>>) -> Self {
        Self {
            frames,
            current: SampleBuffer::new(),
        }
    }
}

impl<const N: usize> PhaseSampler for FrameSampler<'_, N> {
    fn capture(&mut self) {
        self.current = self.frames.get();
    }

    fn samples_per_cycle(&self) -> usize {
        self.current.samples_per_cycle()
    }

    fn raw(&self, sample: usize, channel: IvChannel) -> u16 {
        self.current.raw(sample, channel)
    }
}
