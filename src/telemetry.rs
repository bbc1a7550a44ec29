//! テレメトリ（レコーダ）出力
//!
//! 制御サイクルごとに9チャンネルのサンプルを1つ送ります。送信はベストエフォートで、
//! キューが満杯ならサンプルを捨てて制御ループを止めません。

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Sender;

use crate::fmt::*;

/// レコーダチャンネル（並び順は固定）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(usize)]
pub enum RecorderChannel {
    Ia = 0,
    Ib,
    Ic,
    Va,
    Vb,
    Vc,
    Vbus,
    Position,
    Velocity,
}

impl RecorderChannel {
    pub const COUNT: usize = 9;
}

/// 1サイクル分のテレメトリ
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetrySample(pub [f32; RecorderChannel::COUNT]);

impl TelemetrySample {
    #[inline]
    pub fn get(&self, channel: RecorderChannel) -> f32 {
        self.0[channel as usize]
    }
}

impl core::ops::Index<RecorderChannel> for TelemetrySample {
    type Output = f32;

    fn index(&self, channel: RecorderChannel) -> &f32 {
        &self.0[channel as usize]
    }
}

/// テレメトリ出力先
pub trait TelemetrySink {
    /// サンプルを記録（ブロックしない）
    fn record(&mut self, sample: &TelemetrySample);
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for &mut T {
    fn record(&mut self, sample: &TelemetrySample) {
        (**self).record(sample)
    }
}

/// 破棄ログを出す間隔（破棄回数）
const DROP_LOG_INTERVAL: u32 = 1000;

/// embassy Channel への送信
pub struct ChannelTelemetry<'a, M: RawMutex, const N: usize> {
    sender: Sender<'a, M, TelemetrySample, N>,
    dropped: u32,
}

impl<'a, M: RawMutex, const N: usize> ChannelTelemetry<'a, M, N> {
    pub fn new(sender: Sender<'a, M, TelemetrySample, N>) -> Self {
        Self { sender, dropped: 0 }
    }

    /// キュー満杯で捨てたサンプル数
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl<M: RawMutex, const N: usize> TelemetrySink for ChannelTelemetry<'_, M, N> {
    fn record(&mut self, sample: &TelemetrySample) {
        if self.sender.try_send(*sample).is_err() {
            self.dropped = self.dropped.wrapping_add(1);
            if self.dropped % DROP_LOG_INTERVAL == 1 {
                debug!("Telemetry queue full, dropped {} samples", self.dropped);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::channel::Channel;

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let channel: Channel<CriticalSectionRawMutex, TelemetrySample, 2> = Channel::new();
        let mut sink = ChannelTelemetry::new(channel.sender());

        for i in 0..5 {
            let mut sample = TelemetrySample::default();
            sample.0[RecorderChannel::Position as usize] = i as f32;
            sink.record(&sample);
        }

        assert_eq!(sink.dropped(), 3);
        // 古いサンプルが残る
        assert_eq!(channel.try_receive().unwrap()[RecorderChannel::Position], 0.0);
        assert_eq!(channel.try_receive().unwrap()[RecorderChannel::Position], 1.0);
        assert!(channel.try_receive().is_err());
    }

    #[test]
    fn test_channel_order() {
        let sample = TelemetrySample([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(sample.get(RecorderChannel::Ia), 1.0);
        assert_eq!(sample.get(RecorderChannel::Vbus), 7.0);
        assert_eq!(sample.get(RecorderChannel::Position), 8.0);
        assert_eq!(sample.get(RecorderChannel::Velocity), 9.0);
    }
}
