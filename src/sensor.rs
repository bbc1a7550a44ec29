//! 回転位置センサーアダプタ
//!
//! 2種類のセンサー（AS5047D / MLX90363）を共通インターフェースで扱います。
//! 各アダプタが自分のレイテンシ隠蔽（毎サイクル / Nサイクルごと）を内部に持ちます。

pub mod as5047d;
pub mod mlx90363;

pub use as5047d::{As5047d, PipelinedRegisterLink};
pub use mlx90363::{AlphaExchangeLink, Mlx90363};

/// 読み取り結果のステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorStatus {
    Ok,
    /// 前回の生値を再利用すること
    Fault,
}

/// センサー通信エラー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorFault {
    /// 応答が未完了
    NotReady,
    /// チップがエラーステータスを返した
    Status,
    /// フレーム破損（CRC等）
    Corrupt,
}

/// 1サイクル分の読み取り結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorReading {
    /// 生の角度カウント（0..ENCODER_TICKS_PER_REV）
    pub raw: u16,
    pub status: SensorStatus,
}

impl SensorReading {
    pub const fn ok(raw: u16) -> Self {
        Self {
            raw,
            status: SensorStatus::Ok,
        }
    }

    pub const fn fault(raw: u16) -> Self {
        Self {
            raw,
            status: SensorStatus::Fault,
        }
    }
}

/// 回転位置センサー
pub trait RotarySensor {
    /// 非ブロッキングで最初の読み取り要求を発行
    fn begin_read(&mut self);

    /// 今サイクルの結果を取得（必要なら次の要求も発行）
    fn fetch_result(&mut self) -> SensorReading;
}

impl<T: RotarySensor + ?Sized> RotarySensor for &mut T {
    fn begin_read(&mut self) {
        (**self).begin_read()
    }

    fn fetch_result(&mut self) -> SensorReading {
        (**self).fetch_result()
    }
}
