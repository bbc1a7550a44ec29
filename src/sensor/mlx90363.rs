//! MLX90363 アダプタ（Nサイクルごとに更新）
//!
//! プロトコルのターンアラウンドのため、新しい角度は `MLX90363_REFRESH_CYCLES` サイクルに1回。
//! 間のサイクルは前回の生値をそのまま返し、更新時の異常は前回値へフォールバックします。
//! 一度も正常な値を取れていない間は、どのサイクルも `Fault` を返します。

use super::{RotarySensor, SensorFault, SensorReading};
use crate::config::params::{
    ENCODER_TICKS_PER_REV, MLX90363_ALPHA_TIMEOUT, MLX90363_REFRESH_CYCLES,
};
use crate::fmt::*;

/// Get1Alpha 非同期交換を行うトランスポート
///
/// メッセージの組み立て・CRC・パースはトランスポート側の責務。
pub trait AlphaExchangeLink {
    /// Get1Alpha 要求の交換を開始（非ブロッキング）
    fn start_alpha_exchange(&mut self, timeout: u16);

    /// 直前に開始した交換の結果（角度カウント）
    fn alpha_result(&mut self) -> Result<u16, SensorFault>;
}

pub struct Mlx90363<L> {
    link: L,
    cycles_since_update: u32,
    last_raw: u16,
    /// `last_raw` が実際に読めた値か
    has_value: bool,
}

impl<L: AlphaExchangeLink> Mlx90363<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            // 最初のfetchでbegin_readの結果を回収する
            cycles_since_update: MLX90363_REFRESH_CYCLES,
            last_raw: 0,
            has_value: false,
        }
    }

    /// 更新しないサイクルの結果
    fn replay(&self) -> SensorReading {
        if self.has_value {
            SensorReading::ok(self.last_raw)
        } else {
            SensorReading::fault(self.last_raw)
        }
    }

    /// MLX90363の角度は逆方向に増える
    #[inline]
    fn reverse(alpha: u16) -> u16 {
        (ENCODER_TICKS_PER_REV - (alpha % ENCODER_TICKS_PER_REV)) % ENCODER_TICKS_PER_REV
    }
}

impl<L: AlphaExchangeLink> RotarySensor for Mlx90363<L> {
    fn begin_read(&mut self) {
        critical_section::with(|_| self.link.start_alpha_exchange(MLX90363_ALPHA_TIMEOUT));
    }

    fn fetch_result(&mut self) -> SensorReading {
        if self.cycles_since_update < MLX90363_REFRESH_CYCLES {
            self.cycles_since_update += 1;
            return self.replay();
        }
        self.cycles_since_update = 1;

        let result = critical_section::with(|_| {
            let result = self.link.alpha_result();
            self.link.start_alpha_exchange(MLX90363_ALPHA_TIMEOUT);
            result
        });

        match result {
            Ok(alpha) => {
                self.last_raw = Self::reverse(alpha);
                self.has_value = true;
                SensorReading::ok(self.last_raw)
            }
            Err(fault) => {
                trace!("MLX90363 exchange failed: {:?}", fault);
                SensorReading::fault(self.last_raw)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Calibration;
    use crate::control::Estimator;
    use crate::sensor::SensorStatus;

    struct FakeLink {
        next: Result<u16, SensorFault>,
        exchanges_started: u32,
        results_taken: u32,
    }

    impl FakeLink {
        fn new(alpha: u16) -> Self {
            Self {
                next: Ok(alpha),
                exchanges_started: 0,
                results_taken: 0,
            }
        }
    }

    impl AlphaExchangeLink for FakeLink {
        fn start_alpha_exchange(&mut self, timeout: u16) {
            assert_eq!(timeout, MLX90363_ALPHA_TIMEOUT);
            self.exchanges_started += 1;
        }

        fn alpha_result(&mut self) -> Result<u16, SensorFault> {
            self.results_taken += 1;
            self.next
        }
    }

    #[test]
    fn test_refresh_every_nth_cycle() {
        let mut sensor = Mlx90363::new(FakeLink::new(1000));
        sensor.begin_read();

        // 最初のfetchで回収
        let first = sensor.fetch_result();
        assert_eq!(first, SensorReading::ok(ENCODER_TICKS_PER_REV - 1000));
        assert_eq!(sensor.link.results_taken, 1);

        sensor.link.next = Ok(2000);
        for _ in 1..MLX90363_REFRESH_CYCLES {
            // 間のサイクルは前回値とOk
            assert_eq!(sensor.fetch_result(), first);
        }
        assert_eq!(sensor.link.results_taken, 1);

        let refreshed = sensor.fetch_result();
        assert_eq!(refreshed, SensorReading::ok(ENCODER_TICKS_PER_REV - 2000));
        assert_eq!(sensor.link.results_taken, 2);
        // begin_read + 更新ごとに1回
        assert_eq!(sensor.link.exchanges_started, 3);
    }

    #[test]
    fn test_fault_returns_previous_value() {
        let mut sensor = Mlx90363::new(FakeLink::new(500));
        sensor.begin_read();
        let good = sensor.fetch_result();

        sensor.link.next = Err(SensorFault::Corrupt);
        for _ in 1..MLX90363_REFRESH_CYCLES {
            sensor.fetch_result();
        }
        let faulted = sensor.fetch_result();
        assert_eq!(faulted.status, SensorStatus::Fault);
        assert_eq!(faulted.raw, good.raw);
    }

    #[test]
    fn test_no_ok_until_first_good_exchange() {
        let mut sensor = Mlx90363::new(FakeLink::new(6000));
        sensor.link.next = Err(SensorFault::NotReady);
        sensor.begin_read();

        // 初回の交換が失敗したら、次の更新まで一度もOkを返さない
        for _ in 0..MLX90363_REFRESH_CYCLES {
            assert_eq!(sensor.fetch_result().status, SensorStatus::Fault);
        }

        sensor.link.next = Ok(6000);
        let first = sensor.fetch_result();
        assert_eq!(first, SensorReading::ok(ENCODER_TICKS_PER_REV - 6000));
        // 以降の間のサイクルは本物の値を再利用
        assert_eq!(sensor.fetch_result(), first);
    }

    #[test]
    fn test_estimator_primes_on_real_angle() {
        let calib = Calibration::default();
        let mut est = Estimator::new();
        let mut sensor = Mlx90363::new(FakeLink::new(6000));
        sensor.link.next = Err(SensorFault::NotReady);
        sensor.begin_read();

        for _ in 0..MLX90363_REFRESH_CYCLES {
            est.update_angle(sensor.fetch_result(), &calib);
        }
        sensor.link.next = Ok(6000);
        for _ in 0..MLX90363_REFRESH_CYCLES {
            est.update_angle(sensor.fetch_result(), &calib);
        }

        // 存在しない回転や速度スパイクが出ない
        assert_eq!(est.state().raw_angle, ENCODER_TICKS_PER_REV - 6000);
        assert_eq!(est.state().revolutions, 0);
        assert_eq!(est.state().velocity, 0.0);
    }

    #[test]
    fn test_reverse_zero_stays_zero() {
        assert_eq!(Mlx90363::<FakeLink>::reverse(0), 0);
        assert_eq!(Mlx90363::<FakeLink>::reverse(1), ENCODER_TICKS_PER_REV - 1);
    }
}
