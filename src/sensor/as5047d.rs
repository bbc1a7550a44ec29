//! AS5047D アダプタ（毎サイクル更新）
//!
//! パイプライン化されたレジスタ読み取り: 今回の結果を取り出した直後に次の読み取りを開始し、
//! 転送レイテンシを次の制御周期に隠します。
//! 読み取り失敗時は前回の正常値を `Fault` として返します。

use super::{RotarySensor, SensorFault, SensorReading};
use crate::config::params::AS5047D_ANGLE_REGISTER;
use crate::fmt::*;

/// 角度データ（14ビット）
const ANGLE_MASK: u16 = 0x3fff;

/// 読み取りコマンド（bit14 = R）
pub fn read_command(register: u16) -> u16 {
    with_even_parity((register & 0x3fff) | 0x4000)
}

/// 応答フレームの検査（bit15 = パリティ、bit14 = エラーフラグ）
///
/// MISO断線で 0xffff が返る場合もエラーフラグで弾かれます。
pub fn check_response(word: u16) -> Result<u16, SensorFault> {
    if word.count_ones() % 2 == 1 {
        Err(SensorFault::Corrupt)
    } else if word & 0x4000 != 0 {
        Err(SensorFault::Status)
    } else {
        Ok(word)
    }
}

#[inline]
fn with_even_parity(frame: u16) -> u16 {
    if frame.count_ones() % 2 == 1 {
        frame | 0x8000
    } else {
        frame
    }
}

/// パイプライン読み取りを行うSPIトランスポート
///
/// 割り込みコンテキストからも呼ばれるため、どちらもブロックしないこと。
pub trait PipelinedRegisterLink {
    /// レジスタ読み取りを開始
    fn start_read(&mut self, register: u16);

    /// 直前に開始した読み取りの結果（エラーフラグ・パリティ検査済みの応答フレーム）
    fn read_result(&mut self) -> Result<u16, SensorFault>;
}

pub struct As5047d<L> {
    link: L,
    last_raw: u16,
}

impl<L: PipelinedRegisterLink> As5047d<L> {
    pub fn new(link: L) -> Self {
        Self { link, last_raw: 0 }
    }
}

impl<L: PipelinedRegisterLink> RotarySensor for As5047d<L> {
    fn begin_read(&mut self) {
        critical_section::with(|_| self.link.start_read(AS5047D_ANGLE_REGISTER));
    }

    fn fetch_result(&mut self) -> SensorReading {
        let result = critical_section::with(|_| {
            let result = self.link.read_result();
            self.link.start_read(AS5047D_ANGLE_REGISTER);
            result
        });

        match result {
            Ok(frame) => {
                self.last_raw = frame & ANGLE_MASK;
                SensorReading::ok(self.last_raw)
            }
            Err(fault) => {
                trace!("AS5047D read failed: {:?}", fault);
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
        angles: [Result<u16, SensorFault>; 4],
        started: usize,
        harvested: usize,
        /// 開始済みで未回収の要求数
        in_flight: usize,
        max_in_flight: usize,
    }

    impl FakeLink {
        fn new(angles: [Result<u16, SensorFault>; 4]) -> Self {
            Self {
                angles,
                started: 0,
                harvested: 0,
                in_flight: 0,
                max_in_flight: 0,
            }
        }
    }

    impl PipelinedRegisterLink for FakeLink {
        fn start_read(&mut self, register: u16) {
            assert_eq!(register, AS5047D_ANGLE_REGISTER);
            self.started += 1;
            self.in_flight += 1;
            self.max_in_flight = self.max_in_flight.max(self.in_flight);
        }

        fn read_result(&mut self) -> Result<u16, SensorFault> {
            assert!(self.in_flight > 0, "result read without a started request");
            self.in_flight -= 1;
            let value = self.angles[self.harvested % self.angles.len()];
            self.harvested += 1;
            value
        }
    }

    #[test]
    fn test_fetch_restarts_pipeline() {
        let mut sensor = As5047d::new(FakeLink::new([Ok(10), Ok(20), Ok(30), Ok(40)]));
        sensor.begin_read();

        assert_eq!(sensor.fetch_result(), SensorReading::ok(10));
        assert_eq!(sensor.fetch_result(), SensorReading::ok(20));
        assert_eq!(sensor.fetch_result(), SensorReading::ok(30));

        // 常に1つだけ要求が飛んでいる
        assert_eq!(sensor.link.started, 4);
        assert_eq!(sensor.link.in_flight, 1);
        assert_eq!(sensor.link.max_in_flight, 1);
    }

    #[test]
    fn test_flag_bits_masked() {
        let mut sensor = As5047d::new(FakeLink::new([Ok(0x8000 | 1234), Ok(0), Ok(0), Ok(0)]));
        sensor.begin_read();
        // パリティビットは角度に含めない
        assert_eq!(sensor.fetch_result().raw, 1234);
    }

    #[test]
    fn test_read_command_parity() {
        // 0x3fff | R = 15ビット → パリティ付与
        assert_eq!(read_command(0x3fff), 0xffff);
        assert_eq!(read_command(0x0001), 0x4001);
        assert_eq!(read_command(0x0001).count_ones() % 2, 0);
    }

    #[test]
    fn test_check_response() {
        assert_eq!(check_response(0x8000 | 1), Ok(0x8001));
        assert_eq!(check_response(3), Ok(3));
        assert_eq!(check_response(0xffff), Err(SensorFault::Status));
        assert_eq!(check_response(1), Err(SensorFault::Corrupt));
        assert_eq!(check_response(0x4000 | 1), Err(SensorFault::Status));
    }

    #[test]
    fn test_link_errors_reported_as_fault() {
        let mut sensor = As5047d::new(FakeLink::new([
            Ok(700),
            Err(SensorFault::Status),
            Err(SensorFault::NotReady),
            Ok(710),
        ]));
        sensor.begin_read();

        assert_eq!(sensor.fetch_result(), SensorReading::ok(700));
        // 失敗中は前回の正常値をFaultで返す
        assert_eq!(sensor.fetch_result(), SensorReading::fault(700));
        assert_eq!(sensor.fetch_result(), SensorReading::fault(700));
        assert_eq!(sensor.fetch_result(), SensorReading::ok(710));
        // パイプラインは失敗時も再開される
        assert_eq!(sensor.link.in_flight, 1);
    }

    #[test]
    fn test_persistent_loss_raises_fault_streak() {
        let calib = Calibration::default();
        let mut est = Estimator::new();
        let mut sensor = As5047d::new(FakeLink::new([
            Ok(300),
            Err(SensorFault::Status),
            Err(SensorFault::Status),
            Err(SensorFault::Status),
        ]));
        sensor.begin_read();

        est.update_angle(sensor.fetch_result(), &calib);
        for _ in 0..3 {
            let reading = sensor.fetch_result();
            assert_eq!(reading.status, SensorStatus::Fault);
            est.update_angle(reading, &calib);
        }
        assert_eq!(est.state().sensor_fault_streak, 3);
        assert_eq!(est.state().raw_angle, 300);
    }
}
