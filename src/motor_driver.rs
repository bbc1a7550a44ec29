//! 3相PWM出力
//!
//! 制御ループはデューティ比（0.0～1.0）だけを扱い、タイマーのカウント値への変換は実装側が行います。

/// 3相PWM出力
pub trait PhaseDriver {
    /// 相 `channel`（0..3）のデューティ比を設定
    fn set_duty(&mut self, channel: usize, duty: f32);

    /// 3相まとめて設定
    fn set_duties(&mut self, duties: [f32; 3]) {
        for (channel, duty) in duties.into_iter().enumerate() {
            self.set_duty(channel, duty);
        }
    }
}

impl<T: PhaseDriver + ?Sized> PhaseDriver for &mut T {
    fn set_duty(&mut self, channel: usize, duty: f32) {
        (**self).set_duty(channel, duty)
    }

    fn set_duties(&mut self, duties: [f32; 3]) {
        (**self).set_duties(duties)
    }
}

/// デューティ比 → タイマー比較値
///
/// 範囲外のデューティは 0.0～1.0 に丸めます。
#[inline]
pub fn duty_to_compare(duty: f32, max_duty: u16) -> u16 {
    (duty.clamp(0.0, 1.0) * max_duty as f32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        duties: [f32; 3],
        writes: usize,
    }

    impl PhaseDriver for Recorder {
        fn set_duty(&mut self, channel: usize, duty: f32) {
            self.duties[channel] = duty;
            self.writes += 1;
        }
    }

    #[test]
    fn test_set_duties_writes_each_channel() {
        let mut rec = Recorder::default();
        rec.set_duties([0.1, 0.5, 0.9]);
        assert_eq!(rec.duties, [0.1, 0.5, 0.9]);
        assert_eq!(rec.writes, 3);
    }

    #[test]
    fn test_duty_to_compare() {
        assert_eq!(duty_to_compare(0.0, 4250), 0);
        assert_eq!(duty_to_compare(0.5, 4250), 2125);
        assert_eq!(duty_to_compare(1.0, 4250), 4250);
        assert_eq!(duty_to_compare(1.5, 4250), 4250);
        assert_eq!(duty_to_compare(-0.2, 4250), 0);
    }
}
