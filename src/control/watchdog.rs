//! 指令タイムアウト監視
//!
//! 最後の生存通知から `control_timeout_ms` 以上経過したらブレーキを要求します。
//! ブレーキ中は毎サイクル要求し続け、新しい生存通知で解除されます。

use embassy_time::{Duration, Instant};

use crate::fmt::*;

pub struct Watchdog {
    tripped: bool,
}

impl Watchdog {
    pub const fn new() -> Self {
        Self { tripped: false }
    }

    /// タイムアウト判定
    ///
    /// # Arguments
    /// * `timeout_ms` - タイムアウト [ms]（0で無効）
    /// * `last_command` - 最後の生存通知の時刻
    /// * `now` - 現在時刻
    ///
    /// # Returns
    /// ブレーキが必要なら `true`
    pub fn check(&mut self, timeout_ms: u16, last_command: Instant, now: Instant) -> bool {
        let expired = timeout_ms != 0
            && now.saturating_duration_since(last_command)
                >= Duration::from_millis(timeout_ms as u64);

        if expired && !self.tripped {
            warn!("Command timeout ({} ms), braking", timeout_ms);
        } else if !expired && self.tripped {
            info!("Command received, watchdog cleared");
        }
        self.tripped = expired;
        expired
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}
