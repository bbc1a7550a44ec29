//! 共有状態管理
//!
//! コマンド層（書き込み側）と制御タスクの間で共有する状態。
//! 構造体まるごとのスナップショットを短いクリティカルセクションでやり取りするので、
//! 読み手がフィールド間で不整合な値を見ることはありません。

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::Instant;

use crate::config::{Calibration, Parameters};
use crate::control::ControlStatus;

/// クリティカルセクションで保護された `Copy` 値
pub struct Shared<T: Copy> {
    inner: Mutex<CriticalSectionRawMutex, Cell<T>>,
}

impl<T: Copy> Shared<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(Cell::new(value)),
        }
    }

    /// スナップショットを取得
    pub fn get(&self) -> T {
        self.inner.lock(|cell| cell.get())
    }

    pub fn set(&self, value: T) {
        self.inner.lock(|cell| cell.set(value));
    }

    /// 読み出し・変更・書き戻しを1つのクリティカルセクションで行う
    pub fn modify<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.inner.lock(|cell| {
            let mut value = cell.get();
            let result = f(&mut value);
            cell.set(value);
            result
        })
    }
}

/// 制御タスクとコマンド層が共有する状態
pub struct SharedState {
    calibration: Shared<Calibration>,
    parameters: Shared<Parameters>,
    status: Shared<ControlStatus>,
    last_command: Shared<Instant>,
    /// 制御サイクル起動（複数回の通知は1回にまとまる）
    wake: Signal<CriticalSectionRawMutex, ()>,
}

impl SharedState {
    pub const fn new() -> Self {
        Self {
            calibration: Shared::new(Calibration::default()),
            parameters: Shared::new(Parameters::default()),
            status: Shared::new(ControlStatus::new()),
            last_command: Shared::new(Instant::from_ticks(0)),
            wake: Signal::new(),
        }
    }

    // === キャリブレーション ===

    pub fn calibration(&self) -> Calibration {
        self.calibration.get()
    }

    pub fn set_calibration(&self, calibration: Calibration) {
        self.calibration.set(calibration);
    }

    pub fn update_calibration<R>(&self, f: impl FnOnce(&mut Calibration) -> R) -> R {
        self.calibration.modify(f)
    }

    // === ランタイムパラメータ ===

    pub fn parameters(&self) -> Parameters {
        self.parameters.get()
    }

    pub fn set_parameters(&self, parameters: Parameters) {
        self.parameters.set(parameters);
    }

    pub fn update_parameters<R>(&self, f: impl FnOnce(&mut Parameters) -> R) -> R {
        self.parameters.modify(f)
    }

    // === 制御ステータス ===

    /// 直近サイクルの推定状態と指令値
    pub fn status(&self) -> ControlStatus {
        self.status.get()
    }

    pub(crate) fn publish_status(&self, status: ControlStatus) {
        self.status.set(status);
    }

    // === ウォッチドッグ ===

    /// 指令の生存通知（タイムアウトをリセット）
    pub fn reset_control_timeout(&self, now: Instant) {
        self.last_command.set(now);
    }

    pub fn last_command(&self) -> Instant {
        self.last_command.get()
    }

    // === サイクル起動 ===

    /// 制御サイクルを起動（割り込みコンテキストから呼び出し可）
    pub fn trigger_cycle(&self) {
        self.wake.signal(());
    }

    /// 次の起動まで待機
    pub async fn wait_for_trigger(&self) {
        self.wake.wait().await;
    }

    /// 未処理の起動があるか
    pub fn trigger_pending(&self) -> bool {
        self.wake.signaled()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
