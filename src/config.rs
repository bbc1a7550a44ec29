//! Configuration module
//!
//! このモジュールはモーター制御とハードウェアの設定を提供します。

pub mod calibration;
pub mod parameters;
pub mod params;

// params.rsから主要な定数を再エクスポート
pub use params::*;

pub use calibration::{AdcScale, Calibration};
pub use parameters::Parameters;
