//! ブラシレスサーボ制御コア
//!
//! 20kHzの割り込みで起動される1本の制御タスクが、回転センサー・相電流を読み、
//! 位置/速度/電流（FOC）のカスケード制御でPWMデューティを出力します。
#![cfg_attr(not(test), no_std)]

// fmt.rsは他のモジュールより先に宣言（マクロのため）
mod fmt;

pub mod config;
pub mod control;
pub mod foc;
pub mod ivsense;
pub mod motor_driver;
pub mod sensor;
pub mod state;
pub mod telemetry;
