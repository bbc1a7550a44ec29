//! モーター制御とハードウェアの設定パラメータ

use core::f32::consts::TAU;

/// 制御周波数 [Hz]（PWM更新割り込み1回ごとに1サイクル）
pub const CONTROL_FREQUENCY_HZ: f32 = 20_000.0;

/// 制御周期 [s]
pub const CONTROL_PERIOD_S: f32 = 1.0 / CONTROL_FREQUENCY_HZ;

/// エンコーダ1回転あたりのカウント（14ビット）
pub const ENCODER_TICKS_PER_REV: u16 = 16384;

/// エンコーダ1カウントあたりの角度 [rad]
pub const RAD_PER_ENC_TICK: f32 = TAU / ENCODER_TICKS_PER_REV as f32;

/// MLX90363は20サイクルに1回しか新しい角度を返せない
pub const MLX90363_REFRESH_CYCLES: u32 = 20;

/// AS5047D 角度レジスタ（ANGLECOM）
pub const AS5047D_ANGLE_REGISTER: u16 = 0x3fff;

/// MLX90363 Get1Alpha メッセージのタイムアウト値
pub const MLX90363_ALPHA_TIMEOUT: u16 = 0xffff;

/// 連続センサー異常がこの回数に達したらログを出す
pub const SENSOR_FAULT_LOG_THRESHOLD: u32 = 100;

/// 位置ループ入力（位置誤差）の制限 [rad]
pub const POSITION_INPUT_LIMIT: f32 = 1.0;

/// 速度ループ入力の制限 [rad/s]
pub const VELOCITY_INPUT_LIMIT: f32 = 40.0;

/// これ未満のバス電圧では変調率を計算しない [V]
pub const MIN_BUS_VOLTAGE: f32 = 1.0;

/// 角度補正テーブルのサンプル数（最後のサンプルが2πに対応）
pub const ANGLE_CORRECTION_TABLE_SIZE: usize = 257;

/// テレメトリキューの深さ
pub const TELEMETRY_QUEUE_DEPTH: usize = 32;

/// PWM設定（TIM1、3相相補PWM）
pub mod pwm {
    /// デッドタイム（タイマーカウント）
    pub const DEAD_TIME: u16 = 100;
}

/// 電流・電圧センシング（ivsense）のADC設定
pub mod adc {
    /// ADC分解能（12ビット）
    pub const ADC_COUNTS: f32 = 4096.0;

    /// ADC基準電圧 [V]
    pub const VREF: f32 = 3.3;

    /// 電流センスアンプのゲイン [V/V]
    pub const CURRENT_AMP_GAIN: f32 = 20.0;

    /// シャント抵抗 [Ω]
    pub const SHUNT_RESISTANCE: f32 = 0.002;

    /// 電流ゼロ点のADC値（中点バイアス）
    pub const CURRENT_ZERO_COUNTS: f32 = ADC_COUNTS / 2.0;

    /// 1カウントあたりの電流 [A]
    pub const AMPS_PER_COUNT: f32 = VREF / ADC_COUNTS / (CURRENT_AMP_GAIN * SHUNT_RESISTANCE);

    /// 電圧分圧回路: 33.3kΩ + 3.3kΩ
    pub const VOLTAGE_DIVIDER_RATIO: f32 = (33_300.0 + 3_300.0) / 3_300.0;

    /// 1カウントあたりの電圧 [V]
    pub const VOLTS_PER_COUNT: f32 = VREF / ADC_COUNTS * VOLTAGE_DIVIDER_RATIO;

    /// 1サイクルで平均するサンプル数（デフォルト値）
    pub const DEFAULT_SAMPLES_PER_CYCLE: usize = 4;
}

/// キャリブレーションのデフォルト値
pub mod defaults {
    /// d軸電流PIゲイン
    pub const FOC_KP_D: f32 = 1.0;
    pub const FOC_KI_D: f32 = 0.0;

    /// q軸電流PIゲイン
    pub const FOC_KP_Q: f32 = 1.0;
    pub const FOC_KI_Q: f32 = 0.0;

    /// 速度PIゲイン
    pub const VELOCITY_KP: f32 = 0.5;
    pub const VELOCITY_KI: f32 = 0.0;

    /// 位置PIゲイン
    pub const POSITION_KP: f32 = 5.0;
    pub const POSITION_KI: f32 = 0.0;

    /// トルク制限 [N·m]
    pub const TORQUE_LIMIT: f32 = 1.0;

    /// 速度制限 [rad/s]
    pub const VELOCITY_LIMIT: f32 = 10.0;

    /// 極対数（電気回転数 / 機械回転数）
    pub const EREVS_PER_MREV: u16 = 14;

    /// トルク定数 [N·m/A]
    pub const MOTOR_TORQUE_CONST: f32 = 0.03;

    /// 巻線抵抗 [Ω]
    pub const MOTOR_RESISTANCE: f32 = 0.1;

    /// 指令タイムアウト [ms]（0で無効）
    pub const CONTROL_TIMEOUT_MS: u16 = 1000;

    /// 速度ローパスフィルタ係数
    pub const VELOCITY_FILTER_PARAM: f32 = 0.01;
}
