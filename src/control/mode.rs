//! 制御モードとカスケード構成
//!
//! 各モードがどのループを有効にするかを静的テーブルで定義します。

/// 電流段（最内ループ）の動作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CurrentStage {
    /// 相デューティを直接出力（変調なし）
    Bypass,
    /// q軸電圧を直接指令（電流PIなし）
    VoltageDrive,
    /// 外部から与えられたd/q電流指令を使用
    CurrentSetpoint,
    /// トルク指令からq軸電流指令を生成
    TorqueSetpoint,
}

/// モードごとのカスケード構成
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cascade {
    pub position: bool,
    pub velocity: bool,
    pub current: CurrentStage,
}

/// 制御モード
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlMode {
    RawPwm = 0,
    DirectDriveVoltage = 1,
    FocCurrent = 2,
    Torque = 3,
    Velocity = 4,
    Position = 5,
    PositionVelocity = 6,
}

/// 不正なモード番号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidControlMode(pub u8);

const fn cascade(position: bool, velocity: bool, current: CurrentStage) -> Cascade {
    Cascade {
        position,
        velocity,
        current,
    }
}

/// ControlModeの判別値でインデックスする
const CASCADE_TABLE: [Cascade; 7] = [
    cascade(false, false, CurrentStage::Bypass),          // RawPwm
    cascade(false, false, CurrentStage::VoltageDrive),    // DirectDriveVoltage
    cascade(false, false, CurrentStage::CurrentSetpoint), // FocCurrent
    cascade(false, false, CurrentStage::TorqueSetpoint),  // Torque
    cascade(false, true, CurrentStage::TorqueSetpoint),   // Velocity
    cascade(true, true, CurrentStage::TorqueSetpoint),    // Position
    cascade(true, true, CurrentStage::TorqueSetpoint),    // PositionVelocity
];

impl ControlMode {
    /// このモードで動作するループ
    #[inline]
    pub const fn cascade(self) -> Cascade {
        CASCADE_TABLE[self as usize]
    }
}

impl TryFrom<u8> for ControlMode {
    type Error = InvalidControlMode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::RawPwm),
            1 => Ok(Self::DirectDriveVoltage),
            2 => Ok(Self::FocCurrent),
            3 => Ok(Self::Torque),
            4 => Ok(Self::Velocity),
            5 => Ok(Self::Position),
            6 => Ok(Self::PositionVelocity),
            other => Err(InvalidControlMode(other)),
        }
    }
}
