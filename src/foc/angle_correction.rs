// Encoder angle correction lookup table
//
// Periodic correction over one mechanical turn, stored as signed 8-bit
// samples and scaled/offset by calibration.

use core::f32::consts::TAU;

use crate::config::params::ANGLE_CORRECTION_TABLE_SIZE;

/// Encoder angle correction (periodic linear-interpolated LUT)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleCorrection {
    /// Multiplier applied to the table value (0.0 disables correction)
    pub scale: f32,
    /// Constant added after scaling [rad]
    pub offset: f32,
    /// Samples over [0, 2π]; the last sample sits at 2π
    pub table: [i8; ANGLE_CORRECTION_TABLE_SIZE],
}

impl AngleCorrection {
    /// Correction disabled
    pub const fn disabled() -> Self {
        Self {
            scale: 0.0,
            offset: 0.0,
            table: [0; ANGLE_CORRECTION_TABLE_SIZE],
        }
    }

    /// Correction to add to a raw encoder angle
    ///
    /// # Arguments
    /// * `raw_angle` - Raw encoder angle in radians (any value, wrapped to one turn)
    ///
    /// # Returns
    /// `table(raw_angle) * scale + offset`, or 0.0 when `scale` is zero
    pub fn correction(&self, raw_angle: f32) -> f32 {
        if self.scale != 0.0 {
            self.lookup(raw_angle) * self.scale + self.offset
        } else {
            0.0
        }
    }

    /// Interpolated table value at `angle`
    fn lookup(&self, angle: f32) -> f32 {
        const LAST: usize = ANGLE_CORRECTION_TABLE_SIZE - 1;

        let turns = angle / TAU;
        let wrapped = turns - libm::floorf(turns);
        let position = wrapped * LAST as f32;

        // floor of a non-negative value; min() covers wrapped == 1.0 after rounding
        let index = (position as usize).min(LAST - 1);
        let frac = position - index as f32;

        let a = self.table[index] as f32;
        let b = self.table[index + 1] as f32;
        a + (b - a) * frac
    }
}

impl Default for AngleCorrection {
    fn default() -> Self {
        Self::disabled()
    }
}
