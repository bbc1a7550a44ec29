// PI (Proportional-Integral) controller with anti-windup, auto/manual mode and feed-forward bias

/// Controller activation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoopMode {
    /// Closed loop: `update` computes a new output
    Auto,
    /// Held: `update` returns the last output and the integrator is frozen
    Manual,
}

/// PI controller with anti-windup, input/output limiting and bias
pub struct PiController {
    /// Proportional gain
    kp: f32,
    /// Integral gain
    ki: f32,
    /// Integral accumulator
    integral: f32,
    /// Input (setpoint and process value) limits
    input_min: f32,
    input_max: f32,
    /// Output limits
    output_min: f32,
    output_max: f32,
    /// Feed-forward bias added to the PI output
    bias: f32,
    /// Last calculated output
    last_output: f32,
    mode: LoopMode,
}

impl PiController {
    /// Create a new PI controller (starts held in `Manual`)
    ///
    /// # Arguments
    /// * `kp` - Proportional gain
    /// * `ki` - Integral gain
    /// * `output_min` - Minimum output limit
    /// * `output_max` - Maximum output limit
    pub const fn new(kp: f32, ki: f32, output_min: f32, output_max: f32) -> Self {
        Self {
            kp,
            ki,
            integral: 0.0,
            input_min: f32::NEG_INFINITY,
            input_max: f32::INFINITY,
            output_min,
            output_max,
            bias: 0.0,
            last_output: 0.0,
            mode: LoopMode::Manual,
        }
    }

    /// Create a symmetric PI controller (output range: -limit to +limit)
    pub const fn new_symmetric(kp: f32, ki: f32, output_limit: f32) -> Self {
        Self::new(kp, ki, -output_limit, output_limit)
    }

    /// Switch between auto and manual
    ///
    /// Entering `Auto` from `Manual` starts from an empty integrator.
    pub fn set_mode(&mut self, mode: LoopMode) {
        if mode == LoopMode::Auto && self.mode == LoopMode::Manual {
            self.integral = 0.0;
        }
        self.mode = mode;
    }

    pub fn mode(&self) -> LoopMode {
        self.mode
    }

    /// Update the PI controller
    ///
    /// # Arguments
    /// * `setpoint` - Desired value (clamped to the input limits)
    /// * `measured` - Actual measured value (clamped to the input limits)
    /// * `dt` - Time step (seconds)
    ///
    /// # Returns
    /// `bias + kp·e + ki·∫e`, limited to output_min..output_max.
    /// In `Manual` the last output is returned unchanged.
    pub fn update(&mut self, setpoint: f32, measured: f32, dt: f32) -> f32 {
        if self.mode == LoopMode::Manual {
            return self.last_output;
        }

        let setpoint = setpoint.clamp(self.input_min, self.input_max);
        let measured = measured.clamp(self.input_min, self.input_max);
        let error = setpoint - measured;

        // Integrate unless saturated and the error would push further into saturation
        let winding_up = (self.last_output >= self.output_max && error > 0.0)
            || (self.last_output <= self.output_min && error < 0.0);
        if !winding_up {
            self.integral += error * dt;
        }

        let output = self.bias + self.kp * error + self.ki * self.integral;
        self.last_output = output.clamp(self.output_min, self.output_max);
        self.last_output
    }

    /// Set the proportional and integral gains
    pub fn set_gains(&mut self, kp: f32, ki: f32) {
        self.kp = kp;
        self.ki = ki;
    }

    /// Set the input limits applied to setpoint and process value
    pub fn set_input_limits(&mut self, input_min: f32, input_max: f32) {
        self.input_min = input_min;
        self.input_max = input_max;
    }

    /// Set symmetric output limits (±limit)
    pub fn set_symmetric_limit(&mut self, output_limit: f32) {
        let limit = libm::fabsf(output_limit);
        self.output_min = -limit;
        self.output_max = limit;
    }

    /// Set the feed-forward bias for the next update
    pub fn set_bias(&mut self, bias: f32) {
        self.bias = bias;
    }

    /// Get the current output
    pub fn get_output(&self) -> f32 {
        self.last_output
    }

    /// Get the current integral term
    pub fn get_integral(&self) -> f32 {
        self.integral
    }

    /// Check if output is currently saturated
    pub fn is_saturated(&self) -> bool {
        self.last_output <= self.output_min || self.last_output >= self.output_max
    }
}
