//! AS5600 magnetic rotary encoder.
//!
//! 12-bit absolute angle over I²C: the ANGLE register holds two bytes,
//! big-endian, with the low 12 bits significant.  One count is
//! 360/4096 ≈ 0.0879°.
//!
//! A failed bus transaction surfaces as an [`EncoderError`], never as a
//! made-up angle — downstream drift correction must be able to tell
//! "shaft at 0°" apart from "sensor unreachable".

use crate::app::ports::EncoderPort;
use crate::drivers::hw_init;
use crate::error::EncoderError;
use crate::pins;

/// Degrees per encoder count.
const DEG_PER_COUNT: f32 = 360.0 / 4096.0;

/// AS5600 driver over the shared I²C bus.
pub struct As5600Encoder;

impl As5600Encoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for As5600Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EncoderPort for As5600Encoder {
    fn read_angle_deg(&mut self) -> Result<f32, EncoderError> {
        let mut raw = [0u8; 2];
        hw_init::i2c_read_reg(pins::AS5600_I2C_ADDR, pins::AS5600_ANGLE_REG, &mut raw)
            .map_err(|_| EncoderError::BusError)?;
        Ok(counts_to_deg(raw))
    }
}

/// Convert the two ANGLE register bytes to degrees in `[0, 360)`.
fn counts_to_deg(raw: [u8; 2]) -> f32 {
    let counts = (u16::from_be_bytes(raw)) & 0x0FFF;
    f32::from(counts) * DEG_PER_COUNT
}
