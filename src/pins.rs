//! GPIO / peripheral pin assignments for the PD-Stepper main board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Stepper driver (TMC2209)
// ---------------------------------------------------------------------------

/// Digital output: one rising edge per motor step.
pub const TMC2209_STEP_GPIO: i32 = 2;
/// Digital output: HIGH = increasing virtual angle, LOW = decreasing.
pub const TMC2209_DIR_GPIO: i32 = 3;
/// Digital output: driver enable, **active-low** (LOW = coils energised).
pub const TMC2209_EN_GPIO: i32 = 4;
/// UART pin for TMC2209 register access (reserved — the driver runs in
/// standalone step/dir mode, UART tuning is not wired up).
pub const TMC2209_UART_GPIO: i32 = 5;

// ---------------------------------------------------------------------------
// Magnetic rotary encoder (AS5600, I²C)
// ---------------------------------------------------------------------------

pub const AS5600_SDA_GPIO: i32 = 8;
pub const AS5600_SCL_GPIO: i32 = 9;

/// AS5600 fixed I²C address.
pub const AS5600_I2C_ADDR: u8 = 0x36;
/// ANGLE register (two bytes, big-endian, low 12 bits significant).
pub const AS5600_ANGLE_REG: u8 = 0x0E;

/// I²C master port number used for the encoder bus.
pub const I2C_PORT: i32 = 0;
/// I²C bus clock (AS5600 supports up to 1 MHz; 400 kHz is plenty).
pub const I2C_FREQ_HZ: u32 = 400_000;
