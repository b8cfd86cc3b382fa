//! Answers to hardware queries that have no hardware behind them on a host.

use serde::{Deserialize, Serialize};

/// Nominal core clock reported to code that scales by CPU speed.
pub const SYSTEM_CORE_CLOCK_HZ: u32 = 500_000_000;

const ESC_UPDATE_FREQUENCY_HZ: u32 = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PwmInitError {
    #[default]
    None,
}

impl PwmInitError {
    pub fn message(self) -> &'static str {
        match self {
            PwmInitError::None => "No error",
        }
    }
}

pub fn esc_update_frequency_hz() -> u32 {
    ESC_UPDATE_FREQUENCY_HZ
}

/// Outputs are virtual, so initialisation cannot fail.
pub fn pwm_init_error() -> PwmInitError {
    PwmInitError::None
}

pub fn is_mpu_soft_reset() -> bool {
    false
}

pub fn version_banner() -> String {
    format!("{} {} SITL", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
