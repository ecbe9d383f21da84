use std::fmt::{self, Display};
use std::str::FromStr;

use strum_macros::EnumIter;
use thiserror::Error;

/// Coldest setpoint the unit accepts, in °C.
pub const TEMP_MIN: u8 = 15;
/// Warmest setpoint the unit accepts, in °C.
pub const TEMP_MAX: u8 = 30;
pub const TEMP_DEFAULT: u8 = 25;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Power {
    Off,
    On,
}

impl Default for Power {
    fn default() -> Self {
        Power::Off
    }
}

/// Operating modes, declared in the order the physical MODE button cycles
/// through them: COOL → DEHUMIDIFY → FAN_ONLY → COOL.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, EnumIter)]
pub enum Mode {
    Cool,
    Dehumidify,
    FanOnly,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Cool
    }
}

#[derive(Error, Debug)]
#[error("Invalid device mode")]
pub struct InvalidMode;

impl FromStr for Mode {
    type Err = InvalidMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cool" => Ok(Mode::Cool),
            "dehumidify" | "dehum" | "dry" => Ok(Mode::Dehumidify),
            "fan_only" | "fan" => Ok(Mode::FanOnly),
            _ => Err(InvalidMode),
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Cool => write!(f, "cool"),
            Mode::Dehumidify => write!(f, "dehumidify"),
            Mode::FanOnly => write!(f, "fan_only"),
        }
    }
}

/// The single SPEED button toggles between these two.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FanSpeed {
    Low,
    High,
}

impl Default for FanSpeed {
    fn default() -> Self {
        FanSpeed::Low
    }
}

#[derive(Error, Debug)]
#[error("Invalid fan speed")]
pub struct InvalidFanSpeed;

impl FromStr for FanSpeed {
    type Err = InvalidFanSpeed;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(FanSpeed::Low),
            "high" => Ok(FanSpeed::High),
            _ => Err(InvalidFanSpeed),
        }
    }
}

/// Believed state of the AC unit. There is no feedback channel, so this is
/// the crate's only record of what the device is doing; it may diverge from
/// physical truth after a manual power cycle (see `StateMachine::reset`).
///
/// `temperature` is meaningful only in COOL mode and `fan_speed` only in
/// FAN_ONLY mode, but a value is always carried for both.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DeviceState {
    pub power: Power,
    pub mode: Mode,
    pub temperature: u8,
    pub fan_speed: FanSpeed,
}

impl DeviceState {
    pub fn new(power: Power, mode: Mode, temperature: u8, fan_speed: FanSpeed) -> DeviceState {
        DeviceState {
            power,
            mode,
            temperature,
            fan_speed,
        }
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        DeviceState {
            power: Power::default(),
            mode: Mode::default(),
            temperature: TEMP_DEFAULT,
            fan_speed: FanSpeed::default(),
        }
    }
}

impl Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "power={:?} mode={} temp={}°C fan={:?}",
            self.power, self.mode, self.temperature, self.fan_speed
        )
    }
}
