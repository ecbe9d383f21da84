//! Pure translation between the host's generic climate vocabulary and the
//! device vocabulary. Stateless; unmapped values fall back to documented
//! defaults (mode → COOL, fan → LOW) instead of failing.

use std::str::FromStr;

use thiserror::Error;

use crate::state::{DeviceState, FanSpeed, Mode, Power};

/// Host-side operating mode. Richer than the device supports on purpose: the
/// host vocabulary churns independently of this crate.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ClimateMode {
    Auto,
    Cool,
    Dry,
    FanOnly,
    Heat,
}

#[derive(Error, Debug)]
#[error("Invalid climate mode")]
pub struct InvalidClimateMode;

impl FromStr for ClimateMode {
    type Err = InvalidClimateMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ClimateMode::Auto),
            "cool" => Ok(ClimateMode::Cool),
            "dry" => Ok(ClimateMode::Dry),
            "fan_only" | "fan" => Ok(ClimateMode::FanOnly),
            "heat" => Ok(ClimateMode::Heat),
            _ => Err(InvalidClimateMode),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ClimateFanMode {
    Auto,
    Low,
    Medium,
    High,
}

#[derive(Error, Debug)]
#[error("Invalid climate fan mode")]
pub struct InvalidClimateFanMode;

impl FromStr for ClimateFanMode {
    type Err = InvalidClimateFanMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ClimateFanMode::Auto),
            "low" => Ok(ClimateFanMode::Low),
            "medium" => Ok(ClimateFanMode::Medium),
            "high" => Ok(ClimateFanMode::High),
            _ => Err(InvalidClimateFanMode),
        }
    }
}

/// Target state as the host expresses it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClimateState {
    pub power: bool,
    pub mode: ClimateMode,
    pub target_temperature: f32,
    pub fan_mode: ClimateFanMode,
}

pub fn device_power(on: bool) -> Power {
    if on {
        Power::On
    } else {
        Power::Off
    }
}

pub fn power_is_on(power: Power) -> bool {
    power == Power::On
}

/// Heat and Auto have no device equivalent; they fall back to COOL.
pub fn device_mode(mode: ClimateMode) -> Mode {
    match mode {
        ClimateMode::Cool => Mode::Cool,
        ClimateMode::Dry => Mode::Dehumidify,
        ClimateMode::FanOnly => Mode::FanOnly,
        ClimateMode::Auto | ClimateMode::Heat => Mode::Cool,
    }
}

pub fn climate_mode(mode: Mode) -> ClimateMode {
    match mode {
        Mode::Cool => ClimateMode::Cool,
        Mode::Dehumidify => ClimateMode::Dry,
        Mode::FanOnly => ClimateMode::FanOnly,
    }
}

/// The device fan is a two-position toggle; anything below HIGH maps to LOW.
pub fn device_fan_speed(fan_mode: ClimateFanMode) -> FanSpeed {
    match fan_mode {
        ClimateFanMode::High => FanSpeed::High,
        ClimateFanMode::Auto | ClimateFanMode::Low | ClimateFanMode::Medium => FanSpeed::Low,
    }
}

pub fn climate_fan_mode(fan_speed: FanSpeed) -> ClimateFanMode {
    match fan_speed {
        FanSpeed::Low => ClimateFanMode::Low,
        FanSpeed::High => ClimateFanMode::High,
    }
}

/// Quantizes the host's f32 setpoint to whole degrees here; range clamping
/// is the reconciliation engine's job.
pub fn device_state(climate: &ClimateState) -> DeviceState {
    DeviceState {
        power: device_power(climate.power),
        mode: device_mode(climate.mode),
        temperature: climate.target_temperature.round().clamp(0.0, 255.0) as u8,
        fan_speed: device_fan_speed(climate.fan_mode),
    }
}

pub fn climate_state(device: &DeviceState) -> ClimateState {
    ClimateState {
        power: power_is_on(device.power),
        mode: climate_mode(device.mode),
        target_temperature: f32::from(device.temperature),
        fan_mode: climate_fan_mode(device.fan_speed),
    }
}
