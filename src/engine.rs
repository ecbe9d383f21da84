use std::sync::Arc;

use strum::IntoEnumIterator;

use crate::command::{Command, CommandFactory, CommandType};
use crate::state::{DeviceState, FanSpeed, Mode, Power, TEMP_MAX, TEMP_MIN};
use crate::status::{Category, Severity, Status, StatusObserver, StatusReporter};

pub const CAT_INVALID_MODE: Category = Category::new("engine", 1, "Engine.InvalidMode");

/// Reconciles the believed device state against a requested target by
/// simulating presses on the physical remote: one toggling power button, one
/// forward-cycling mode button, relative temperature buttons and a fan
/// toggle. `move_to` returns the press sequence and advances the believed
/// state as if the presses had already landed.
pub struct StateMachine {
    current: DeviceState,
    factory: CommandFactory,
    reporter: StatusReporter,
    commands: Vec<Command>,
}

impl StateMachine {
    pub fn new(factory: CommandFactory) -> StateMachine {
        StateMachine {
            current: DeviceState::default(),
            factory,
            reporter: StatusReporter::new(),
            commands: Vec::new(),
        }
    }

    pub fn register_observer(&mut self, observer: Arc<dyn StatusObserver>) {
        self.reporter.register_observer(observer);
    }

    /// The believed state. Never read back from hardware.
    pub fn state(&self) -> DeviceState {
        self.current
    }

    /// Computes the ordered command sequence from the believed state to
    /// `target`. Deterministic, and idempotent: a second call with the same
    /// target returns an empty sequence.
    pub fn move_to(&mut self, target: DeviceState) -> Vec<Command> {
        self.commands.clear();

        self.generate_power_commands(target.power);

        // Once off, mode/temperature/fan are meaningless.
        if self.current.power == Power::On {
            self.generate_mode_commands(target.mode);

            if self.current.mode == Mode::Cool {
                self.generate_temperature_commands(target.temperature);
            }
            if self.current.mode == Mode::FanOnly {
                self.generate_fan_commands(target.fan_speed);
            }

            debug!(
                "queued {} commands for transition to {}",
                self.commands.len(),
                target
            );
        }
        std::mem::take(&mut self.commands)
    }

    /// Restores the believed state to device defaults without emitting
    /// commands. For resynchronization after a suspected desync, e.g. the
    /// unit was power-cycled at the wall.
    pub fn reset(&mut self) {
        self.current = DeviceState::default();
        self.commands.clear();
        debug!("state machine reset to defaults: {}", self.current);
    }

    fn generate_power_commands(&mut self, target_power: Power) {
        if self.current.power != target_power {
            self.commands.push(self.factory.create(CommandType::Power));
            self.current.power = target_power;
            debug!("power switched to {:?}", target_power);
        }
    }

    fn generate_mode_commands(&mut self, target_mode: Mode) {
        if self.current.mode == target_mode {
            return;
        }
        let steps = match self.mode_steps(self.current.mode, target_mode) {
            Some(steps) => steps,
            None => return,
        };
        if steps > 0 {
            self.commands
                .push(self.factory.create_repeated(CommandType::Mode, steps));
            self.current.mode = target_mode;
            debug!("mode change: {} steps to {}", steps, target_mode);
        }
    }

    fn generate_temperature_commands(&mut self, target_temp: u8) {
        let target_temp = target_temp.clamp(TEMP_MIN, TEMP_MAX);
        let diff = i32::from(target_temp) - i32::from(self.current.temperature);
        if diff == 0 {
            return;
        }
        let command_type = if diff > 0 {
            CommandType::TempUp
        } else {
            CommandType::TempDown
        };
        self.commands
            .push(self.factory.create_repeated(command_type, diff.unsigned_abs()));
        // Applying the exact diff lands the believed temperature on the
        // clamped target.
        self.current.temperature = target_temp;
        debug!("temperature change: {} steps to {}°C", diff, target_temp);
    }

    fn generate_fan_commands(&mut self, target_fan: FanSpeed) {
        if self.current.fan_speed != target_fan {
            self.commands.push(self.factory.create(CommandType::FanSpeed));
            self.current.fan_speed = target_fan;
            debug!("fan speed toggled to {:?}", target_fan);
        }
    }

    /// Forward presses of the MODE button from `from` to `to` along the
    /// cyclic sequence COOL → DEHUMIDIFY → FAN_ONLY. Always in [0, 2].
    fn mode_steps(&self, from: Mode, to: Mode) -> Option<u32> {
        let from_index = Mode::iter().position(|m| m == from);
        let to_index = Mode::iter().position(|m| m == to);
        match (from_index, to_index) {
            (Some(from_index), Some(to_index)) => {
                let len = Mode::iter().count();
                Some(((to_index + len - from_index) % len) as u32)
            }
            _ => {
                self.reporter.report(Status::new(
                    Severity::Warning,
                    CAT_INVALID_MODE,
                    format!("mode not in cycle sequence: from={}, to={}", from, to),
                ));
                None
            }
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        StateMachine::new(CommandFactory::default())
    }
}
