use std::time::Duration;

/// NEC address shared by every button on the stock remote.
pub const NEC_ADDRESS: u16 = 0xFB04;

const POWER_NEC: u16 = 0xFB04;
const TEMP_UP_NEC: u16 = 0xFA05;
const TEMP_DOWN_NEC: u16 = 0xFE01;
const MODE_NEC: u16 = 0xF20D;
const FAN_SPEED_NEC: u16 = 0xF906;

/// The buttons on the physical remote. The actual IR waveform per button is
/// owned by the transmission collaborator; commands only carry the NEC code.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CommandType {
    /// Power on/off toggle.
    Power,
    /// Cycle operating mode one step forward.
    Mode,
    /// Raise the setpoint by 1°C (COOL mode only).
    TempUp,
    /// Lower the setpoint by 1°C (COOL mode only).
    TempDown,
    /// Toggle fan speed LOW/HIGH (FAN_ONLY mode only).
    FanSpeed,
}

impl CommandType {
    pub const fn nec_code(self) -> u16 {
        match self {
            CommandType::Power => POWER_NEC,
            CommandType::Mode => MODE_NEC,
            CommandType::TempUp => TEMP_UP_NEC,
            CommandType::TempDown => TEMP_DOWN_NEC,
            CommandType::FanSpeed => FAN_SPEED_NEC,
        }
    }

    pub const fn is_temperature(self) -> bool {
        matches!(self, CommandType::TempUp | CommandType::TempDown)
    }
}

/// One transmittable button press (possibly repeated). Immutable once built.
///
/// `pacing_delay` is the gap requested after this command; zero means "use
/// the handler's default inter-command delay". Equality is structural over
/// type, address and repeat count — the delay is advisory.
#[derive(Clone, Debug)]
pub struct Command {
    command_type: CommandType,
    address: u16,
    repeat_count: u32,
    pacing_delay: Duration,
}

impl Command {
    pub fn new(
        command_type: CommandType,
        address: u16,
        repeat_count: u32,
        pacing_delay: Duration,
    ) -> Command {
        Command {
            command_type,
            address,
            repeat_count: repeat_count.max(1),
            pacing_delay,
        }
    }

    pub fn command_type(&self) -> CommandType {
        self.command_type
    }

    pub fn nec_code(&self) -> u16 {
        self.command_type.nec_code()
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    pub fn pacing_delay(&self) -> Duration {
        self.pacing_delay
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Command) -> bool {
        self.command_type == other.command_type
            && self.address == other.address
            && self.repeat_count == other.repeat_count
    }
}

impl Eq for Command {}

/// Builds commands with the deployment's fixed device address.
#[derive(Clone, Debug)]
pub struct CommandFactory {
    address: u16,
}

impl CommandFactory {
    pub fn new(address: u16) -> CommandFactory {
        CommandFactory { address }
    }

    pub fn create(&self, command_type: CommandType) -> Command {
        self.create_repeated(command_type, 1)
    }

    pub fn create_repeated(&self, command_type: CommandType, repeat_count: u32) -> Command {
        Command::new(command_type, self.address, repeat_count, Duration::ZERO)
    }

    pub fn create_with_delay(
        &self,
        command_type: CommandType,
        repeat_count: u32,
        pacing_delay: Duration,
    ) -> Command {
        Command::new(command_type, self.address, repeat_count, pacing_delay)
    }
}

impl Default for CommandFactory {
    fn default() -> Self {
        CommandFactory::new(NEC_ADDRESS)
    }
}
