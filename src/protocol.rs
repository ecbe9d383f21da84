use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::command::Command;
use crate::queue::{CommandQueue, QueueConsumer};
use crate::scheduler::Scheduler;
use crate::status::{Category, Severity, Status, StatusObserver, StatusReporter};

/// How long the unit keeps its temperature-adjust overlay up after the last
/// temperature press.
pub const SETTING_MODE_TIMEOUT: Duration = Duration::from_millis(5000);
/// Extra settle time after the press that opens the temperature overlay.
pub const SETTING_MODE_ENTER_DELAY: Duration = Duration::from_millis(150);
/// Default gap between consecutive transmissions.
pub const INTER_COMMAND_DELAY: Duration = Duration::from_millis(200);

pub const TIMEOUT_NEXT_COMMAND: &str = "ac_next_command";
pub const TIMEOUT_SETTING_MODE: &str = "ac_setting_mode";

pub const CAT_QUEUE_UNAVAILABLE: Category =
    Category::new("protocol", 1, "Protocol.QueueUnavailable");

/// Opaque transmission capability. Called once per physical button press;
/// repeats and pacing are owned by the handler, and the outcome of the
/// underlying IR emission is not interpreted here.
pub trait Transmit: Send {
    fn transmit(&mut self, command: &Command);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TempState {
    Idle,
    SettingActive,
}

struct Inner {
    queue: Arc<Mutex<CommandQueue>>,
    transmitter: Box<dyn Transmit>,
    scheduler: Arc<dyn Scheduler>,
    temp_state: TempState,
    presses_left: u32,
    wake_pending: Arc<AtomicBool>,
    reporter: StatusReporter,
}

/// Drains the command queue one press at a time, pacing transmissions to the
/// device's timing quirks. Never blocks: between presses it hands control
/// back to the host scheduler and resumes via the named `ac_next_command`
/// timeout. A second named timeout, `ac_setting_mode`, tracks the window
/// during which the unit interprets temperature presses immediately.
pub struct ProtocolHandler {
    inner: Arc<Mutex<Inner>>,
    queue: Arc<Mutex<CommandQueue>>,
    scheduler: Arc<dyn Scheduler>,
    listener: Arc<QueueListener>,
}

impl ProtocolHandler {
    pub fn new(
        queue: Arc<Mutex<CommandQueue>>,
        transmitter: Box<dyn Transmit>,
        scheduler: Arc<dyn Scheduler>,
    ) -> ProtocolHandler {
        let wake_pending = Arc::new(AtomicBool::new(false));
        let inner = Arc::new(Mutex::new(Inner {
            queue: queue.clone(),
            transmitter,
            scheduler: scheduler.clone(),
            temp_state: TempState::Idle,
            presses_left: 0,
            wake_pending: wake_pending.clone(),
            reporter: StatusReporter::new(),
        }));
        let listener = Arc::new(QueueListener {
            inner: inner.clone(),
            scheduler: scheduler.clone(),
            wake_pending,
        });
        ProtocolHandler {
            inner,
            queue,
            scheduler,
            listener,
        }
    }

    /// Registers as the queue's consumer and, if work is already queued,
    /// starts draining immediately.
    pub fn start(&self) {
        let kick = match self.queue.lock() {
            Ok(mut queue) => {
                queue.register_consumer(self.listener.clone());
                !queue.is_empty()
            }
            Err(_) => {
                error!("Could not get lock for command queue during start");
                false
            }
        };
        if kick {
            self.listener.on_command_enqueued();
        }
    }

    /// Cancels pending continuations and the setting-mode timeout, returns to
    /// IDLE and discards in-flight repeat progress. Pair with
    /// `StateMachine::reset` and `CommandQueue::reset` when resynchronizing.
    pub fn reset(&self) {
        self.scheduler.cancel(TIMEOUT_NEXT_COMMAND);
        self.scheduler.cancel(TIMEOUT_SETTING_MODE);
        match self.inner.lock() {
            Ok(mut state) => {
                state.temp_state = TempState::Idle;
                state.presses_left = 0;
                state.wake_pending.store(false, Ordering::SeqCst);
                debug!("protocol handler reset");
            }
            Err(_) => error!("Could not get lock for protocol handler during reset"),
        }
    }

    pub fn register_observer(&self, observer: Arc<dyn StatusObserver>) {
        if let Ok(mut state) = self.inner.lock() {
            state.reporter.register_observer(observer);
        }
    }

    /// Whether the temperature-adjust window is believed open.
    pub fn in_setting_mode(&self) -> bool {
        self.inner
            .lock()
            .map(|state| state.temp_state == TempState::SettingActive)
            .unwrap_or(false)
    }
}

impl Drop for ProtocolHandler {
    fn drop(&mut self) {
        if let Ok(mut queue) = self.queue.lock() {
            let listener: Arc<dyn QueueConsumer> = self.listener.clone();
            queue.unregister_consumer(&listener);
        }
        self.scheduler.cancel(TIMEOUT_NEXT_COMMAND);
        self.scheduler.cancel(TIMEOUT_SETTING_MODE);
    }
}

struct QueueListener {
    inner: Arc<Mutex<Inner>>,
    scheduler: Arc<dyn Scheduler>,
    wake_pending: Arc<AtomicBool>,
}

impl QueueConsumer for QueueListener {
    fn on_command_enqueued(&self) {
        // Runs under the queue lock, so only touch the wake flag and the
        // scheduler here. Skipping when a continuation is already pending
        // keeps a fresh enqueue from cutting an inter-command delay short.
        if !self.wake_pending.swap(true, Ordering::SeqCst) {
            let inner = self.inner.clone();
            self.scheduler.schedule(
                TIMEOUT_NEXT_COMMAND,
                Duration::ZERO,
                Box::new(move || process_next(&inner)),
            );
        }
    }

    fn on_queue_drained(&self) {
        trace!("command queue drained");
    }
}

fn process_next(inner: &Arc<Mutex<Inner>>) {
    let Ok(mut state) = inner.lock() else {
        error!("Could not get lock for protocol handler");
        return;
    };
    state.wake_pending.store(false, Ordering::SeqCst);

    let front = match state.queue.lock() {
        Ok(queue) => queue.get(0).ok().cloned(),
        Err(_) => {
            state.reporter.report(Status::new(
                Severity::Error,
                CAT_QUEUE_UNAVAILABLE,
                "Could not get lock for command queue",
            ));
            None
        }
    };
    let Some(command) = front else {
        debug!("all queued commands executed");
        return;
    };

    if state.presses_left == 0 {
        state.presses_left = command.repeat_count();
    }

    let delay = if command.command_type().is_temperature() {
        let entering = state.temp_state == TempState::Idle;
        if entering {
            debug!("entering temperature setting mode");
        }
        state.transmitter.transmit(&command);
        state.presses_left -= 1;
        state.temp_state = TempState::SettingActive;

        // Refresh the setting window after every press.
        let for_timeout = inner.clone();
        state.scheduler.schedule(
            TIMEOUT_SETTING_MODE,
            SETTING_MODE_TIMEOUT,
            Box::new(move || on_setting_mode_timeout(&for_timeout)),
        );

        if state.presses_left == 0 {
            dequeue_front(&mut state);
        }
        if entering {
            SETTING_MODE_ENTER_DELAY
        } else {
            INTER_COMMAND_DELAY
        }
    } else {
        for _ in 0..state.presses_left {
            state.transmitter.transmit(&command);
        }
        state.presses_left = 0;
        dequeue_front(&mut state);
        if command.pacing_delay() > Duration::ZERO {
            command.pacing_delay()
        } else {
            INTER_COMMAND_DELAY
        }
    };

    state.wake_pending.store(true, Ordering::SeqCst);
    let for_next = inner.clone();
    state.scheduler.schedule(
        TIMEOUT_NEXT_COMMAND,
        delay,
        Box::new(move || process_next(&for_next)),
    );
}

fn dequeue_front(state: &mut Inner) {
    match state.queue.lock() {
        Ok(mut queue) => {
            if let Err(e) = queue.dequeue() {
                warn!("dequeue after transmission failed: {}", e);
            }
        }
        Err(_) => {
            state.reporter.report(Status::new(
                Severity::Error,
                CAT_QUEUE_UNAVAILABLE,
                "Could not get lock for command queue",
            ));
        }
    }
}

fn on_setting_mode_timeout(inner: &Arc<Mutex<Inner>>) {
    let Ok(mut state) = inner.lock() else {
        error!("Could not get lock for protocol handler");
        return;
    };
    if state.temp_state == TempState::SettingActive {
        state.temp_state = TempState::Idle;
        debug!("temperature setting mode timed out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandFactory, CommandType};
    use crate::scheduler::ManualScheduler;

    #[derive(Clone, Default)]
    struct RecordingTransmitter {
        sent: Arc<Mutex<Vec<CommandType>>>,
    }

    impl Transmit for RecordingTransmitter {
        fn transmit(&mut self, command: &Command) {
            self.sent.lock().unwrap().push(command.command_type());
        }
    }

    impl RecordingTransmitter {
        fn sent(&self) -> Vec<CommandType> {
            self.sent.lock().unwrap().clone()
        }
    }

    struct Fixture {
        queue: Arc<Mutex<CommandQueue>>,
        scheduler: Arc<ManualScheduler>,
        transmitter: RecordingTransmitter,
        handler: ProtocolHandler,
        factory: CommandFactory,
    }

    fn fixture() -> Fixture {
        let queue = Arc::new(Mutex::new(CommandQueue::new(16)));
        let scheduler = Arc::new(ManualScheduler::new());
        let transmitter = RecordingTransmitter::default();
        let handler = ProtocolHandler::new(
            queue.clone(),
            Box::new(transmitter.clone()),
            scheduler.clone(),
        );
        handler.start();
        Fixture {
            queue,
            scheduler,
            transmitter,
            handler,
            factory: CommandFactory::default(),
        }
    }

    impl Fixture {
        fn enqueue(&self, command: Command) {
            self.queue.lock().unwrap().enqueue(command).unwrap();
        }

        fn queue_len(&self) -> usize {
            self.queue.lock().unwrap().len()
        }
    }

    #[test]
    fn temperature_presses_pace_through_setting_mode() {
        let fx = fixture();
        fx.enqueue(fx.factory.create_repeated(CommandType::TempUp, 3));

        // Wake from the enqueue, immediate.
        assert_eq!(
            fx.scheduler.delay_of(TIMEOUT_NEXT_COMMAND),
            Some(Duration::ZERO)
        );

        // First press opens the overlay: entry delay, window timer armed.
        assert!(fx.scheduler.fire(TIMEOUT_NEXT_COMMAND));
        assert_eq!(fx.transmitter.sent(), vec![CommandType::TempUp]);
        assert!(fx.handler.in_setting_mode());
        assert_eq!(
            fx.scheduler.delay_of(TIMEOUT_NEXT_COMMAND),
            Some(SETTING_MODE_ENTER_DELAY)
        );
        assert_eq!(
            fx.scheduler.delay_of(TIMEOUT_SETTING_MODE),
            Some(SETTING_MODE_TIMEOUT)
        );

        // Presses 2 and 3 go straight through at the standard gap.
        assert!(fx.scheduler.fire(TIMEOUT_NEXT_COMMAND));
        assert_eq!(
            fx.scheduler.delay_of(TIMEOUT_NEXT_COMMAND),
            Some(INTER_COMMAND_DELAY)
        );
        assert!(fx.scheduler.fire(TIMEOUT_NEXT_COMMAND));
        assert_eq!(fx.transmitter.sent().len(), 3);
        assert_eq!(fx.queue_len(), 0);

        // Continuation finds the queue drained and stops rescheduling.
        assert!(fx.scheduler.fire(TIMEOUT_NEXT_COMMAND));
        assert!(!fx.scheduler.is_scheduled(TIMEOUT_NEXT_COMMAND));

        // Window expires with no further temp presses: back to idle.
        assert!(fx.handler.in_setting_mode());
        assert!(fx.scheduler.fire(TIMEOUT_SETTING_MODE));
        assert!(!fx.handler.in_setting_mode());

        // The next temperature command re-incurs the entry delay.
        fx.enqueue(fx.factory.create(CommandType::TempUp));
        assert!(fx.scheduler.fire(TIMEOUT_NEXT_COMMAND));
        assert_eq!(
            fx.scheduler.delay_of(TIMEOUT_NEXT_COMMAND),
            Some(SETTING_MODE_ENTER_DELAY)
        );
    }

    #[test]
    fn regular_command_expands_repeats_in_one_step() {
        let fx = fixture();
        fx.enqueue(fx.factory.create_repeated(CommandType::Mode, 2));

        assert!(fx.scheduler.fire(TIMEOUT_NEXT_COMMAND));
        assert_eq!(
            fx.transmitter.sent(),
            vec![CommandType::Mode, CommandType::Mode]
        );
        assert_eq!(fx.queue_len(), 0);
        assert!(!fx.handler.in_setting_mode());
        assert_eq!(
            fx.scheduler.delay_of(TIMEOUT_NEXT_COMMAND),
            Some(INTER_COMMAND_DELAY)
        );
    }

    #[test]
    fn command_pacing_delay_overrides_default() {
        let fx = fixture();
        let delay = Duration::from_millis(500);
        fx.enqueue(
            fx.factory
                .create_with_delay(CommandType::Power, 1, delay),
        );

        assert!(fx.scheduler.fire(TIMEOUT_NEXT_COMMAND));
        assert_eq!(fx.scheduler.delay_of(TIMEOUT_NEXT_COMMAND), Some(delay));
    }

    #[test]
    fn enqueue_does_not_cut_pending_continuation_short() {
        let fx = fixture();
        fx.enqueue(fx.factory.create(CommandType::Power));
        assert!(fx.scheduler.fire(TIMEOUT_NEXT_COMMAND));
        assert_eq!(
            fx.scheduler.delay_of(TIMEOUT_NEXT_COMMAND),
            Some(INTER_COMMAND_DELAY)
        );

        // Queue is empty again but a paced continuation is still pending;
        // the wakeup must not replace it with an immediate one.
        fx.enqueue(fx.factory.create(CommandType::Mode));
        assert_eq!(
            fx.scheduler.delay_of(TIMEOUT_NEXT_COMMAND),
            Some(INTER_COMMAND_DELAY)
        );

        assert!(fx.scheduler.fire(TIMEOUT_NEXT_COMMAND));
        assert_eq!(
            fx.transmitter.sent(),
            vec![CommandType::Power, CommandType::Mode]
        );
    }

    #[test]
    fn reset_cancels_timeouts_and_progress() {
        let fx = fixture();
        fx.enqueue(fx.factory.create_repeated(CommandType::TempDown, 4));
        assert!(fx.scheduler.fire(TIMEOUT_NEXT_COMMAND));
        assert!(fx.handler.in_setting_mode());

        fx.handler.reset();
        assert!(!fx.handler.in_setting_mode());
        assert!(!fx.scheduler.is_scheduled(TIMEOUT_NEXT_COMMAND));
        assert!(!fx.scheduler.is_scheduled(TIMEOUT_SETTING_MODE));
        assert_eq!(fx.transmitter.sent(), vec![CommandType::TempDown]);
    }

    #[test]
    fn handler_kicks_when_started_on_nonempty_queue() {
        let queue = Arc::new(Mutex::new(CommandQueue::new(16)));
        let factory = CommandFactory::default();
        queue
            .lock()
            .unwrap()
            .enqueue(factory.create(CommandType::Power))
            .unwrap();

        let scheduler = Arc::new(ManualScheduler::new());
        let transmitter = RecordingTransmitter::default();
        let handler = ProtocolHandler::new(
            queue.clone(),
            Box::new(transmitter.clone()),
            scheduler.clone(),
        );
        handler.start();

        assert!(fx_fire_all(&scheduler));
        assert_eq!(transmitter.sent(), vec![CommandType::Power]);
    }

    fn fx_fire_all(scheduler: &ManualScheduler) -> bool {
        let mut fired = false;
        while scheduler.fire(TIMEOUT_NEXT_COMMAND) {
            fired = true;
        }
        fired
    }
}
