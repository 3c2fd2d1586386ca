//! Control loop state
//!
//! [`Controller`] is the single owner of the drive, the command watchdog and
//! the drive mode. Transport tasks never touch the motors directly; they post
//! [`ControlEvent`]s into a [`ControlQueue`] and the drive task feeds them to
//! [`Controller::handle`], calling [`Controller::tick`] periodically and
//! after every event.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use embassy_time::Instant;
use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;

use crate::command::{Command, ControlCommand, ControlEvent, Convention, Inbound, MotionCommand};
use crate::config::ControlConfig;
use crate::drive::{DriveController, DriveError};
use crate::status::StatusEcho;
use crate::watchdog::{CommandWatchdog, StaleStop};

/// Single-consumer queue between the transports and the drive task
pub type ControlQueue<M, const N: usize> = Channel<M, ControlEvent, N>;

/// Posts an event, waiting for room unless it is droppable
///
/// Stops, mode changes and link events are never lost to a full queue; a
/// motion command is dropped instead, as the next one replaces it anyway.
pub async fn post<M: RawMutex, const N: usize>(queue: &ControlQueue<M, N>, event: ControlEvent) -> bool {
    if event.is_droppable() {
        submit(queue, event)
    } else {
        queue.send(event).await;
        true
    }
}

/// Posts an event without waiting; a full queue drops the event
pub fn submit<M: RawMutex, const N: usize>(queue: &ControlQueue<M, N>, event: ControlEvent) -> bool {
    match queue.try_send(event) {
        Ok(()) => true,
        Err(_) => {
            warn!("Control queue full, dropping {:?}", event);
            false
        }
    }
}

/// Who is in charge of the motors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveMode {
    /// Reserved for on-board autonomy; remote motion commands are ignored
    Auto,
    /// Remote motion commands drive the motors
    #[default]
    Manual,
}

impl DriveMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DriveMode::Auto => "AUTO",
            DriveMode::Manual => "MANUAL",
        }
    }
}

pub struct Controller<P, EN> {
    drive: DriveController<P, EN>,
    watchdog: CommandWatchdog,
    mode: DriveMode,
}

impl<P, EN> Controller<P, EN>
where
    P: SetDutyCycle,
    EN: OutputPin,
{
    pub fn new(drive: DriveController<P, EN>, config: &ControlConfig, now: Instant) -> Self {
        Self {
            drive,
            watchdog: CommandWatchdog::new(config.command_timeout, now),
            mode: DriveMode::default(),
        }
    }

    pub fn mode(&self) -> DriveMode {
        self.mode
    }

    pub fn drive(&self) -> &DriveController<P, EN> {
        &self.drive
    }

    pub fn watchdog(&self) -> &CommandWatchdog {
        &self.watchdog
    }

    /// Applies one queued event; returns the echo owed to the client, if any
    pub fn handle(&mut self, event: ControlEvent) -> Result<Option<StatusEcho>, DriveError> {
        match event {
            ControlEvent::Command(command) => self.handle_command(command),
            ControlEvent::LinkUp => {
                info!("Client connected");
                self.drive.stop_all()?;
                Ok(None)
            }
            ControlEvent::LinkDown => {
                info!("Client disconnected, stopping motors");
                self.drive.stop_all()?;
                Ok(None)
            }
        }
    }

    /// Periodic watchdog check
    pub fn tick(&mut self, now: Instant) -> Result<Option<StaleStop>, DriveError> {
        self.watchdog.check_and_enforce(now, &mut self.drive)
    }

    fn handle_command(&mut self, command: Command) -> Result<Option<StatusEcho>, DriveError> {
        self.watchdog.touch(command.received_at);

        match command.inbound {
            Inbound::Control(control) => {
                self.handle_control(control)?;
                Ok(None)
            }
            Inbound::Motion(motion) => self.handle_motion(&motion),
        }
    }

    fn handle_control(&mut self, control: ControlCommand) -> Result<(), DriveError> {
        match control {
            ControlCommand::Auto => self.set_mode(DriveMode::Auto),
            ControlCommand::Manual => self.set_mode(DriveMode::Manual),
            ControlCommand::Stop => {
                warn!("Emergency stop");
                self.drive.stop_all()?;
            }
        }
        Ok(())
    }

    fn set_mode(&mut self, mode: DriveMode) {
        if self.mode != mode {
            info!("Mode: {}", mode.as_str());
        }
        self.mode = mode;
    }

    fn handle_motion(&mut self, motion: &MotionCommand) -> Result<Option<StatusEcho>, DriveError> {
        if self.mode == DriveMode::Manual {
            self.drive.apply(motion)?;
            debug!("Duties now {:?}", self.drive.targets());
        }

        let echo = match motion.convention {
            Convention::Axis => Some(StatusEcho::new(motion, self.drive.targets(), self.mode)),
            Convention::PerWheel => None,
        };
        Ok(echo)
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;
    use embassy_futures::join::join;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    use super::*;
    use crate::config::ControlConfig;
    use crate::drive::ChannelId;
    use crate::testing::{at, drive_bench, FakePin, FakePwm, Output, WriteLog};

    fn controller() -> (Controller<FakePwm, FakePin>, WriteLog) {
        let (drive, log) = drive_bench();
        (Controller::new(drive, &ControlConfig::default(), at(0)), log)
    }

    fn command(inbound: Inbound, ms: u64) -> ControlEvent {
        ControlEvent::Command(Command {
            inbound,
            received_at: at(ms),
        })
    }

    fn motion(motion: MotionCommand, ms: u64) -> ControlEvent {
        command(Inbound::Motion(motion), ms)
    }

    fn control(control: ControlCommand, ms: u64) -> ControlEvent {
        command(Inbound::Control(control), ms)
    }

    #[test]
    fn starts_in_manual_and_drives() {
        let (mut controller, _log) = controller();
        assert_eq!(controller.mode(), DriveMode::Manual);

        let echo = controller.handle(motion(MotionCommand::per_wheel(300, -50), 10)).unwrap();

        assert_eq!(echo, None);
        assert_eq!(controller.drive().targets(), [255, -50]);
        assert_eq!(controller.watchdog().last_command_at(), at(10));
    }

    #[test]
    fn axis_command_echoes_applied_duties() {
        let (mut controller, _log) = controller();

        let echo = controller
            .handle(motion(MotionCommand::axis(50, -100), 10))
            .unwrap()
            .unwrap();

        assert_eq!((echo.motor_a, echo.motor_b), (-255, 128));
        assert!(echo.debug.ends_with("Mode:MANUAL"));
        assert_eq!(controller.drive().duty(ChannelId::A).reverse, 255);
        assert_eq!(controller.drive().duty(ChannelId::B).forward, 128);
    }

    #[test]
    fn auto_mode_ignores_motion_but_still_echoes_and_touches() {
        let (mut controller, log) = controller();

        controller.handle(control(ControlCommand::Auto, 5)).unwrap();
        assert_eq!(controller.mode(), DriveMode::Auto);
        log.clear();

        let echo = controller
            .handle(motion(MotionCommand::axis(20, 80), 40))
            .unwrap()
            .unwrap();

        assert!(log.writes().is_empty());
        assert_eq!((echo.motor_a, echo.motor_b), (0, 0));
        assert!(echo.debug.ends_with("Mode:AUTO"));
        assert_eq!(controller.watchdog().last_command_at(), at(40));

        controller.handle(control(ControlCommand::Manual, 50)).unwrap();
        controller.handle(motion(MotionCommand::axis(20, 80), 60)).unwrap();
        assert!(controller.drive().is_active());
    }

    #[test]
    fn emergency_stop_cuts_everything() {
        let (mut controller, log) = controller();
        controller.handle(motion(MotionCommand::per_wheel(120, 120), 0)).unwrap();

        controller.handle(control(ControlCommand::Stop, 20)).unwrap();

        assert_eq!(controller.drive().targets(), [0, 0]);
        assert!(!log.levels().enabled);
        assert_eq!(controller.mode(), DriveMode::Manual);
        assert_eq!(controller.watchdog().last_command_at(), at(20));
    }

    #[test]
    fn client_connect_and_disconnect_stop_the_drive() {
        let (mut controller, _log) = controller();

        for event in [ControlEvent::LinkUp, ControlEvent::LinkDown] {
            controller.handle(motion(MotionCommand::per_wheel(-90, 60), 0)).unwrap();
            assert!(controller.drive().is_active());

            controller.handle(event).unwrap();
            assert!(!controller.drive().is_active());
            assert!(!controller.drive().is_enabled());
        }
    }

    #[test]
    fn silent_client_is_stopped_by_the_tick() {
        let (mut controller, _log) = controller();
        controller.handle(motion(MotionCommand::per_wheel(100, 100), 1_000)).unwrap();

        assert_eq!(controller.tick(at(1_300)).unwrap(), None);
        let stop = controller.tick(at(1_310)).unwrap().unwrap();

        assert_eq!(stop.cut, [100, 100]);
        assert!(!controller.drive().is_active());
    }

    #[test]
    fn command_that_waited_too_long_is_cut_in_the_same_iteration() {
        let (mut controller, log) = controller();

        controller.handle(motion(MotionCommand::per_wheel(200, 0), 100)).unwrap();
        let stop = controller.tick(at(450)).unwrap();

        assert!(stop.is_some());
        let levels = log.levels();
        assert!(Output::ALL.iter().all(|&output| levels.duty(output) == 0));
        assert!(!levels.enabled);
    }

    #[test]
    fn full_queue_drops_events() {
        let queue = ControlQueue::<NoopRawMutex, 2>::new();

        assert!(submit(&queue, ControlEvent::LinkUp));
        assert!(submit(&queue, motion(MotionCommand::per_wheel(1, 1), 0)));
        assert!(!submit(&queue, ControlEvent::LinkDown));

        assert_eq!(queue.try_receive(), Ok(ControlEvent::LinkUp));
    }

    #[test]
    fn only_motion_commands_are_droppable() {
        assert!(motion(MotionCommand::per_wheel(1, 1), 0).is_droppable());
        assert!(!control(ControlCommand::Stop, 0).is_droppable());
        assert!(!control(ControlCommand::Auto, 0).is_droppable());
        assert!(!ControlEvent::LinkUp.is_droppable());
        assert!(!ControlEvent::LinkDown.is_droppable());
    }

    #[test]
    fn motion_is_dropped_on_a_full_queue_without_waiting() {
        let queue = ControlQueue::<NoopRawMutex, 2>::new();
        let first = motion(MotionCommand::per_wheel(10, 10), 0);
        let second = motion(MotionCommand::per_wheel(20, 20), 1);

        assert!(block_on(post(&queue, first)));
        assert!(block_on(post(&queue, second)));
        assert!(!block_on(post(&queue, motion(MotionCommand::per_wheel(30, 30), 2))));

        assert_eq!(queue.try_receive(), Ok(first));
        assert_eq!(queue.try_receive(), Ok(second));
        assert!(queue.try_receive().is_err());
    }

    #[test]
    fn stop_and_link_down_wait_for_room_in_a_full_queue() {
        let queue = ControlQueue::<NoopRawMutex, 2>::new();
        let first = motion(MotionCommand::per_wheel(10, 10), 0);
        let second = motion(MotionCommand::per_wheel(20, 20), 1);
        let stop = control(ControlCommand::Stop, 2);
        assert!(submit(&queue, first));
        assert!(submit(&queue, second));

        // the stop only gets in once the drive side has taken an event
        let (posted, taken) = block_on(join(post(&queue, stop), queue.receive()));
        assert!(posted);
        assert_eq!(taken, first);

        let (posted, taken) = block_on(join(post(&queue, ControlEvent::LinkDown), queue.receive()));
        assert!(posted);
        assert_eq!(taken, second);

        assert_eq!(queue.try_receive(), Ok(stop));
        assert_eq!(queue.try_receive(), Ok(ControlEvent::LinkDown));
    }
}
