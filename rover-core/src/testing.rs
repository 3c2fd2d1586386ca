//! Test doubles for the hardware and network seams

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::rc::Rc;

use embassy_time::Instant;
use embedded_hal::digital::{self, ErrorType as DigitalErrorType, OutputPin};
use embedded_hal::pwm::{self, ErrorType as PwmErrorType, SetDutyCycle};
use embedded_hal_async::delay::DelayNs;

use crate::connectivity::{BootError, BootSelector, Clock, JoinError, LinkStatus, NetworkLink, Restart};
use crate::drive::{DriveController, HBridgeChannel};

/// One of the four PWM inputs of the dual driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    AForward,
    AReverse,
    BForward,
    BReverse,
}

impl Output {
    pub const ALL: [Output; 4] = [
        Output::AForward,
        Output::AReverse,
        Output::BForward,
        Output::BReverse,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// A single hardware write, in the order it happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Write {
    Duty(Output, u16),
    Enable(bool),
}

/// Output levels after replaying a write log
#[derive(Debug, Default)]
pub struct Levels {
    duties: [u16; 4],
    pub enabled: bool,
}

impl Levels {
    pub fn duty(&self, output: Output) -> u16 {
        self.duties[output.index()]
    }
}

/// Journal of accepted writes plus switches that make outputs reject writes
#[derive(Clone, Default)]
pub struct WriteLog {
    writes: Rc<RefCell<Vec<Write>>>,
    enable_fault: Rc<Cell<bool>>,
    output_faults: Rc<Cell<[bool; 4]>>,
}

impl WriteLog {
    fn push(&self, write: Write) {
        self.writes.borrow_mut().push(write);
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.borrow().clone()
    }

    pub fn clear(&self) {
        self.writes.borrow_mut().clear();
    }

    /// Makes the enable line reject every write until cleared
    pub fn fail_enable(&self, fail: bool) {
        self.enable_fault.set(fail);
    }

    /// Makes one PWM input reject every write until cleared
    pub fn fail_output(&self, output: Output, fail: bool) {
        let mut faults = self.output_faults.get();
        faults[output.index()] = fail;
        self.output_faults.set(faults);
    }

    fn output_fails(&self, output: Output) -> bool {
        self.output_faults.get()[output.index()]
    }

    pub fn levels(&self) -> Levels {
        let mut levels = Levels::default();
        for write in self.writes.borrow().iter() {
            match *write {
                Write::Duty(output, duty) => levels.duties[output.index()] = duty,
                Write::Enable(enabled) => levels.enabled = enabled,
            }
        }
        levels
    }

    /// Replays the log and fails if both inputs of a channel were ever high together
    pub fn assert_never_both_high(&self) {
        let mut levels = Levels::default();
        for write in self.writes.borrow().iter() {
            if let Write::Duty(output, duty) = *write {
                levels.duties[output.index()] = duty;
            }
            assert!(
                levels.duty(Output::AForward) == 0 || levels.duty(Output::AReverse) == 0,
                "channel A driven both ways"
            );
            assert!(
                levels.duty(Output::BForward) == 0 || levels.duty(Output::BReverse) == 0,
                "channel B driven both ways"
            );
        }
    }
}

/// PWM input with an 8-bit range that records every accepted duty write
///
/// A rejected write leaves the recorded level unchanged.
pub struct FakePwm {
    output: Output,
    log: WriteLog,
}

impl PwmErrorType for FakePwm {
    type Error = pwm::ErrorKind;
}

impl SetDutyCycle for FakePwm {
    fn max_duty_cycle(&self) -> u16 {
        255
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        if self.log.output_fails(self.output) {
            return Err(pwm::ErrorKind::Other);
        }
        self.log.push(Write::Duty(self.output, duty));
        Ok(())
    }
}

/// Enable line that records every accepted level change
pub struct FakePin {
    log: WriteLog,
}

impl FakePin {
    fn set(&mut self, high: bool) -> Result<(), digital::ErrorKind> {
        if self.log.enable_fault.get() {
            return Err(digital::ErrorKind::Other);
        }
        self.log.push(Write::Enable(high));
        Ok(())
    }
}

impl DigitalErrorType for FakePin {
    type Error = digital::ErrorKind;
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true)
    }
}

pub type FakeDrive = DriveController<FakePwm, FakePin>;

/// A drive controller wired to recording fakes with `MAX_DUTY = 255`
pub fn drive_bench() -> (FakeDrive, WriteLog) {
    let log = WriteLog::default();
    let pwm = |output| FakePwm {
        output,
        log: log.clone(),
    };

    let channel_a = HBridgeChannel::new(pwm(Output::AForward), pwm(Output::AReverse));
    let channel_b = HBridgeChannel::new(pwm(Output::BForward), pwm(Output::BReverse));
    let enable = FakePin { log: log.clone() };

    let drive = DriveController::new(channel_a, channel_b, enable, 255).unwrap();
    (drive, log)
}

pub fn at(ms: u64) -> Instant {
    Instant::from_millis(ms)
}

/// Manually advanced clock shared between [`Clock`] and [`DelayNs`]
#[derive(Clone, Default)]
pub struct FakeClock(Rc<Cell<u64>>);

impl FakeClock {
    pub fn now_ms(&self) -> u64 {
        self.0.get()
    }

    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        Instant::from_millis(self.0.get())
    }
}

impl DelayNs for FakeClock {
    async fn delay_ns(&mut self, ns: u32) {
        self.0.set(self.0.get() + u64::from(ns) / 1_000_000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.0.set(self.0.get() + u64::from(ms));
    }
}

/// Network link that connects once the shared clock reaches `connects_at_ms`
pub struct FakeLink {
    pub clock: FakeClock,
    pub connects_at_ms: Option<u64>,
    pub refuse_join: bool,
    /// Clock time consumed by each status query before it answers
    pub status_cost_ms: u64,
    /// Status queries never answer
    pub stall_status: bool,
    pub joins: usize,
    pub polls: usize,
}

impl FakeLink {
    pub fn new(clock: FakeClock, connects_at_ms: Option<u64>) -> Self {
        Self {
            clock,
            connects_at_ms,
            refuse_join: false,
            status_cost_ms: 0,
            stall_status: false,
            joins: 0,
            polls: 0,
        }
    }

    fn is_up(&self) -> bool {
        self.connects_at_ms
            .is_some_and(|at| self.clock.now_ms() >= at)
    }
}

impl NetworkLink for FakeLink {
    async fn begin_join(&mut self) -> Result<(), JoinError> {
        self.joins += 1;
        if self.refuse_join {
            Err(JoinError::NoCredentials)
        } else {
            Ok(())
        }
    }

    async fn status(&mut self) -> LinkStatus {
        self.polls += 1;
        if self.stall_status {
            core::future::pending::<()>().await;
        }
        self.clock.advance(self.status_cost_ms);
        if self.is_up() {
            LinkStatus::Connected
        } else {
            LinkStatus::Joining
        }
    }

    fn address(&self) -> Option<Ipv4Addr> {
        self.is_up().then(|| Ipv4Addr::new(192, 168, 4, 23))
    }
}

/// Boot selector with scripted results and a call journal
#[derive(Default)]
pub struct FakeBoot {
    pub image: Option<u32>,
    pub fail_set: bool,
    pub calls: VecDeque<&'static str>,
    pub set_next_boot_calls: usize,
}

impl BootSelector for FakeBoot {
    type Image = u32;

    fn find_recovery_image(&mut self) -> Result<u32, BootError> {
        self.calls.push_back("find");
        self.image.ok_or(BootError::NotFound)
    }

    fn set_next_boot(&mut self, _image: &u32) -> Result<(), BootError> {
        self.calls.push_back("set");
        self.set_next_boot_calls += 1;
        if self.fail_set {
            Err(BootError::WriteFailed)
        } else {
            Ok(())
        }
    }
}

/// Restart that only counts requests
#[derive(Default)]
pub struct FakeRestart {
    pub requests: usize,
}

impl Restart for FakeRestart {
    fn restart(&mut self) {
        self.requests += 1;
    }
}
