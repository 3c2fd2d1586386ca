//! Drive Task Module
//!
//! Owns the motor driver and the control state. Drains the control-event
//! queue and runs the command watchdog every check period, so a stale
//! command stream stops the motors within one period of the timeout.

use defmt::{error, info, unwrap};
use embassy_futures::select::{select, Either};
use embassy_rp::gpio;
use embassy_rp::pwm;
use embassy_time::{Instant, Ticker};
use rover_core::config::ControlConfig;
use rover_core::control::Controller;
use rover_core::drive::{DriveController, HBridgeChannel};

use crate::system::config::{CHECK_PERIOD, PWM_FREQUENCY_HZ};
use crate::system::resources::MotorDriverResources;
use crate::system::{event, state};

#[embassy_executor::task]
pub async fn drive(r: MotorDriverResources) {
    let config = ControlConfig::default();

    // One PWM count per duty step, so the core's duty maps 1:1 onto compare values
    let clock_freq_hz = embassy_rp::clocks::clk_sys_freq();
    let divider = (clock_freq_hz / (PWM_FREQUENCY_HZ * (u32::from(config.max_duty) + 1))).clamp(1, 255) as u8;

    let mut pwm_config = pwm::Config::default();
    pwm_config.divider = divider.into();
    pwm_config.top = config.max_duty;

    // Standby stays low until a channel is driven
    let standby = gpio::Output::new(r.standby_pin, gpio::Level::Low);

    let (a_forward, a_reverse) = pwm::Pwm::new_output_ab(
        r.channel_a_slice,
        r.channel_a_forward_pin,
        r.channel_a_reverse_pin,
        pwm_config.clone(),
    )
    .split();
    let (b_forward, b_reverse) = pwm::Pwm::new_output_ab(
        r.channel_b_slice,
        r.channel_b_forward_pin,
        r.channel_b_reverse_pin,
        pwm_config,
    )
    .split();

    let channel_a = HBridgeChannel::new(unwrap!(a_forward), unwrap!(a_reverse));
    let channel_b = HBridgeChannel::new(unwrap!(b_forward), unwrap!(b_reverse));
    let drive = unwrap!(DriveController::new(channel_a, channel_b, standby, config.max_duty));

    let mut controller = Controller::new(drive, &config, Instant::now());
    let mut mirrored = (controller.mode(), controller.drive().targets());
    info!("Drive ready, PWM divider {}", divider);

    let mut ticker = Ticker::every(CHECK_PERIOD);
    loop {
        if let Either::First(control_event) = select(event::wait(), ticker.next()).await {
            match controller.handle(control_event) {
                Ok(Some(echo)) => event::publish_status(echo),
                Ok(None) => {}
                Err(e) => error!("Drive write failed: {}", e),
            }
        }

        // also runs right after an event, so a command that sat in the queue
        // past the timeout is cut before the next period
        if let Err(e) = controller.tick(Instant::now()) {
            error!("Watchdog stop failed: {}", e);
        }

        let current = (controller.mode(), controller.drive().targets());
        if current != mirrored {
            mirrored = current;
            state::set_drive(current.0, current.1).await;
        }
    }
}
