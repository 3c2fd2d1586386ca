//! Hardware Resource Management
//!
//! Assigns the board's pins and peripherals to the tasks that own them.
//!
//! # Resource Groups
//! - Motor Driver: dual-PWM H-bridge inputs and the shared standby line
//! - Radio: CYW43439 power, SPI pins, PIO and DMA channel
//!
//! Flash and the watchdog are taken by `main` directly; they are shared by
//! the credential reader, the boot selector and the restart path.

use assign_resources::assign_resources;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::{self, PIO0};
use embassy_rp::Peri;
use embassy_rp::pio::InterruptHandler as PioInterruptHandler;

assign_resources! {
    /// Dual H-bridge, two PWM inputs per channel
    motor_driver: MotorDriverResources {
        standby_pin: PIN_22,
        // Channel A: forward on output A, reverse on output B of slice 0
        channel_a_slice: PWM_SLICE0,
        channel_a_forward_pin: PIN_16,
        channel_a_reverse_pin: PIN_17,
        // Channel B: same layout on slice 1
        channel_b_slice: PWM_SLICE1,
        channel_b_forward_pin: PIN_18,
        channel_b_reverse_pin: PIN_19,
    },
    /// CYW43439 Wi-Fi radio on the Pico 2 W
    radio: RadioResources {
        power_pin: PIN_23,
        cs_pin: PIN_25,
        dio_pin: PIN_24,
        clk_pin: PIN_29,
        pio: PIO0,
        dma: DMA_CH0,
    },
}

bind_interrupts!(pub struct Irqs {
    PIO0_IRQ_0 => PioInterruptHandler<PIO0>;
});
