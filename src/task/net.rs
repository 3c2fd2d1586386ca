//! Network Tasks
//!
//! Radio bring-up and the background runners of the CYW43 driver and the
//! embassy-net stack.

use cyw43::PowerManagementMode;
use cyw43_pio::{PioSpi, DEFAULT_CLOCK_DIVIDER};
use defmt::unwrap;
use embassy_executor::Spawner;
use embassy_net::{Config, Stack, StackResources};
use embassy_rp::clocks::RoscRng;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{DMA_CH0, PIO0};
use embassy_rp::pio::Pio;
use rand::RngCore;
use static_cell::StaticCell;

use crate::system::config::{RADIO_CLM_ADDRESS, RADIO_CLM_LEN, RADIO_FIRMWARE_ADDRESS, RADIO_FIRMWARE_LEN};
use crate::system::resources::{Irqs, RadioResources};

#[embassy_executor::task]
async fn cyw43_task(runner: cyw43::Runner<'static, Output<'static>, PioSpi<'static, PIO0, 0, DMA_CH0>>) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn net_task(mut runner: embassy_net::Runner<'static, cyw43::NetDriver<'static>>) -> ! {
    runner.run().await
}

/// Powers up the radio, starts the DHCP stack and spawns their runners
///
/// The radio firmware and CLM blobs are read from the fixed flash addresses
/// they were programmed to.
pub async fn start_radio(spawner: Spawner, r: RadioResources) -> (cyw43::Control<'static>, Stack<'static>) {
    // SAFETY: the blobs are programmed at these addresses and never written by the firmware
    let fw = unsafe { core::slice::from_raw_parts(RADIO_FIRMWARE_ADDRESS as *const u8, RADIO_FIRMWARE_LEN) };
    let clm = unsafe { core::slice::from_raw_parts(RADIO_CLM_ADDRESS as *const u8, RADIO_CLM_LEN) };

    let power = Output::new(r.power_pin, Level::Low);
    let cs = Output::new(r.cs_pin, Level::High);
    let mut pio = Pio::new(r.pio, Irqs);
    let spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        DEFAULT_CLOCK_DIVIDER,
        pio.irq0,
        cs,
        r.dio_pin,
        r.clk_pin,
        r.dma,
    );

    static STATE: StaticCell<cyw43::State> = StaticCell::new();
    let state = STATE.init(cyw43::State::new());
    let (net_device, mut control, runner) = cyw43::new(state, power, spi, fw).await;
    unwrap!(spawner.spawn(cyw43_task(runner)));

    control.init(clm).await;
    control.set_power_management(PowerManagementMode::PowerSave).await;

    let seed = RoscRng.next_u64();
    static RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
    let (stack, runner) = embassy_net::new(
        net_device,
        Config::dhcpv4(Default::default()),
        RESOURCES.init(StackResources::new()),
        seed,
    );
    unwrap!(spawner.spawn(net_task(runner)));

    (control, stack)
}
