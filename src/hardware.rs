//! Opens the real e-paper panel on a Raspberry Pi.
//!
//! SPI goes through the kernel spidev driver. DC, RST and BUSY (and CS, when
//! the wiring does not use the kernel's chip select) are GPIO character
//! device lines.

use anyhow::{anyhow, Context};
use embedded_hal_bus::spi::ExclusiveDevice;
use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::{CdevPin, Delay, SpidevBus, SpidevDevice};
use log::info;
use plant_mood_lib::config::HardwareConfig;
use plant_mood_lib::epd::Epd;
use plant_mood_lib::panel::Panel;

/// SSD1683 tops out at 8 MHz
const SPI_SPEED_HZ: u32 = 8_000_000;
const CONSUMER: &str = "plant-mood";

fn spi_options() -> SpidevOptions {
    SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(SPI_SPEED_HZ)
        .mode(SpiModeFlags::SPI_MODE_0)
        .build()
}

fn line(chip: &mut Chip, offset: u32, flags: LineRequestFlags, default: u8) -> anyhow::Result<CdevPin> {
    let handle = chip
        .get_line(offset)
        .with_context(|| format!("GPIO line {offset}"))?
        .request(flags, default, CONSUMER)
        .with_context(|| format!("request GPIO line {offset}"))?;
    CdevPin::new(handle).with_context(|| format!("creating pin for GPIO line {offset}"))
}

/// Open SPI and GPIO lines and build the panel driver.
pub fn open_panel(hw: &HardwareConfig) -> anyhow::Result<Box<dyn Panel>> {
    info!(
        "🔧 Opening panel {}x{} on {} (DC {}, RST {}, BUSY {}, CS {:?})",
        hw.width, hw.height, hw.spi_device, hw.dc_pin, hw.rst_pin, hw.busy_pin, hw.cs_pin
    );

    let mut chip = Chip::new(&hw.gpio_chip).with_context(|| format!("open {}", hw.gpio_chip))?;
    let dc = line(&mut chip, hw.dc_pin, LineRequestFlags::OUTPUT, 0)?;
    let rst = line(&mut chip, hw.rst_pin, LineRequestFlags::OUTPUT, 1)?;
    let busy = line(&mut chip, hw.busy_pin, LineRequestFlags::INPUT, 0)?;

    match hw.cs_pin {
        None => {
            let mut spi = SpidevDevice::open(&hw.spi_device)
                .with_context(|| format!("opening {}", hw.spi_device))?;
            spi.configure(&spi_options())
                .with_context(|| format!("configure {}", hw.spi_device))?;
            Ok(Box::new(Epd::new(
                spi, dc, rst, busy, Delay, hw.width, hw.height,
            )))
        }
        Some(cs_pin) => {
            let mut bus = SpidevBus::open(&hw.spi_device)
                .with_context(|| format!("opening {}", hw.spi_device))?;
            bus.configure(&spi_options())
                .with_context(|| format!("configure {}", hw.spi_device))?;
            let cs = line(&mut chip, cs_pin, LineRequestFlags::OUTPUT, 1)?;
            let spi = ExclusiveDevice::new(bus, cs, Delay)
                .map_err(|e| anyhow!("chip select GPIO {cs_pin}: {e:?}"))?;
            Ok(Box::new(Epd::new(
                spi, dc, rst, busy, Delay, hw.width, hw.height,
            )))
        }
    }
}
