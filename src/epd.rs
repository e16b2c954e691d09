//! Monochrome SSD16xx-family e-paper driver
//!
//! Drives single-color Waveshare panels whose controller speaks the
//! SSD1680/SSD1683 command set: one black/white RAM written with `0x24`, a
//! second "previous image" RAM written with `0x26`, refresh via `0x22/0x20`.
//! The driver is generic over `embedded-hal` 1.0 so the same code runs on the
//! Pi (through `linux-embedded-hal`) and against mock pins in tests.

use crate::frame::Frame;
use crate::panel::{Panel, PanelError};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;
use log::{debug, info};
use std::fmt::Debug;

/// How often BUSY is polled
const BUSY_POLL_MS: u32 = 10;
/// Give up after this many polls (20 s; a full refresh of a large panel takes several)
const BUSY_MAX_POLLS: u32 = 2000;
/// Largest single SPI write; spidev's default buffer size
const SPI_CHUNK: usize = 4096;

mod cmd {
    pub const DEEP_SLEEP: u8 = 0x10;
    pub const DATA_ENTRY_MODE: u8 = 0x11;
    pub const SW_RESET: u8 = 0x12;
    pub const TEMP_SENSOR: u8 = 0x18;
    pub const MASTER_ACTIVATION: u8 = 0x20;
    pub const UPDATE_CONTROL_2: u8 = 0x22;
    pub const WRITE_RAM_BW: u8 = 0x24;
    pub const WRITE_RAM_PREVIOUS: u8 = 0x26;
    pub const BORDER_WAVEFORM: u8 = 0x3C;
    pub const RAM_X_RANGE: u8 = 0x44;
    pub const RAM_Y_RANGE: u8 = 0x45;
    pub const RAM_X_COUNTER: u8 = 0x4E;
    pub const RAM_Y_COUNTER: u8 = 0x4F;
}

fn hw_error<E: Debug>(what: &'static str) -> impl Fn(E) -> PanelError {
    move |e| PanelError(format!("{what}: {e:?}"))
}

/// E-paper panel driver
pub struct Epd<SPI, DC, RST, BUSY, DELAY> {
    spi: SPI,
    dc_pin: DC,
    rst_pin: RST,
    busy_pin: BUSY,
    delay: DELAY,
    width: u32,
    height: u32,
}

impl<SPI, DC, RST, BUSY, DELAY> Epd<SPI, DC, RST, BUSY, DELAY>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    BUSY: InputPin,
    DELAY: DelayNs,
{
    pub fn new(
        spi: SPI,
        dc_pin: DC,
        rst_pin: RST,
        busy_pin: BUSY,
        delay: DELAY,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            spi,
            dc_pin,
            rst_pin,
            busy_pin,
            delay,
            width,
            height,
        }
    }

    fn frame_bytes(&self) -> usize {
        (self.width.div_ceil(8) * self.height) as usize
    }

    /// Hardware reset pulse
    fn reset(&mut self) -> Result<(), PanelError> {
        self.rst_pin.set_high().map_err(hw_error("RST"))?;
        self.delay.delay_ms(200);
        self.rst_pin.set_low().map_err(hw_error("RST"))?;
        self.delay.delay_ms(5);
        self.rst_pin.set_high().map_err(hw_error("RST"))?;
        self.delay.delay_ms(200);
        Ok(())
    }

    fn send_command(&mut self, command: u8) -> Result<(), PanelError> {
        self.dc_pin.set_low().map_err(hw_error("DC"))?;
        self.spi.write(&[command]).map_err(hw_error("SPI"))
    }

    fn send_data(&mut self, data: &[u8]) -> Result<(), PanelError> {
        self.dc_pin.set_high().map_err(hw_error("DC"))?;
        for chunk in data.chunks(SPI_CHUNK) {
            self.spi.write(chunk).map_err(hw_error("SPI"))?;
        }
        Ok(())
    }

    /// Wait while BUSY is high.
    fn read_busy(&mut self) -> Result<(), PanelError> {
        let mut polls = 0;
        while self.busy_pin.is_high().map_err(hw_error("BUSY"))? {
            if polls >= BUSY_MAX_POLLS {
                return Err(PanelError(format!(
                    "BUSY still high after {} ms",
                    BUSY_MAX_POLLS * BUSY_POLL_MS
                )));
            }
            self.delay.delay_ms(BUSY_POLL_MS);
            polls += 1;
        }
        debug!("Panel ready after {} BUSY polls", polls);
        Ok(())
    }

    fn turn_on_display(&mut self) -> Result<(), PanelError> {
        self.send_command(cmd::UPDATE_CONTROL_2)?;
        self.send_data(&[0xF7])?;
        self.send_command(cmd::MASTER_ACTIVATION)?;
        self.read_busy()
    }

    fn write_both_rams(&mut self, data: &[u8]) -> Result<(), PanelError> {
        self.send_command(cmd::WRITE_RAM_BW)?;
        self.send_data(data)?;
        self.send_command(cmd::WRITE_RAM_PREVIOUS)?;
        self.send_data(data)
    }
}

impl<SPI, DC, RST, BUSY, DELAY> Panel for Epd<SPI, DC, RST, BUSY, DELAY>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    BUSY: InputPin,
    DELAY: DelayNs,
{
    fn init(&mut self) -> Result<(), PanelError> {
        if self.width == 0 || self.height == 0 {
            return Err(PanelError(format!(
                "panel size {}x{} has a zero dimension",
                self.width, self.height
            )));
        }
        self.reset()?;

        self.read_busy()?;
        self.send_command(cmd::SW_RESET)?;
        self.read_busy()?;

        self.send_command(cmd::BORDER_WAVEFORM)?;
        self.send_data(&[0x05])?;

        self.send_command(cmd::TEMP_SENSOR)?; // internal sensor
        self.send_data(&[0x80])?;

        self.send_command(cmd::DATA_ENTRY_MODE)?; // X+, Y+
        self.send_data(&[0x03])?;

        let x_end = (self.width.div_ceil(8) - 1) as u8;
        let y_end = self.height - 1;
        self.send_command(cmd::RAM_X_RANGE)?;
        self.send_data(&[0x00, x_end])?;
        self.send_command(cmd::RAM_Y_RANGE)?;
        self.send_data(&[0x00, 0x00, (y_end % 256) as u8, (y_end / 256) as u8])?;

        self.send_command(cmd::RAM_X_COUNTER)?;
        self.send_data(&[0x00])?;
        self.send_command(cmd::RAM_Y_COUNTER)?;
        self.send_data(&[0x00, 0x00])?;

        self.read_busy()?;
        debug!("Panel initialized ({}x{})", self.width, self.height);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), PanelError> {
        let white = vec![0xFF; self.frame_bytes()];
        self.write_both_rams(&white)?;
        self.turn_on_display()
    }

    fn display(&mut self, frame: &Frame) -> Result<(), PanelError> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(PanelError(format!(
                "frame is {}x{}, panel is {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }
        self.write_both_rams(frame.as_bytes())?;
        self.turn_on_display()?;
        info!("Panel refreshed");
        Ok(())
    }

    fn sleep(&mut self) -> Result<(), PanelError> {
        self.send_command(cmd::DEEP_SLEEP)?;
        self.send_data(&[0x01])?;
        self.delay.delay_ms(100);
        Ok(())
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}
