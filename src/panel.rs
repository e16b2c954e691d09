//! The display collaborator: anything that can show a [`Frame`].
//!
//! The render loop only ever calls the five operations on [`Panel`], in the
//! order the e-paper hardware needs (`init` before every update, `sleep`
//! after it). [`crate::epd::Epd`] drives the real panel; [`ConsolePanel`]
//! prints frames as ASCII art for development without hardware.

use crate::frame::Frame;
use std::io::{self, Write};

/// Error from a panel operation. Always fatal to the render loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("panel error: {0}")]
pub struct PanelError(pub String);

impl From<io::Error> for PanelError {
    fn from(e: io::Error) -> Self {
        PanelError(e.to_string())
    }
}

/// A monochrome display.
pub trait Panel {
    /// Wake and configure the controller.
    fn init(&mut self) -> Result<(), PanelError>;
    /// Blank the screen to white.
    fn clear(&mut self) -> Result<(), PanelError>;
    /// Transfer and show a frame.
    fn display(&mut self, frame: &Frame) -> Result<(), PanelError>;
    /// Enter low-power mode; `init` is needed before the next update.
    fn sleep(&mut self) -> Result<(), PanelError>;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

impl<P: Panel + ?Sized> Panel for Box<P> {
    fn init(&mut self) -> Result<(), PanelError> {
        (**self).init()
    }
    fn clear(&mut self) -> Result<(), PanelError> {
        (**self).clear()
    }
    fn display(&mut self, frame: &Frame) -> Result<(), PanelError> {
        (**self).display(frame)
    }
    fn sleep(&mut self) -> Result<(), PanelError> {
        (**self).sleep()
    }
    fn width(&self) -> u32 {
        (**self).width()
    }
    fn height(&self) -> u32 {
        (**self).height()
    }
}

/// Prints each frame as ASCII art, one character per `cell x 2*cell` block.
pub struct ConsolePanel<W = io::Stdout> {
    out: W,
    width: u32,
    height: u32,
    cell: u32,
}

impl ConsolePanel<io::Stdout> {
    pub fn stdout(width: u32, height: u32) -> Self {
        Self::new(io::stdout(), width, height)
    }
}

impl<W: Write> ConsolePanel<W> {
    /// Cell size is picked so a row fits in roughly 120 columns.
    pub fn new(out: W, width: u32, height: u32) -> Self {
        let cell = width.div_ceil(120).max(1);
        Self {
            out,
            width,
            height,
            cell,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// ASCII rendering: `#` for blocks containing ink, `.` otherwise.
pub fn ascii_art(frame: &Frame, cell: u32) -> String {
    let cell_w = cell.max(1) as i32;
    let cell_h = cell_w * 2;
    let mut art = String::new();
    for cy in (0..frame.height() as i32).step_by(cell_h as usize) {
        for cx in (0..frame.width() as i32).step_by(cell_w as usize) {
            let inked = (cy..cy + cell_h)
                .any(|y| (cx..cx + cell_w).any(|x| frame.is_ink(x, y)));
            art.push(if inked { '#' } else { '.' });
        }
        art.push('\n');
    }
    art
}

impl<W: Write> Panel for ConsolePanel<W> {
    fn init(&mut self) -> Result<(), PanelError> {
        Ok(())
    }

    fn clear(&mut self) -> Result<(), PanelError> {
        writeln!(self.out, "[panel cleared]")?;
        Ok(())
    }

    fn display(&mut self, frame: &Frame) -> Result<(), PanelError> {
        let border = "=".repeat(self.width.div_ceil(self.cell) as usize);
        writeln!(self.out, "{border}")?;
        self.out.write_all(ascii_art(frame, self.cell).as_bytes())?;
        writeln!(self.out, "{border}")?;
        self.out.flush()?;
        Ok(())
    }

    fn sleep(&mut self) -> Result<(), PanelError> {
        Ok(())
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}
