/*!
Request/response session with one meter.
*/

use crate::decode::{decode, Measurement};
use crate::error::Result;
use crate::reader::FrameReader;
use std::io::{Read, Write};
use tracing::debug;

/// A meter behind an already opened and configured channel
pub struct Meter<C> {
    reader: FrameReader<C>,
    serial: Option<String>,
}

impl<C: Read + Write> Meter<C> {
    /// Create a session on `channel`
    pub fn new(channel: C) -> Self {
        Self {
            reader: FrameReader::new(channel),
            serial: None,
        }
    }

    /// Create a session with an explicit report limit per frame
    pub fn with_report_limit(channel: C, report_limit: usize) -> Self {
        Self {
            reader: FrameReader::with_report_limit(channel, report_limit),
            serial: None,
        }
    }

    /// Attach the device serial number, as reported by whoever opened the channel
    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    /// Get the device serial number, if known
    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Trigger, reassemble and decode one reading
    pub fn read_measurement(&mut self) -> Result<Measurement> {
        let frame = self.reader.read_frame()?;
        let measurement = decode(frame)?;
        debug!("Measurement: {}", measurement);
        Ok(measurement)
    }

    /// Get statistics: (frames read, framing errors)
    pub fn stats(&self) -> (u64, u64) {
        self.reader.stats()
    }

    /// Give back the channel
    pub fn into_inner(self) -> C {
        self.reader.into_inner()
    }
}
