/*!
Request/response exchange over a duplex byte channel.

Any `Read + Write` works as a channel: an opened `/dev/hidraw*` node, a serial bridge,
or an in-memory mock. Each `read` is expected to deliver exactly one transport report.
*/

use crate::error::FrameError;
use crate::frame::{FrameAssembler, RawFrame};
use crate::protocol::{MAX_REPORTS_PER_FRAME, REPORT_SIZE, TRIGGER_COMMAND};
use std::io::{self, Read, Write};
use tracing::{debug, trace};

/// Triggers readings and reassembles the answering frames
pub struct FrameReader<C> {
    channel: C,
    assembler: FrameAssembler,
}

impl<C: Read + Write> FrameReader<C> {
    /// Create a reader with the default report limit
    pub fn new(channel: C) -> Self {
        Self::with_report_limit(channel, MAX_REPORTS_PER_FRAME)
    }

    /// Create a reader that gives up on a frame after `report_limit` reports
    pub fn with_report_limit(channel: C, report_limit: usize) -> Self {
        Self {
            channel,
            assembler: FrameAssembler::with_report_limit(report_limit),
        }
    }

    /// Send the trigger command and block until one frame is reassembled
    pub fn read_frame(&mut self) -> Result<RawFrame, FrameError> {
        self.assembler.reset();

        self.channel.write_all(&TRIGGER_COMMAND)?;
        self.channel.flush()?;
        trace!("Trigger sent");

        loop {
            let report = self.read_report()?;
            if let Some(frame) = self.assembler.push_report(report)? {
                debug!("Read frame: {}", frame.to_hex());
                return Ok(frame);
            }
        }
    }

    fn read_report(&mut self) -> Result<[u8; REPORT_SIZE], FrameError> {
        let mut report = [0u8; REPORT_SIZE];
        loop {
            match self.channel.read(&mut report) {
                Ok(0) => {
                    return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "channel closed").into())
                }
                Ok(REPORT_SIZE) => return Ok(report),
                Ok(n) => return Err(FrameError::ShortReport(n)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Get statistics: (frames read, framing errors)
    pub fn stats(&self) -> (u64, u64) {
        self.assembler.stats()
    }

    /// Get a reference to the channel
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Give back the channel
    pub fn into_inner(self) -> C {
        self.channel
    }
}

/// One-shot exchange on a borrowed channel using the default report limit
pub fn read_frame<C: Read + Write>(channel: &mut C) -> Result<RawFrame, FrameError> {
    FrameReader::new(channel).read_frame()
}
