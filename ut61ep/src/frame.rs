/*!
Raw frames and the report-by-report reassembly state machine.

The meter answers a trigger with a stream of 2-byte reports. Each report carries a tag
byte and one payload byte; payload bytes form `AB CD <len>` followed by `len` more bytes.
[`FrameAssembler`] consumes reports one at a time and yields a [`RawFrame`] once the
declared length has been consumed.
*/

use crate::error::FrameError;
use crate::protocol::{FRAME_HEADER, MAX_REPORTS_PER_FRAME, REPORT_SIZE, REPORT_TAG};
use serde::{Serialize, Serializer};
use std::ops::Deref;
use tracing::{debug, trace};

/// One reassembled payload of exactly the declared length
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawFrame(Vec<u8>);

impl RawFrame {
    /// Wrap already reassembled payload bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get the payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Take ownership of the payload bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Lowercase hex rendering for diagnostics
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl Deref for RawFrame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for RawFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for RawFrame {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Serialize for RawFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Reassembly state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassemblyState {
    /// Expecting the first header byte (0xAB)
    AwaitingHeader0,
    /// Expecting the second header byte (0xCD)
    AwaitingHeader1,
    /// Expecting the declared payload length
    AwaitingLength,
    /// Consuming payload bytes
    CollectingPayload { remaining: usize },
    /// A frame was just handed out; the next report starts a new one
    Complete,
}

/// Frame reassembly engine
#[derive(Debug)]
pub struct FrameAssembler {
    state: ReassemblyState,
    buffer: Vec<u8>,
    consumed: usize,
    reads: usize,
    report_limit: usize,
    frames_completed: u64,
    framing_errors: u64,
}

impl FrameAssembler {
    /// Create an assembler with the default report limit
    pub fn new() -> Self {
        Self::with_report_limit(MAX_REPORTS_PER_FRAME)
    }

    /// Create an assembler that gives up after `report_limit` reports without a frame
    pub fn with_report_limit(report_limit: usize) -> Self {
        Self {
            state: ReassemblyState::AwaitingHeader0,
            buffer: Vec::new(),
            consumed: 0,
            reads: 0,
            report_limit: report_limit.max(1),
            frames_completed: 0,
            framing_errors: 0,
        }
    }

    /// Get current state
    pub fn state(&self) -> ReassemblyState {
        self.state
    }

    /// Get the report limit
    pub fn report_limit(&self) -> usize {
        self.report_limit
    }

    /// Get statistics: (frames completed, framing errors)
    pub fn stats(&self) -> (u64, u64) {
        (self.frames_completed, self.framing_errors)
    }

    /// Get the partial payload (for debugging)
    pub fn current_buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Drop any partial frame and wait for a new header
    pub fn reset(&mut self) {
        self.state = ReassemblyState::AwaitingHeader0;
        self.buffer.clear();
        self.consumed = 0;
        self.reads = 0;
    }

    /// Process one transport report.
    /// Returns `Some(frame)` when the declared length has been consumed.
    pub fn push_report(&mut self, report: [u8; REPORT_SIZE]) -> Result<Option<RawFrame>, FrameError> {
        if self.state == ReassemblyState::Complete {
            self.reset();
        }

        match self.step(report) {
            Ok(Some(frame)) => Ok(Some(frame)),
            Ok(None) if self.reads >= self.report_limit => {
                debug!("Report limit reached in state {:?}", self.state);
                Err(self.fail(FrameError::ReportLimitExceeded { reads: self.reads }))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn step(&mut self, report: [u8; REPORT_SIZE]) -> Result<Option<RawFrame>, FrameError> {
        self.reads += 1;

        let [tag, value] = report;
        if tag != REPORT_TAG {
            return Err(FrameError::TagMismatch { tag, payload: value });
        }

        let offset = self.consumed;
        self.consumed += 1;
        trace!("payload[{}] = {:#04x}", offset, value);

        match self.state {
            ReassemblyState::AwaitingHeader0 | ReassemblyState::AwaitingHeader1 => {
                if value != FRAME_HEADER[offset] {
                    return Err(FrameError::HeaderMismatch { offset, value });
                }
                self.state = if offset == 0 {
                    ReassemblyState::AwaitingHeader1
                } else {
                    ReassemblyState::AwaitingLength
                };
                Ok(None)
            }

            ReassemblyState::AwaitingLength => {
                let length = usize::from(value);
                debug!("Frame header ok, declared length {}", length);
                self.buffer.clear();
                self.buffer.resize(length, 0);

                if length == 0 {
                    return Ok(Some(self.complete()));
                }
                self.state = ReassemblyState::CollectingPayload { remaining: length };
                Ok(None)
            }

            ReassemblyState::CollectingPayload { remaining } => {
                // Byte at stream offset `i` lands at buffer index `i - 2`
                if let Some(slot) = self.buffer.get_mut(offset - 2) {
                    *slot = value;
                }

                if remaining == 1 {
                    return Ok(Some(self.complete()));
                }
                self.state = ReassemblyState::CollectingPayload { remaining: remaining - 1 };
                Ok(None)
            }

            ReassemblyState::Complete => {
                unreachable!("push_report resets a completed assembler before stepping")
            }
        }
    }

    fn complete(&mut self) -> RawFrame {
        self.frames_completed += 1;
        self.state = ReassemblyState::Complete;
        debug!("Frame complete: {} bytes after {} reports", self.buffer.len(), self.reads);
        RawFrame(std::mem::take(&mut self.buffer))
    }

    fn fail(&mut self, error: FrameError) -> FrameError {
        self.framing_errors += 1;
        self.reset();
        error
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reports(payload: &[u8]) -> Vec<[u8; 2]> {
        payload.iter().map(|&b| [REPORT_TAG, b]).collect()
    }

    fn feed(assembler: &mut FrameAssembler, payload: &[u8]) -> Result<Option<RawFrame>, FrameError> {
        let mut last = Ok(None);
        for report in reports(payload) {
            last = assembler.push_report(report);
            if !matches!(last, Ok(None)) {
                break;
            }
        }
        last
    }

    #[test]
    fn test_frame_reassembly() {
        let mut assembler = FrameAssembler::new();
        // Declared length 5: four more bytes are stored, the fifth is consumed
        let stream = [0xAB, 0xCD, 0x05, 0x11, 0x22, 0x33, 0x44, 0x55];

        let frame = feed(&mut assembler, &stream).unwrap().unwrap();
        assert_eq!(frame.len(), 5);
        assert_eq!(frame.as_bytes(), &[0x00, 0x11, 0x22, 0x33, 0x44]);
        assert_eq!(assembler.state(), ReassemblyState::Complete);
        assert_eq!(assembler.stats(), (1, 0));
    }

    #[test]
    fn test_state_progression() {
        let mut assembler = FrameAssembler::new();
        assert_eq!(assembler.state(), ReassemblyState::AwaitingHeader0);
        assembler.push_report([1, 0xAB]).unwrap();
        assert_eq!(assembler.state(), ReassemblyState::AwaitingHeader1);
        assembler.push_report([1, 0xCD]).unwrap();
        assert_eq!(assembler.state(), ReassemblyState::AwaitingLength);
        assembler.push_report([1, 3]).unwrap();
        assert_eq!(assembler.state(), ReassemblyState::CollectingPayload { remaining: 3 });
        assert_eq!(assembler.current_buffer().len(), 3);
    }

    #[test]
    fn test_zero_length_frame() {
        let mut assembler = FrameAssembler::new();
        let frame = feed(&mut assembler, &[0xAB, 0xCD, 0x00]).unwrap().unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn test_header_mismatch() {
        let mut assembler = FrameAssembler::new();
        let err = feed(&mut assembler, &[0xAC]).unwrap_err();
        assert!(matches!(err, FrameError::HeaderMismatch { offset: 0, value: 0xAC }));

        let err = feed(&mut assembler, &[0xAB, 0xDC]).unwrap_err();
        assert!(matches!(err, FrameError::HeaderMismatch { offset: 1, value: 0xDC }));

        assert_eq!(assembler.state(), ReassemblyState::AwaitingHeader0);
        assert_eq!(assembler.stats(), (0, 2));
    }

    #[test]
    fn test_tag_mismatch() {
        let mut assembler = FrameAssembler::new();
        assembler.push_report([1, 0xAB]).unwrap();
        let err = assembler.push_report([2, 0xCD]).unwrap_err();
        assert!(matches!(err, FrameError::TagMismatch { tag: 2, payload: 0xCD }));
        assert_eq!(assembler.state(), ReassemblyState::AwaitingHeader0);
    }

    #[test]
    fn test_report_limit() {
        let mut assembler = FrameAssembler::with_report_limit(6);
        let stream = [0xAB, 0xCD, 0x10, 0, 0, 0, 0, 0];
        let err = feed(&mut assembler, &stream).unwrap_err();
        assert!(matches!(err, FrameError::ReportLimitExceeded { reads: 6 }));
        assert!(assembler.current_buffer().is_empty());
    }

    #[test]
    fn test_frame_on_last_allowed_report() {
        // 3 header reports + 3 payload reports fit a limit of 6 exactly
        let mut assembler = FrameAssembler::with_report_limit(6);
        let frame = feed(&mut assembler, &[0xAB, 0xCD, 0x03, 0x0A, 0x0B, 0x0C]).unwrap();
        assert_eq!(frame.unwrap().as_bytes(), &[0x00, 0x0A, 0x0B]);
    }

    #[test]
    fn test_longest_frame_default_limit() {
        let mut stream = vec![0xAB, 0xCD, 0xFF];
        stream.extend(std::iter::repeat(0x5A).take(255));

        let mut assembler = FrameAssembler::new();
        let frame = feed(&mut assembler, &stream).unwrap().unwrap();
        assert_eq!(frame.len(), 255);
        assert_eq!(frame[0], 0x00);
        assert!(frame[1..].iter().all(|&b| b == 0x5A));
    }

    #[test]
    fn test_complete_restarts_on_next_report() {
        let mut assembler = FrameAssembler::with_report_limit(4);
        feed(&mut assembler, &[0xAB, 0xCD, 0x01, 0xFF]).unwrap().unwrap();
        assert_eq!(assembler.state(), ReassemblyState::Complete);

        // The read counter starts over, so the next frame gets the full limit again
        assembler.push_report([1, 0xAB]).unwrap();
        assert_eq!(assembler.state(), ReassemblyState::AwaitingHeader1);
        let frame = feed(&mut assembler, &[0xCD, 0x01, 0xEE]).unwrap();
        assert_eq!(frame.unwrap().len(), 1);
    }

    #[test]
    fn test_next_frame_after_complete() {
        let mut assembler = FrameAssembler::new();
        feed(&mut assembler, &[0xAB, 0xCD, 0x01, 0xFF]).unwrap().unwrap();
        let frame = feed(&mut assembler, &[0xAB, 0xCD, 0x02, 0x07, 0x08]).unwrap().unwrap();
        assert_eq!(frame.as_bytes(), &[0x00, 0x07]);
        assert_eq!(assembler.stats(), (2, 0));
    }

    #[test]
    fn test_raw_frame_hex() {
        let frame = RawFrame::new(vec![0xAB, 0x01, 0xFF]);
        assert_eq!(frame.to_hex(), "ab01ff");
        assert_eq!(serde_json::to_string(&frame).unwrap(), "\"ab01ff\"");
    }
}
