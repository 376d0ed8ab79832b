/*!
# UT61E+ Telemetry Decoding

This crate turns the report stream of a UNI-T UT61E+ multimeter (seen through its
CP2110 UART-over-USB bridge) into structured readings.

## Core Types

- [`RawFrame`] - One reassembled payload, exactly as declared by the device
- [`FrameAssembler`] - Report-by-report reassembly state machine
- [`FrameReader`] - Trigger + reassembly over a duplex byte channel
- [`Measurement`] - Decoded reading (mode, range, unit, value)
- [`Meter`] - Request/response session combining reader and decoder

## Modules

- [`mode`] - Mode and unit enumerations with their static lookup tables
- [`frame`] - Raw frames and the reassembly state machine
- [`reader`] - Channel I/O for one request/response exchange
- [`decode`] - Payload to measurement decoding
- [`error`] - Error types
*/

pub mod decode;
pub mod error;
pub mod frame;
pub mod meter;
pub mod mode;
pub mod reader;

// Re-export commonly used types
pub use decode::{decode, Measurement};
pub use error::{DecodeError, ErrorKind, FrameError, MeterError, Result};
pub use frame::{FrameAssembler, RawFrame, ReassemblyState};
pub use meter::Meter;
pub use mode::{Mode, Unit};
pub use reader::{read_frame, FrameReader};

/// Version information for the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol constants
pub mod protocol {
    /// Command that asks the meter for one reading
    pub const TRIGGER_COMMAND: [u8; 7] = [0x06, 0xAB, 0xCD, 0x03, 0x5E, 0x01, 0xD9];

    /// Size of a transport report in bytes (tag + one payload byte)
    pub const REPORT_SIZE: usize = 2;

    /// Tag carried by every data report
    pub const REPORT_TAG: u8 = 0x01;

    /// Fixed frame header at payload offsets 0 and 1
    pub const FRAME_HEADER: [u8; 2] = [0xAB, 0xCD];

    /// Default upper bound on report reads for a single frame: header, length byte and
    /// the longest payload a one-byte length can declare
    pub const MAX_REPORTS_PER_FRAME: usize = FRAME_HEADER.len() + 1 + u8::MAX as usize;

    /// Smallest frame the decoder accepts
    pub const MIN_FRAME_LEN: usize = 15;

    /// Offset of the mode code
    pub const MODE_OFFSET: usize = 1;

    /// Offset of the range byte (low nibble is the range index)
    pub const RANGE_OFFSET: usize = 2;

    /// First byte of the digit field
    pub const DIGITS_START: usize = 4;

    /// Last byte of the digit field
    pub const DIGITS_END: usize = 9;

    /// Offset of the status flags byte
    pub const STATUS_OFFSET: usize = 14;

    /// Status flag: reading is negative
    pub const STATUS_NEGATIVE: u8 = 0x01;

    /// Status flag: composite voltage mode is AC
    pub const STATUS_AC: u8 = 0x08;

    /// Decimal point marker inside the digit field
    pub const DECIMAL_POINT: u8 = 0x2E;

    /// "OL" marker inside the digit field
    pub const OVER_LIMIT: [u8; 2] = [0x4F, 0x4C];
}
