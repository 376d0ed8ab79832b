/*!
Payload decoding.

Frame layout as used here (offsets into [`RawFrame`]):

| Offset | Meaning                                              |
|--------|------------------------------------------------------|
| 1      | Mode code                                            |
| 2      | Range index (low nibble)                             |
| 4..=9  | Digit field: ASCII digits, `.` or the `OL` marker    |
| 14     | Status flags: 0x01 negative, 0x08 AC (composite mode)|
*/

use crate::error::DecodeError;
use crate::frame::RawFrame;
use crate::mode::{Mode, Unit};
use crate::protocol::{
    DECIMAL_POINT, DIGITS_END, DIGITS_START, MIN_FRAME_LEN, MODE_OFFSET, OVER_LIMIT, RANGE_OFFSET,
    STATUS_AC, STATUS_NEGATIVE, STATUS_OFFSET,
};
use serde::Serialize;
use std::fmt;

/// One decoded meter reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub raw: RawFrame,
    pub mode: Mode,
    pub range: u8,
    pub unit: Unit,
    /// Scaled value, `+inf` when the meter reports over limit
    pub value: f64,
}

impl Measurement {
    /// Check if the meter reported "OL"
    pub fn is_over_limit(&self) -> bool {
        self.value == f64::INFINITY
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_over_limit() {
            write!(f, "OL {}", self.unit)?;
        } else {
            write!(f, "{} {}", self.value, self.unit)?;
        }
        write!(f, " (mode {}, range {})", self.mode, self.range)
    }
}

/// Digit field contents before scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Digits {
    Value { magnitude: i64, decimals: i32 },
    OverLimit,
}

fn parse_digits(frame: &[u8]) -> Digits {
    let mut magnitude: i64 = 0;
    let mut point = DIGITS_END;

    for i in DIGITS_START..=DIGITS_END {
        if frame[i..=i + 1] == OVER_LIMIT {
            return Digits::OverLimit;
        }
        if frame[i] == DECIMAL_POINT {
            point = i;
        } else {
            magnitude = magnitude * 10 + i64::from(frame[i] & 0x0F);
        }
    }

    Digits::Value {
        magnitude,
        decimals: (DIGITS_END - point) as i32,
    }
}

/// Decode a reassembled frame into a measurement
pub fn decode(frame: RawFrame) -> Result<Measurement, DecodeError> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(DecodeError::MalformedFrame {
            len: frame.len(),
            required: MIN_FRAME_LEN,
        });
    }

    let status = frame[STATUS_OFFSET];
    let range = frame[RANGE_OFFSET] & 0x0F;
    let mode = Mode::from_code(frame[MODE_OFFSET]).resolve(status & STATUS_AC != 0);
    let unit = mode.unit();
    let sign: i64 = if status & STATUS_NEGATIVE != 0 { -1 } else { 1 };

    let value = match parse_digits(&frame) {
        Digits::OverLimit => f64::INFINITY,
        Digits::Value { magnitude, decimals } => {
            (sign * magnitude) as f64 / 10f64.powi(decimals) * mode.scale_factor(range)
        }
    };

    Ok(Measurement {
        raw: frame,
        mode,
        range,
        unit,
        value,
    })
}

impl TryFrom<RawFrame> for Measurement {
    type Error = DecodeError;

    fn try_from(frame: RawFrame) -> Result<Self, Self::Error> {
        decode(frame)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a 19-byte frame shaped like the meter's
    pub(crate) fn make_frame(mode: u8, range: u8, digits: &[u8; 6], status: u8) -> RawFrame {
        let mut bytes = vec![0u8; 19];
        bytes[MODE_OFFSET] = mode;
        bytes[RANGE_OFFSET] = 0x30 | range;
        bytes[DIGITS_START..=DIGITS_END].copy_from_slice(digits);
        bytes[STATUS_OFFSET] = status;
        RawFrame::new(bytes)
    }

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn test_decimal_value() {
        let frame = make_frame(0x02, 0, b" 00.50", 0x00);
        let m = decode(frame).unwrap();
        assert_eq!(m.mode, Mode::VoltsDc);
        assert_eq!(m.unit, Unit::Volt);
        assert!(approx_eq(m.value, 0.50));
    }

    #[test]
    fn test_negative_value() {
        let m = decode(make_frame(0x02, 1, b" 1.234", 0x01)).unwrap();
        assert!(approx_eq(m.value, -1.234));
    }

    #[test]
    fn test_integer_value() {
        // No decimal point: the accumulated integer is used as-is
        let m = decode(make_frame(0x04, 0, b" 50000", 0x00)).unwrap();
        assert_eq!(m.unit, Unit::Hertz);
        assert_eq!(m.value, 50000.0);
    }

    #[test]
    fn test_scaled_values() {
        let m = decode(make_frame(0x03, 0, b"123.45", 0x00)).unwrap();
        assert_eq!(m.mode, Mode::MillivoltsDc);
        assert!(approx_eq(m.value, 0.12345));

        let m = decode(make_frame(0x06, 1, b"4.7000", 0x00)).unwrap();
        assert_eq!(m.unit, Unit::Ohm);
        assert!(approx_eq(m.value, 4700.0));

        let m = decode(make_frame(0x0C, 0, b"012.3 ", 0x00)).unwrap();
        assert_eq!(m.unit, Unit::Ampere);
        assert!(approx_eq(m.value, 12.30e-6));
    }

    #[test]
    fn test_range_clamped_to_last_factor() {
        let m = decode(make_frame(0x06, 9, b"1.0000", 0x00)).unwrap();
        assert_eq!(m.range, 9);
        assert!(approx_eq(m.value, 1e6));
    }

    #[test]
    fn test_range_uses_low_nibble() {
        let mut bytes = make_frame(0x06, 0, b"1.0000", 0x00).into_bytes();
        bytes[RANGE_OFFSET] = 0xF2;
        let m = decode(RawFrame::new(bytes)).unwrap();
        assert_eq!(m.range, 2);
    }

    #[test]
    fn test_over_limit() {
        for (pos, status) in [(4, 0x00), (6, 0x01), (8, 0x01), (9, 0x00)] {
            let mut digits = *b"  0.00";
            digits[pos - DIGITS_START] = b'O';
            let bytes = if pos < DIGITS_END {
                digits[pos - DIGITS_START + 1] = b'L';
                make_frame(0x06, 2, &digits, status).into_bytes()
            } else {
                // Marker straddling the end of the digit field
                let mut bytes = make_frame(0x06, 2, &digits, status).into_bytes();
                bytes[DIGITS_END + 1] = b'L';
                bytes
            };

            let m = decode(RawFrame::new(bytes)).unwrap();
            assert_eq!(m.value, f64::INFINITY, "OL at offset {}", pos);
            assert!(m.is_over_limit());
        }
    }

    #[test]
    fn test_composite_mode() {
        let ac = decode(make_frame(0x19, 1, b"230.1 ", 0x08)).unwrap();
        assert_eq!(ac.mode, Mode::VoltsAc);
        assert_eq!(ac.unit, Unit::Volt);

        let dc = decode(make_frame(0x19, 1, b" 12.00", 0x00)).unwrap();
        assert_eq!(dc.mode, Mode::VoltsDc);

        let negative_dc = decode(make_frame(0x19, 1, b" 12.00", 0x01)).unwrap();
        assert_eq!(negative_dc.mode, Mode::VoltsDc);
        assert!(approx_eq(negative_dc.value, -12.0));

        // The AC flag leaves other modes alone
        for code in [0x00u8, 0x02, 0x06, 0x0E, 0x42] {
            let with_flag = decode(make_frame(code, 0, b"  1.00", 0x08)).unwrap();
            let without_flag = decode(make_frame(code, 0, b"  1.00", 0x00)).unwrap();
            assert_eq!(with_flag.mode, Mode::from_code(code));
            assert_eq!(with_flag.mode, without_flag.mode);
        }
    }

    #[test]
    fn test_unit_stable_across_ranges() {
        for code in 0x00..=0x19u8 {
            let mode = Mode::from_code(code);
            if mode.is_composite() {
                continue;
            }
            for range in 0..=0x0F {
                let m = decode(make_frame(code, range, b"  1.00", 0x00)).unwrap();
                assert_eq!(m.unit, mode.unit(), "mode {} range {}", mode, range);
            }
        }
    }

    #[test]
    fn test_unrecognized_mode_decodes() {
        let m = decode(make_frame(0x7F, 5, b"  2.50", 0x00)).unwrap();
        assert_eq!(m.mode, Mode::Unrecognized(0x7F));
        assert_eq!(m.unit, Unit::None);
        assert!(approx_eq(m.value, 2.5));
    }

    #[test]
    fn test_decimal_point_roundtrip() {
        let magnitude = 12345i64;
        for point in DIGITS_START..=DIGITS_END {
            // Five digits around a point placed at `point`; a point in the last
            // position leaves no fractional digits
            let mut digits = [0u8; 6];
            let text = format!("{:05}", magnitude);
            let mut chars = text.bytes();
            for (slot, offset) in digits.iter_mut().zip(DIGITS_START..=DIGITS_END) {
                *slot = if offset == point {
                    DECIMAL_POINT
                } else {
                    chars.next().unwrap_or(b'0')
                };
            }

            let expected = magnitude as f64 / 10f64.powi((DIGITS_END - point) as i32);
            let m = decode(make_frame(0x02, 0, &digits, 0x00)).unwrap();
            assert!(approx_eq(m.value, expected), "point at {}: {} != {}", point, m.value, expected);
        }
    }

    #[test]
    fn test_malformed_frame() {
        let err = decode(RawFrame::new(vec![0u8; 14])).unwrap_err();
        assert_eq!(err, DecodeError::MalformedFrame { len: 14, required: 15 });
        assert!(decode(RawFrame::default()).is_err());
    }

    #[test]
    fn test_display() {
        let m = decode(make_frame(0x02, 0, b" 00.50", 0x00)).unwrap();
        assert_eq!(m.to_string(), "0.5 V (mode V DC, range 0)");

        let m = decode(make_frame(0x06, 2, b" OL   ", 0x00)).unwrap();
        assert_eq!(m.to_string(), "OL Ω (mode Ohm, range 2)");
    }
}
