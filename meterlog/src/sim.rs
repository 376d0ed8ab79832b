/*!
Simulated meter.

Answers every trigger command with a well-formed report stream, cycling through a fixed
script of readings, so the whole pipeline can run without hardware.
*/

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use tracing::{debug, info};
use ut61ep::protocol::{
    DIGITS_END, DIGITS_START, FRAME_HEADER, MODE_OFFSET, RANGE_OFFSET, REPORT_TAG,
    STATUS_OFFSET, TRIGGER_COMMAND,
};

/// Length the real meter declares for its frames
const FRAME_LEN: usize = 19;

/// One scripted reading: mode code, range, digit field, status flags
struct Reading {
    mode: u8,
    range: u8,
    digits: [u8; 6],
    status: u8,
}

const SCRIPT: [Reading; 6] = [
    Reading { mode: 0x02, range: 1, digits: *b" 5.012", status: 0x00 },
    Reading { mode: 0x01, range: 0, digits: *b"123.45", status: 0x00 },
    Reading { mode: 0x06, range: 1, digits: *b" 4.700", status: 0x00 },
    Reading { mode: 0x06, range: 2, digits: *b"  OL  ", status: 0x00 },
    Reading { mode: 0x19, range: 1, digits: *b" 12.00", status: 0x01 },
    Reading { mode: 0x19, range: 1, digits: *b"230.10", status: 0x08 },
];

/// In-memory stand-in for the HID device node
#[derive(Debug, Default)]
pub struct SimulatedMeter {
    command: Vec<u8>,
    reports: VecDeque<[u8; 2]>,
    readings_sent: u64,
}

impl SimulatedMeter {
    pub fn new() -> Self {
        info!("🧪 Using simulated meter");
        Self::default()
    }

    fn frame_for(reading: &Reading) -> [u8; FRAME_LEN] {
        let mut frame = [0u8; FRAME_LEN];
        frame[MODE_OFFSET] = reading.mode;
        frame[RANGE_OFFSET] = 0x30 | reading.range;
        frame[DIGITS_START..=DIGITS_END].copy_from_slice(&reading.digits);
        frame[STATUS_OFFSET] = reading.status;
        frame
    }

    fn queue_reading(&mut self) {
        let reading = &SCRIPT[(self.readings_sent % SCRIPT.len() as u64) as usize];
        let frame = Self::frame_for(reading);

        // Header and length, then everything after the length slot, then one trailing
        // byte the reader consumes without storing
        let payload = FRAME_HEADER
            .iter()
            .copied()
            .chain(std::iter::once(FRAME_LEN as u8))
            .chain(frame[1..].iter().copied())
            .chain(std::iter::once(0x00));

        self.reports.extend(payload.map(|byte| [REPORT_TAG, byte]));
        self.readings_sent += 1;
        debug!("Queued simulated frame {} ({} reports)", self.readings_sent, self.reports.len());
    }
}

impl Write for SimulatedMeter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.command.extend_from_slice(buf);
        if self.command.len() >= TRIGGER_COMMAND.len() {
            let command: Vec<u8> = self.command.drain(..TRIGGER_COMMAND.len()).collect();
            if command == TRIGGER_COMMAND {
                self.queue_reading();
            } else {
                debug!("Ignoring unknown command {:02x?}", command);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for SimulatedMeter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reports.pop_front() {
            Some(report) => {
                let n = report.len().min(buf.len());
                buf[..n].copy_from_slice(&report[..n]);
                Ok(n)
            }
            // Nothing was triggered: behave like a closed device
            None => Ok(0),
        }
    }
}
