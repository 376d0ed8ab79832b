/*!
Reading capture loop.

Two threads:
1. Reader thread: trigger -> reassemble -> decode, forwarding each measurement
2. Output thread: prints measurements as text or JSON lines on stdout

Failed cycles are logged and retried with a fresh trigger. The running flag is checked
between cycles, so a stop request takes effect once the in-flight reading returns.
*/

use std::fs::OpenOptions;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Local};
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{info, warn, error};
use ut61ep::{ErrorKind, Measurement, Meter};
use crate::config::{AppConfig, CaptureConfig, OutputFormat};
use crate::sim::SimulatedMeter;

/// Read + Write + Send, so device nodes and the simulator share one reader thread
pub trait Transport: Read + Write + Send {}
impl<T: Read + Write + Send> Transport for T {}

/// Counters for one capture session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub readings: u64,
    pub transport_errors: u64,
    pub framing_errors: u64,
    pub malformed_frames: u64,
}

impl CaptureStats {
    /// Count a failed cycle
    pub fn record_error(&mut self, kind: ErrorKind) {
        match kind {
            ErrorKind::Transport => self.transport_errors += 1,
            ErrorKind::Framing => self.framing_errors += 1,
            ErrorKind::MalformedFrame => self.malformed_frames += 1,
        }
    }

    /// Total failed cycles
    pub fn errors(&self) -> u64 {
        self.transport_errors + self.framing_errors + self.malformed_frames
    }
}

/// Meter logger: owns the configuration and the running flag
pub struct MeterLogger {
    config: AppConfig,
    running: Arc<AtomicBool>,
}

impl MeterLogger {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Get a reference to the running flag for external control
    pub fn get_running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Open the configured channel
    fn open_transport(&self) -> Result<Box<dyn Transport>> {
        let device = &self.config.device;
        if device.simulate {
            return Ok(Box::new(SimulatedMeter::new()));
        }

        info!("🔌 Opening {}", device.path);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&device.path)
            .with_context(|| format!("Failed to open device: {}", device.path))?;
        Ok(Box::new(file))
    }

    /// Run capture until the reading count is reached, the flag is cleared,
    /// or the device gives up
    pub fn start(&mut self) -> Result<CaptureStats> {
        let transport = self.open_transport()?;
        let mut meter = Meter::with_report_limit(transport, self.config.device.max_reports_per_frame);
        if let Some(serial) = &self.config.device.serial {
            meter = meter.with_serial(serial.clone());
            info!("📟 Meter serial: {}", serial);
        }

        let (data_tx, data_rx) = bounded::<Measurement>(self.config.capture.channel_buffer_size.max(1));

        let running_reader = Arc::clone(&self.running);
        let capture = self.config.capture.clone();
        let output = self.config.output.clone();

        let reader_handle = thread::spawn(move || {
            match Self::reader_thread(meter, data_tx, running_reader, capture) {
                Ok(stats) => {
                    info!("Reader thread finished successfully");
                    Ok(stats)
                }
                Err(e) => {
                    error!("Reader thread failed: {:#}", e);
                    Err(e)
                }
            }
        });

        let output_handle = thread::spawn(move || {
            let stdout = io::stdout();
            Self::output_thread(data_rx, stdout.lock(), output.format, output.show_raw)
        });

        let reader_result = reader_handle.join().map_err(|_| anyhow!("Reader thread panicked"))?;
        let output_result = output_handle.join().map_err(|_| anyhow!("Output thread panicked"))?;

        output_result?;
        reader_result
    }

    /// Reader thread - one request/response cycle per reading
    fn reader_thread<C: Read + Write>(
        mut meter: Meter<C>,
        data_tx: Sender<Measurement>,
        running: Arc<AtomicBool>,
        capture: CaptureConfig,
    ) -> Result<CaptureStats> {
        let mut stats = CaptureStats::default();
        let mut consecutive_errors = 0u32;
        let poll_interval = Duration::from_millis(capture.poll_interval_ms);
        let retry_delay = Duration::from_millis(capture.retry_delay_ms);
        let start_time = Instant::now();

        info!("📝 Reader thread started");

        while running.load(Ordering::SeqCst) {
            if capture.count.is_some_and(|count| stats.readings >= count) {
                info!("Reached {} readings", stats.readings);
                break;
            }

            match meter.read_measurement() {
                Ok(measurement) => {
                    consecutive_errors = 0;
                    stats.readings += 1;

                    if data_tx.send(measurement).is_err() {
                        warn!("Output channel closed, stopping reader");
                        break;
                    }
                    thread::sleep(poll_interval);
                }
                Err(e) => {
                    stats.record_error(e.kind());
                    consecutive_errors += 1;

                    if !e.is_recoverable() {
                        Self::log_stats(&stats, start_time);
                        return Err(e).context("Device stopped responding");
                    }

                    warn!("⚠️ Reading failed ({:?}): {}", e.kind(), e);
                    if consecutive_errors >= capture.max_consecutive_errors {
                        Self::log_stats(&stats, start_time);
                        bail!("Giving up after {} consecutive failed readings", consecutive_errors);
                    }
                    thread::sleep(retry_delay);
                }
            }
        }

        Self::log_stats(&stats, start_time);
        Ok(stats)
    }

    fn log_stats(stats: &CaptureStats, start_time: Instant) {
        info!("📈 Reader final stats:");
        info!("   Readings: {}", stats.readings);
        info!("   Transport errors: {}", stats.transport_errors);
        info!("   Framing errors: {}", stats.framing_errors);
        info!("   Malformed frames: {}", stats.malformed_frames);
        info!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
    }

    /// Output thread - drains the channel until the reader hangs up
    fn output_thread<W: Write>(
        data_rx: Receiver<Measurement>,
        mut out: W,
        format: OutputFormat,
        show_raw: bool,
    ) -> Result<()> {
        for measurement in data_rx {
            let timestamp = Local::now();
            let line = match format {
                OutputFormat::Text => format_text(&measurement, &timestamp, show_raw),
                OutputFormat::Json => format_json(&measurement, &timestamp, show_raw),
            };
            writeln!(out, "{}", line)?;
            out.flush()?;
        }
        Ok(())
    }
}

/// One human readable line
pub fn format_text(measurement: &Measurement, timestamp: &DateTime<Local>, show_raw: bool) -> String {
    let value = if measurement.is_over_limit() {
        "OL".to_string()
    } else {
        format!("{}", measurement.value)
    };

    let mut line = format!(
        "{} {} {} mode={} range={}",
        timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
        value,
        measurement.unit,
        measurement.mode,
        measurement.range,
    );
    if show_raw {
        line.push_str(&format!(" raw={}", measurement.raw.to_hex()));
    }
    line
}

/// One JSON object per line
pub fn format_json(measurement: &Measurement, timestamp: &DateTime<Local>, show_raw: bool) -> String {
    let value = if measurement.is_over_limit() {
        serde_json::json!("OL")
    } else {
        serde_json::json!(measurement.value)
    };

    let mut json_output = serde_json::json!({
        "timestamp": timestamp.to_rfc3339(),
        "mode": measurement.mode.to_string(),
        "mode_code": measurement.mode.code(),
        "range": measurement.range,
        "unit": measurement.unit.symbol(),
        "value": value,
    });
    if show_raw {
        json_output["raw"] = serde_json::json!(measurement.raw.to_hex());
    }
    json_output.to_string()
}
