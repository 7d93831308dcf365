//! Delivery of samples to the display.
//!
//! Each [`Sample`] becomes one newline-terminated JSON object written to a
//! byte sink, normally the serial port. There is no acknowledgement and no
//! retry: a failed write ends the loop.

pub mod config;

pub use config::LinkConfig;

use crate::error::{MonitorError, Result};
use crate::metrics::Sample;
use futures_util::stream::BoxStream;
use std::future::Future;
use std::io::Write;
use tokio_stream::StreamExt;
use tracing::{debug, error, info};

/// Sink for samples.
pub trait Emitter {
    /// Write one sample as a single frame.
    fn emit(&mut self, sample: &Sample) -> Result<()>;
}

/// Writes samples as newline-delimited JSON to any byte sink.
pub struct LineEmitter<W> {
    writer: W,
}

impl<W: Write> LineEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Emitter for LineEmitter<W> {
    fn emit(&mut self, sample: &Sample) -> Result<()> {
        let mut line = serde_json::to_string(sample)?;
        line.push('\n');

        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|e| MonitorError::transport_error(format!("write failed: {}", e)))?;

        debug!("Sent: {}", line.trim_end());
        Ok(())
    }
}

/// Open the configured serial port for writing.
pub fn open_serial(config: &LinkConfig) -> Result<LineEmitter<Box<dyn serialport::SerialPort>>> {
    let port = serialport::new(config.port.as_str(), config.baud)
        .timeout(config.write_timeout())
        .open()
        .map_err(|e| MonitorError::transport_error(format!("failed to open {}: {}", config.port, e)))?;

    info!("Opened {} at {} baud", config.port, config.baud);
    Ok(LineEmitter::new(port))
}

/// Future that resolves when the process is asked to stop: Ctrl-C, or
/// SIGTERM on Unix.
///
/// Handlers are installed before this returns, so a signal that arrives
/// before the future is first polled is not lost. A handler that fails to
/// install later simply never fires.
pub fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    #[cfg(unix)]
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    Ok(async move {
        let interrupt = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl-C"),
                Err(err) => {
                    error!("Failed to listen for Ctrl-C: {}", err);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(unix)]
        let terminated = async move {
            terminate.recv().await;
            info!("Received SIGTERM");
        };
        #[cfg(not(unix))]
        let terminated = std::future::pending::<()>();

        tokio::select! {
            _ = interrupt => {}
            _ = terminated => {}
        }
    })
}

/// Forward samples to `emitter` until the stream ends, `shutdown` resolves,
/// or a write fails.
///
/// The stream is consumed so that whatever it owns (including the
/// accelerator session) is released before this returns, on every path.
/// Returns the number of samples written.
pub async fn run<E, F>(
    mut samples: BoxStream<'static, Sample>,
    emitter: &mut E,
    shutdown: F,
) -> Result<u64>
where
    E: Emitter,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut sent = 0u64;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested after {} samples", sent);
                break;
            }
            next = samples.next() => match next {
                Some(sample) => {
                    emitter.emit(&sample)?;
                    sent += 1;
                }
                None => {
                    info!("Sample stream ended after {} samples", sent);
                    break;
                }
            },
        }
    }

    Ok(sent)
}
