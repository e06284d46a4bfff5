// coin-bridge/src/link.rs
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream, StopBits};

use crate::error::BridgeError;

/// Byte stream to the controller plus the two modem control lines
pub trait DeviceLink: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    fn set_dtr(&mut self, level: bool) -> Result<(), BridgeError>;
    fn set_rts(&mut self, level: bool) -> Result<(), BridgeError>;
}

/// Opens a link to a transport address
pub trait Connector: Unpin + 'static {
    fn open(&self, address: &str) -> Result<Box<dyn DeviceLink>, BridgeError>;
}

/// Serial connector: 8 data bits, no parity, 1 stop bit, no flow control
#[derive(Debug, Clone)]
pub struct SerialConnector {
    baud_rate: u32,
}

impl SerialConnector {
    pub fn new(baud_rate: u32) -> Self {
        Self { baud_rate }
    }
}

impl Default for SerialConnector {
    fn default() -> Self {
        Self::new(9600)
    }
}

impl Connector for SerialConnector {
    fn open(&self, address: &str) -> Result<Box<dyn DeviceLink>, BridgeError> {
        let stream = tokio_serial::new(address, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(|e| classify_open_error(address, &e.to_string()))?;

        Ok(Box::new(SerialLink(stream)))
    }
}

/// Map an OS open failure, separating "resource busy" from the rest
pub(crate) fn classify_open_error(address: &str, reason: &str) -> BridgeError {
    let lowered = reason.to_lowercase();
    if lowered.contains("busy") || lowered.contains("access is denied") {
        BridgeError::Busy {
            address: address.to_string(),
        }
    } else {
        BridgeError::Open {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub struct SerialLink(SerialStream);

impl DeviceLink for SerialLink {
    fn set_dtr(&mut self, level: bool) -> Result<(), BridgeError> {
        self.0
            .write_data_terminal_ready(level)
            .map_err(|e| BridgeError::ControlLines(e.to_string()))
    }

    fn set_rts(&mut self, level: bool) -> Result<(), BridgeError> {
        self.0
            .write_request_to_send(level)
            .map_err(|e| BridgeError::ControlLines(e.to_string()))
    }
}

impl AsyncRead for SerialLink {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

impl AsyncWrite for SerialLink {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.0).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.0).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.0).poll_shutdown(cx)
    }
}
