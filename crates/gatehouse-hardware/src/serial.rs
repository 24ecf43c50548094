//! Serial port access.
//!
//! The Elcom reader talks 9600 baud, 7 data bits, odd parity, 1 stop bit and
//! no flow control. [`SerialSettings::default`] carries exactly those values;
//! they only need overriding for bench setups behind USB adapters that
//! misreport their capabilities.

use std::fmt;

use serde::Serialize;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, info};

use gatehouse_core::constants::BAUD_RATE;

use crate::error::{HardwareError, Result};

/// Line parameters for the reader's serial port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialSettings {
    /// Baud rate.
    pub baud_rate: u32,

    /// Data bits per character.
    pub data_bits: DataBits,

    /// Stop bits per character.
    pub stop_bits: StopBits,

    /// Parity checking.
    pub parity: Parity,

    /// Flow control.
    pub flow_control: FlowControl,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: BAUD_RATE,
            data_bits: DataBits::Seven,
            stop_bits: StopBits::One,
            parity: Parity::Odd,
            flow_control: FlowControl::None,
        }
    }
}

/// Open a serial port with the given line parameters.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns [`HardwareError::InvalidData`] for an empty path and
/// [`HardwareError::Serial`] if the port cannot be opened.
pub fn open_port(path: &str, settings: &SerialSettings) -> Result<SerialStream> {
    if path.trim().is_empty() {
        return Err(HardwareError::invalid_data("serial port path is empty"));
    }

    debug!(
        port = path,
        baud_rate = settings.baud_rate,
        data_bits = ?settings.data_bits,
        parity = ?settings.parity,
        "Opening serial port"
    );

    let stream = tokio_serial::new(path, settings.baud_rate)
        .data_bits(settings.data_bits)
        .stop_bits(settings.stop_bits)
        .parity(settings.parity)
        .flow_control(settings.flow_control)
        .open_native_async()?;

    info!(port = path, "Serial port opened");
    Ok(stream)
}

/// A serial port found on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub name: String,

    /// Human-readable port type, e.g. the USB product string.
    pub description: String,
}

impl fmt::Display for PortInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.description)
    }
}

/// List the serial ports available on this host.
///
/// # Errors
///
/// Returns [`HardwareError::InitializationFailed`] if the ports cannot be
/// enumerated.
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports()
        .map_err(|e| HardwareError::initialization_failed(format!("listing serial ports: {e}")))?;

    Ok(ports
        .into_iter()
        .map(|port| PortInfo {
            description: describe(&port.port_type),
            name: port.port_name,
        })
        .collect())
}

fn describe(port_type: &serialport::SerialPortType) -> String {
    match port_type {
        serialport::SerialPortType::UsbPort(usb) => {
            let product = usb.product.as_deref().unwrap_or("USB serial");
            format!("{product} [{:04x}:{:04x}]", usb.vid, usb.pid)
        }
        serialport::SerialPortType::PciPort => "PCI".to_string(),
        serialport::SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        serialport::SerialPortType::Unknown => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_match_elcom_line() {
        let settings = SerialSettings::default();
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.data_bits, DataBits::Seven);
        assert_eq!(settings.stop_bits, StopBits::One);
        assert_eq!(settings.parity, Parity::Odd);
        assert_eq!(settings.flow_control, FlowControl::None);
    }

    #[tokio::test]
    async fn test_open_empty_path() {
        let result = open_port("  ", &SerialSettings::default());
        assert!(matches!(result, Err(HardwareError::InvalidData { .. })));
    }

    #[tokio::test]
    async fn test_open_missing_port() {
        let result = open_port("/dev/gatehouse-does-not-exist", &SerialSettings::default());
        assert!(matches!(result, Err(HardwareError::Serial(_))));
    }

    #[test]
    fn test_describe_port_types() {
        assert_eq!(describe(&serialport::SerialPortType::PciPort), "PCI");
        assert_eq!(describe(&serialport::SerialPortType::Unknown), "unknown");
    }

    #[test]
    fn test_port_info_display() {
        let info = PortInfo {
            name: "/dev/ttyUSB0".to_string(),
            description: "FT232R [0403:6001]".to_string(),
        };
        assert_eq!(info.to_string(), "/dev/ttyUSB0 (FT232R [0403:6001])");
    }
}
