// coin-bridge/src/discovery.rs
use tokio_serial::SerialPortType;

/// Source of transport addresses to try, in priority order
pub trait PortDiscovery: Unpin + 'static {
    fn list_candidate_addresses(&self) -> Vec<String>;
}

/// Fixed list of addresses, used when the operator pins a port
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    addresses: Vec<String>,
}

impl StaticDiscovery {
    pub fn new(addresses: Vec<String>) -> Self {
        Self { addresses }
    }
}

impl PortDiscovery for StaticDiscovery {
    fn list_candidate_addresses(&self) -> Vec<String> {
        self.addresses.clone()
    }
}

/// Enumerates serial ports on the host, USB adapters first
#[derive(Debug, Clone, Default)]
pub struct SerialPortDiscovery;

impl SerialPortDiscovery {
    /// Whether a port name looks like a microcontroller on this platform
    fn matches_platform(name: &str) -> bool {
        if cfg!(target_os = "windows") {
            name.starts_with("COM")
        } else if cfg!(target_os = "macos") {
            name.starts_with("/dev/cu.usb") || name.starts_with("/dev/tty.usb")
        } else {
            name.starts_with("/dev/ttyUSB") || name.starts_with("/dev/ttyACM")
        }
    }
}

impl PortDiscovery for SerialPortDiscovery {
    fn list_candidate_addresses(&self) -> Vec<String> {
        let ports = match tokio_serial::available_ports() {
            Ok(ports) => ports,
            Err(e) => {
                tracing::warn!("Serial port enumeration failed: {}", e);
                return Vec::new();
            }
        };

        let mut usb = Vec::new();
        let mut other = Vec::new();
        for port in ports {
            match port.port_type {
                SerialPortType::UsbPort(_) => usb.push(port.port_name),
                _ if Self::matches_platform(&port.port_name) => other.push(port.port_name),
                _ => {}
            }
        }

        rank_candidates(usb, other)
    }
}

/// USB ports come first; duplicates are dropped keeping the first occurrence
fn rank_candidates(usb: Vec<String>, other: Vec<String>) -> Vec<String> {
    let mut ranked: Vec<String> = Vec::with_capacity(usb.len() + other.len());
    for name in usb.into_iter().chain(other) {
        if !ranked.contains(&name) {
            ranked.push(name);
        }
    }
    ranked
}

/// Candidates for a connection cycle: an explicit address wins over discovery
pub fn candidate_addresses(explicit: Option<&str>, discovery: &dyn PortDiscovery) -> Vec<String> {
    match explicit {
        Some(address) if !address.is_empty() => vec![address.to_string()],
        _ => discovery.list_candidate_addresses(),
    }
}
