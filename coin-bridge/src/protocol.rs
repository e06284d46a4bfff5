// coin-bridge/src/protocol.rs
//! Line protocol spoken by the coin acceptor controller.
//!
//! Inbound lines are `COIN:<type>`, `STATUS:<text>`, `ERROR:<text>` or a bare
//! `READY`. Outbound commands are single upper-case words terminated by a
//! newline.

use std::fmt;
use std::str::FromStr;

use crate::error::UnknownCommand;

/// Denomination table: coin type reported by the controller -> value
const DENOMINATIONS: &[(&str, u32)] = &[("1", 1), ("5", 5), ("10", 10), ("20", 20)];

/// Look up the value of a coin type, `None` for types the kiosk does not accept
pub fn coin_value(coin_type: &str) -> Option<u32> {
    DENOMINATIONS
        .iter()
        .find(|(name, _)| *name == coin_type)
        .map(|(_, value)| *value)
}

/// A parsed inbound line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMessage {
    Coin { coin_type: String, value: u32 },
    /// `COIN:` with a type missing from the denomination table
    UnknownCoin(String),
    Status(String),
    Error(String),
    Ready,
    Unrecognized(String),
}

impl DeviceMessage {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();

        if let Some(coin_type) = line.strip_prefix("COIN:") {
            let coin_type = coin_type.trim();
            return match coin_value(coin_type) {
                Some(value) => DeviceMessage::Coin {
                    coin_type: coin_type.to_string(),
                    value,
                },
                None => DeviceMessage::UnknownCoin(coin_type.to_string()),
            };
        }
        if let Some(text) = line.strip_prefix("STATUS:") {
            return DeviceMessage::Status(text.trim().to_string());
        }
        if let Some(text) = line.strip_prefix("ERROR:") {
            return DeviceMessage::Error(text.trim().to_string());
        }
        if line == "READY" {
            return DeviceMessage::Ready;
        }

        DeviceMessage::Unrecognized(line.to_string())
    }
}

/// Outbound commands understood by the controller firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Handshake probe
    Ready,
    EnableCoins,
    DisableCoins,
    TestCoin,
    PinStatus,
    Reset,
    DebugOn,
    DebugOff,
    /// Pulse detection method 1..=3
    Method(u8),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Ready => write!(f, "READY"),
            Command::EnableCoins => write!(f, "ENABLE_COINS"),
            Command::DisableCoins => write!(f, "DISABLE_COINS"),
            Command::TestCoin => write!(f, "TESTCOIN"),
            Command::PinStatus => write!(f, "PINSTATUS"),
            Command::Reset => write!(f, "RESET"),
            Command::DebugOn => write!(f, "DEBUGON"),
            Command::DebugOff => write!(f, "DEBUGOFF"),
            Command::Method(n) => write!(f, "METHOD{}", n),
        }
    }
}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let command = match s.trim().to_ascii_uppercase().as_str() {
            "READY" => Command::Ready,
            "ENABLE_COINS" => Command::EnableCoins,
            "DISABLE_COINS" => Command::DisableCoins,
            "TESTCOIN" => Command::TestCoin,
            "PINSTATUS" => Command::PinStatus,
            "RESET" => Command::Reset,
            "DEBUGON" => Command::DebugOn,
            "DEBUGOFF" => Command::DebugOff,
            "METHOD1" => Command::Method(1),
            "METHOD2" => Command::Method(2),
            "METHOD3" => Command::Method(3),
            _ => return Err(UnknownCommand(s.to_string())),
        };
        Ok(command)
    }
}
