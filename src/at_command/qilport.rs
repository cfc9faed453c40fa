use core::fmt::Write;
use heapless::String;

use super::AtRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketMode {
    Tcp,
    Udp,
}

impl SocketMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocketMode::Tcp => "TCP",
            SocketMode::Udp => "UDP",
        }
    }
}

/// AT+QILPORT=...
///
/// Sets the local port the modem listens on once [super::StartServer] runs.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetLocalPort {
    pub mode: SocketMode,
    pub port: u16,
}

impl AtRequest for SetLocalPort {
    fn encode(&self) -> String<256> {
        let mut buf = String::new();
        write!(buf, "AT+QILPORT=\"{}\",{}\r", self.mode.as_str(), self.port).ok(/* fits */);
        buf
    }
}
