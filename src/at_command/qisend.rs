use core::fmt::Write;
use heapless::String;

use super::AtRequest;
use crate::slot::SocketId;

/// AT+QISEND=...
///
/// Without a length the modem takes data until Ctrl-Z.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocketSend {
    pub id: SocketId,
}

impl AtRequest for SocketSend {
    fn encode(&self) -> String<256> {
        let mut buf = String::new();
        write!(buf, "AT+QISEND={}\r", self.id.ordinal()).ok(/* fits */);
        buf
    }
}
