use core::fmt::Write;
use heapless::String;

use super::AtRequest;
use crate::slot::SocketId;

/// AT+QICLOSE / AT+QICLOSE=...
///
/// Without an id this closes the listening server.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CloseSocket {
    pub id: Option<SocketId>,
}

impl AtRequest for CloseSocket {
    fn encode(&self) -> String<256> {
        let mut buf = String::new();
        match self.id {
            Some(id) => write!(buf, "AT+QICLOSE={}\r", id.ordinal()).ok(/* fits */),
            None => write!(buf, "AT+QICLOSE\r").ok(/* fits */),
        };
        buf
    }
}
