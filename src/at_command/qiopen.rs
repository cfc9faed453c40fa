use core::fmt::Write;
use heapless::String;

use super::{AtRequest, SocketMode};
use crate::slot::SocketId;

/// AT+QIOPEN=...
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OpenSocket {
    pub id: SocketId,

    /// TCP or UDP
    pub mode: SocketMode,

    /// IP or domain name
    pub host: String<100>,

    pub port: u16,
}

impl AtRequest for OpenSocket {
    fn encode(&self) -> String<256> {
        let mut buf = String::new();
        write!(
            buf,
            "AT+QIOPEN={},\"{}\",\"{}\",{}\r",
            self.id.ordinal(),
            self.mode.as_str(),
            self.host,
            self.port
        )
        .ok(/* the host is bounded well below the buffer size */);
        buf
    }
}
