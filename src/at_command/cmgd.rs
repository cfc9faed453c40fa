use core::fmt::Write;
use heapless::String;

use super::AtRequest;

/// AT+CMGD=<index>
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeleteSms {
    /// Storage index, as listed by `AT+CMGL`.
    pub index: u32,
}

impl AtRequest for DeleteSms {
    fn encode(&self) -> String<256> {
        let mut buf = String::new();
        write!(buf, "AT+CMGD={}\r", self.index).ok(/* fits */);
        buf
    }
}
