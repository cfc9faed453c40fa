use core::net::Ipv4Addr;
use heapless::String;

use super::{AtParseErr, AtParseLine, AtRequest};

/// AT+QILOCIP
///
/// The modem answers with a bare address line, without a trailing OK.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GetLocalIp;

impl AtRequest for GetLocalIp {
    fn encode(&self) -> String<256> {
        "AT+QILOCIP\r".into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LocalIp(#[cfg_attr(feature = "defmt", defmt(Debug2Format))] pub Ipv4Addr);

impl AtParseLine for LocalIp {
    fn from_line(line: &str) -> Result<Self, AtParseErr> {
        line.trim()
            .parse()
            .map(LocalIp)
            .map_err(|_| "Not an IPv4 address".into())
    }
}
