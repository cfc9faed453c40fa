use core::fmt::Write;
use heapless::String;

use super::{AtParseErr, AtParseLine, AtRequest, PhoneNumber};

/// AT+CMGS=...
///
/// The modem answers with a "> " prompt, after which the message text is written raw and
/// terminated with Ctrl-Z.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SendSms {
    pub destination: PhoneNumber,
}

impl AtRequest for SendSms {
    fn encode(&self) -> String<256> {
        let mut buf = String::new();
        write!(buf, "AT+CMGS=\"{}\"\r", self.destination).ok(/* a phone number always fits */);
        buf
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MessageReference {
    pub value: u32,
}

impl AtParseLine for MessageReference {
    fn from_line(line: &str) -> Result<Self, AtParseErr> {
        let (message, rest) = line.split_once(": ").ok_or("Missing ': '")?;

        if message != "+CMGS" {
            return Err("Missing +CMGS prefix".into());
        }

        Ok(Self {
            value: rest.trim().parse().map_err(|_| "Invalid message reference")?,
        })
    }
}
