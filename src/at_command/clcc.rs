use heapless::String;

use super::{bounded, AtParseErr, AtParseLine, AtRequest, PhoneNumber};

/// AT+CLCC
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ListCurrentCalls;

impl AtRequest for ListCurrentCalls {
    fn encode(&self) -> String<256> {
        "AT+CLCC\r".into()
    }
}

/// One `+CLCC:` record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CallInfo {
    pub index: u8,

    /// True for calls placed by us
    pub outgoing: bool,

    pub number: PhoneNumber,
}

impl AtParseLine for CallInfo {
    fn from_line(line: &str) -> Result<Self, AtParseErr> {
        let (message, rest) = line.split_once(": ").ok_or("Missing ': '")?;
        if message != "+CLCC" {
            return Err("Missing +CLCC prefix".into());
        }

        // <id>,<dir>,<stat>,<mode>,<mpty>,<number>,<type>
        let mut fields = rest.split(',');
        let index = fields.next().ok_or("Missing <id>")?.trim().parse()?;
        let direction: u8 = fields.next().ok_or("Missing <dir>")?.trim().parse()?;
        let number = fields.nth(3).ok_or("Missing <number>")?.trim_matches('"');

        Ok(CallInfo {
            index,
            outgoing: direction == 0,
            number: bounded(number).ok_or("Phone number too long")?,
        })
    }
}
