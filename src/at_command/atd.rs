use core::fmt::Write;
use heapless::String;

use super::{AtRequest, PhoneNumber};

/// ATD<number>;
///
/// The trailing ';' makes this a voice call rather than a data call.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Dial {
    pub number: PhoneNumber,
}

impl AtRequest for Dial {
    fn encode(&self) -> String<256> {
        let mut buf = String::new();
        write!(buf, "ATD{};\r", self.number).ok(/* a phone number always fits */);
        buf
    }
}
