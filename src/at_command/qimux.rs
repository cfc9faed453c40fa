use heapless::String;

use super::AtRequest;

/// AT+QIMUX=...
///
/// Multi-connection mode must be on for the socket id in [super::OpenSocket] to be accepted.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EnableMultiConnection(pub bool);

impl AtRequest for EnableMultiConnection {
    fn encode(&self) -> String<256> {
        let command = if self.0 { "AT+QIMUX=1\r" } else { "AT+QIMUX=0\r" };
        command.into()
    }
}
