use heapless::String;

use super::AtRequest;

/// AT+COLP=...
///
/// Enables the `+COLP:` line sent when the remote party accepts an outgoing call.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigureConnectedLine(pub bool);

impl AtRequest for ConfigureConnectedLine {
    fn encode(&self) -> String<256> {
        let command = if self.0 { "AT+COLP=1\r" } else { "AT+COLP=0\r" };
        command.into()
    }
}
