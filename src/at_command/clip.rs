use heapless::String;

use super::AtRequest;

/// AT+CLIP=...
///
/// Enables the `+CLIP:` caller id line after each `RING`.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigureCallerId(pub bool);

impl AtRequest for ConfigureCallerId {
    fn encode(&self) -> String<256> {
        let command = if self.0 { "AT+CLIP=1\r" } else { "AT+CLIP=0\r" };
        command.into()
    }
}
