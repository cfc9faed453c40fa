use heapless::String;

use super::AtRequest;

/// ATH
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HangUp;

impl AtRequest for HangUp {
    fn encode(&self) -> String<256> {
        "ATH\r".into()
    }
}
