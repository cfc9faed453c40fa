use heapless::String;

use super::AtRequest;

/// ATA
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AnswerCall;

impl AtRequest for AnswerCall {
    fn encode(&self) -> String<256> {
        "ATA\r".into()
    }
}
