use heapless::String;

use super::AtRequest;

/// AT+QISERVER
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StartServer;

impl AtRequest for StartServer {
    fn encode(&self) -> String<256> {
        "AT+QISERVER\r".into()
    }
}
