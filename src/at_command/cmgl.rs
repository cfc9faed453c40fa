use heapless::String;

use super::AtRequest;

/// AT+CMGL="REC UNREAD",1
///
/// Lists unread messages without changing their status, so a message is only gone once it has
/// been deleted.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ListUnreadSms;

impl AtRequest for ListUnreadSms {
    fn encode(&self) -> String<256> {
        "AT+CMGL=\"REC UNREAD\",1\r".into()
    }
}
