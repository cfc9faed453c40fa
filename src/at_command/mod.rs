use core::{fmt::Debug, num::ParseIntError};

pub mod unsolicited;

pub mod ata;
pub mod atd;
pub mod ate;
pub mod ath;
pub mod clcc;
pub mod clip;
pub mod cmgd;
pub mod cmgf;
pub mod cmgl;
pub mod cmgs;
pub mod colp;
pub mod ifc;
pub mod qiclose;
pub mod qilocip;
pub mod qilport;
pub mod qimux;
pub mod qiopen;
pub mod qisend;
pub mod qiserver;

pub use ata::AnswerCall;
pub use atd::Dial;
pub use ate::SetEcho;
pub use ath::HangUp;
pub use clcc::{CallInfo, ListCurrentCalls};
pub use clip::ConfigureCallerId;
pub use cmgd::DeleteSms;
pub use cmgf::{SetSmsMessageFormat, SmsMessageFormat};
pub use cmgl::ListUnreadSms;
pub use cmgs::{MessageReference, SendSms};
pub use colp::ConfigureConnectedLine;
pub use ifc::{FlowControl, SetFlowControl};
pub use qiclose::CloseSocket;
pub use qilocip::{GetLocalIp, LocalIp};
pub use qilport::{SetLocalPort, SocketMode};
pub use qimux::EnableMultiConnection;
pub use qiopen::OpenSocket;
pub use qisend::SocketSend;
pub use qiserver::StartServer;

/// Maximum length of a phone number, including a leading '+'.
pub const PHONE_NUMBER_LEN: usize = 20;

pub type PhoneNumber = heapless::String<PHONE_NUMBER_LEN>;

/// Ctrl-Z, terminates SMS text and socket data.
pub const CTRL_Z: u8 = 0x1A;

#[derive(Clone, Copy, Default, Debug)]
pub(crate) struct AtParseErr {
    #[allow(dead_code)]
    message: &'static str,
}

pub(crate) trait AtParseLine: Sized {
    fn from_line(line: &str) -> Result<Self, AtParseErr>;
}

#[cfg(feature = "defmt")]
pub trait AtRequest: Debug + defmt::Format {
    fn encode(&self) -> heapless::String<256>;
}

#[cfg(not(feature = "defmt"))]
pub trait AtRequest: Debug {
    fn encode(&self) -> heapless::String<256>;
}

impl From<&'static str> for AtParseErr {
    fn from(message: &'static str) -> Self {
        AtParseErr { message }
    }
}

impl From<ParseIntError> for AtParseErr {
    fn from(_: ParseIntError) -> Self {
        AtParseErr {
            message: "Failed to parse integer",
        }
    }
}

/// Copy `s` into a bounded string, failing if it does not fit.
pub(crate) fn bounded<const N: usize>(s: &str) -> Option<heapless::String<N>> {
    let mut out = heapless::String::new();
    out.push_str(s).ok()?;
    Some(out)
}
