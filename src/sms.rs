//! Sending and receiving SMS in text mode.
//!
//! Sending is two commands: [Sms::begin] waits for the modem's `>` prompt, then the text is
//! written with [Sms::write] and [Sms::end] submits it. Receiving lists the first unread message
//! with [Sms::available], after which its text is read out of the receive buffer byte by byte.

use core::task::Poll;

use crate::at_command::{
    bounded, AtParseLine, DeleteSms, ListUnreadSms, MessageReference, PhoneNumber, SendSms, CTRL_Z,
};
use crate::modem::{CommandState, ModemCore, Provider, Reply, Response, Transition};
use crate::{log, CommandError};

/// The end of the listing, after the text of its last message.
const LISTING_END: &[u8] = b"\r\n\r\nOK\r\n";

/// The start of the next record, when the modem lists more than one message.
const NEXT_RECORD: &[u8] = b"\r\n\r\n+";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum SmsState {
    /// `AT+CMGS` sent, waiting for the `>` prompt.
    AwaitPrompt,

    /// Ctrl-Z sent, waiting for the modem to accept the message.
    AwaitSent,

    /// `AT+CMGL` sent, waiting for the first record or the end of the listing.
    AwaitListing,

    /// `AT+CMGD` sent.
    AwaitDelete,
}

impl SmsState {
    pub fn step(&self) -> u32 {
        match self {
            SmsState::AwaitPrompt
            | SmsState::AwaitSent
            | SmsState::AwaitListing
            | SmsState::AwaitDelete => 2,
        }
    }
}

/// The header of a received message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SmsHeader {
    /// Storage index, used to delete the message.
    pub index: u32,
    pub sender: PhoneNumber,
}

pub(crate) struct SmsProvider {
    /// The message being read, if any.
    current: Option<SmsHeader>,

    /// The listing holds another message after the current one.
    two_sms: bool,
}

impl SmsProvider {
    pub fn new() -> Self {
        SmsProvider {
            current: None,
            two_sms: false,
        }
    }

    fn parse_listing(&mut self, core: &mut ModemCore) -> Transition<SmsState> {
        if let Some(start) = core.rx.position_from(core.rx.reply_start(), b"+CMGL:") {
            // wait for the whole header line, unless it can never fit
            if core.rx.position_from(start, b"\n").is_none() && core.rx.available_bytes() > 0 {
                return Transition::Continue(SmsState::AwaitListing);
            }

            core.rx.chop_until(b"+CMGL:", true);
            let index = core.rx.read_int().unwrap_or(0);
            let sender = core
                .rx
                .extract_str(b"\",\"", b"\"")
                .unwrap_or_default();
            core.rx.chop_until(b"\n", true);

            self.two_sms = core.rx.locate(NEXT_RECORD);
            core.sms_text = true;
            core.space_available();

            let header = SmsHeader { index, sender };
            log::debug!("SMS {} from {:?}", header.index, header.sender.as_str());
            self.current = Some(header.clone());
            return Transition::Done(Ok(Response::SmsAvailable(Some(header))));
        }

        match core.generic_parse(None) {
            Reply::Pending => Transition::Continue(SmsState::AwaitListing),
            Reply::Accepted(()) => Transition::Done(Ok(Response::SmsAvailable(None))),
            Reply::Rejected => Transition::Done(Err(CommandError::AddressNack)),
        }
    }
}

impl Provider for SmsProvider {
    type State = SmsState;

    fn resume(&mut self, state: SmsState, core: &mut ModemCore) -> Transition<SmsState> {
        match state {
            SmsState::AwaitPrompt => match core.generic_parse(Some(b">")) {
                Reply::Pending => Transition::Continue(state),
                Reply::Accepted(()) => Transition::Done(Ok(Response::Done)),
                Reply::Rejected => Transition::Done(Err(CommandError::AddressNack)),
            },
            SmsState::AwaitSent => {
                let reference = core
                    .rx
                    .find_line(b"+CMGS:")
                    .and_then(|line| MessageReference::from_line(line).ok());

                match core.generic_parse(None) {
                    Reply::Pending => Transition::Continue(state),
                    Reply::Accepted(()) => Transition::Done(Ok(Response::MessageSent(reference))),
                    Reply::Rejected => Transition::Done(Err(CommandError::DataNack)),
                }
            }
            SmsState::AwaitListing => self.parse_listing(core),
            SmsState::AwaitDelete => match core.generic_parse(None) {
                Reply::Pending => Transition::Continue(state),
                Reply::Accepted(()) => Transition::Done(Ok(Response::Done)),
                Reply::Rejected => Transition::Done(Err(CommandError::AddressNack)),
            },
        }
    }
}

/// SMS operations, borrowed from [crate::Modem::sms].
pub struct Sms<'a> {
    core: &'a mut ModemCore,
    provider: &'a mut SmsProvider,
}

impl<'a> Sms<'a> {
    pub(crate) fn new(core: &'a mut ModemCore, provider: &'a mut SmsProvider) -> Self {
        Sms { core, provider }
    }

    /// Start a message to `number`. Completes once the modem is ready for the text.
    pub fn begin(&mut self, number: &str) -> Result<(), CommandError> {
        let destination = bounded(number).ok_or_else(|| {
            log::warn!("phone number {:?} is too long", number);
            CommandError::AddressNack
        })?;

        self.core.start(
            &SendSms { destination },
            CommandState::Sms(SmsState::AwaitPrompt),
        )
    }

    /// Queue message text. Returns the number of bytes queued.
    pub fn write(&mut self, text: &[u8]) -> usize {
        self.core.write_raw(text)
    }

    /// Submit the message. Completes with [Response::MessageSent].
    pub fn end(&mut self) -> Result<(), CommandError> {
        self.core
            .start_raw(&[CTRL_Z, b'\r'], CommandState::Sms(SmsState::AwaitSent))
    }

    /// List the first unread message. Completes with [Response::SmsAvailable].
    pub fn available(&mut self) -> Result<(), CommandError> {
        self.core.start(
            &ListUnreadSms,
            CommandState::Sms(SmsState::AwaitListing),
        )?;
        self.provider.current = None;
        self.provider.two_sms = false;
        Ok(())
    }

    /// The sender of the message being read.
    pub fn remote_number(&self) -> Option<&str> {
        self.provider
            .current
            .as_ref()
            .map(|header| header.sender.as_str())
    }

    /// Whether the listing held another unread message after this one.
    pub fn more_available(&self) -> bool {
        self.provider.two_sms
    }

    /// Look at the next byte of the message text without consuming it.
    ///
    /// The text ends where the next record or the end of the listing starts, so it may contain
    /// blank lines. `Ready(None)` at the end of the text, `Pending` until it is known whether the
    /// buffered bytes are text or the end of the message.
    pub fn peek(&self) -> Poll<Option<u8>> {
        if !self.core.sms_text {
            return Poll::Ready(None);
        }
        if !self.core.is_idle() {
            return Poll::Pending;
        }

        let head = self.core.rx.reply();
        if head.starts_with(NEXT_RECORD) || head.starts_with(LISTING_END) {
            Poll::Ready(None)
        } else if head.is_empty() || NEXT_RECORD.starts_with(head) || LISTING_END.starts_with(head)
        {
            Poll::Pending
        } else {
            Poll::Ready(head.first().copied())
        }
    }

    /// Read the next byte of the message text.
    pub fn read(&mut self) -> Poll<Option<u8>> {
        match self.peek() {
            Poll::Ready(Some(_)) => {}
            Poll::Ready(None) => {
                if self.core.sms_text && self.core.rx.reply().starts_with(NEXT_RECORD) {
                    self.provider.two_sms = true;
                }
                self.core.sms_text = false;
                return Poll::Ready(None);
            }
            Poll::Pending => return Poll::Pending,
        }

        let byte = self.core.rx.read();
        self.core.space_available();
        Poll::Ready(byte)
    }

    /// Delete the message that was listed, dropping whatever of it is left unread.
    pub fn flush(&mut self) -> Result<(), CommandError> {
        let Some(header) = &self.provider.current else {
            log::warn!("no SMS to delete");
            return Err(CommandError::AddressNack);
        };
        let index = header.index;

        self.core
            .open_command(CommandState::Sms(SmsState::AwaitDelete))?;
        self.provider.current = None;
        self.provider.two_sms = false;

        self.core.sms_text = false;
        self.core.flush_rx();
        self.core.issue(&DeleteSms { index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modem::CommandId;
    use crate::voice::CallStatus;
    use crate::Modem;

    fn read_all(modem: &mut Modem) -> heapless::Vec<u8, 128> {
        let mut text = heapless::Vec::new();
        while let Poll::Ready(Some(byte)) = modem.sms().read() {
            text.push(byte).unwrap();
        }
        text
    }

    #[test]
    fn send_hello() {
        let mut modem = Modem::default();

        modem.sms().begin("+15551234567").unwrap();
        assert_eq!(modem.pending_tx(), b"AT+CMGS=\"+15551234567\"\r");
        assert_eq!(modem.command_step(), Some(2));
        modem.consume_tx(modem.pending_tx().len());

        modem.receive(b"AT+CMGS=\"+15551234567\"\r\r\n");
        modem.poll();
        assert_eq!(modem.ready(), Poll::Pending);

        modem.receive(b"> ");
        modem.poll();
        assert_eq!(modem.ready(), Poll::Ready(Ok(Response::Done)));

        assert_eq!(modem.sms().write(b"hello"), 5);
        modem.sms().end().unwrap();
        assert_eq!(modem.pending_tx(), b"hello\x1a\r");
        modem.consume_tx(7);

        modem.receive(b"hello\x1a\r\n+CMGS: 12\r\n\r\nOK\r\n");
        modem.poll();
        assert_eq!(
            modem.ready(),
            Poll::Ready(Ok(Response::MessageSent(Some(MessageReference { value: 12 }))))
        );
        assert_eq!(modem.command_error_code(), 0);
    }

    #[test]
    fn send_rejected() {
        let mut modem = Modem::default();
        modem.sms().begin("+15551234567").unwrap();
        modem.receive(b"\r\n+CMS ERROR: 304\r\n");
        modem.poll();
        assert_eq!(modem.ready(), Poll::Ready(Err(CommandError::AddressNack)));

        modem.sms().begin("+15551234567").unwrap();
        modem.receive(b"\r\n> ");
        modem.poll();
        modem.sms().end().unwrap();
        modem.receive(b"\r\nERROR\r\n");
        modem.poll();
        assert_eq!(modem.ready(), Poll::Ready(Err(CommandError::DataNack)));
        assert_eq!(modem.command_error_code(), 3);
    }

    #[test]
    fn number_too_long() {
        let mut modem = Modem::default();
        assert_eq!(
            modem.sms().begin("+1555123456789012345678"),
            Err(CommandError::AddressNack)
        );
        assert_eq!(modem.ongoing_command(), None);
        assert!(modem.pending_tx().is_empty());
    }

    #[test]
    fn two_messages_in_buffer() {
        let mut modem = Modem::default();
        modem.sms().available().unwrap();
        assert_eq!(modem.pending_tx(), b"AT+CMGL=\"REC UNREAD\",1\r");

        let listing = b"\r\n+CMGL: 1,\"REC UNREAD\",\"+1555\",,\"24/01/01\"\r\nhi\r\n\r\n\
            +CMGL: 2,\"REC UNREAD\",\"+1666\",,\"24/01/01\"\r\nyo\r\n\r\nOK\r\n";
        assert_eq!(modem.receive(listing), listing.len());
        modem.poll();

        assert_eq!(
            modem.ready(),
            Poll::Ready(Ok(Response::SmsAvailable(Some(SmsHeader {
                index: 1,
                sender: "+1555".into(),
            }))))
        );
        assert_eq!(modem.sms().remote_number(), Some("+1555"));
        assert!(modem.sms().more_available());

        assert_eq!(read_all(&mut modem).as_slice(), b"hi");
        assert_eq!(modem.sms().read(), Poll::Ready(None));

        // the second record is still there
        let rest = core::str::from_utf8(&listing[51..]).unwrap();
        assert!(rest.starts_with("+CMGL: 2"));
        assert_eq!(modem.rx_space(), 128 - (listing.len() - 51 + 4));
    }

    #[test]
    fn blank_line_in_text() {
        let mut modem = Modem::default();
        modem.sms().available().unwrap();
        modem.receive(
            b"\r\n+CMGL: 1,\"REC UNREAD\",\"+1555\",,\"\"\r\na\r\n\r\nb\r\n\r\n\
            +CMGL: 2,\"REC UNREAD\",\"+1666\",,\"\"\r\nyo\r\n\r\nOK\r\n",
        );
        modem.poll();

        assert!(modem.sms().more_available());
        assert_eq!(read_all(&mut modem).as_slice(), b"a\r\n\r\nb");
    }

    #[test]
    fn second_record_arrives_late() {
        let mut modem = Modem::default();
        modem.sms().available().unwrap();
        modem.receive(b"\r\n+CMGL: 1,\"REC UNREAD\",\"+1555\",,\"\"\r\nhi");
        modem.poll();
        assert!(!modem.sms().more_available());

        modem.receive(b"\r\n\r\n+CMGL: 2,\"REC UNREAD\",\"+1666\",,\"\"\r\nyo\r\n\r\nOK\r\n");
        assert_eq!(read_all(&mut modem).as_slice(), b"hi");
        assert!(modem.sms().more_available());
    }

    #[test]
    fn urc_keywords_in_text() {
        let texts: [&[u8]; 3] = [b"I AM BUSY", b"STRING", b"NO CARRIER PIGEONS"];
        for text in texts {
            let mut modem = Modem::default();
            modem.sms().available().unwrap();
            modem.receive(b"\r\n+CMGL: 1,\"REC UNREAD\",\"+1555\",,\"\"\r\n");
            modem.receive(text);
            modem.receive(b"\r\n\r\nOK\r\n");

            modem.poll();
            assert!(modem.ready().is_ready());
            modem.poll();

            assert_eq!(read_all(&mut modem).as_slice(), text);
            assert_eq!(modem.voice().status(), CallStatus::Idle);
            assert_eq!(modem.next_event(), None);
        }
    }

    #[test]
    fn header_arrives_in_pieces() {
        let mut modem = Modem::default();
        modem.sms().available().unwrap();
        modem.consume_tx(modem.pending_tx().len());

        modem.receive(b"\r\n+CMGL: 4,\"REC UNREAD\",\"+15");
        modem.poll();
        assert_eq!(modem.ready(), Poll::Pending);

        modem.receive(b"551234567\",,\"24/01/01\"\r\nmulti\r\nline\r");
        modem.poll();
        assert_eq!(
            modem.ready(),
            Poll::Ready(Ok(Response::SmsAvailable(Some(SmsHeader {
                index: 4,
                sender: "+15551234567".into(),
            }))))
        );
        assert!(!modem.sms().more_available());

        assert_eq!(read_all(&mut modem).as_slice(), b"multi\r\nline");
        // "\r" alone can not be told apart from the end of the message yet
        assert_eq!(modem.sms().peek(), Poll::Pending);

        modem.receive(b"\n\r\nOK\r\n");
        assert_eq!(modem.sms().read(), Poll::Ready(None));

        modem.sms().flush().unwrap();
        assert_eq!(modem.pending_tx(), b"AT+CMGD=4\r");
        assert_eq!(modem.rx_space(), 128);
        modem.receive(b"\r\nOK\r\n");
        modem.poll();
        assert_eq!(modem.ready(), Poll::Ready(Ok(Response::Done)));

        // nothing left to delete
        assert_eq!(modem.sms().flush(), Err(CommandError::AddressNack));
    }

    #[test]
    fn no_messages() {
        let mut modem = Modem::default();
        modem.sms().available().unwrap();
        modem.receive(b"\r\nOK\r\n");
        modem.poll();
        assert_eq!(modem.ready(), Poll::Ready(Ok(Response::SmsAvailable(None))));
        assert_eq!(modem.sms().read(), Poll::Ready(None));
        assert_eq!(modem.sms().remote_number(), None);
    }

    #[test]
    fn listing_rejected() {
        let mut modem = Modem::default();
        modem.sms().available().unwrap();
        modem.receive(b"\r\n+CMS ERROR: 302\r\n");
        modem.poll();
        assert_eq!(modem.command_error(), Some(CommandError::AddressNack));
    }

    #[test]
    fn reading_resumes_a_paused_modem() {
        let mut modem = Modem::default();
        modem.sms().available().unwrap();
        modem.consume_tx(modem.pending_tx().len());

        modem.receive(b"+CMGL: 1,\"REC UNREAD\",\"\",,\"\"\r\n");
        assert_eq!(modem.receive(&[b'x'; 100]), 98);
        assert_eq!(modem.pending_tx(), &[crate::modem::XOFF]);

        // the header alone does not free enough space
        modem.poll();
        assert_eq!(modem.ongoing_command(), None);
        assert_eq!(modem.pending_tx(), &[crate::modem::XOFF]);

        for _ in 0..2 {
            assert_eq!(modem.sms().read(), Poll::Ready(Some(b'x')));
        }
        assert_eq!(modem.pending_tx(), &[crate::modem::XOFF]);
        assert_eq!(modem.sms().read(), Poll::Ready(Some(b'x')));
        assert_eq!(modem.pending_tx(), &[crate::modem::XOFF, crate::modem::XON]);
    }

    #[test]
    fn another_command_discards_unread_text() {
        let mut modem = Modem::default();
        modem.sms().available().unwrap();
        modem.receive(b"\r\n+CMGL: 1,\"REC UNREAD\",\"+1555\",,\"\"\r\nhi\r\n\r\nOK\r\n");
        modem.poll();
        assert_eq!(modem.sms().peek(), Poll::Ready(Some(b'h')));

        modem.sms().begin("+1555").unwrap();
        assert_eq!(modem.ongoing_command(), Some(CommandId::Sms));
        assert_eq!(modem.sms().read(), Poll::Ready(None));
        assert_eq!(modem.rx_space(), 128);
    }
}
