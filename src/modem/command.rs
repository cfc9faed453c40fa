use core::{cmp::min, net::Ipv4Addr};
use heapless::Vec;

use super::ModemCore;
use crate::at_command::{unsolicited::Urc, MessageReference, PhoneNumber};
use crate::client::ClientState;
use crate::server::ServerState;
use crate::sms::{SmsHeader, SmsState};
use crate::voice::VoiceState;
use crate::{slot::SocketId, CommandError};

/// Size of the transmit queue, in bytes.
pub const TX_QUEUE_LEN: usize = 512;

/// The provider that owns the ongoing command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandId {
    Sms,
    Voice,
    Server,
    Client,
    Generic,
}

/// Where an ongoing command is in its exchange with the modem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum CommandState {
    Sms(SmsState),
    Voice(VoiceState),
    Server(ServerState),
    Client(ClientState),
    Generic(GenericState),
}

impl CommandState {
    pub fn id(&self) -> CommandId {
        match self {
            CommandState::Sms(_) => CommandId::Sms,
            CommandState::Voice(_) => CommandId::Voice,
            CommandState::Server(_) => CommandId::Server,
            CommandState::Client(_) => CommandId::Client,
            CommandState::Generic(_) => CommandId::Generic,
        }
    }

    /// The step number of the state. Step 1 is the request issued when the command is opened.
    pub fn step(&self) -> u32 {
        match self {
            CommandState::Sms(state) => state.step(),
            CommandState::Voice(state) => state.step(),
            CommandState::Server(state) => state.step(),
            CommandState::Client(state) => state.step(),
            CommandState::Generic(state) => state.step(),
        }
    }
}

/// The successful result of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    /// The command completed and has nothing to report.
    Done,

    /// The modem took the SMS, and maybe told us its reference.
    MessageSent(Option<MessageReference>),

    /// The first unread SMS, if any. Its text can now be read.
    SmsAvailable(Option<SmsHeader>),

    CallingNumber(PhoneNumber),

    Listening {
        #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
        local_ip: Ipv4Addr,
    },

    Connected(SocketId),
}

/// The outcome of a single step.
pub(crate) enum Transition<S> {
    /// Stay in, or move to, the given state and wait for more data.
    Continue(S),

    /// Close the command.
    Done(Result<Response, CommandError>),
}

impl<S> Transition<S> {
    pub fn map<T>(self, f: impl FnOnce(S) -> T) -> Transition<T> {
        match self {
            Transition::Continue(state) => Transition::Continue(f(state)),
            Transition::Done(result) => Transition::Done(result),
        }
    }
}

/// What the modem answered, as far as the buffer tells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum Reply<T = ()> {
    /// Not enough data has arrived to decide.
    Pending,
    Accepted(T),
    Rejected,
}

/// A provider of modem commands.
pub(crate) trait Provider {
    type State: Copy;

    /// Advance the ongoing command by at most one step.
    ///
    /// Called on every poll while the provider owns the command, so it must tolerate a buffer
    /// that is only partially filled and must not repeat a request it already queued.
    fn resume(&mut self, state: Self::State, core: &mut ModemCore) -> Transition<Self::State>;

    fn handle_urc(&mut self, _urc: &Urc, _core: &mut ModemCore) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum GenericState {
    AwaitOk,
}

impl GenericState {
    pub fn step(&self) -> u32 {
        2
    }
}

/// Any request that is answered with a plain OK or ERROR.
pub(crate) struct GenericCommand;

impl Provider for GenericCommand {
    type State = GenericState;

    fn resume(&mut self, state: GenericState, core: &mut ModemCore) -> Transition<GenericState> {
        match core.generic_parse(None) {
            Reply::Pending => Transition::Continue(state),
            Reply::Accepted(()) => Transition::Done(Ok(Response::Done)),
            Reply::Rejected => Transition::Done(Err(CommandError::AddressNack)),
        }
    }
}

/// Bytes waiting to be written to the modem.
pub(crate) struct TxQueue {
    buf: Vec<u8, TX_QUEUE_LEN>,
}

impl TxQueue {
    pub const fn new() -> Self {
        TxQueue { buf: Vec::new() }
    }

    /// Queue all of `bytes`, or nothing at all.
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), CommandError> {
        self.buf
            .extend_from_slice(bytes)
            .map_err(|_| CommandError::Busy)
    }

    /// Queue as many of `bytes` as fit. Returns the number of bytes queued.
    pub fn push_partial(&mut self, bytes: &[u8]) -> usize {
        let n = min(self.free(), bytes.len());
        self.buf
            .extend_from_slice(&bytes[..n])
            .ok(/* n never exceeds the free space */);
        n
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn free(&self) -> usize {
        self.buf.capacity() - self.buf.len()
    }

    /// Drop the first `n` bytes, they have been written.
    pub fn consume(&mut self, n: usize) {
        let n = min(n, self.buf.len());
        self.buf.rotate_left(n);
        self.buf.truncate(self.buf.len() - n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_queue_is_all_or_nothing() {
        let mut queue = TxQueue::new();
        assert_eq!(queue.push(&[b'a'; TX_QUEUE_LEN - 2]), Ok(()));
        assert_eq!(queue.push(b"abc"), Err(CommandError::Busy));
        assert_eq!(queue.as_slice().len(), TX_QUEUE_LEN - 2);

        assert_eq!(queue.push_partial(b"xyz"), 2);
        assert_eq!(queue.as_slice().len(), TX_QUEUE_LEN);
    }

    #[test]
    fn tx_queue_consume() {
        let mut queue = TxQueue::new();
        queue.push(b"ATA\rATH\r").unwrap();
        queue.consume(4);
        assert_eq!(queue.as_slice(), b"ATH\r");
        queue.consume(100);
        assert!(queue.as_slice().is_empty());
    }
}
