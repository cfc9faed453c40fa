mod command;
mod context;

use core::task::Poll;
use embassy_time::Duration;

use crate::at_command::{unsolicited::Urc, AtRequest};
use crate::client::{Client, ClientProvider, ClientState};
use crate::server::{Server, ServerProvider};
use crate::sms::{Sms, SmsProvider};
use crate::voice::{Voice, VoiceProvider};
use crate::{log, slot::SocketId, util::Lagged, CommandError};

pub use command::{CommandId, Response, TX_QUEUE_LEN};
pub(crate) use command::{
    CommandState, GenericCommand, GenericState, Provider, Reply, Transition, TxQueue,
};
pub(crate) use context::ModemCore;
pub use context::{XOFF, XON};

/// How the engine keeps the modem from overrunning the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlowControl {
    /// Send XOFF when the buffer is nearly full and XON once it has drained.
    XonXoff,

    /// Rely on the transport to stop reading, e.g. hardware flow control.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModemConfig {
    pub flow_control: FlowControl,

    /// Send XOFF once the free space in the receive buffer drops to this many bytes.
    pub pause_threshold: usize,

    /// Send XON once the free space in the receive buffer is above this many bytes.
    pub resume_threshold: usize,

    /// How long [crate::tcp::ClientService::connect] waits for the modem.
    pub connect_timeout: Duration,
}

impl Default for ModemConfig {
    fn default() -> Self {
        ModemConfig {
            flow_control: FlowControl::XonXoff,
            pause_threshold: 8,
            resume_threshold: 32,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Something the modem told us without being asked.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModemEvent {
    IncomingCall,

    /// The remote party accepted our call.
    CallAnswered,

    CallEnded,

    /// The remote party was busy.
    RemoteBusy,

    /// A remote client connected to our server.
    RemoteClientConnected,

    /// The remote end closed a socket. `None` when the modem did not say which.
    SocketClosed(Option<SocketId>),
}

/// A non-blocking AT command modem.
///
/// The modem never touches the serial port. Feed it the modem's output with [Modem::receive],
/// write out [Modem::pending_tx], and call [Modem::poll] to make progress. [crate::pump::IoPump]
/// does all three for an `embedded-io-async` serial port.
pub struct Modem {
    core: ModemCore,
    sms: SmsProvider,
    voice: VoiceProvider,
    server: ServerProvider,
    client: ClientProvider,
}

impl Default for Modem {
    fn default() -> Self {
        Self::new(ModemConfig::default())
    }
}

impl Modem {
    pub fn new(config: ModemConfig) -> Self {
        Modem {
            core: ModemCore::new(config),
            sms: SmsProvider::new(),
            voice: VoiceProvider::new(),
            server: ServerProvider::new(),
            client: ClientProvider::new(),
        }
    }

    pub fn config(&self) -> &ModemConfig {
        self.core.config()
    }

    /// Take bytes read from the modem.
    ///
    /// Returns the number of bytes accepted. The rest does not fit in the receive buffer, and
    /// should be offered again after the next [Modem::poll].
    pub fn receive(&mut self, bytes: &[u8]) -> usize {
        self.core.receive(bytes)
    }

    /// Free space in the receive buffer.
    pub fn rx_space(&self) -> usize {
        self.core.rx.available_bytes()
    }

    /// Bytes waiting to be written to the modem.
    pub fn pending_tx(&self) -> &[u8] {
        self.core.tx.as_slice()
    }

    /// Mark the first `n` bytes of [Modem::pending_tx] as written.
    pub fn consume_tx(&mut self, n: usize) {
        self.core.tx.consume(n);
    }

    /// Make progress with whatever is in the receive buffer.
    ///
    /// Unsolicited result codes are handled first. If one was found, the ongoing command is left
    /// alone until the next poll.
    pub fn poll(&mut self) {
        if self.recognize_unsolicited() {
            return;
        }
        self.continue_command();
    }

    /// The result of the last command, once it is done.
    pub fn ready(&self) -> Poll<Result<Response, CommandError>> {
        if self.core.is_idle() {
            Poll::Ready(self.core.last_result().clone())
        } else {
            Poll::Pending
        }
    }

    /// The error of the last command, if it failed.
    pub fn command_error(&self) -> Option<CommandError> {
        match self.core.last_result() {
            Err(e) if self.core.is_idle() => Some(*e),
            _ => None,
        }
    }

    /// The numeric result of the last command, `0` for success.
    pub fn command_error_code(&self) -> i32 {
        self.command_error().map_or(0, |e| e.code())
    }

    pub fn ongoing_command(&self) -> Option<CommandId> {
        self.core.ongoing().map(|state| state.id())
    }

    /// The step the ongoing command is waiting at.
    pub fn command_step(&self) -> Option<u32> {
        self.core.ongoing().map(|state| state.step())
    }

    /// Run a request whose answer is a plain OK or ERROR, e.g. `ATE0` or `AT+CMGF=1`.
    pub fn run_command(&mut self, request: &impl AtRequest) -> Result<(), CommandError> {
        self.core
            .start(request, CommandState::Generic(GenericState::AwaitOk))
    }

    /// Give up on the ongoing command without telling the modem.
    ///
    /// The command closes with `Busy`. Whatever the modem still sends for it is dropped when the
    /// next command is issued.
    pub fn abandon_command(&mut self) {
        let Some(state) = self.core.ongoing() else {
            return;
        };

        log::warn!("abandoning {:?} at step {}", state.id(), state.step());
        if let CommandState::Client(ClientState::AwaitOpen { id } | ClientState::AwaitConnect { id }) =
            state
        {
            self.client.disconnect(id, &mut self.core);
        }
        self.core.close_command(Err(CommandError::Busy));
    }

    /// Take the oldest event the modem reported.
    pub fn next_event(&mut self) -> Option<Result<ModemEvent, Lagged>> {
        self.core.events.recv()
    }

    /// Drop every event that has not been taken yet.
    pub fn clear_events(&mut self) {
        self.core.events.clear();
    }

    pub fn sms(&mut self) -> Sms<'_> {
        Sms::new(&mut self.core, &mut self.sms)
    }

    pub fn voice(&mut self) -> Voice<'_> {
        Voice::new(&mut self.core, &mut self.voice)
    }

    pub fn server(&mut self) -> Server<'_> {
        Server::new(&mut self.core, &mut self.server)
    }

    pub fn client(&mut self) -> Client<'_> {
        Client::new(&mut self.core, &mut self.client)
    }

    /// Look for an unsolicited result code, and let the providers react to it.
    ///
    /// Returns true if one was handled.
    fn recognize_unsolicited(&mut self) -> bool {
        let listeners = self.core.listeners;
        let Some(found) = Urc::recognize(&self.core.rx, |kind| listeners.accepts(kind)) else {
            return false;
        };
        log::debug!("Got URC: {:?}", found.urc);

        // With no command, no socket and no SMS being read, nothing before the URC will ever be
        // parsed.
        let quiet = self.core.is_idle() && !self.core.streaming() && !self.core.sms_text;

        match &found.urc {
            Urc::SocketClosed(id) => {
                self.server.handle_urc(&found.urc, &mut self.core);
                self.client.handle_urc(&found.urc, &mut self.core);
                self.core.push_event(ModemEvent::SocketClosed(*id));
            }
            Urc::Connect => self.server.handle_urc(&found.urc, &mut self.core),
            _ => self.voice.handle_urc(&found.urc, &mut self.core),
        }

        if quiet {
            self.core.consume(found.end);
        } else {
            self.core.excise(found.start, found.end);
        }
        true
    }

    fn continue_command(&mut self) {
        let Some(state) = self.core.ongoing() else {
            return;
        };

        let core = &mut self.core;
        let transition = match state {
            CommandState::Sms(state) => self.sms.resume(state, core).map(CommandState::Sms),
            CommandState::Voice(state) => self.voice.resume(state, core).map(CommandState::Voice),
            CommandState::Server(state) => {
                self.server.resume(state, core).map(CommandState::Server)
            }
            CommandState::Client(state) => {
                self.client.resume(state, core).map(CommandState::Client)
            }
            CommandState::Generic(state) => {
                GenericCommand.resume(state, core).map(CommandState::Generic)
            }
        };

        match transition {
            Transition::Continue(next) => {
                if next != state {
                    log::trace!("{:?} step {} -> {}", next.id(), state.step(), next.step());
                }
                self.core.advance(next);
            }
            Transition::Done(result) => self.core.close_command(result),
        }
    }
}
