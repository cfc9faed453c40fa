//! TCP client sockets.
//!
//! Socket ids are drawn from a pool of [MAX_SOCKETS], but only one connection is open at a time:
//! the modem does not say which socket received data belongs to. A socket is written in sessions:
//! after [Client::begin_write] the modem takes raw data until [Client::end_write] terminates it
//! with Ctrl-Z.

use crate::at_command::{
    bounded, unsolicited::Urc, CloseSocket, OpenSocket, SocketMode, SocketSend, CTRL_Z,
};
use crate::modem::{CommandId, CommandState, ModemCore, Provider, Reply, Response, Transition};
use crate::slot::{SocketId, MAX_SOCKETS};
use crate::{log, CommandError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ClientState {
    /// Waiting for the modem to take the open request.
    AwaitOpen { id: SocketId },

    /// The request was taken, waiting for the connection.
    AwaitConnect { id: SocketId },

    AwaitPrompt { id: SocketId },
    AwaitSendOk { id: SocketId },
    AwaitClose { id: SocketId },
}

impl ClientState {
    pub fn step(&self) -> u32 {
        match self {
            ClientState::AwaitConnect { .. } => 3,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenReply {
    Accepted,
    Connected,
    AlreadyConnected,
    Failed,
}

const OPEN_REPLIES: [(&[u8], OpenReply); 4] = [
    (b"CONNECT OK\r\n", OpenReply::Connected),
    (b"ALREADY CONNECT\r\n", OpenReply::AlreadyConnected),
    (b"CONNECT FAIL\r\n", OpenReply::Failed),
    (b"OK\r\n", OpenReply::Accepted),
];

const SEND_REPLIES: [(&[u8], bool); 2] = [(b"SEND OK\r\n", true), (b"SEND FAIL\r\n", false)];

const CLOSE_REPLIES: [(&[u8], ()); 2] = [(b"CLOSE OK\r\n", ()), (b"OK\r\n", ())];

pub(crate) struct ClientProvider {
    connected: [bool; MAX_SOCKETS],
}

impl ClientProvider {
    pub fn new() -> Self {
        ClientProvider {
            connected: [false; MAX_SOCKETS],
        }
    }

    /// Forget about `id` and hand it back to the pool.
    pub fn disconnect(&mut self, id: SocketId, core: &mut ModemCore) {
        if let Some(connected) = self.connected.get_mut(id.ordinal()) {
            *connected = false;
        }
        if core.sockets.is_claimed(id) {
            core.sockets.release(id);
        }
        if !core.sockets.any_claimed() {
            core.listeners.unregister(CommandId::Client);
        }
    }

    fn await_open(
        &mut self,
        state: ClientState,
        id: SocketId,
        core: &mut ModemCore,
    ) -> Transition<ClientState> {
        let reply = match core.match_reply(&OPEN_REPLIES) {
            Reply::Pending => return Transition::Continue(state),
            Reply::Rejected => OpenReply::Failed,
            Reply::Accepted(reply) => reply,
        };

        match reply {
            OpenReply::Accepted => Transition::Continue(ClientState::AwaitConnect { id }),
            OpenReply::Connected => {
                log::info!("socket {} connected", id.ordinal());
                self.connected[id.ordinal()] = true;
                core.listeners.register(CommandId::Client);
                Transition::Done(Ok(Response::Connected(id)))
            }
            OpenReply::AlreadyConnected => {
                self.disconnect(id, core);
                Transition::Done(Err(CommandError::LineBusy))
            }
            OpenReply::Failed => {
                self.disconnect(id, core);
                Transition::Done(Err(CommandError::AddressNack))
            }
        }
    }
}

impl Provider for ClientProvider {
    type State = ClientState;

    fn resume(&mut self, state: ClientState, core: &mut ModemCore) -> Transition<ClientState> {
        match state {
            ClientState::AwaitOpen { id } | ClientState::AwaitConnect { id } => {
                self.await_open(state, id, core)
            }
            ClientState::AwaitPrompt { .. } => {
                let prompts: [(&[u8], ()); 2] = [(b"> ", ()), (b">", ())];
                match core.match_reply(&prompts) {
                    Reply::Pending => Transition::Continue(state),
                    Reply::Accepted(()) => Transition::Done(Ok(Response::Done)),
                    Reply::Rejected => Transition::Done(Err(CommandError::DataNack)),
                }
            }
            ClientState::AwaitSendOk { .. } => match core.match_reply(&SEND_REPLIES) {
                Reply::Pending => Transition::Continue(state),
                Reply::Accepted(true) => Transition::Done(Ok(Response::Done)),
                Reply::Accepted(false) | Reply::Rejected => {
                    Transition::Done(Err(CommandError::DataNack))
                }
            },
            ClientState::AwaitClose { .. } => match core.match_reply(&CLOSE_REPLIES) {
                Reply::Pending => Transition::Continue(state),
                Reply::Accepted(()) => Transition::Done(Ok(Response::Done)),
                Reply::Rejected => Transition::Done(Err(CommandError::AddressNack)),
            },
        }
    }

    fn handle_urc(&mut self, urc: &Urc, _core: &mut ModemCore) {
        match urc {
            Urc::SocketClosed(Some(id)) => {
                if let Some(connected) = self.connected.get_mut(id.ordinal()) {
                    *connected = false;
                }
            }
            Urc::SocketClosed(None) => self.connected = [false; MAX_SOCKETS],
            _ => {}
        }
    }
}

/// TCP client operations, borrowed from [crate::Modem::client].
pub struct Client<'a> {
    core: &'a mut ModemCore,
    provider: &'a mut ClientProvider,
}

impl<'a> Client<'a> {
    pub(crate) fn new(core: &'a mut ModemCore, provider: &'a mut ClientProvider) -> Self {
        Client { core, provider }
    }

    /// Open a TCP connection. Completes with [Response::Connected].
    ///
    /// The socket id is returned right away, and goes back to the pool if the connection fails.
    /// Fails with `LineBusy` while another connection is open.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<SocketId, CommandError> {
        let bounded_host = bounded(host).ok_or(CommandError::AddressNack)?;
        if !self.core.is_idle() {
            return Err(CommandError::Busy);
        }
        if self.core.sockets.any_claimed() {
            log::warn!("a connection is already open, not connecting to {}", host);
            return Err(CommandError::LineBusy);
        }
        if !self.core.streaming() {
            self.core.drop_stale_output();
        }

        let Some(id) = self.core.sockets.claim() else {
            log::warn!("no free socket for {}", host);
            return Err(CommandError::LineBusy);
        };

        let request = OpenSocket {
            id,
            mode: SocketMode::Tcp,
            host: bounded_host,
            port,
        };
        if let Err(e) = self
            .core
            .start(&request, CommandState::Client(ClientState::AwaitOpen { id }))
        {
            self.provider.disconnect(id, self.core);
            return Err(e);
        }
        Ok(id)
    }

    /// Whether `id` is connected.
    pub fn status(&self, id: SocketId) -> bool {
        self.core.sockets.is_claimed(id)
            && self
                .provider
                .connected
                .get(id.ordinal())
                .copied()
                .unwrap_or(false)
    }

    /// Ask the modem for a write prompt. Completes once the modem takes data.
    pub fn begin_write(&mut self, id: SocketId) -> Result<(), CommandError> {
        if !self.status(id) {
            return Err(CommandError::AddressNack);
        }

        self.core.start(
            &SocketSend { id },
            CommandState::Client(ClientState::AwaitPrompt { id }),
        )
    }

    /// Queue data after [Client::begin_write]. Returns the number of bytes queued.
    pub fn write(&mut self, data: &[u8]) -> usize {
        self.core.write_raw(data)
    }

    /// Send the data queued since [Client::begin_write].
    pub fn end_write(&mut self, id: SocketId) -> Result<(), CommandError> {
        self.core.start_raw(
            &[CTRL_Z],
            CommandState::Client(ClientState::AwaitSendOk { id }),
        )
    }

    /// Bytes received on `id`. Nothing can be read while a command is ongoing.
    pub fn available(&self, id: SocketId) -> usize {
        if self.core.is_idle() && self.core.sockets.is_claimed(id) {
            self.core.rx.stored_bytes()
        } else {
            0
        }
    }

    pub fn read(&mut self, id: SocketId, buf: &mut [u8]) -> usize {
        if self.available(id) == 0 {
            return 0;
        }

        let n = self.core.rx.read_into(buf);
        self.core.space_available();
        n
    }

    /// Close `id`, dropping whatever it received that was not read.
    ///
    /// The id goes back to the pool whatever the modem answers.
    pub fn stop(&mut self, id: SocketId) -> Result<(), CommandError> {
        if !self.core.is_idle() {
            return Err(CommandError::Busy);
        }

        self.provider.disconnect(id, self.core);
        self.core.start(
            &CloseSocket { id: Some(id) },
            CommandState::Client(ClientState::AwaitClose { id }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modem::{ModemEvent, XON};
    use crate::Modem;
    use core::task::Poll;

    fn settle(modem: &mut Modem, reply: &[u8]) {
        modem.consume_tx(modem.pending_tx().len());
        modem.receive(reply);
        modem.poll();
    }

    fn connected(modem: &mut Modem) -> SocketId {
        let id = modem.client().connect("example.com", 80).unwrap();
        settle(modem, b"\r\nOK\r\n");
        settle(modem, b"\r\nCONNECT OK\r\n");
        assert_eq!(modem.ready(), Poll::Ready(Ok(Response::Connected(id))));
        modem.consume_tx(modem.pending_tx().len());
        id
    }

    #[test]
    fn connect() {
        let mut modem = Modem::default();
        let id = modem.client().connect("example.com", 80).unwrap();
        assert_eq!(id, SocketId(0));
        assert_eq!(modem.pending_tx(), b"AT+QIOPEN=0,\"TCP\",\"example.com\",80\r");

        settle(&mut modem, b"\r\nOK\r\n");
        assert_eq!(modem.command_step(), Some(3));
        assert!(!modem.client().status(id));

        settle(&mut modem, b"\r\n0, CONNECT OK\r\n");
        assert_eq!(modem.ready(), Poll::Ready(Ok(Response::Connected(id))));
        assert!(modem.client().status(id));
    }

    #[test]
    fn connect_fails() {
        let mut modem = Modem::default();
        let id = modem.client().connect("example.com", 80).unwrap();
        settle(&mut modem, b"\r\nOK\r\n\r\n0, CONNECT FAIL\r\n");
        assert_eq!(modem.ready(), Poll::Pending);
        modem.poll();
        assert_eq!(modem.command_error(), Some(CommandError::AddressNack));

        // the id went back to the pool
        modem.consume_tx(modem.pending_tx().len());
        assert_eq!(modem.client().connect("example.com", 80), Ok(id));
    }

    #[test]
    fn already_connected() {
        let mut modem = Modem::default();
        modem.client().connect("example.com", 80).unwrap();
        settle(&mut modem, b"\r\n0, ALREADY CONNECT\r\n");
        assert_eq!(modem.command_error(), Some(CommandError::LineBusy));
    }

    #[test]
    fn one_connection_at_a_time() {
        let mut modem = Modem::default();
        let id = connected(&mut modem);
        assert_eq!(
            modem.client().connect("example.org", 80),
            Err(CommandError::LineBusy)
        );
        assert!(modem.pending_tx().is_empty());

        modem.client().stop(id).unwrap();
        settle(&mut modem, b"\r\nCLOSE OK\r\n");
        assert_eq!(modem.client().connect("example.org", 80), Ok(id));
    }

    #[test]
    fn host_too_long() {
        let mut modem = Modem::default();
        let host = [b'a'; 101];
        let host = core::str::from_utf8(&host).unwrap();
        assert_eq!(
            modem.client().connect(host, 80),
            Err(CommandError::AddressNack)
        );
        assert_eq!(modem.ongoing_command(), None);
    }

    #[test]
    fn write_session() {
        let mut modem = Modem::default();
        let id = connected(&mut modem);

        modem.client().begin_write(id).unwrap();
        assert_eq!(modem.pending_tx(), b"AT+QISEND=0\r");
        settle(&mut modem, b"\r\n> ");
        assert_eq!(modem.ready(), Poll::Ready(Ok(Response::Done)));

        assert_eq!(modem.client().write(b"hello"), 5);
        modem.client().end_write(id).unwrap();
        assert_eq!(modem.pending_tx(), b"hello\x1a");

        settle(&mut modem, b"\r\nSEND OK\r\n");
        assert_eq!(modem.ready(), Poll::Ready(Ok(Response::Done)));
        assert_eq!(modem.client().available(id), 0);
    }

    #[test]
    fn send_fails() {
        let mut modem = Modem::default();
        let id = connected(&mut modem);

        modem.client().begin_write(id).unwrap();
        settle(&mut modem, b"\r\n> ");
        modem.client().end_write(id).unwrap();
        settle(&mut modem, b"\r\nSEND FAIL\r\n");
        assert_eq!(modem.command_error_code(), 3);
    }

    #[test]
    fn write_needs_a_connection() {
        let mut modem = Modem::default();
        assert_eq!(
            modem.client().begin_write(SocketId(0)),
            Err(CommandError::AddressNack)
        );
    }

    #[test]
    fn read() {
        let mut modem = Modem::default();
        let id = connected(&mut modem);

        modem.receive(b"hello");
        modem.poll();
        assert_eq!(modem.client().available(id), 5);

        let mut buf = [0u8; 8];
        assert_eq!(modem.client().read(id, &mut buf), 5);
        assert_eq!(&buf[..5], b"hello");
        assert_eq!(modem.client().available(id), 0);
    }

    #[test]
    fn answers_are_found_behind_unread_data() {
        let mut modem = Modem::default();
        let id = connected(&mut modem);

        modem.receive(b"<html>");
        modem.client().begin_write(id).unwrap();
        assert_eq!(modem.pending_tx(), b"AT+QISEND=0\r");

        // the '>' in the unread data is not the prompt
        settle(&mut modem, b"");
        assert_eq!(modem.ready(), Poll::Pending);

        settle(&mut modem, b"\r\n> ");
        assert_eq!(modem.ready(), Poll::Ready(Ok(Response::Done)));
        modem.client().write(b"hi");
        modem.client().end_write(id).unwrap();
        settle(&mut modem, b"\r\nSEND OK\r\n");
        assert_eq!(modem.ready(), Poll::Ready(Ok(Response::Done)));

        let mut buf = [0u8; 8];
        assert_eq!(modem.client().read(id, &mut buf), 6);
        assert_eq!(&buf[..6], b"<html>");
    }

    #[test]
    fn no_room_for_an_answer() {
        let mut modem = Modem::default();
        let id = connected(&mut modem);

        assert_eq!(modem.receive(&[b'x'; 128]), 128);
        modem.consume_tx(modem.pending_tx().len());

        // the prompt could never arrive, so the command fails right away
        assert_eq!(modem.client().begin_write(id), Err(CommandError::Busy));
        assert_eq!(modem.ongoing_command(), None);
        assert_eq!(modem.command_error(), Some(CommandError::Busy));
        assert_eq!(modem.client().available(id), 128);

        // closing drops the unread data
        modem.client().stop(id).unwrap();
        assert_eq!(modem.rx_space(), 128);
        assert_eq!(modem.pending_tx()[0], XON);
        assert_eq!(&modem.pending_tx()[1..], b"AT+QICLOSE=0\r");
    }

    #[test]
    fn remote_close() {
        let mut modem = Modem::default();
        let id = connected(&mut modem);

        modem.receive(b"\r\n0, CLOSED\r\n");
        modem.poll();
        assert!(!modem.client().status(id));
        assert_eq!(
            modem.next_event(),
            Some(Ok(ModemEvent::SocketClosed(Some(id))))
        );

        modem.client().stop(id).unwrap();
        assert_eq!(modem.pending_tx(), b"AT+QICLOSE=0\r");
        settle(&mut modem, b"\r\nCLOSE OK\r\n");
        assert_eq!(modem.ready(), Poll::Ready(Ok(Response::Done)));

        // CLOSED is no longer recognised once every socket is released
        modem.receive(b"CLOSED\r\n");
        modem.poll();
        assert_eq!(modem.next_event(), None);
    }
}
