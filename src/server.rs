//! TCP server.
//!
//! Bringing the server up takes four steps: query the local address, set the local port, start
//! the server and wait for it to be confirmed. Each step is entered only after the modem
//! accepted the previous one.

use core::net::Ipv4Addr;

use crate::at_command::{
    unsolicited::Urc, AtParseLine, CloseSocket, GetLocalIp, LocalIp, SetLocalPort, SocketMode,
    StartServer,
};
use crate::modem::{
    CommandId, CommandState, ModemCore, ModemEvent, Provider, Reply, Response, Transition,
};
use crate::{log, CommandError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ServerState {
    AwaitLocalIp {
        port: u16,
    },
    AwaitPortAck {
        #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
        local_ip: Ipv4Addr,
    },
    AwaitServerAck {
        #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
        local_ip: Ipv4Addr,
    },
    AwaitClose,
}

impl ServerState {
    pub fn step(&self) -> u32 {
        match self {
            ServerState::AwaitLocalIp { .. } => 2,
            ServerState::AwaitPortAck { .. } => 3,
            ServerState::AwaitServerAck { .. } => 4,
            ServerState::AwaitClose => 2,
        }
    }
}

pub(crate) struct ServerProvider {
    local_ip: Option<Ipv4Addr>,
    listening: bool,
    has_client: bool,
}

impl ServerProvider {
    pub fn new() -> Self {
        ServerProvider {
            local_ip: None,
            listening: false,
            has_client: false,
        }
    }

    fn await_local_ip(&mut self, port: u16, core: &mut ModemCore) -> Transition<ServerState> {
        while let Some(line) = core.rx.take_line() {
            // command echo
            if line.starts_with("AT") {
                continue;
            }

            let Ok(LocalIp(local_ip)) = LocalIp::from_line(&line) else {
                log::warn!("expected local ip, got {:?}", line.as_str());
                return Transition::Done(Err(CommandError::DataNack));
            };
            log::info!("local ip {}", line.as_str());

            let request = SetLocalPort {
                mode: SocketMode::Tcp,
                port,
            };
            return match core.send_request(&request) {
                Ok(()) => Transition::Continue(ServerState::AwaitPortAck { local_ip }),
                Err(e) => Transition::Done(Err(e)),
            };
        }
        core.space_available();

        Transition::Continue(ServerState::AwaitLocalIp { port })
    }
}

impl Provider for ServerProvider {
    type State = ServerState;

    fn resume(&mut self, state: ServerState, core: &mut ModemCore) -> Transition<ServerState> {
        match state {
            ServerState::AwaitLocalIp { port } => self.await_local_ip(port, core),
            ServerState::AwaitPortAck { local_ip } => match core.generic_parse(None) {
                Reply::Pending => Transition::Continue(state),
                Reply::Rejected => Transition::Done(Err(CommandError::DataNack)),
                Reply::Accepted(()) => match core.send_request(&StartServer) {
                    Ok(()) => Transition::Continue(ServerState::AwaitServerAck { local_ip }),
                    Err(e) => Transition::Done(Err(e)),
                },
            },
            ServerState::AwaitServerAck { local_ip } => match core.generic_parse(None) {
                Reply::Pending => Transition::Continue(state),
                Reply::Rejected => Transition::Done(Err(CommandError::DataNack)),
                Reply::Accepted(()) => {
                    self.local_ip = Some(local_ip);
                    self.listening = true;
                    self.has_client = false;
                    core.listeners.register(CommandId::Server);
                    Transition::Done(Ok(Response::Listening { local_ip }))
                }
            },
            ServerState::AwaitClose => {
                let patterns: [(&[u8], ()); 2] = [(b"CLOSE OK\r\n", ()), (b"OK\r\n", ())];
                match core.match_reply(&patterns) {
                    Reply::Pending => Transition::Continue(state),
                    Reply::Accepted(()) => Transition::Done(Ok(Response::Done)),
                    Reply::Rejected => Transition::Done(Err(CommandError::AddressNack)),
                }
            }
        }
    }

    fn handle_urc(&mut self, urc: &Urc, core: &mut ModemCore) {
        if !self.listening {
            return;
        }

        match urc {
            Urc::Connect => {
                log::info!("remote client connected");
                self.has_client = true;
                core.push_event(ModemEvent::RemoteClientConnected);
            }
            Urc::SocketClosed(None) => self.has_client = false,
            _ => {}
        }
    }
}

/// TCP server operations, borrowed from [crate::Modem::server].
pub struct Server<'a> {
    core: &'a mut ModemCore,
    provider: &'a mut ServerProvider,
}

impl<'a> Server<'a> {
    pub(crate) fn new(core: &'a mut ModemCore, provider: &'a mut ServerProvider) -> Self {
        Server { core, provider }
    }

    /// Start listening on `port`. Completes with [Response::Listening].
    ///
    /// A step the modem rejects closes the command with [CommandError::DataNack].
    pub fn connect(&mut self, port: u16) -> Result<(), CommandError> {
        if self.provider.listening {
            return Err(CommandError::LineBusy);
        }

        self.core.start(
            &GetLocalIp,
            CommandState::Server(ServerState::AwaitLocalIp { port }),
        )
    }

    /// Stop the server. The server is considered stopped even if the modem rejects the request.
    pub fn stop(&mut self) -> Result<(), CommandError> {
        if !self.core.is_idle() {
            return Err(CommandError::Busy);
        }

        self.provider.listening = false;
        self.provider.has_client = false;
        self.core.listeners.unregister(CommandId::Server);
        self.core.start(
            &CloseSocket { id: None },
            CommandState::Server(ServerState::AwaitClose),
        )
    }

    pub fn is_listening(&self) -> bool {
        self.provider.listening
    }

    /// The address the server listens on, once it has been started.
    pub fn local_ip(&self) -> Option<Ipv4Addr> {
        self.provider.local_ip
    }

    pub fn has_client(&self) -> bool {
        self.provider.has_client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Modem;
    use core::task::Poll;

    fn settle(modem: &mut Modem, reply: &[u8]) {
        modem.consume_tx(modem.pending_tx().len());
        modem.receive(reply);
        modem.poll();
    }

    #[test]
    fn bring_up() {
        let mut modem = Modem::default();
        modem.server().connect(8080).unwrap();
        assert_eq!(modem.pending_tx(), b"AT+QILOCIP\r");
        assert_eq!(modem.command_step(), Some(2));

        settle(&mut modem, b"AT+QILOCIP\r\r\n10.64.12.5\r\n");
        assert_eq!(modem.pending_tx(), b"AT+QILPORT=\"TCP\",8080\r");
        assert_eq!(modem.command_step(), Some(3));

        settle(&mut modem, b"\r\nOK\r\n");
        assert_eq!(modem.pending_tx(), b"AT+QISERVER\r");
        assert_eq!(modem.command_step(), Some(4));

        settle(&mut modem, b"\r\nOK\r\n");
        let local_ip = Ipv4Addr::new(10, 64, 12, 5);
        assert_eq!(modem.ready(), Poll::Ready(Ok(Response::Listening { local_ip })));
        assert!(modem.server().is_listening());
        assert_eq!(modem.server().local_ip(), Some(local_ip));
    }

    #[test]
    fn port_rejected() {
        let mut modem = Modem::default();
        modem.server().connect(8080).unwrap();
        settle(&mut modem, b"\r\n10.64.12.5\r\n");
        settle(&mut modem, b"\r\nERROR\r\n");

        assert_eq!(modem.command_error_code(), 3);
        assert_eq!(modem.command_step(), None);
        assert!(modem.pending_tx().is_empty());

        // nothing happens on later polls either
        modem.poll();
        assert!(modem.pending_tx().is_empty());
        assert!(!modem.server().is_listening());
    }

    #[test]
    fn malformed_local_ip() {
        let mut modem = Modem::default();
        modem.server().connect(8080).unwrap();
        settle(&mut modem, b"\r\n+CME ERROR: 3\r\n");
        assert_eq!(modem.command_error(), Some(CommandError::DataNack));
    }

    #[test]
    fn remote_clients() {
        let mut modem = Modem::default();
        modem.server().connect(23).unwrap();
        settle(&mut modem, b"\r\n10.0.0.1\r\n");
        settle(&mut modem, b"\r\nOK\r\n");
        settle(&mut modem, b"\r\nOK\r\n");
        assert!(modem.server().is_listening());

        modem.receive(b"\r\nCONNECT\r\n");
        modem.poll();
        assert!(modem.server().has_client());
        assert_eq!(modem.next_event(), Some(Ok(ModemEvent::RemoteClientConnected)));

        modem.receive(b"data\r\nCLOSED\r\n");
        modem.poll();
        assert!(!modem.server().has_client());
        assert_eq!(modem.next_event(), Some(Ok(ModemEvent::SocketClosed(None))));

        // only the URCs were taken out of the buffer
        assert_eq!(modem.rx_space(), 128 - 4);
    }

    #[test]
    fn stop() {
        let mut modem = Modem::default();
        modem.server().connect(23).unwrap();
        settle(&mut modem, b"\r\n10.0.0.1\r\n");
        settle(&mut modem, b"\r\nOK\r\n");
        settle(&mut modem, b"\r\nOK\r\n");

        modem.server().stop().unwrap();
        assert_eq!(modem.pending_tx(), b"AT+QICLOSE\r");
        assert!(!modem.server().is_listening());

        settle(&mut modem, b"\r\nCLOSE OK\r\n");
        assert_eq!(modem.ready(), Poll::Ready(Ok(Response::Done)));

        // CONNECT is no longer a URC
        modem.receive(b"\r\nCONNECT\r\n");
        modem.poll();
        assert!(!modem.server().has_client());
        assert_eq!(modem.next_event(), None);
    }
}
