use core::str::from_utf8;

use super::{CommandId, CommandState, FlowControl, ModemConfig, ModemEvent, Reply, Response, TxQueue};
use crate::at_command::{unsolicited::UrcKind, AtRequest};
use crate::buffer::ReceiveBuffer;
use crate::slot::SocketPool;
use crate::util::RingQueue;
use crate::{log, CommandError};

/// Pause transmission from the modem.
pub const XOFF: u8 = 0x13;

/// Resume transmission from the modem.
pub const XON: u8 = 0x11;

const OK: &[u8] = b"OK\r\n";
const LINE_END: &[u8] = b"\r\n";

/// The providers that want to see unsolicited result codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct UrcRegistry(u8);

impl UrcRegistry {
    fn bit(id: CommandId) -> u8 {
        1 << id as u8
    }

    pub fn register(&mut self, id: CommandId) {
        self.0 |= Self::bit(id);
    }

    pub fn unregister(&mut self, id: CommandId) {
        self.0 &= !Self::bit(id);
    }

    pub fn contains(&self, id: CommandId) -> bool {
        self.0 & Self::bit(id) != 0
    }

    /// Whether any registered provider handles `kind`.
    pub fn accepts(&self, kind: UrcKind) -> bool {
        match kind {
            UrcKind::CallerId
            | UrcKind::CallAccepted
            | UrcKind::NoCarrier
            | UrcKind::Busy
            | UrcKind::Ring => self.contains(CommandId::Voice),
            UrcKind::SocketClosed => {
                self.contains(CommandId::Client) || self.contains(CommandId::Server)
            }
            UrcKind::Connect => self.contains(CommandId::Server),
        }
    }
}

/// State shared by every provider: the buffers, the command slot and the socket ids.
pub(crate) struct ModemCore {
    pub rx: ReceiveBuffer,
    pub tx: TxQueue,
    pub sockets: SocketPool,
    pub listeners: UrcRegistry,
    pub events: RingQueue<ModemEvent, 8>,

    /// The receive buffer holds SMS text that has not been read yet.
    pub sms_text: bool,

    config: ModemConfig,
    ongoing: Option<CommandState>,
    last_result: Result<Response, CommandError>,

    /// An XOFF was sent and has not been followed by an XON yet.
    paused: bool,
}

impl ModemCore {
    pub fn new(config: ModemConfig) -> Self {
        let mut listeners = UrcRegistry::default();
        listeners.register(CommandId::Voice);

        ModemCore {
            rx: ReceiveBuffer::new(),
            tx: TxQueue::new(),
            sockets: SocketPool::new(),
            listeners,
            events: RingQueue::new(),
            sms_text: false,
            config,
            ongoing: None,
            last_result: Ok(Response::Done),
            paused: false,
        }
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    pub fn is_idle(&self) -> bool {
        self.ongoing.is_none()
    }

    pub fn ongoing(&self) -> Option<CommandState> {
        self.ongoing
    }

    pub fn last_result(&self) -> &Result<Response, CommandError> {
        &self.last_result
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Make the caller the owner of the modem. Fails with `Busy` if a command is ongoing.
    pub fn open_command(&mut self, state: CommandState) -> Result<(), CommandError> {
        if let Some(ongoing) = self.ongoing {
            log::warn!("{:?} rejected, {:?} is ongoing", state.id(), ongoing.id());
            return Err(CommandError::Busy);
        }

        log::debug!("open {:?}", state.id());
        self.ongoing = Some(state);
        self.last_result = Ok(Response::Done);
        Ok(())
    }

    /// Move the ongoing command to its next state.
    pub fn advance(&mut self, next: CommandState) {
        if self.ongoing.is_some() {
            self.ongoing = Some(next);
        }
    }

    /// Finish the ongoing command. Every opened command is closed exactly once.
    pub fn close_command(&mut self, result: Result<Response, CommandError>) {
        let Some(state) = self.ongoing.take() else {
            log::error!("tried to close a command that was not ongoing: {:?}", result);
            return;
        };

        match &result {
            Ok(response) => log::debug!("{:?} done: {:?}", state.id(), response),
            Err(e) => log::warn!("{:?} failed at step {}: {:?}", state.id(), state.step(), e),
        }
        self.last_result = result;
    }

    /// Close the ongoing command with `error`, if `id` owns it.
    pub fn abort(&mut self, id: CommandId, error: CommandError) {
        if self.ongoing.map(|state| state.id()) == Some(id) {
            self.close_command(Err(error));
        }
    }

    /// Open a command and issue its first request.
    pub fn start(&mut self, request: &impl AtRequest, state: CommandState) -> Result<(), CommandError> {
        self.open_command(state)?;
        self.issue(request)
    }

    /// Open a command whose first step is raw bytes rather than a request.
    pub fn start_raw(&mut self, bytes: &[u8], state: CommandState) -> Result<(), CommandError> {
        self.open_command(state)?;
        if let Err(e) = self.tx.push(bytes) {
            self.close_command(Err(e));
            return Err(e);
        }
        if self.streaming() {
            self.rx.mark_reply();
        }
        Ok(())
    }

    /// Issue a request for the ongoing command, closing it if the request can not be queued.
    pub fn issue(&mut self, request: &impl AtRequest) -> Result<(), CommandError> {
        if let Err(e) = self.send_request(request) {
            self.close_command(Err(e));
            return Err(e);
        }
        Ok(())
    }

    pub fn send_request(&mut self, request: &impl AtRequest) -> Result<(), CommandError> {
        log::trace!("Running AT command: {:?}", request);
        self.generic_command(&request.encode(), false)
    }

    /// Queue the literal command `text`, optionally terminated with a carriage return.
    ///
    /// Output left over from earlier commands is dropped first. While a socket may have put data
    /// in the buffer, that data is kept and the answer is looked for behind it instead. If unread
    /// data leaves no room for the answer, the command fails with `Busy`.
    pub fn generic_command(&mut self, text: &str, terminate: bool) -> Result<(), CommandError> {
        let terminator: &[u8] = if terminate { b"\r" } else { b"" };
        if text.len() + terminator.len() > self.tx.free() {
            log::warn!("no room in transmit queue for {:?}", text);
            return Err(CommandError::Busy);
        }

        if !self.streaming() {
            self.drop_stale_output();
        } else if self.rx.available_bytes() <= self.config.pause_threshold {
            log::warn!(
                "no room for an answer to {:?}, {} bytes unread",
                text,
                self.rx.stored_bytes()
            );
            return Err(CommandError::Busy);
        } else {
            self.rx.mark_reply();
        }

        log::debug!("Write to modem: {:?}", text);
        self.tx.push(text.as_bytes())?;
        self.tx.push(terminator)
    }

    /// Drop output left over from earlier commands, including unread SMS text.
    pub fn drop_stale_output(&mut self) {
        if !self.rx.is_empty() {
            log::trace!("dropping stale output {:?}", self.rx.as_slice());
            self.flush_rx();
        }
        self.sms_text = false;
    }

    /// Queue raw bytes, e.g. SMS text or socket data. Returns the number of bytes queued.
    pub fn write_raw(&mut self, bytes: &[u8]) -> usize {
        let n = self.tx.push_partial(bytes);
        log::trace!("queued {} of {} raw bytes", n, bytes.len());
        n
    }

    /// Look for `expect` (`OK` by default) or an error line in the reply window.
    ///
    /// Whichever comes first decides, and the reply window is consumed through it.
    pub fn generic_parse(&mut self, expect: Option<&[u8]>) -> Reply {
        self.match_reply(&[(expect.unwrap_or(OK), ())])
    }

    /// Like [ModemCore::generic_parse], but with several accepted answers.
    ///
    /// On a tie the pattern listed first wins.
    pub fn match_reply<T: Copy>(&mut self, patterns: &[(&[u8], T)]) -> Reply<T> {
        let from = self.rx.reply_start();
        let accepted = patterns
            .iter()
            .filter_map(|&(pattern, value)| {
                let start = self.rx.position_from(from, pattern)?;
                Some((start, start + pattern.len(), value))
            })
            .fold(None, |first: Option<(usize, usize, T)>, found| match first {
                Some(first) if first.0 <= found.0 => Some(first),
                _ => Some(found),
            });
        let rejected = self.find_error();

        match (accepted, rejected) {
            (Some((start, end, value)), rejected)
                if rejected.map_or(true, |(error_start, _)| start < error_start) =>
            {
                self.excise(from, end);
                Reply::Accepted(value)
            }
            (_, Some((start, end))) => {
                if let Ok(line) = from_utf8(&self.rx.as_slice()[start..end]) {
                    log::warn!("modem answered {:?}", line.trim());
                }
                self.excise(from, end);
                Reply::Rejected
            }
            _ => Reply::Pending,
        }
    }

    /// Find a complete `ERROR`, `+CME ERROR: <n>` or `+CMS ERROR: <n>` line in the reply window.
    fn find_error(&self) -> Option<(usize, usize)> {
        let start = self.rx.position_from(self.rx.reply_start(), b"ERROR")?;
        let end = self.rx.position_from(start, LINE_END)? + LINE_END.len();
        Some((start, end))
    }

    /// Consume the first `n` buffered bytes.
    pub fn consume(&mut self, n: usize) {
        self.rx.discard(n);
        self.space_available();
    }

    /// Remove `start..end` from the buffer, keeping what surrounds it.
    pub fn excise(&mut self, start: usize, end: usize) {
        self.rx.excise(start, end);
        self.space_available();
    }

    pub fn flush_rx(&mut self) {
        self.rx.flush();
        self.space_available();
    }

    /// Take bytes from the modem. Returns how many were accepted.
    pub fn receive(&mut self, bytes: &[u8]) -> usize {
        let n = self.rx.push(bytes);
        if n < bytes.len() {
            log::trace!("receive buffer full, holding back {} bytes", bytes.len() - n);
        }

        if self.config.flow_control == FlowControl::XonXoff
            && !self.paused
            && self.rx.available_bytes() <= self.config.pause_threshold
            && self.tx.push(&[XOFF]).is_ok()
        {
            log::debug!("receive buffer nearly full, sending XOFF");
            self.paused = true;
        }

        n
    }

    /// Tell the modem to resume sending, if it was paused and the buffer has drained enough.
    pub fn space_available(&mut self) {
        if self.paused
            && self.rx.available_bytes() > self.config.resume_threshold
            && self.tx.push(&[XON]).is_ok()
        {
            log::debug!("receive buffer drained, sending XON");
            self.paused = false;
        }
    }

    /// Whether bytes in the receive buffer may belong to a socket rather than to a command.
    pub fn streaming(&self) -> bool {
        self.sockets.any_claimed() || self.listeners.contains(CommandId::Server)
    }

    pub fn push_event(&mut self, event: ModemEvent) {
        log::debug!("event: {:?}", event);
        self.events.send(event);
    }
}
