//! Voice calls.
//!
//! The call status is driven both by our own commands and by what the modem reports on its own:
//! `RING` and `+CLIP:` for incoming calls, `+COLP:` when the remote party answers, and
//! `NO CARRIER` or `BUSY` when a call ends.

use crate::at_command::{
    bounded, unsolicited::Urc, AnswerCall, AtParseLine, CallInfo, Dial, HangUp, ListCurrentCalls,
    PhoneNumber,
};
use crate::modem::{
    CommandId, CommandState, ModemCore, ModemEvent, Provider, Reply, Response, Transition,
};
use crate::{log, CommandError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CallStatus {
    Idle,

    /// We dialed and the remote party has not answered yet.
    Calling,

    /// Someone is calling us.
    ReceivingCall,

    Talking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum VoiceState {
    AwaitDial,
    AwaitAnswer,
    AwaitHangUp,
    AwaitCallList,
}

impl VoiceState {
    pub fn step(&self) -> u32 {
        2
    }
}

pub(crate) struct VoiceProvider {
    status: CallStatus,

    /// The caller id of the last incoming call.
    caller: PhoneNumber,
}

impl VoiceProvider {
    pub fn new() -> Self {
        VoiceProvider {
            status: CallStatus::Idle,
            caller: PhoneNumber::new(),
        }
    }

    fn set_status(&mut self, status: CallStatus) {
        if self.status != status {
            log::info!("call status {:?} -> {:?}", self.status, status);
            self.status = status;
        }
    }

    fn incoming_call(&mut self, core: &mut ModemCore) {
        if self.status == CallStatus::Idle {
            self.caller.clear();
            self.set_status(CallStatus::ReceivingCall);
            core.push_event(ModemEvent::IncomingCall);
        }
    }

    fn call_ended(&mut self, event: ModemEvent, core: &mut ModemCore) {
        self.set_status(CallStatus::Idle);
        core.abort(CommandId::Voice, CommandError::LineBusy);
        core.push_event(event);
    }
}

impl Provider for VoiceProvider {
    type State = VoiceState;

    fn resume(&mut self, state: VoiceState, core: &mut ModemCore) -> Transition<VoiceState> {
        let calling_number = match state {
            VoiceState::AwaitCallList => core
                .rx
                .find_line(b"+CLCC:")
                .and_then(|line| CallInfo::from_line(line).ok())
                .map(|info| info.number),
            _ => None,
        };

        match core.generic_parse(None) {
            Reply::Pending => Transition::Continue(state),
            Reply::Rejected => Transition::Done(Err(CommandError::AddressNack)),
            Reply::Accepted(()) => match state {
                VoiceState::AwaitDial => {
                    self.set_status(CallStatus::Calling);
                    Transition::Done(Ok(Response::Done))
                }
                VoiceState::AwaitAnswer => {
                    self.set_status(CallStatus::Talking);
                    Transition::Done(Ok(Response::Done))
                }
                VoiceState::AwaitHangUp => {
                    self.set_status(CallStatus::Idle);
                    Transition::Done(Ok(Response::Done))
                }
                VoiceState::AwaitCallList => match calling_number {
                    Some(number) => Transition::Done(Ok(Response::CallingNumber(number))),
                    None => Transition::Done(Err(CommandError::DataNack)),
                },
            },
        }
    }

    fn handle_urc(&mut self, urc: &Urc, core: &mut ModemCore) {
        match urc {
            Urc::Ring => self.incoming_call(core),
            Urc::CallerId(number) => {
                self.incoming_call(core);
                if let Some(number) = number {
                    self.caller = number.clone();
                }
            }
            Urc::CallAccepted => {
                if self.status == CallStatus::Calling {
                    self.set_status(CallStatus::Talking);
                    core.push_event(ModemEvent::CallAnswered);
                }
            }
            Urc::NoCarrier => self.call_ended(ModemEvent::CallEnded, core),
            Urc::Busy => self.call_ended(ModemEvent::RemoteBusy, core),
            _ => {}
        }
    }
}

/// Voice call operations, borrowed from [crate::Modem::voice].
pub struct Voice<'a> {
    core: &'a mut ModemCore,
    provider: &'a mut VoiceProvider,
}

impl<'a> Voice<'a> {
    pub(crate) fn new(core: &'a mut ModemCore, provider: &'a mut VoiceProvider) -> Self {
        Voice { core, provider }
    }

    pub fn status(&self) -> CallStatus {
        self.provider.status
    }

    /// The caller id reported with the last incoming call, if the network sent one.
    pub fn caller_id(&self) -> Option<&str> {
        Some(self.provider.caller.as_str()).filter(|number| !number.is_empty())
    }

    /// Dial `number`. The line must be idle.
    pub fn call(&mut self, number: &str) -> Result<(), CommandError> {
        if self.provider.status != CallStatus::Idle {
            log::warn!("can not call while {:?}", self.provider.status);
            return Err(CommandError::LineBusy);
        }
        let number = bounded(number).ok_or(CommandError::AddressNack)?;

        self.core
            .start(&Dial { number }, CommandState::Voice(VoiceState::AwaitDial))
    }

    pub fn answer(&mut self) -> Result<(), CommandError> {
        self.core
            .start(&AnswerCall, CommandState::Voice(VoiceState::AwaitAnswer))
    }

    pub fn hang_up(&mut self) -> Result<(), CommandError> {
        self.core
            .start(&HangUp, CommandState::Voice(VoiceState::AwaitHangUp))
    }

    /// Ask the modem who is on the line. Completes with [Response::CallingNumber].
    pub fn retrieve_calling_number(&mut self) -> Result<(), CommandError> {
        self.core.start(
            &ListCurrentCalls,
            CommandState::Voice(VoiceState::AwaitCallList),
        )
    }
}
