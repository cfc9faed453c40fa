/// Terminal failure of a modem command.
///
/// The discriminants are the integer codes reported by [CommandError::code]. A successful command
/// reports `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(i32)]
pub enum CommandError {
    /// Another command is in flight, or the modem could not take the command.
    Busy = 1,

    /// The modem rejected the command or the address (phone number, host).
    AddressNack = 2,

    /// The modem rejected the payload, or answered with something unusable.
    DataNack = 3,

    /// The line or socket is already in use, or the call was dropped.
    LineBusy = 4,
}

impl CommandError {
    pub fn code(&self) -> i32 {
        *self as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    Command(CommandError),

    /// The caller's time budget ran out before the modem answered.
    Timeout,

    /// The serial transport failed.
    Serial,

    BufferOverflow,

    /// The socket is not connected.
    NotConnected,
}

impl embedded_io_async::Error for Error {
    fn kind(&self) -> embedded_io_async::ErrorKind {
        match self {
            Error::Command(_) => embedded_io_async::ErrorKind::Other,
            Error::Timeout => embedded_io_async::ErrorKind::TimedOut,
            Error::Serial => embedded_io_async::ErrorKind::Other,
            Error::BufferOverflow => embedded_io_async::ErrorKind::OutOfMemory,
            Error::NotConnected => embedded_io_async::ErrorKind::NotConnected,
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Error::Command(e)
    }
}
