use crate::at_command::{AtParseErr, AtParseLine};
use crate::slot::{SocketId, MAX_SOCKETS};

/// The `<id>, ` prefix the modem puts in front of socket messages in multi-connection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocketPrefix(pub SocketId);

impl AtParseLine for SocketPrefix {
    fn from_line(line: &str) -> Result<Self, AtParseErr> {
        let index: u8 = line
            .strip_suffix(", ")
            .ok_or("Missing ', '")?
            .trim()
            .parse()?;

        if usize::from(index) >= MAX_SOCKETS {
            return Err("Socket id out of range".into());
        }

        Ok(SocketPrefix(SocketId(index)))
    }
}
