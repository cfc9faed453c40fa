//! Unsolicited Response Codes

use core::str::from_utf8;

use super::{AtParseLine, PhoneNumber};
use crate::{buffer::ReceiveBuffer, slot::SocketId};

mod clip;
mod connection;

pub use clip::CallerId;
pub use connection::SocketPrefix;

/// Unsolicited Response Code
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Urc {
    /// `+CLIP: "<number>",...`, sent after `RING` when caller id is enabled
    CallerId(Option<PhoneNumber>),

    /// `+COLP: ...`, the remote party accepted our call
    CallAccepted,

    /// The call was dropped
    NoCarrier,

    /// The remote party is busy
    Busy,

    /// Incoming call
    Ring,

    /// `[<id>, ]CLOSED`, the remote end closed a socket
    SocketClosed(Option<SocketId>),

    /// A remote client attached to our server
    Connect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UrcKind {
    CallerId,
    CallAccepted,
    NoCarrier,
    Busy,
    Ring,
    SocketClosed,
    Connect,
}

/// The patterns in priority order. Two matches at the same position go to the one listed first.
const PATTERNS: [(UrcKind, &[u8]); 7] = [
    (UrcKind::CallerId, b"+CLIP:"),
    (UrcKind::CallAccepted, b"+COLP:"),
    (UrcKind::NoCarrier, b"NO CARRIER"),
    (UrcKind::Busy, b"BUSY"),
    (UrcKind::Ring, b"RING"),
    (UrcKind::SocketClosed, b"CLOSED\r\n"),
    (UrcKind::Connect, b"CONNECT\r\n"),
];

const LINE_END: &[u8] = b"\r\n";

/// A URC found in the receive buffer, occupying `start..end`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UrcMatch {
    pub urc: Urc,
    pub start: usize,
    pub end: usize,
}

impl Urc {
    pub fn kind(&self) -> UrcKind {
        match self {
            Urc::CallerId(_) => UrcKind::CallerId,
            Urc::CallAccepted => UrcKind::CallAccepted,
            Urc::NoCarrier => UrcKind::NoCarrier,
            Urc::Busy => UrcKind::Busy,
            Urc::Ring => UrcKind::Ring,
            Urc::SocketClosed(_) => UrcKind::SocketClosed,
            Urc::Connect => UrcKind::Connect,
        }
    }

    /// Find the earliest URC in the buffer that `accept` wants.
    ///
    /// Nothing is consumed, and nothing in front of the returned match is a URC. URCs are whole
    /// lines, optionally prefixed with a socket id for `CLOSED`, so a keyword inside SMS text or
    /// socket data is not one. The match includes the line break in front of the URC. A URC is
    /// only reported once its line ending has arrived, or once the buffer is full.
    pub fn recognize(
        buffer: &ReceiveBuffer,
        mut accept: impl FnMut(UrcKind) -> bool,
    ) -> Option<UrcMatch> {
        PATTERNS
            .iter()
            .filter(|(kind, _)| accept(*kind))
            .filter_map(|&(kind, pattern)| Self::match_pattern(buffer, kind, pattern))
            .fold(None, |first: Option<UrcMatch>, found| match first {
                Some(first) if first.start <= found.start => Some(first),
                _ => Some(found),
            })
    }

    fn match_pattern(buffer: &ReceiveBuffer, kind: UrcKind, pattern: &[u8]) -> Option<UrcMatch> {
        let contents = buffer.as_slice();
        let mut from = 0;

        loop {
            let at = buffer.position_from(from, pattern)?;
            from = at + 1;

            let line_start = contents[..at]
                .iter()
                .rposition(|&b| b == b'\n')
                .map_or(0, |i| i + 1);
            let id = if line_start == at {
                None
            } else if kind == UrcKind::SocketClosed {
                let prefix = from_utf8(&contents[line_start..at])
                    .ok()
                    .and_then(|prefix| SocketPrefix::from_line(prefix).ok());
                match prefix {
                    Some(SocketPrefix(id)) => Some(id),
                    None => continue,
                }
            } else {
                continue;
            };

            let after = at + pattern.len();
            let end = match kind {
                // the pattern carries its own line ending
                UrcKind::SocketClosed | UrcKind::Connect => after,

                UrcKind::CallerId | UrcKind::CallAccepted => {
                    match buffer.position_from(after, LINE_END) {
                        Some(i) => i + LINE_END.len(),
                        None if buffer.available_bytes() == 0 => contents.len(),
                        None => return None,
                    }
                }

                // nothing may follow on the same line
                UrcKind::NoCarrier | UrcKind::Busy | UrcKind::Ring => {
                    let rest = &contents[after..];
                    if rest.starts_with(LINE_END) {
                        after + LINE_END.len()
                    } else if !LINE_END.starts_with(rest) {
                        continue;
                    } else if buffer.available_bytes() == 0 {
                        contents.len()
                    } else {
                        return None;
                    }
                }
            };

            let urc = match kind {
                UrcKind::CallerId => {
                    let line = from_utf8(&contents[at..end]).unwrap_or("");
                    Urc::CallerId(CallerId::from_line(line.trim()).ok().map(|id| id.number))
                }
                UrcKind::CallAccepted => Urc::CallAccepted,
                UrcKind::NoCarrier => Urc::NoCarrier,
                UrcKind::Busy => Urc::Busy,
                UrcKind::Ring => Urc::Ring,
                UrcKind::Connect => Urc::Connect,
                UrcKind::SocketClosed => Urc::SocketClosed(id),
            };

            let start = if contents[..line_start].ends_with(LINE_END) {
                line_start - LINE_END.len()
            } else {
                line_start
            };
            return Some(UrcMatch { urc, start, end });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recognize(contents: &[u8]) -> Option<UrcMatch> {
        let mut buffer = ReceiveBuffer::new();
        buffer.push(contents);
        Urc::recognize(&buffer, |_| true)
    }

    #[test]
    fn ring() {
        let found = recognize(b"\r\nRING\r\n").unwrap();
        assert_eq!(found.urc, Urc::Ring);
        assert_eq!((found.start, found.end), (0, 8));
    }

    #[test]
    fn ring_waits_for_line_end() {
        assert_eq!(recognize(b"\r\nRING"), None);
        assert_eq!(recognize(b"\r\nRING\r"), None);
        assert_eq!(recognize(b"\r\nRINGO\r\n"), None);
    }

    #[test]
    fn keywords_inside_a_line() {
        assert_eq!(recognize(b"\r\nI AM BUSY\r\n\r\nOK\r\n"), None);
        assert_eq!(recognize(b"\r\nSTRING\r\n"), None);
        assert_eq!(recognize(b"no carrier? NO CARRIER\r\n"), None);
        assert_eq!(recognize(b"payloadCLOSED\r\n"), None);

        // the first occurrence is not a URC, the second one is
        let found = recognize(b"STRING\r\nRING\r\n").unwrap();
        assert_eq!(found.urc, Urc::Ring);
        assert_eq!((found.start, found.end), (6, 14));
    }

    #[test]
    fn earliest_first() {
        let found = recognize(b"\r\nRING\r\n\r\n+CLIP: \"+15551234567\",145,\"\",,\"\",0\r\n").unwrap();
        assert_eq!(found.urc, Urc::Ring);

        let found = recognize(b"\r\n+CLIP: \"+15551234567\",145,\"\",,\"\",0\r\n").unwrap();
        assert_eq!(found.urc, Urc::CallerId(Some("+15551234567".into())));
    }

    #[test]
    fn partial_caller_id_waits() {
        assert_eq!(recognize(b"\r\n+CLIP: \"+1555"), None);
    }

    #[test]
    fn no_carrier() {
        assert_eq!(recognize(b"\r\nNO CARRIER\r\n").unwrap().urc, Urc::NoCarrier);
        assert_eq!(recognize(b"\r\nBUSY\r\n").unwrap().urc, Urc::Busy);
        assert_eq!(recognize(b"\r\n+COLP: \"+1555\",145\r\n").unwrap().urc, Urc::CallAccepted);
    }

    #[test]
    fn socket_closed_with_id() {
        let found = recognize(b"\r\n1, CLOSED\r\n").unwrap();
        assert_eq!(found.urc, Urc::SocketClosed(Some(SocketId(1))));
        assert_eq!((found.start, found.end), (0, 13));
    }

    #[test]
    fn socket_closed_keeps_data() {
        let found = recognize(b"bye\r\n0, CLOSED\r\n").unwrap();
        assert_eq!(found.urc, Urc::SocketClosed(Some(SocketId(0))));
        assert_eq!((found.start, found.end), (3, 16));

        let found = recognize(b"payload\r\nCLOSED\r\n").unwrap();
        assert_eq!(found.urc, Urc::SocketClosed(None));
        assert_eq!((found.start, found.end), (7, 17));
    }

    #[test]
    fn connect_ok_is_not_a_urc() {
        assert_eq!(recognize(b"\r\n0, CONNECT OK\r\n"), None);
        assert_eq!(recognize(b"\r\nCONNECT\r\n").unwrap().urc, Urc::Connect);
    }

    #[test]
    fn filter() {
        let mut buffer = ReceiveBuffer::new();
        buffer.push(b"\r\nRING\r\n\r\nCLOSED\r\n");
        let found = Urc::recognize(&buffer, |kind| kind == UrcKind::SocketClosed).unwrap();
        assert_eq!(found.urc, Urc::SocketClosed(None));
        assert_eq!((found.start, found.end), (8, 18));
    }
}
