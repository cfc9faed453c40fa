use crate::at_command::{bounded, AtParseErr, AtParseLine, PhoneNumber};

/// Caller id of an incoming call
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CallerId {
    pub number: PhoneNumber,
}

impl AtParseLine for CallerId {
    fn from_line(line: &str) -> Result<Self, AtParseErr> {
        let (message, rest) = line.split_once(": ").ok_or("Missing ': '")?;
        if message != "+CLIP" {
            return Err("Missing +CLIP prefix".into());
        }

        // <number>,<type>[,<subaddr>,<satype>,<alpha>,<CLI validity>]
        let (number, _) = rest.split_once(',').ok_or("Missing ','")?;

        Ok(CallerId {
            number: bounded(number.trim_matches('"')).ok_or("Phone number too long")?,
        })
    }
}
