use std::fmt;
use std::str::FromStr;

use crate::error::TriggerError;

/// Keys that drive each line low, indexed by line number minus one.
const UNSET_KEYS: [u8; 8] = *b"QWERTYUI";

/// Set of DLP-IO8-G output lines, one bit per line (bit 0 is line 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggerLines(u8);

impl TriggerLines {
    pub const ALL: TriggerLines = TriggerLines(0xFF);

    pub fn single(line: u8) -> Result<Self, TriggerError> {
        if !(1..=8).contains(&line) {
            return Err(TriggerError::InvalidLine(char::from(b'0'.wrapping_add(line))));
        }
        Ok(Self(1 << (line - 1)))
    }

    pub fn contains(&self, line: u8) -> bool {
        (1..=8).contains(&line) && self.0 & (1 << (line - 1)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (1..=8u8).filter(|line| self.contains(*line))
    }

    /// Bytes that drive the lines high.
    pub fn set_command(&self) -> Vec<u8> {
        self.iter().map(|line| b'0' + line).collect()
    }

    /// Bytes that drive the lines low.
    pub fn unset_command(&self) -> Vec<u8> {
        self.iter().map(|line| UNSET_KEYS[usize::from(line - 1)]).collect()
    }
}

impl FromStr for TriggerLines {
    type Err = TriggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mask = 0u8;
        for c in s.chars().filter(|c| !c.is_whitespace() && *c != ',') {
            match c.to_digit(10) {
                Some(d @ 1..=8) => mask |= 1 << (d - 1),
                _ => return Err(TriggerError::InvalidLine(c)),
            }
        }
        if mask == 0 {
            return Err(TriggerError::NoLines);
        }
        Ok(Self(mask))
    }
}

impl fmt::Display for TriggerLines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.iter() {
            write!(f, "{line}")?;
        }
        Ok(())
    }
}
