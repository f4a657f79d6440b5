//! Expire directive sent along with an upload.
//!
//! Either `asap` (purge after the first download) or a duration with a
//! single shortcut unit: `30m`, `2h`, `1d`.

use std::fmt;
use std::str::FromStr;

use crate::error::UpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpireUnit {
    Days,
    Hours,
    Minutes,
}

impl ExpireUnit {
    fn suffix(self) -> char {
        match self {
            ExpireUnit::Days => 'd',
            ExpireUnit::Hours => 'h',
            ExpireUnit::Minutes => 'm',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expire {
    Asap,
    After { amount: u64, unit: ExpireUnit },
}

impl FromStr for Expire {
    type Err = UpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| UpError::InvalidExpire {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let value = s.trim();
        if value.eq_ignore_ascii_case("asap") {
            return Ok(Expire::Asap);
        }

        let Some(last) = value.chars().last() else {
            return Err(invalid("empty value"));
        };
        let unit = match last.to_ascii_lowercase() {
            'd' => ExpireUnit::Days,
            'h' => ExpireUnit::Hours,
            'm' => ExpireUnit::Minutes,
            _ => return Err(invalid("expected asap or a duration ending in d, h or m")),
        };

        let digits = &value[..value.len() - last.len_utf8()];
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("duration must start with a number"));
        }
        let amount: u64 = digits
            .parse()
            .map_err(|_| invalid("duration out of range"))?;
        if amount == 0 {
            return Err(invalid("duration must be greater than zero"));
        }

        Ok(Expire::After { amount, unit })
    }
}

impl fmt::Display for Expire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expire::Asap => f.write_str("asap"),
            Expire::After { amount, unit } => write!(f, "{}{}", amount, unit.suffix()),
        }
    }
}

/// Turn a raw expire setting into the form value. An empty setting is
/// passed through so the server applies its default.
pub fn form_value(raw: &str) -> Result<String, UpError> {
    if raw.trim().is_empty() {
        return Ok(String::new());
    }
    Ok(raw.parse::<Expire>()?.to_string())
}
