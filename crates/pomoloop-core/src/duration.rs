//! Phase duration strings.
//!
//! The grammar is one or more `<int><unit>` components where the unit is
//! `h`, `m` or `s`. Components are summed, so `1h30m`, `90m` and `5400s`
//! all describe the same phase.

use std::time::Duration;

use crate::error::DurationError;

/// Parse a duration string into whole seconds.
///
/// # Errors
/// Returns [`DurationError`] when the string is empty, contains anything but
/// `<int>h|m|s` components, or overflows `u64` seconds.
pub fn parse_secs(input: &str) -> Result<u64, DurationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DurationError::Empty);
    }

    let invalid = || DurationError::Invalid {
        input: input.to_string(),
    };
    let overflow = || DurationError::Overflow {
        input: input.to_string(),
    };

    let mut total: u64 = 0;
    let mut digits = String::new();
    for ch in trimmed.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let unit = match ch {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(invalid()),
        };
        if digits.is_empty() {
            return Err(invalid());
        }
        let value: u64 = digits.parse().map_err(|_| overflow())?;
        let secs = value.checked_mul(unit).ok_or_else(overflow)?;
        total = total.checked_add(secs).ok_or_else(overflow)?;
        digits.clear();
    }

    // Trailing digits without a unit ("25") are rejected.
    if !digits.is_empty() {
        return Err(invalid());
    }
    Ok(total)
}

/// Parse a duration string into a [`Duration`].
///
/// # Errors
/// See [`parse_secs`].
pub fn parse(input: &str) -> Result<Duration, DurationError> {
    parse_secs(input).map(Duration::from_secs)
}

/// Render seconds as `MM:SS`, or `H:MM:SS` once an hour or more remains.
pub fn format_clock(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Render seconds for reports: `1h 05m`, `12m`, `40s`.
pub fn format_human(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{secs}s")
    }
}
