use std::fmt;

/// Money is represented as integer micro-units to avoid floating-point
/// precision issues. 1 unit = 1_000_000 micros, so 50.000000 = 50_000_000.
pub type Micros = i64;

/// Number of fractional digits carried by every amount.
pub const SCALE: u32 = 6;

const MICROS_PER_UNIT: i64 = 1_000_000;

/// Format micros as a decimal string with six fractional digits.
/// Example: 50_000_000 -> "50.000000", -1_234_567 -> "-1.234567"
pub fn format_micros(micros: Micros) -> String {
    let sign = if micros < 0 { "-" } else { "" };
    let abs = micros.abs();
    let units = abs / MICROS_PER_UNIT;
    let remainder = abs % MICROS_PER_UNIT;
    format!("{}{}.{:06}", sign, units, remainder)
}

/// Parse a decimal string into micros.
/// Example: "50" -> 50_000_000, "12.5" -> 12_500_000, "0.000001" -> 1
pub fn parse_micros(input: &str) -> Result<Micros, ParseMicrosError> {
    let input = input.trim();
    let negative = input.starts_with('-');
    let input = input.trim_start_matches('-');

    let parts: Vec<&str> = input.split('.').collect();
    match parts.len() {
        1 => {
            // No decimal point, treat as whole units
            let units: i64 = parts[0]
                .parse()
                .map_err(|_| ParseMicrosError::InvalidFormat)?;
            let micros = units
                .checked_mul(MICROS_PER_UNIT)
                .ok_or(ParseMicrosError::Overflow)?;
            Ok(if negative { -micros } else { micros })
        }
        2 => {
            let units: i64 = if parts[0].is_empty() {
                0
            } else {
                parts[0]
                    .parse()
                    .map_err(|_| ParseMicrosError::InvalidFormat)?
            };

            // Pad or truncate the fractional part to 6 digits
            let decimal_str = parts[1];
            let fraction: i64 = if decimal_str.is_empty() {
                0
            } else if decimal_str.len() <= SCALE as usize {
                let parsed: i64 = decimal_str
                    .parse()
                    .map_err(|_| ParseMicrosError::InvalidFormat)?;
                parsed * 10_i64.pow(SCALE - decimal_str.len() as u32)
            } else {
                // More than 6 fractional digits - truncate
                decimal_str[..SCALE as usize]
                    .parse()
                    .map_err(|_| ParseMicrosError::InvalidFormat)?
            };

            let micros = units
                .checked_mul(MICROS_PER_UNIT)
                .and_then(|m| m.checked_add(fraction))
                .ok_or(ParseMicrosError::Overflow)?;
            Ok(if negative { -micros } else { micros })
        }
        _ => Err(ParseMicrosError::InvalidFormat),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseMicrosError {
    InvalidFormat,
    Overflow,
}

impl fmt::Display for ParseMicrosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseMicrosError::InvalidFormat => write!(f, "invalid money format"),
            ParseMicrosError::Overflow => write!(f, "amount out of range"),
        }
    }
}

impl std::error::Error for ParseMicrosError {}
