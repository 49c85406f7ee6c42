//! Value codec between PLC symbols and robot I/O signals.
//!
//! The width tag declared per directive selects the representation on the
//! PLC side:
//!
//! | Width | PLC type | Signal write            |
//! |-------|----------|-------------------------|
//! | 1     | `BOOL`   | 0 / 1, change-suppressed|
//! | 8     | `BYTE`   | level, always written   |
//! | 16    | `WORD`   | level, always written   |
//! | 32    | `DWORD`  | level, always written   |
//! | other | `LREAL`  | level, always written   |
//!
//! Signals always carry an `f64`. Narrowing from a signal level to an integer
//! width truncates toward zero and then wraps modulo 2^N.

use std::fmt;
use thiserror::Error;

/// Declared transfer width of a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    /// `[1]`, boolean.
    Bit,
    /// `[8]`, unsigned 8-bit.
    Byte,
    /// `[16]`, unsigned 16-bit.
    Word,
    /// `[32]`, unsigned 32-bit.
    DWord,
    /// Any other digit run: floating value, no integer clamp.
    /// Keeps the declared number for display.
    Real(u32),
}

impl Width {
    /// Map a declared bit count to its width tag.
    pub fn from_bits(bits: u32) -> Self {
        match bits {
            1 => Self::Bit,
            8 => Self::Byte,
            16 => Self::Word,
            32 => Self::DWord,
            other => Self::Real(other),
        }
    }

    /// The bit count as written in the mapping file.
    pub fn bits(self) -> u32 {
        match self {
            Self::Bit => 1,
            Self::Byte => 8,
            Self::Word => 16,
            Self::DWord => 32,
            Self::Real(bits) => bits,
        }
    }

    /// True for the boolean width.
    #[inline]
    pub fn is_bool(self) -> bool {
        matches!(self, Self::Bit)
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// A value as read from or written to the PLC symbol table.
#[derive(Debug, Clone, PartialEq)]
pub enum PlcValue {
    Bool(bool),
    Byte(u8),
    Word(u16),
    DWord(u32),
    /// Signed integer symbols (`INT`, `DINT`, `LINT`) widened to 64 bit.
    Int(i64),
    Real(f64),
    /// `STRING` symbols. Only coercible when the text is a boolean or number.
    Text(String),
}

/// Coercion failure for a single value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// Value has no boolean interpretation.
    #[error("value {0:?} is not convertible to a boolean")]
    NotBoolean(String),

    /// Value has no numeric interpretation.
    #[error("value {0:?} is not convertible to a number")]
    NotNumeric(String),
}

impl PlcValue {
    /// Truthy test used for width-1 directives.
    ///
    /// Numbers are true when non-zero (NaN is false). Text accepts
    /// `true`/`false` in any case or a number.
    pub fn is_truthy(&self) -> Result<bool, CodecError> {
        match self {
            Self::Bool(b) => Ok(*b),
            Self::Byte(v) => Ok(*v != 0),
            Self::Word(v) => Ok(*v != 0),
            Self::DWord(v) => Ok(*v != 0),
            Self::Int(v) => Ok(*v != 0),
            Self::Real(v) => Ok(*v != 0.0 && !v.is_nan()),
            Self::Text(s) => {
                let t = s.trim();
                if t.eq_ignore_ascii_case("true") {
                    Ok(true)
                } else if t.eq_ignore_ascii_case("false") {
                    Ok(false)
                } else {
                    t.parse::<f64>()
                        .map(|v| v != 0.0 && !v.is_nan())
                        .map_err(|_| CodecError::NotBoolean(s.clone()))
                }
            }
        }
    }

    /// Numeric view used for non-boolean widths.
    pub fn as_f64(&self) -> Result<f64, CodecError> {
        match self {
            Self::Bool(b) => Ok(bool_level(*b)),
            Self::Byte(v) => Ok(f64::from(*v)),
            Self::Word(v) => Ok(f64::from(*v)),
            Self::DWord(v) => Ok(f64::from(*v)),
            Self::Int(v) => Ok(*v as f64),
            Self::Real(v) => Ok(*v),
            Self::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| CodecError::NotNumeric(s.clone())),
        }
    }
}

impl fmt::Display for PlcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => f.write_str(format_bool(*b)),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Word(v) => write!(f, "{v}"),
            Self::DWord(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Real(v) => f.write_str(&format_real(*v)),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// What to apply to a robot signal for a source-to-target transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalCommand {
    /// Digital state. Written only when it differs from the current state.
    Switch(bool),
    /// Group or analog level. Always written.
    Level(f64),
}

impl SignalCommand {
    /// Dashboard rendering of the command.
    pub fn display(&self) -> String {
        match self {
            Self::Switch(b) => format_bool(*b).to_string(),
            Self::Level(v) => format_real(*v),
        }
    }
}

/// Convert a PLC value into the command for a signal of the given width.
pub fn to_signal(value: &PlcValue, width: Width) -> Result<SignalCommand, CodecError> {
    if width.is_bool() {
        value.is_truthy().map(SignalCommand::Switch)
    } else {
        value.as_f64().map(SignalCommand::Level)
    }
}

/// Convert a raw signal level into the PLC value for the given width.
pub fn from_signal(raw: f64, width: Width) -> PlcValue {
    match width {
        Width::Bit => PlcValue::Bool(signal_is_set(raw)),
        Width::Byte => PlcValue::Byte(narrow_u8(raw)),
        Width::Word => PlcValue::Word(narrow_u16(raw)),
        Width::DWord => PlcValue::DWord(narrow_u32(raw)),
        Width::Real(_) => PlcValue::Real(raw),
    }
}

/// A digital signal reads as set only at exactly `1`.
#[inline]
pub fn signal_is_set(raw: f64) -> bool {
    raw == 1.0
}

/// Signal level for a boolean state.
#[inline]
pub fn bool_level(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

/// Truncate toward zero, then wrap modulo 2^8.
#[inline]
pub fn narrow_u8(v: f64) -> u8 {
    truncate_i64(v) as u8
}

/// Truncate toward zero, then wrap modulo 2^16.
#[inline]
pub fn narrow_u16(v: f64) -> u16 {
    truncate_i64(v) as u16
}

/// Truncate toward zero, then wrap modulo 2^32.
#[inline]
pub fn narrow_u32(v: f64) -> u32 {
    truncate_i64(v) as u32
}

// `as` saturates out-of-range floats and maps NaN to 0.
#[inline]
fn truncate_i64(v: f64) -> i64 {
    v.trunc() as i64
}

/// `TRUE` / `FALSE`.
#[inline]
pub fn format_bool(b: bool) -> &'static str {
    if b { "TRUE" } else { "FALSE" }
}

/// Render a real with at most two fractional digits (`12.346` → `12.35`,
/// `12.50` → `12.5`, `12.0` → `12`).
pub fn format_real(v: f64) -> String {
    if !v.is_finite() {
        return v.to_string();
    }
    let mut s = format!("{v:.2}");
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed);
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}
