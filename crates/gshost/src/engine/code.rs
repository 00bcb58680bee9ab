//! Return-code partitioning for engine calls.
//!
//! Every `gsapi_*` call returns a signed integer. The literal values matter
//! only at the FFI boundary; control flow in this crate branches exclusively
//! on the [`Outcome`] category a value falls into.

use std::fmt;

const E_INTERRUPT: i32 = -6;
const E_FATAL: i32 = -100;
const E_QUIT: i32 = -101;
const E_NEED_INPUT: i32 = -106;
const E_INFO: i32 = -110;

/// The documented PostScript-level error codes.
///
/// Values follow upstream's `ierrors.h`. Upstream's own headers disagree
/// about -28/-29: `gserrors.h` calls -28 "unregistered" (and defines no -29)
/// while `ierrors.h` calls -28 "undefined resource" and -29 "unregistered".
/// `ierrors.h` is the interpreter-level table and matches what the API
/// returns, so it is followed here; nothing in this crate branches on the
/// distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Unknown = -1,
    /// The polling callback returned negative and the operation aborted.
    Interrupt = -6,
    InvalidAccess = -7,
    InvalidFileAccess = -9,
    InvalidFont = -10,
    IoError = -12,
    LimitCheck = -13,
    NoCurrentPoint = -14,
    RangeCheck = -15,
    TypeCheck = -20,
    Undefined = -21,
    UndefinedFilename = -22,
    UndefinedResult = -23,
    VmError = -25,
    ConfigurationError = -26,
    InvalidContext = -27,
    UndefinedResource = -28,
    Unregistered = -29,
    /// invalidid (DPS extension) or the last level-2 code.
    LastOrInvalidId = -30,
    HitDetected = -99,
}

impl ErrorCode {
    /// Codes outside the documented table report as [`ErrorCode::Unknown`].
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            -6 => Self::Interrupt,
            -7 => Self::InvalidAccess,
            -9 => Self::InvalidFileAccess,
            -10 => Self::InvalidFont,
            -12 => Self::IoError,
            -13 => Self::LimitCheck,
            -14 => Self::NoCurrentPoint,
            -15 => Self::RangeCheck,
            -20 => Self::TypeCheck,
            -21 => Self::Undefined,
            -22 => Self::UndefinedFilename,
            -23 => Self::UndefinedResult,
            -25 => Self::VmError,
            -26 => Self::ConfigurationError,
            -27 => Self::InvalidContext,
            -28 => Self::UndefinedResource,
            -29 => Self::Unregistered,
            -30 => Self::LastOrInvalidId,
            -99 => Self::HitDetected,
            _ => Self::Unknown,
        }
    }
}

/// Categorized result of one engine call.
///
/// The partition drives all control flow: non-zero is not a synonym for
/// failure. `Quit`, `Info`, `NeedInput` and `Interrupted` are expected
/// control states; `Error` codes leave the instance usable; `Fatal` codes
/// force teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Success.
    Done,
    /// The `quit` operator ran. Not an error; `exit` must be called next.
    Quit,
    /// Usage info was displayed (`gs -h`). Not an error; `exit` must be
    /// called next.
    Info,
    /// `run_string_continue` wants more input. The steady state of an open
    /// session.
    NeedInput,
    /// The poll callback requested cancellation and the engine honored it.
    Interrupted,
    /// A recoverable interpreter error; the instance stays usable for
    /// further calls and for cleanup.
    Error(ErrorCode),
    /// Anything at or beyond the fatal threshold (other than the named soft
    /// signals). Only `exit` and deletion are legal afterwards.
    Fatal(i32),
}

impl Outcome {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0.. => Self::Done,
            E_QUIT => Self::Quit,
            E_INFO => Self::Info,
            E_NEED_INPUT => Self::NeedInput,
            E_INTERRUPT => Self::Interrupted,
            raw if raw <= E_FATAL => Self::Fatal(raw),
            raw => Self::Error(ErrorCode::from_raw(raw)),
        }
    }

    /// The wire value this outcome corresponds to. `Done` reports 0 even
    /// when the engine returned a larger non-negative value.
    pub fn raw(&self) -> i32 {
        match self {
            Self::Done => 0,
            Self::Quit => E_QUIT,
            Self::Info => E_INFO,
            Self::NeedInput => E_NEED_INPUT,
            Self::Interrupted => E_INTERRUPT,
            Self::Error(code) => *code as i32,
            Self::Fatal(raw) => *raw,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// True when the engine requires `exit` as the next lifecycle call.
    pub fn needs_exit(&self) -> bool {
        matches!(self, Self::Quit | Self::Info | Self::Fatal(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => write!(f, "success"),
            Self::Quit => write!(f, "quit requested"),
            Self::Info => write!(f, "usage info displayed"),
            Self::NeedInput => write!(f, "need more input"),
            Self::Interrupted => write!(f, "interrupted by poll"),
            Self::Error(code) => write!(f, "error {:?} ({})", code, *code as i32),
            Self::Fatal(raw) => write!(f, "fatal error ({raw})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_soft_signals() {
        assert_eq!(Outcome::from_raw(-101), Outcome::Quit);
        assert_eq!(Outcome::from_raw(-110), Outcome::Info);
        assert_eq!(Outcome::from_raw(-106), Outcome::NeedInput);
        assert_eq!(Outcome::from_raw(-6), Outcome::Interrupted);
        assert!(!Outcome::from_raw(-106).is_fatal());
        assert!(Outcome::from_raw(-101).needs_exit());
        assert!(Outcome::from_raw(-110).needs_exit());
        assert!(!Outcome::from_raw(-106).needs_exit());
    }

    #[test]
    fn partitions_fatal_band() {
        assert_eq!(Outcome::from_raw(-100), Outcome::Fatal(-100));
        assert_eq!(Outcome::from_raw(-102), Outcome::Fatal(-102));
        assert_eq!(Outcome::from_raw(-250), Outcome::Fatal(-250));
        assert!(Outcome::from_raw(-100).needs_exit());
    }

    #[test]
    fn partitions_recoverable_errors() {
        assert_eq!(
            Outcome::from_raw(-15),
            Outcome::Error(ErrorCode::RangeCheck)
        );
        assert_eq!(Outcome::from_raw(-21), Outcome::Error(ErrorCode::Undefined));
        // Undocumented codes stay in the recoverable band as Unknown.
        assert_eq!(Outcome::from_raw(-2), Outcome::Error(ErrorCode::Unknown));
        assert!(!Outcome::from_raw(-15).needs_exit());
    }

    #[test]
    fn non_negative_is_success() {
        assert_eq!(Outcome::from_raw(0), Outcome::Done);
        assert_eq!(Outcome::from_raw(1), Outcome::Done);
        assert!(Outcome::from_raw(0).is_success());
    }

    #[test]
    fn raw_round_trips_named_codes() {
        for raw in [0, -6, -15, -99, -100, -101, -106, -110, -200] {
            assert_eq!(Outcome::from_raw(raw).raw(), raw);
        }
    }
}
