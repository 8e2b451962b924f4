// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Failure classification.
//!
//! Each module owns a typed error enum. Controllers only need to know which
//! broad class a failure belongs to, so every error type implements
//! [`Classify`].

use std::fmt;

/// Broad class of a failure as seen by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A path escaped its sandbox root. Never retried.
    SecurityViolation,
    /// The requested resource does not exist.
    NotFound,
    /// The caller supplied malformed input (bad XML, unknown filter, ...).
    InvalidInput,
    /// The resource already exists.
    Conflict,
    /// An unexpected I/O or internal failure.
    Io,
}

impl ErrorKind {
    /// Stable identifier used in tool responses.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SecurityViolation => "SECURITY_VIOLATION",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidInput => "INVALID_INPUT",
            Self::Conflict => "CONFLICT",
            Self::Io => "IO_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that know their [`ErrorKind`].
pub trait Classify {
    /// Returns the class of this error.
    fn kind(&self) -> ErrorKind;
}
