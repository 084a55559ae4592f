//! Error types shared by the bus layers
//!
//! Failures come in two flavours. Hard errors ([`Error`]) abort the operation
//! in flight. Soft failures ([`Warning`]) are recorded and the operation
//! carries on, which is what happens to quirk handling during release and to
//! user callbacks during a scan.

use heapless::Vec;

use crate::rom::Rom;

/// Maximum number of warnings kept by a single [`Report`]
pub const MAX_WARNINGS: usize = 8;

/// Hard error, generic over the transport error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error<E> {
    /// Reset found no presence pulse
    NoPresence,
    /// Transport level read/write failure
    Bus(E),
    /// Identifier read with READ ROM failed its CRC-8
    ChecksumMismatch,
    /// Operation requires an acquired session
    NotAcquired,
    /// Session was acquired twice without release
    AlreadyAcquired,
}

/// Discriminant of [`Error`] without the transport payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// See [`Error::NoPresence`]
    NoPresence,
    /// See [`Error::Bus`]
    Bus,
    /// See [`Error::ChecksumMismatch`]
    ChecksumMismatch,
    /// See [`Error::NotAcquired`]
    NotAcquired,
    /// See [`Error::AlreadyAcquired`]
    AlreadyAcquired,
}

impl<E> Error<E> {
    /// Error kind, suitable for logging
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoPresence => ErrorKind::NoPresence,
            Error::Bus(_) => ErrorKind::Bus,
            Error::ChecksumMismatch => ErrorKind::ChecksumMismatch,
            Error::NotAcquired => ErrorKind::NotAcquired,
            Error::AlreadyAcquired => ErrorKind::AlreadyAcquired,
        }
    }
}

/// Failure that was swallowed so the surrounding operation could finish
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning<E> {
    /// Explicit sleep request to the quirk family failed during release
    Quiescence(Error<E>),
    /// User callback rejected a discovered identifier
    ///
    /// The callback's own error value stays with the caller, only the
    /// rejected identifier is recorded here.
    Callback(Rom),
    /// Scan record was full, identifier found but not passed to the callback
    RecordFull(Rom),
}

/// Outcome of an operation that can partially fail
///
/// `value` is always meaningful: on a failed scan it holds the number of
/// identifiers discovered before the failure. At most [`MAX_WARNINGS`]
/// warnings are kept, later ones are only counted in `dropped_warnings`.
#[derive(Debug)]
#[must_use]
pub struct Report<T, E> {
    /// Value produced by the operation
    pub value: T,
    /// Swallowed failures, oldest first
    pub warnings: Vec<Warning<E>, MAX_WARNINGS>,
    /// Swallowed failures that did not fit into `warnings`
    pub dropped_warnings: usize,
    /// First hard error, if any
    pub fatal: Option<Error<E>>,
}

impl<T, E> Report<T, E> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
            dropped_warnings: 0,
            fatal: None,
        }
    }

    /// Record a swallowed failure, only counting it when the list is full
    pub(crate) fn warn(&mut self, warning: Warning<E>) {
        if self.warnings.push(warning).is_err() {
            self.dropped_warnings += 1;
        }
    }

    /// Total number of swallowed failures, kept or dropped
    pub fn warning_count(&self) -> usize {
        self.warnings.len() + self.dropped_warnings
    }

    /// Record a hard error unless an earlier one is already stored
    pub(crate) fn fail(&mut self, error: Error<E>) {
        if self.fatal.is_none() {
            self.fatal = Some(error);
        }
    }

    /// True when no hard error occurred
    pub fn is_ok(&self) -> bool {
        self.fatal.is_none()
    }

    /// Discard warnings and keep the hard outcome
    pub fn into_result(self) -> Result<T, Error<E>> {
        match self.fatal {
            Some(error) => Err(error),
            None => Ok(self.value),
        }
    }
}
