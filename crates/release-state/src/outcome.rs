//! Tri-state outcome of a store or service operation.
//!
//! An [`Outcome`] is exactly one of:
//! - `Present(value)`: the operation produced a value
//! - `Empty`: the thing asked for legitimately does not exist
//! - `Error`: the operation failed (already logged where it was detected)
//!
//! Consumers propagate `Error` unchanged. `Empty` may be reinterpreted by the
//! caller (a missing release and a missing annotation mean different things)
//! but is never turned into `Present`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Outcome<T> {
    Present(T),
    Empty,
    Error,
}

impl<T> Outcome<T> {
    pub fn present(value: T) -> Self {
        Outcome::Present(value)
    }

    pub fn empty() -> Self {
        Outcome::Empty
    }

    pub fn error() -> Self {
        Outcome::Error
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Outcome::Present(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Outcome::Empty)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error)
    }

    /// Returns the contained value.
    ///
    /// # Panics
    ///
    /// Panics if the outcome is `Empty` or `Error`. Calling this without
    /// checking [`Outcome::is_present`] first is a programming error.
    #[track_caller]
    pub fn unwrap(self) -> T {
        match self {
            Outcome::Present(value) => value,
            Outcome::Empty => panic!("called `Outcome::unwrap()` on an `Empty` value"),
            Outcome::Error => panic!("called `Outcome::unwrap()` on an `Error` value"),
        }
    }

    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Outcome::Present(value) => Outcome::Present(f(value)),
            Outcome::Empty => Outcome::Empty,
            Outcome::Error => Outcome::Error,
        }
    }

    pub fn and_then<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> Outcome<U>,
    {
        match self {
            Outcome::Present(value) => f(value),
            Outcome::Empty => Outcome::Empty,
            Outcome::Error => Outcome::Error,
        }
    }

    /// Re-types a non-present outcome, keeping `Empty` and `Error` apart.
    ///
    /// Returns `Ok(value)` when present so callers can continue with it.
    pub fn into_present<U>(self) -> Result<T, Outcome<U>> {
        match self {
            Outcome::Present(value) => Ok(value),
            Outcome::Empty => Err(Outcome::Empty),
            Outcome::Error => Err(Outcome::Error),
        }
    }
}

impl<T> Outcome<Vec<T>> {
    /// `Present` for a non-empty collection, `Empty` otherwise.
    pub fn from_collection(items: Vec<T>) -> Self {
        if items.is_empty() {
            Outcome::Empty
        } else {
            Outcome::Present(items)
        }
    }
}

impl<T> From<Option<T>> for Outcome<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Outcome::Present(value),
            None => Outcome::Empty,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Present(value) => write!(f, "Outcome[{}]", value),
            Outcome::Empty => write!(f, "Outcome.empty"),
            Outcome::Error => write!(f, "Outcome.error"),
        }
    }
}
