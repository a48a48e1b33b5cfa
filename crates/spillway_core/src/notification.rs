//! The unit stored in every queue: one upstream event.

use crate::error::SpillError;

/// One event emitted by a producer.
///
/// Values and terminal signals travel through the same queue so that their
/// relative order is enforced by the queue itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification<T> {
    /// A data item.
    Value(T),
    /// The producer failed.
    Error(SpillError),
    /// The producer finished normally.
    Complete,
}

/// Discriminant of a [`Notification`], as stored in a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NotificationKind {
    /// [`Notification::Value`].
    Value = 1,
    /// [`Notification::Error`].
    Error = 2,
    /// [`Notification::Complete`].
    Complete = 3,
}

impl NotificationKind {
    /// Converts a byte to a notification kind.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Value),
            2 => Some(Self::Error),
            3 => Some(Self::Complete),
            _ => None,
        }
    }

    /// Converts the kind to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

impl<T> Notification<T> {
    /// Returns the discriminant.
    #[must_use]
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::Value(_) => NotificationKind::Value,
            Self::Error(_) => NotificationKind::Error,
            Self::Complete => NotificationKind::Complete,
        }
    }

    /// Returns `true` for `Error` and `Complete`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Value(_))
    }

    /// Returns the value, if this is a `Value`.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}
