//! Capabilities whose output ends up in collections
//!
//! - [`LocalDirectory`]: pick a directory and manage named entries in it
//! - [`Recorder`]: drive a [`MediaDevice`] and store photos and recordings in
//!   the `files` collection
//! - [`Geolocator`]: one-shot position lookups with grant and error state
//! - [`Notifier`]: permission-gated notifications

pub mod capture;
pub mod directory;
pub mod geolocation;
pub mod notification;

pub use capture::{CaptureState, DeviceKind, MediaDevice, Recorder, Track};
pub use directory::{EntryKind, LocalDirectory, ListedEntry};
pub use geolocation::{GeolocationDevice, GeolocationState, Geolocator, Position, PositionErrorCode};
pub use notification::{NotificationCenter, NotificationState, Notifier};

/// Permission as reported by the platform before or after a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Prompt,
    Denied,
}

/// Failures reported by capabilities.
///
/// These are surfaced to callers as state, never as a crash: a missing
/// capability disables the action, a denied permission clears `granted`.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("{0} is not supported on this platform")]
    Unsupported(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Invalid entry name: {0:?}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::Error),
}

impl CapabilityError {
    /// True when the user declined the grant
    pub fn is_denied(&self) -> bool {
        matches!(self, CapabilityError::PermissionDenied(_))
    }
}

pub type CapabilityResult<T> = std::result::Result<T, CapabilityError>;
