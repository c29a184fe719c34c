//! One-shot position lookup
//!
//! [`GeolocationDevice`] is the platform seam. [`Geolocator`] keeps the last
//! known coordinates together with the grant and error reported by the
//! device.

use serde::Serialize;
use super::{CapabilityError, CapabilityResult, Permission};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// Failure codes a location service reports for a position request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionErrorCode {
    PermissionDenied = 1,
    PositionUnavailable = 2,
    Timeout = 3,
}

impl From<PositionErrorCode> for CapabilityError {
    fn from(code: PositionErrorCode) -> Self {
        match code {
            PositionErrorCode::PermissionDenied => {
                CapabilityError::PermissionDenied("location access was refused".to_string())
            }
            PositionErrorCode::PositionUnavailable => {
                CapabilityError::Unavailable("location information is unavailable".to_string())
            }
            PositionErrorCode::Timeout => CapabilityError::Timeout(
                "the request to get user location timed out".to_string(),
            ),
        }
    }
}

pub trait GeolocationDevice: Send {
    /// False when the platform has no location service at all
    fn is_supported(&self) -> bool;

    fn permission(&mut self) -> Permission;

    /// Resolve the current position, prompting for access if needed
    fn current_position(&mut self) -> Result<Position, PositionErrorCode>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeolocationState {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub error: Option<String>,
    pub granted: bool,
}

pub struct Geolocator<D: GeolocationDevice> {
    device: D,
    state: GeolocationState,
}

impl<D: GeolocationDevice> Geolocator<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            state: GeolocationState::default(),
        }
    }

    pub fn state(&self) -> &GeolocationState {
        &self.state
    }

    /// Ask the device for the current position.
    ///
    /// Failures clear `granted` and land in `error`; the last known
    /// coordinates are kept.
    pub fn locate(&mut self) -> CapabilityResult<Position> {
        if !self.device.is_supported() {
            return self.fail(CapabilityError::Unsupported("Geolocation".to_string()));
        }
        if self.device.permission() == Permission::Denied {
            return self.fail(PositionErrorCode::PermissionDenied.into());
        }

        match self.device.current_position() {
            Ok(position) => {
                self.state.latitude = Some(position.latitude);
                self.state.longitude = Some(position.longitude);
                self.state.granted = true;
                self.state.error = None;
                tracing::debug!("located at {}, {}", position.latitude, position.longitude);
                Ok(position)
            }
            Err(code) => self.fail(code.into()),
        }
    }

    fn fail(&mut self, err: CapabilityError) -> CapabilityResult<Position> {
        tracing::warn!("geolocation failed: {}", err);
        self.state.granted = false;
        self.state.error = Some(err.to_string());
        Err(err)
    }
}
