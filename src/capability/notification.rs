//! Desktop notifications
//!
//! [`Notifier`] remembers whether notifications are supported and granted,
//! and refuses to show anything until they are.

use serde::Serialize;
use super::{CapabilityError, CapabilityResult, Permission};

pub trait NotificationCenter: Send {
    fn is_supported(&self) -> bool;

    fn permission(&self) -> Permission;

    /// Prompt the user and return the resulting permission
    fn request_permission(&mut self) -> CapabilityResult<Permission>;

    fn show(&mut self, title: &str, body: Option<&str>) -> CapabilityResult<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationState {
    pub supported: bool,
    pub granted: bool,
    pub error: Option<String>,
}

pub struct Notifier<C: NotificationCenter> {
    center: C,
    state: NotificationState,
}

impl<C: NotificationCenter> Notifier<C> {
    pub fn new(center: C) -> Self {
        let supported = center.is_supported();
        let granted = supported && center.permission() == Permission::Granted;
        Self {
            center,
            state: NotificationState {
                supported,
                granted,
                error: None,
            },
        }
    }

    pub fn state(&self) -> &NotificationState {
        &self.state
    }

    pub fn request_permission(&mut self) -> CapabilityResult<Permission> {
        if !self.state.supported {
            return Err(self.fail(CapabilityError::Unsupported("Notifications".to_string())));
        }
        match self.center.request_permission() {
            Ok(permission) => {
                self.state.granted = permission == Permission::Granted;
                self.state.error = None;
                Ok(permission)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    pub fn show(&mut self, title: &str, body: Option<&str>) -> CapabilityResult<()> {
        if !self.state.supported {
            return Err(self.fail(CapabilityError::Unsupported("Notifications".to_string())));
        }
        if !self.state.granted {
            return Err(self.fail(CapabilityError::PermissionDenied(
                "notification permission not granted".to_string(),
            )));
        }
        match self.center.show(title, body) {
            Ok(()) => {
                self.state.error = None;
                tracing::debug!("notification shown: {}", title);
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn fail(&mut self, err: CapabilityError) -> CapabilityError {
        tracing::warn!("notification failed: {}", err);
        self.state.error = Some(err.to_string());
        err
    }
}
