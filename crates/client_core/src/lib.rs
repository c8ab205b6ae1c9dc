use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::geo::GeoPoint;

pub mod cart;
pub mod map;
pub mod observable;
pub mod session;

pub use cart::{CartStore, CART_KEY};
pub use map::{MapPicker, MapPickerState};
pub use observable::{Observable, Subscription};
pub use session::{SessionError, SessionStore, UserEndpoints, USER_KEY};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Success { title: String, message: String },
    Failure { title: String, message: String },
}

impl Notification {
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Success {
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn failure(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failure {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Fire-and-forget user-facing messages.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// The environment hosting the stores. `reload` discards every piece of
/// in-memory state that may still reference the previous session.
pub trait HostEnvironment: Send + Sync {
    fn reload(&self);
}

/// Records reload requests so the composition root can rebuild its stores.
#[derive(Default)]
pub struct ReloadSignal {
    requested: AtomicBool,
}

impl ReloadSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether a reload was requested since the last call.
    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }
}

impl HostEnvironment for ReloadSignal {
    fn reload(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_location(&self) -> Result<GeoPoint>;
}

/// Reports a fixed position, e.g. one taken from configuration.
pub struct StaticLocation(pub GeoPoint);

#[async_trait]
impl LocationProvider for StaticLocation {
    async fn current_location(&self) -> Result<GeoPoint> {
        Ok(self.0)
    }
}

pub struct UnavailableLocation;

#[async_trait]
impl LocationProvider for UnavailableLocation {
    async fn current_location(&self) -> Result<GeoPoint> {
        Err(anyhow!("location provider is unavailable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_signal_is_consumed_once() {
        let signal = ReloadSignal::new();
        assert!(!signal.take());
        signal.reload();
        assert!(signal.take());
        assert!(!signal.take());
    }

    #[tokio::test]
    async fn unavailable_location_errors() {
        assert!(UnavailableLocation.current_location().await.is_err());
        let point = StaticLocation(GeoPoint::new(1.0, 2.0))
            .current_location()
            .await
            .expect("static location");
        assert_eq!(point, GeoPoint::new(1.0, 2.0));
    }
}
