use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

use tracing::debug;

use crate::errors::{ClientError, ClientResult};

/// Tracks actions that have been triggered but not yet settled.
///
/// A second trigger of the same action key while the first is pending is
/// rejected with [`ClientError::Busy`] instead of being sent twice.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    pending: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    /// Claim `action` until the returned guard is dropped.
    ///
    /// # Errors
    /// Returns [`ClientError::Busy`] if the action is already pending.
    pub fn begin(&self, action: impl Into<String>) -> ClientResult<InFlightGuard> {
        let action = action.into();
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if !pending.insert(action.clone()) {
            debug!(%action, "rejecting re-entrant trigger");
            return Err(ClientError::Busy { action });
        }
        Ok(InFlightGuard {
            pending: Arc::clone(&self.pending),
            action,
        })
    }

    #[must_use]
    pub fn is_pending(&self, action: &str) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(action)
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    pending: Arc<Mutex<HashSet<String>>>,
    action: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_trigger_is_busy_until_first_settles() {
        let in_flight = InFlight::default();
        let guard = in_flight.begin("return-loan:7").unwrap();
        assert!(matches!(
            in_flight.begin("return-loan:7"),
            Err(ClientError::Busy { .. })
        ));
        assert!(in_flight.begin("return-loan:8").is_ok());
        drop(guard);
        assert!(!in_flight.is_pending("return-loan:7"));
        assert!(in_flight.begin("return-loan:7").is_ok());
    }
}
