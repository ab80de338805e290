//! Page-level view state shared by every controller: the page mode machine,
//! auto-dismissing banners, delete confirmations and the mount scope.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::{
    errors::{ClientError, ClientResult},
    models::Id,
};

/// What a page is currently showing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageMode {
    #[default]
    List,
    /// Create form when `editing` is `None`, edit form otherwise.
    Form { editing: Option<Id> },
    Detail(Id),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    OpenCreate,
    OpenEdit(Id),
    OpenDetail(Id),
    Saved,
    Cancel,
    Back,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot handle {event:?} while showing {mode:?}")]
pub struct IllegalTransition {
    pub mode: PageMode,
    pub event: PageEvent,
}

impl PageMode {
    /// Next mode after `event`, per the page transition table.
    ///
    /// # Errors
    /// Returns [`IllegalTransition`] for events the current mode does not accept.
    pub fn apply(&self, event: PageEvent) -> Result<PageMode, IllegalTransition> {
        use PageEvent as E;
        use PageMode as M;

        let next = match (self, event) {
            (M::List | M::Detail(_), E::OpenCreate) => M::Form { editing: None },
            (M::List | M::Detail(_), E::OpenEdit(id)) => M::Form { editing: Some(id) },
            (M::List | M::Detail(_), E::OpenDetail(id)) => M::Detail(id),
            (M::Form { .. }, E::Saved | E::Cancel) | (M::Detail(_), E::Back) => M::List,
            (mode, event) => {
                return Err(IllegalTransition {
                    mode: mode.clone(),
                    event,
                })
            }
        };
        Ok(next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub kind: BannerKind,
    pub text: String,
}

#[derive(Debug, Default)]
struct Slot {
    banner: Option<Banner>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

/// Success and error messages that clear themselves after a fixed time.
///
/// Each kind holds at most one message. Showing a new one, or dismissing,
/// cancels the pending timer of the old one.
#[derive(Debug, Clone)]
pub struct Banners {
    ttl: Duration,
    slots: Arc<Mutex<[Slot; 2]>>,
}

impl Banners {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Arc::default(),
        }
    }

    fn index(kind: BannerKind) -> usize {
        match kind {
            BannerKind::Success => 0,
            BannerKind::Error => 1,
        }
    }

    pub fn success(&self, text: impl Into<String>) {
        self.show(BannerKind::Success, text.into());
    }

    pub fn error(&self, text: impl Into<String>) {
        self.show(BannerKind::Error, text.into());
    }

    /// Surface a failed action. Expired sessions are left to the login redirect.
    pub fn report(&self, err: &ClientError, fallback: &str) {
        if let Some(text) = err.banner_text(fallback) {
            self.error(text);
        }
    }

    pub fn show(&self, kind: BannerKind, text: String) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = &mut slots[Self::index(kind)];
        slot.generation += 1;
        slot.banner = Some(Banner { kind, text });
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }

        // outside a runtime the banner simply stays until replaced
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let generation = slot.generation;
        let ttl = self.ttl;
        let slots_ref = Arc::clone(&self.slots);
        slot.timer = Some(runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            let mut slots = slots_ref.lock().unwrap_or_else(PoisonError::into_inner);
            let slot = &mut slots[Self::index(kind)];
            if slot.generation == generation {
                slot.banner = None;
                slot.timer = None;
            }
        }));
    }

    pub fn dismiss(&self, kind: BannerKind) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = &mut slots[Self::index(kind)];
        slot.generation += 1;
        slot.banner = None;
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
    }

    #[must_use]
    pub fn current(&self, kind: BannerKind) -> Option<Banner> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)[Self::index(kind)]
            .banner
            .clone()
    }
}

/// Proof that a delete was explicitly confirmed.
///
/// Only [`ConfirmGate::open`] creates one, so no code path can go from a list
/// row straight to a delete request.
#[derive(Debug)]
pub struct DeleteConfirmation {
    target: Id,
    ticket: u64,
}

impl DeleteConfirmation {
    #[must_use]
    pub fn target(&self) -> &Id {
        &self.target
    }
}

/// The "are you sure?" step in front of a delete.
///
/// At most one delete is pending; opening another supersedes it.
#[derive(Debug, Default)]
pub struct ConfirmGate {
    pending: Mutex<Option<(u64, Id)>>,
    tickets: AtomicU64,
}

impl ConfirmGate {
    pub fn open(&self, target: Id) -> DeleteConfirmation {
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed) + 1;
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((ticket, target.clone()));
        debug!(%target, "delete awaiting confirmation");
        DeleteConfirmation { target, ticket }
    }

    pub fn cancel(&self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    #[must_use]
    pub fn pending_target(&self) -> Option<Id> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(_, id)| id.clone())
    }

    /// Redeem a confirmation, closing the pending step.
    ///
    /// # Errors
    /// Returns [`ClientError::Validation`] if the step was cancelled or superseded.
    pub fn take(&self, confirmation: DeleteConfirmation) -> ClientResult<Id> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let current = pending
            .as_ref()
            .is_some_and(|(ticket, _)| *ticket == confirmation.ticket);
        if !current {
            return Err(ClientError::Validation(
                "delete confirmation is no longer pending".into(),
            ));
        }
        pending.take();
        Ok(confirmation.target)
    }
}

/// Mount flag of a page.
///
/// Requests are not cancelled when a page goes away; their results are
/// dropped instead of being written into the unmounted page.
#[derive(Debug, Clone)]
pub struct PageScope {
    mounted: Arc<AtomicBool>,
}

impl Default for PageScope {
    fn default() -> Self {
        Self {
            mounted: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl PageScope {
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::Release);
    }
}
