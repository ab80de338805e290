//! Member directory page.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{
    api::LibraryApi,
    errors::{ClientError, ClientResult},
    guard::{InFlight, InFlightGuard},
    models::{Id, Member, MemberForm, SubmitForm},
    view::{Banners, ConfirmGate, DeleteConfirmation, IllegalTransition, PageEvent, PageMode, PageScope},
};

const LOAD_FAILED: &str = "Failed to load members.";
const SAVE_FAILED: &str = "Failed to save member.";
const DELETE_FAILED: &str = "Failed to delete member.";

#[derive(Debug, Default)]
struct MemberPage {
    members: Vec<Member>,
    mode: PageMode,
}

pub struct MemberDirectory {
    api: Arc<dyn LibraryApi>,
    state: RwLock<MemberPage>,
    banners: Banners,
    gate: ConfirmGate,
    in_flight: InFlight,
    scope: PageScope,
}

impl MemberDirectory {
    #[must_use]
    pub fn new(api: Arc<dyn LibraryApi>, banners: Banners) -> Self {
        Self {
            api,
            state: RwLock::default(),
            banners,
            gate: ConfirmGate::default(),
            in_flight: InFlight::default(),
            scope: PageScope::default(),
        }
    }

    #[must_use]
    pub fn banners(&self) -> &Banners {
        &self.banners
    }

    #[must_use]
    pub fn scope(&self) -> &PageScope {
        &self.scope
    }

    /// # Errors
    /// Returns the backend's failure; the page keeps its previous rows.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self) -> ClientResult<Vec<Member>> {
        let members = self
            .api
            .list_members()
            .await
            .inspect_err(|e| self.banners.report(e, LOAD_FAILED))?;
        info!(count = members.len(), "members loaded");
        if self.scope.is_mounted() {
            self.state.write().await.members = members.clone();
        } else {
            debug!("member page unmounted, discarding results");
        }
        Ok(members)
    }

    pub async fn rows(&self) -> Vec<Member> {
        self.state.read().await.members.clone()
    }

    /// A loaded member, for the detail view or to prefill the edit form.
    ///
    /// # Errors
    /// Returns [`ClientError::NotFound`] if the member is not on the page.
    pub async fn member(&self, id: &Id) -> ClientResult<Member> {
        self.state
            .read()
            .await
            .members
            .iter()
            .find(|m| &m.id == id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("member {id}")))
    }

    /// # Errors
    /// Returns a validation error before sending anything, [`ClientError::Busy`]
    /// while a save is pending, or the backend's failure.
    #[tracing::instrument(skip(self, form))]
    pub async fn create(&self, form: &MemberForm) -> ClientResult<()> {
        let _guard = self.begin_save()?;
        form.check()
            .inspect_err(|e| self.banners.report(e, SAVE_FAILED))?;
        self.api
            .create_member(form)
            .await
            .inspect_err(|e| self.banners.report(e, SAVE_FAILED))?;
        info!("member created");
        self.saved("Member added.").await;
        Ok(())
    }

    /// # Errors
    /// Same as [`MemberDirectory::create`].
    #[tracing::instrument(skip(self, form))]
    pub async fn update(&self, id: &Id, form: &MemberForm) -> ClientResult<()> {
        let _guard = self.begin_save()?;
        form.check()
            .inspect_err(|e| self.banners.report(e, SAVE_FAILED))?;
        self.api
            .update_member(id, form)
            .await
            .inspect_err(|e| self.banners.report(e, SAVE_FAILED))?;
        info!("member updated");
        self.saved("Member updated.").await;
        Ok(())
    }

    /// # Errors
    /// Returns [`ClientError::NotFound`] if the member is not on the page.
    pub async fn request_delete(&self, id: &Id) -> ClientResult<DeleteConfirmation> {
        self.member(id).await?;
        Ok(self.gate.open(id.clone()))
    }

    pub fn cancel_delete(&self) {
        self.gate.cancel();
    }

    /// # Errors
    /// Rejects cancelled or superseded confirmations; otherwise the backend's failure.
    #[tracing::instrument(skip(self, confirmation), fields(member = %confirmation.target()))]
    pub async fn delete(&self, confirmation: DeleteConfirmation) -> ClientResult<()> {
        let id = self.gate.take(confirmation)?;
        let _guard = self.in_flight.begin(format!("delete-member:{id}"))?;
        self.api
            .delete_member(&id)
            .await
            .inspect_err(|e| self.banners.report(e, DELETE_FAILED))?;
        info!("member deleted");
        self.banners.success("Member deleted.");
        self.reload().await;
        Ok(())
    }

    pub async fn mode(&self) -> PageMode {
        self.state.read().await.mode.clone()
    }

    /// # Errors
    /// Returns [`IllegalTransition`] if the current mode does not accept `event`.
    pub async fn navigate(&self, event: PageEvent) -> Result<PageMode, IllegalTransition> {
        let mut page = self.state.write().await;
        page.mode = page.mode.apply(event)?;
        Ok(page.mode.clone())
    }

    fn begin_save(&self) -> ClientResult<InFlightGuard> {
        self.in_flight
            .begin("save-member")
            .inspect_err(|e| self.banners.report(e, SAVE_FAILED))
    }

    async fn saved(&self, message: &str) {
        self.banners.success(message);
        {
            let mut page = self.state.write().await;
            if let Ok(next) = page.mode.apply(PageEvent::Saved) {
                page.mode = next;
            }
        }
        self.reload().await;
    }

    async fn reload(&self) {
        if let Err(err) = self.list().await {
            warn!(error = %err, "reload after mutation failed");
        }
    }
}
