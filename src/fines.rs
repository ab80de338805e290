//! The fine ledger page: listing, manual and automatic entries, confirmed deletes.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{
    api::LibraryApi,
    cache::ReferenceCache,
    errors::{settle3, ClientError, ClientResult},
    guard::InFlight,
    models::{EnrichedFine, Fine, FineForm, Id, MemberFineTotal, SubmitForm, NOT_FOUND},
    view::{Banners, ConfirmGate, DeleteConfirmation, IllegalTransition, PageEvent, PageMode, PageScope},
};

const LOAD_FAILED: &str = "Failed to load fines.";
const SAVE_FAILED: &str = "Failed to add fine.";
const DELETE_FAILED: &str = "Failed to delete fine.";

#[derive(Debug, Default)]
struct FinePage {
    cache: Arc<ReferenceCache>,
    fines: Vec<Fine>,
    mode: PageMode,
}

/// Join a fine with its member name and book title.
#[must_use]
pub fn enrich_fine(fine: &Fine, cache: &ReferenceCache) -> EnrichedFine {
    let member_name = cache
        .member(&fine.member_id)
        .map_or(NOT_FOUND, |m| m.name.as_str())
        .to_string();
    let book_title = fine
        .book_id
        .as_ref()
        .and_then(|id| cache.book(id))
        .map_or(NOT_FOUND, |b| b.title.as_str())
        .to_string();
    EnrichedFine {
        fine: fine.clone(),
        member_name,
        book_title,
    }
}

pub struct FineLedger {
    api: Arc<dyn LibraryApi>,
    state: RwLock<FinePage>,
    banners: Banners,
    gate: ConfirmGate,
    in_flight: InFlight,
    scope: PageScope,
}

impl FineLedger {
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

    /// Fetch fines, members and books together and rebuild the page.
    ///
    /// # Errors
    /// Fails as a whole if any of the three requests fails; nothing is stored then.
    #[tracing::instrument(skip(self))]
    pub async fn list_fines(&self) -> ClientResult<Vec<EnrichedFine>> {
        let api = self.api.as_ref();
        let (fines, members, books) =
            tokio::join!(api.list_fines(), api.list_members(), api.list_books());
        let (fines, members, books) =
            settle3(fines, members, books).inspect_err(|e| self.banners.report(e, LOAD_FAILED))?;

        let cache = Arc::new(ReferenceCache::from_parts(members, books));
        let rows = fines.iter().map(|f| enrich_fine(f, &cache)).collect::<Vec<_>>();
        info!(count = rows.len(), "fines loaded");

        if self.scope.is_mounted() {
            let mut page = self.state.write().await;
            page.cache = cache;
            page.fines = fines;
        } else {
            debug!("fine page unmounted, discarding results");
        }
        Ok(rows)
    }

    /// Loaded fines, enriched.
    pub async fn rows(&self) -> Vec<EnrichedFine> {
        let page = self.state.read().await;
        page.fines.iter().map(|f| enrich_fine(f, &page.cache)).collect()
    }

    /// Write a fine entry. Shared by manual entry and late returns.
    ///
    /// # Errors
    /// Returns a validation error before sending anything if the amount is not
    /// positive or the member is missing; otherwise the backend's failure.
    #[tracing::instrument(skip(self, form), fields(member = ?form.member_id, amount = form.amount))]
    pub async fn record_fine(&self, form: &FineForm) -> ClientResult<Fine> {
        form.check()?;
        let fine = self.api.create_fine(form).await?;
        info!(fine = %fine.id, category = %fine.category, "fine recorded");
        Ok(fine)
    }

    /// Manual entry from the fine form: record, announce, reload.
    ///
    /// # Errors
    /// See [`FineLedger::record_fine`]; also [`ClientError::Busy`] while
    /// a previous submission is still pending.
    pub async fn submit_fine(&self, form: &FineForm) -> ClientResult<Fine> {
        let _guard = self
            .in_flight
            .begin("submit-fine")
            .inspect_err(|e| self.banners.report(e, SAVE_FAILED))?;
        let fine = self
            .record_fine(form)
            .await
            .inspect_err(|e| self.banners.report(e, SAVE_FAILED))?;
        self.banners.success("Fine added.");
        self.leave_form().await;
        self.reload().await;
        Ok(fine)
    }

    /// First step of a delete: open the confirmation for a loaded fine.
    ///
    /// # Errors
    /// Returns [`ClientError::NotFound`] if the fine is not on the page.
    pub async fn request_delete(&self, fine_id: &Id) -> ClientResult<DeleteConfirmation> {
        let known = self.state.read().await.fines.iter().any(|f| &f.id == fine_id);
        if !known {
            return Err(ClientError::NotFound(format!("fine {fine_id}")));
        }
        Ok(self.gate.open(fine_id.clone()))
    }

    pub fn cancel_delete(&self) {
        self.gate.cancel();
    }

    /// Second step of a delete: send it.
    ///
    /// # Errors
    /// Rejects cancelled or superseded confirmations; otherwise the backend's failure.
    #[tracing::instrument(skip(self, confirmation), fields(fine = %confirmation.target()))]
    pub async fn delete_fine(&self, confirmation: DeleteConfirmation) -> ClientResult<()> {
        let fine_id = self.gate.take(confirmation)?;
        let _guard = self.in_flight.begin(format!("delete-fine:{fine_id}"))?;
        self.api
            .delete_fine(&fine_id)
            .await
            .inspect_err(|e| self.banners.report(e, DELETE_FAILED))?;
        info!("fine deleted");
        self.banners.success("Fine deleted.");
        self.reload().await;
        Ok(())
    }

    /// Fines of one member, taken from the loaded list without a request.
    pub async fn fine_history_for_member(&self, member_id: &Id) -> Vec<EnrichedFine> {
        let page = self.state.read().await;
        page.fines
            .iter()
            .filter(|f| &f.member_id == member_id)
            .map(|f| enrich_fine(f, &page.cache))
            .collect()
    }

    /// Count and sum of fines per member, in order of first appearance.
    pub async fn member_totals(&self) -> Vec<MemberFineTotal> {
        let page = self.state.read().await;
        let mut totals: Vec<MemberFineTotal> = Vec::new();
        let mut index: HashMap<&Id, usize> = HashMap::new();
        for fine in &page.fines {
            let slot = *index.entry(&fine.member_id).or_insert_with(|| {
                totals.push(MemberFineTotal {
                    member_id: fine.member_id.clone(),
                    member_name: page
                        .cache
                        .member(&fine.member_id)
                        .map_or(NOT_FOUND, |m| m.name.as_str())
                        .to_string(),
                    count: 0,
                    total: 0,
                });
                totals.len() - 1
            });
            totals[slot].count += 1;
            totals[slot].total = totals[slot].total.saturating_add(fine.amount);
        }
        totals
    }

    pub async fn mode(&self) -> PageMode {
        self.state.read().await.mode.clone()
    }

    /// Move the page to another mode.
    ///
    /// # Errors
    /// Returns [`IllegalTransition`] if the current mode does not accept `event`.
    pub async fn navigate(&self, event: PageEvent) -> Result<PageMode, IllegalTransition> {
        let mut page = self.state.write().await;
        page.mode = page.mode.apply(event)?;
        Ok(page.mode.clone())
    }

    async fn leave_form(&self) {
        let mut page = self.state.write().await;
        if let Ok(next) = page.mode.apply(PageEvent::Saved) {
            page.mode = next;
        }
    }

    async fn reload(&self) {
        if let Err(err) = self.list_fines().await {
            warn!(error = %err, "reload after mutation failed");
        }
    }
}
