//! The loan page: listing with derived status, borrowing, and returns with
//! automatic late fees.

use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{
    api::LibraryApi,
    cache::ReferenceCache,
    clock::Clock,
    errors::{settle2, settle3, ClientError, ClientResult},
    fees::FeeSchedule,
    fines::FineLedger,
    guard::InFlight,
    models::{EnrichedLoan, Fine, FineForm, Id, Loan, LoanForm, SubmitForm, NOT_FOUND},
    view::{Banners, IllegalTransition, PageEvent, PageMode, PageScope},
};

const LOAD_FAILED: &str = "Failed to load loans.";
const HISTORY_FAILED: &str = "Failed to load the member's loan history.";
const SAVE_FAILED: &str = "Failed to add loan.";
const RETURN_FAILED: &str = "Failed to process the return.";
const FINE_FAILED: &str = "Book returned, but the late fee could not be recorded.";

/// Join a loan with display names and its status at `now`.
#[must_use]
pub fn enrich_loan(loan: &Loan, cache: &ReferenceCache, now: NaiveDateTime) -> EnrichedLoan {
    EnrichedLoan {
        member_name: cache
            .member(&loan.member_id)
            .map_or(NOT_FOUND, |m| m.name.as_str())
            .to_string(),
        book_title: cache
            .book(&loan.book_id)
            .map_or(NOT_FOUND, |b| b.title.as_str())
            .to_string(),
        status: loan.status_at(now),
        loan: loan.clone(),
    }
}

/// What happened to the late fee of a returned loan.
#[derive(Debug)]
pub enum FineAssessment {
    /// Returned on time; nothing was recorded.
    NotLate,
    Recorded(Fine),
    /// The loan is returned but writing the fine failed. Not retried.
    Failed(ClientError),
}

#[derive(Debug)]
pub struct ReturnOutcome {
    pub loan_id: Id,
    pub returned_at: NaiveDateTime,
    pub late_fee: u64,
    pub fine: FineAssessment,
}

#[derive(Debug, Default)]
struct LoanPage {
    cache: Arc<ReferenceCache>,
    loans: Vec<Loan>,
    member_filter: Option<Id>,
    mode: PageMode,
}

pub struct LoanManager {
    api: Arc<dyn LibraryApi>,
    ledger: Arc<FineLedger>,
    clock: Arc<dyn Clock>,
    fees: FeeSchedule,
    state: RwLock<LoanPage>,
    banners: Banners,
    in_flight: InFlight,
    scope: PageScope,
}

impl LoanManager {
    #[must_use]
    pub fn new(
        api: Arc<dyn LibraryApi>,
        ledger: Arc<FineLedger>,
        clock: Arc<dyn Clock>,
        fees: FeeSchedule,
        banners: Banners,
    ) -> Self {
        Self {
            api,
            ledger,
            clock,
            fees,
            state: RwLock::default(),
            banners,
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

    /// Load loans, all of them or one member's, enriched with names and status.
    ///
    /// The full list refetches members and books alongside the loans. A
    /// member's history reuses the loaded reference data and only fetches it
    /// when the page has none yet.
    ///
    /// # Errors
    /// Fails as a whole if any concurrent request fails; nothing is stored then.
    #[tracing::instrument(skip(self))]
    pub async fn list_loans(&self, member: Option<&Id>) -> ClientResult<Vec<EnrichedLoan>> {
        let fallback = if member.is_some() { HISTORY_FAILED } else { LOAD_FAILED };
        let (loans, cache) = self
            .fetch(member)
            .await
            .inspect_err(|e| self.banners.report(e, fallback))?;

        let now = self.clock.now();
        let rows = loans
            .iter()
            .map(|loan| enrich_loan(loan, &cache, now))
            .collect::<Vec<_>>();
        info!(count = rows.len(), "loans loaded");

        if self.scope.is_mounted() {
            let mut page = self.state.write().await;
            page.cache = cache;
            page.loans = loans;
            page.member_filter = member.cloned();
        } else {
            debug!("loan page unmounted, discarding results");
        }
        Ok(rows)
    }

    async fn fetch(&self, member: Option<&Id>) -> ClientResult<(Vec<Loan>, Arc<ReferenceCache>)> {
        let api = self.api.as_ref();
        let Some(member_id) = member else {
            let (loans, members, books) =
                tokio::join!(api.list_loans(), api.list_members(), api.list_books());
            let (loans, members, books) = settle3(loans, members, books)?;
            return Ok((loans, Arc::new(ReferenceCache::from_parts(members, books))));
        };

        let loaded = {
            let page = self.state.read().await;
            page.cache.is_loaded().then(|| Arc::clone(&page.cache))
        };
        if let Some(cache) = loaded {
            return Ok((api.list_member_loans(member_id).await?, cache));
        }
        let (loans, cache) = tokio::join!(
            api.list_member_loans(member_id),
            ReferenceCache::load_all(api)
        );
        let (loans, cache) = settle2(loans, cache)?;
        Ok((loans, Arc::new(cache)))
    }

    /// Loaded loans with every status derived again at the current time.
    pub async fn rows(&self) -> Vec<EnrichedLoan> {
        let now = self.clock.now();
        let page = self.state.read().await;
        page.loans
            .iter()
            .map(|loan| enrich_loan(loan, &page.cache, now))
            .collect()
    }

    /// Reference data of the current page, for member and book pickers.
    pub async fn reference(&self) -> Arc<ReferenceCache> {
        Arc::clone(&self.state.read().await.cache)
    }

    /// Record a new loan, then reload the full list.
    ///
    /// # Errors
    /// Returns a validation error if a required field is missing, [`ClientError::Busy`]
    /// while a previous submission is pending, or the backend's failure.
    #[tracing::instrument(skip(self, form), fields(member = ?form.member_id, book = ?form.book_id))]
    pub async fn create_loan(&self, form: &LoanForm) -> ClientResult<Loan> {
        let _guard = self
            .in_flight
            .begin("create-loan")
            .inspect_err(|e| self.banners.report(e, SAVE_FAILED))?;
        form.check()
            .inspect_err(|e| self.banners.report(e, SAVE_FAILED))?;
        let loan = self
            .api
            .create_loan(form)
            .await
            .inspect_err(|e| self.banners.report(e, SAVE_FAILED))?;
        info!(loan = %loan.id, due = %loan.due_date, "loan created");

        self.banners.success("Loan added.");
        self.leave_form().await;
        self.reload(None).await;
        Ok(loan)
    }

    /// Return a loaned book and charge the late fee, if any.
    ///
    /// The return is committed first. The fee is computed from the loan's due
    /// date and the moment the return succeeded, and recorded as a `Late` fine
    /// when positive. A failed fine does not undo the return; it is reported in
    /// the outcome and on the error banner. The loan list is reloaded last.
    ///
    /// # Errors
    /// Returns [`ClientError::Busy`] if this loan's return is already running,
    /// [`ClientError::NotFound`] if the loan is not on the page, a validation
    /// error if it is already returned, or the failure of the return request.
    #[tracing::instrument(skip(self))]
    pub async fn mark_returned(&self, loan_id: &Id) -> ClientResult<ReturnOutcome> {
        let _guard = self
            .in_flight
            .begin(format!("return-loan:{loan_id}"))
            .inspect_err(|e| self.banners.report(e, RETURN_FAILED))?;

        let loan = self
            .state
            .read()
            .await
            .loans
            .iter()
            .find(|l| &l.id == loan_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("loan {loan_id}")))?;
        if loan.returned {
            let err = ClientError::Validation(format!("loan {loan_id} is already returned"));
            self.banners.report(&err, RETURN_FAILED);
            return Err(err);
        }

        self.api
            .return_loan(&loan.id)
            .await
            .inspect_err(|e| self.banners.report(e, RETURN_FAILED))?;
        let returned_at = self.clock.now();
        info!(loan = %loan.id, "loan returned");

        let late_fee = self.fees.late_fee(loan.due_date, returned_at);
        let fine = if late_fee == 0 {
            FineAssessment::NotLate
        } else {
            match self
                .ledger
                .record_fine(&FineForm::late_return(&loan, late_fee))
                .await
            {
                Ok(fine) => FineAssessment::Recorded(fine),
                Err(err) => {
                    warn!(loan = %loan.id, late_fee, error = %err, "late fee not recorded");
                    self.banners.report(&err, FINE_FAILED);
                    FineAssessment::Failed(err)
                }
            }
        };

        match &fine {
            FineAssessment::Recorded(_) => {
                self.banners
                    .success(format!("Book returned. Late fee: {late_fee}"));
            }
            FineAssessment::NotLate => self.banners.success("Book returned."),
            FineAssessment::Failed(_) => {}
        }

        let filter = self.state.read().await.member_filter.clone();
        self.reload(filter.as_ref()).await;

        Ok(ReturnOutcome {
            loan_id: loan.id,
            returned_at,
            late_fee,
            fine,
        })
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

    async fn reload(&self, member: Option<&Id>) {
        if let Err(err) = self.list_loans(member).await {
            warn!(error = %err, "reload after mutation failed");
        }
    }
}
