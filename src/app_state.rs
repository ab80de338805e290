use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::{
    api::{HttpApi, LibraryApi},
    books::BookCatalog,
    clock::{Clock, SystemClock},
    errors::{ClientError, ClientResult},
    fees::FeeSchedule,
    fines::FineLedger,
    loans::LoanManager,
    members::MemberDirectory,
    models::LoginRequest,
    session::Session,
    view::Banners,
    Config,
};

/// Everything the pages share: configuration, the credential, the transport,
/// the banners and the clock.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub session: Session,
    pub api: Arc<dyn LibraryApi>,
    pub banners: Banners,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wire the HTTP transport for `config`, authenticated through `session`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: Config, session: Session) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .context("failed to build HTTP client")?;
        let api = HttpApi::new(client, config.api_url.clone(), session.clone());
        Ok(Self::with_api(config, session, Arc::new(api), Arc::new(SystemClock)))
    }

    /// State over any transport and clock.
    #[must_use]
    pub fn with_api(
        config: Config,
        session: Session,
        api: Arc<dyn LibraryApi>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let banners = Banners::new(config.banner_ttl());
        Self {
            config,
            session,
            api,
            banners,
            clock,
        }
    }

    /// Exchange credentials for a bearer token and store it in the session.
    ///
    /// # Errors
    /// Returns a validation error for a malformed email or empty password
    /// without sending anything, otherwise the backend's refusal.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<()> {
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        validator::Validate::validate(&request)
            .map_err(|e| ClientError::Validation(e.to_string()))?;
        let token = self.api.login(&request).await?;
        self.session.set(token);
        info!("signed in");
        Ok(())
    }

    /// Check a stored credential against the backend.
    ///
    /// # Errors
    /// Returns [`ClientError::AuthExpired`] if the backend no longer accepts it.
    pub async fn verify(&self) -> ClientResult<serde_json::Value> {
        self.api.current_user().await
    }

    pub fn logout(&self) {
        self.session.clear();
    }

    #[must_use]
    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule::new(self.config.late_fee_per_day)
    }

    #[must_use]
    pub fn member_directory(&self) -> MemberDirectory {
        MemberDirectory::new(Arc::clone(&self.api), self.banners.clone())
    }

    #[must_use]
    pub fn book_catalog(&self) -> BookCatalog {
        BookCatalog::new(Arc::clone(&self.api), self.banners.clone())
    }

    #[must_use]
    pub fn fine_ledger(&self) -> Arc<FineLedger> {
        Arc::new(FineLedger::new(Arc::clone(&self.api), self.banners.clone()))
    }

    /// Loan page recording late fees through `ledger`.
    #[must_use]
    pub fn loan_manager(&self, ledger: Arc<FineLedger>) -> LoanManager {
        LoanManager::new(
            Arc::clone(&self.api),
            ledger,
            Arc::clone(&self.clock),
            self.fee_schedule(),
            self.banners.clone(),
        )
    }
}
