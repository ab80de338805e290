//! Book catalog page.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{
    api::LibraryApi,
    errors::{ClientError, ClientResult},
    guard::{InFlight, InFlightGuard},
    models::{Book, BookForm, Id, SubmitForm},
    view::{Banners, ConfirmGate, DeleteConfirmation, IllegalTransition, PageEvent, PageMode, PageScope},
};

const LOAD_FAILED: &str = "Failed to load books.";
const SAVE_FAILED: &str = "Failed to save book.";
const DELETE_FAILED: &str = "Failed to delete book.";

#[derive(Debug, Default)]
struct BookPage {
    books: Vec<Book>,
    mode: PageMode,
}

pub struct BookCatalog {
    api: Arc<dyn LibraryApi>,
    state: RwLock<BookPage>,
    banners: Banners,
    gate: ConfirmGate,
    in_flight: InFlight,
    scope: PageScope,
}

impl BookCatalog {
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

    #[tracing::instrument(skip(self))]
    pub async fn list(&self) -> ClientResult<Vec<Book>> {
        let books = self
            .api
            .list_books()
            .await
            .inspect_err(|e| self.banners.report(e, LOAD_FAILED))?;
        info!(count = books.len(), "books loaded");
        if self.scope.is_mounted() {
            self.state.write().await.books = books.clone();
        } else {
            debug!("book page unmounted, discarding results");
        }
        Ok(books)
    }

    pub async fn rows(&self) -> Vec<Book> {
        self.state.read().await.books.clone()
    }

    /// # Errors
    /// Returns [`ClientError::NotFound`] if the book is not on the page.
    pub async fn book(&self, id: &Id) -> ClientResult<Book> {
        self.state
            .read()
            .await
            .books
            .iter()
            .find(|b| &b.id == id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("book {id}")))
    }

    #[tracing::instrument(skip(self, form), fields(title = %form.title))]
    pub async fn create(&self, form: &BookForm) -> ClientResult<()> {
        let _guard = self.begin_save()?;
        form.check()
            .inspect_err(|e| self.banners.report(e, SAVE_FAILED))?;
        self.api
            .create_book(form)
            .await
            .inspect_err(|e| self.banners.report(e, SAVE_FAILED))?;
        info!("book created");
        self.saved("Book added.").await;
        Ok(())
    }

    #[tracing::instrument(skip(self, form), fields(title = %form.title))]
    pub async fn update(&self, id: &Id, form: &BookForm) -> ClientResult<()> {
        let _guard = self.begin_save()?;
        form.check()
            .inspect_err(|e| self.banners.report(e, SAVE_FAILED))?;
        self.api
            .update_book(id, form)
            .await
            .inspect_err(|e| self.banners.report(e, SAVE_FAILED))?;
        info!("book updated");
        self.saved("Book updated.").await;
        Ok(())
    }

    pub async fn request_delete(&self, id: &Id) -> ClientResult<DeleteConfirmation> {
        self.book(id).await?;
        Ok(self.gate.open(id.clone()))
    }

    pub fn cancel_delete(&self) {
        self.gate.cancel();
    }

    #[tracing::instrument(skip(self, confirmation), fields(book = %confirmation.target()))]
    pub async fn delete(&self, confirmation: DeleteConfirmation) -> ClientResult<()> {
        let id = self.gate.take(confirmation)?;
        let _guard = self.in_flight.begin(format!("delete-book:{id}"))?;
        self.api
            .delete_book(&id)
            .await
            .inspect_err(|e| self.banners.report(e, DELETE_FAILED))?;
        info!("book deleted");
        self.banners.success("Book deleted.");
        self.reload().await;
        Ok(())
    }

    pub async fn mode(&self) -> PageMode {
        self.state.read().await.mode.clone()
    }

    pub async fn navigate(&self, event: PageEvent) -> Result<PageMode, IllegalTransition> {
        let mut page = self.state.write().await;
        page.mode = page.mode.apply(event)?;
        Ok(page.mode.clone())
    }

    fn begin_save(&self) -> ClientResult<InFlightGuard> {
        self.in_flight
            .begin("save-book")
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
