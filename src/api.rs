//! Transport for the library REST API.

use async_trait::async_trait;
use reqwest::{header::ACCEPT, multipart::Form, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    errors::{ClientError, ClientResult, RemoteErrorBody},
    models::{
        Book, BookForm, Fine, FineForm, Id, Loan, LoanForm, LoginRequest, Member, MemberForm,
        SubmitForm, TokenResponse,
    },
    session::Session,
    utils::{multipart, Listing, Single},
};

/// Operations the client needs from the backend.
///
/// Implementations must report HTTP 401 as [`ClientError::AuthExpired`] after
/// expiring the session.
#[async_trait]
pub trait LibraryApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> ClientResult<String>;
    async fn current_user(&self) -> ClientResult<serde_json::Value>;

    async fn list_members(&self) -> ClientResult<Vec<Member>>;
    async fn create_member(&self, form: &MemberForm) -> ClientResult<()>;
    async fn update_member(&self, id: &Id, form: &MemberForm) -> ClientResult<()>;
    async fn delete_member(&self, id: &Id) -> ClientResult<()>;

    async fn list_books(&self) -> ClientResult<Vec<Book>>;
    async fn create_book(&self, form: &BookForm) -> ClientResult<()>;
    async fn update_book(&self, id: &Id, form: &BookForm) -> ClientResult<()>;
    async fn delete_book(&self, id: &Id) -> ClientResult<()>;

    async fn list_loans(&self) -> ClientResult<Vec<Loan>>;
    async fn list_member_loans(&self, member_id: &Id) -> ClientResult<Vec<Loan>>;
    async fn create_loan(&self, form: &LoanForm) -> ClientResult<Loan>;
    async fn return_loan(&self, loan_id: &Id) -> ClientResult<()>;

    async fn list_fines(&self) -> ClientResult<Vec<Fine>>;
    async fn create_fine(&self, form: &FineForm) -> ClientResult<Fine>;
    async fn delete_fine(&self, fine_id: &Id) -> ClientResult<()>;
}

/// [`LibraryApi`] over HTTP with bearer authentication.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
    session: Session,
}

impl HttpApi {
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>, session: Session) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Start an authenticated request.
    ///
    /// Without a credential nothing is sent: the session is expired right away
    /// so observers redirect to login.
    fn authed(&self, method: Method, path: &str) -> ClientResult<RequestBuilder> {
        let Some(token) = self.session.token() else {
            self.session.expire();
            return Err(ClientError::AuthExpired);
        };
        Ok(self
            .client
            .request(method, self.url(path))
            .header(ACCEPT, "application/json")
            .bearer_auth(token))
    }

    async fn send(&self, request: RequestBuilder) -> ClientResult<Response> {
        let response = request.send().await?;
        self.check(response).await
    }

    async fn check(&self, response: Response) -> ClientResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            self.session.expire();
            return Err(ClientError::AuthExpired);
        }
        let message = response
            .json::<RemoteErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message);
        warn!(%status, ?message, "backend rejected request");
        Err(ClientError::Remote { status, message })
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> ClientResult<Vec<T>> {
        debug!(path, "fetching list");
        let response = self.send(self.authed(Method::GET, path)?).await?;
        Ok(response.json::<Listing<T>>().await?.into_vec())
    }

    async fn post_form(&self, path: &str, form: Form) -> ClientResult<Response> {
        self.send(self.authed(Method::POST, path)?.multipart(form))
            .await
    }

    /// Submit an update through the `_method=PUT` override the backend expects
    /// for multipart bodies.
    async fn put_form<F: SubmitForm + Sync>(&self, path: &str, form: &F) -> ClientResult<()> {
        let mut fields = form.form_fields();
        fields.push(("_method", "PUT".to_string()));
        self.post_form(path, multipart(fields)).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> ClientResult<()> {
        self.send(self.authed(Method::DELETE, path)?).await?;
        Ok(())
    }
}

#[async_trait]
impl LibraryApi for HttpApi {
    async fn login(&self, request: &LoginRequest) -> ClientResult<String> {
        let response = self
            .client
            .post(self.url("/login"))
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;
        // a 401 here means bad credentials, not an expired session
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<RemoteErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message);
            return Err(ClientError::Remote { status, message });
        }
        let body = response.json::<TokenResponse>().await?;
        body.token
            .filter(|t| !t.trim().is_empty())
            .ok_or(ClientError::Remote {
                status,
                message: body.message,
            })
    }

    async fn current_user(&self) -> ClientResult<serde_json::Value> {
        let response = self.send(self.authed(Method::GET, "/user")?).await?;
        Ok(response.json().await?)
    }

    async fn list_members(&self) -> ClientResult<Vec<Member>> {
        self.get_list("/member").await
    }

    async fn create_member(&self, form: &MemberForm) -> ClientResult<()> {
        self.post_form("/member", multipart(form.form_fields()))
            .await?;
        Ok(())
    }

    async fn update_member(&self, id: &Id, form: &MemberForm) -> ClientResult<()> {
        self.put_form(&format!("/member/{id}"), form).await
    }

    async fn delete_member(&self, id: &Id) -> ClientResult<()> {
        self.delete(&format!("/member/{id}")).await
    }

    async fn list_books(&self) -> ClientResult<Vec<Book>> {
        self.get_list("/buku").await
    }

    async fn create_book(&self, form: &BookForm) -> ClientResult<()> {
        self.post_form("/buku", multipart(form.form_fields()))
            .await?;
        Ok(())
    }

    async fn update_book(&self, id: &Id, form: &BookForm) -> ClientResult<()> {
        self.put_form(&format!("/buku/{id}"), form).await
    }

    async fn delete_book(&self, id: &Id) -> ClientResult<()> {
        self.delete(&format!("/buku/{id}")).await
    }

    async fn list_loans(&self) -> ClientResult<Vec<Loan>> {
        self.get_list("/peminjaman").await
    }

    async fn list_member_loans(&self, member_id: &Id) -> ClientResult<Vec<Loan>> {
        self.get_list(&format!("/peminjaman/{member_id}")).await
    }

    async fn create_loan(&self, form: &LoanForm) -> ClientResult<Loan> {
        let response = self
            .post_form("/peminjaman", multipart(form.form_fields()))
            .await?;
        Ok(response.json::<Single<Loan>>().await?.into_inner())
    }

    async fn return_loan(&self, loan_id: &Id) -> ClientResult<()> {
        let path = format!("/peminjaman/pengembalian/{loan_id}");
        self.send(self.authed(Method::PUT, &path)?).await?;
        Ok(())
    }

    async fn list_fines(&self) -> ClientResult<Vec<Fine>> {
        self.get_list("/denda").await
    }

    async fn create_fine(&self, form: &FineForm) -> ClientResult<Fine> {
        let response = self
            .post_form("/denda", multipart(form.form_fields()))
            .await?;
        Ok(response.json::<Single<Fine>>().await?.into_inner())
    }

    async fn delete_fine(&self, fine_id: &Id) -> ClientResult<()> {
        self.delete(&format!("/denda/{fine_id}")).await
    }
}
