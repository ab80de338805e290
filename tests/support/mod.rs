//! In-process stand-in for the library REST backend.
//!
//! Records are kept as raw JSON with the same loose typing the real backend
//! produces: ids alternate between numbers and strings, amounts come back as
//! decimal strings and the returned flag is `0`, `"0"` or a timestamp.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use axum::{
    extract::{Multipart, Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use library_admin::{AppState, Clock, Config, HttpApi, Session};
use serde_json::{json, Value};

pub const TOKEN: &str = "test-token";
pub const PASSWORD: &str = "secret";

pub struct Backend {
    pub members: Mutex<Vec<Value>>,
    pub books: Mutex<Vec<Value>>,
    pub loans: Mutex<Vec<Value>>,
    pub fines: Mutex<Vec<Value>>,
    /// `METHOD /path` of every authenticated call, in arrival order.
    pub requests: Mutex<Vec<String>>,
    /// Path whose GET answers 500.
    pub failing_path: Mutex<Option<String>>,
    pub reject_fines: AtomicBool,
    pub return_delay: Mutex<Duration>,
    next_id: AtomicU64,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            members: Mutex::new(vec![
                json!({"id": 1, "no_ktp": "3201010101010001", "nama": "Sari", "alamat": "Jl. Merdeka 1", "tgl_lahir": "1990-05-17"}),
                json!({"id": "2", "no_ktp": "3201010101010002", "nama": "Budi", "alamat": "Jl. Sudirman 2", "tgl_lahir": "1988-11-02"}),
            ]),
            books: Mutex::new(vec![
                json!({"id": 5, "no_rak": "A-01", "judul": "Laskar Pelangi", "pengarang": "Andrea Hirata", "penerbit": "Bentang", "tahun_terbit": "2005", "stok": "3", "detail": null}),
                json!({"id": "6", "no_rak": "B-02", "judul": "Bumi Manusia", "pengarang": "Pramoedya Ananta Toer", "penerbit": "Hasta Mitra", "tahun_terbit": 1980, "stok": 1, "detail": ""}),
            ]),
            loans: Mutex::new(vec![
                json!({"id": 10, "id_member": "1", "id_buku": 5, "tgl_pinjam": "2024-01-03", "tgl_pengembalian": "2024-01-10", "status_pengembalian": 0}),
                json!({"id": "11", "id_member": 2, "id_buku": "6", "tgl_pinjam": "2024-01-08", "tgl_pengembalian": "2024-01-20 00:00:00", "status_pengembalian": "0"}),
                json!({"id": 12, "id_member": 1, "id_buku": 6, "tgl_pinjam": "2023-12-01", "tgl_pengembalian": "2023-12-08", "status_pengembalian": "2023-12-07 10:00:00"}),
            ]),
            fines: Mutex::new(vec![
                json!({"id": 1, "id_member": 1, "id_buku": 6, "jumlah_denda": "2000.00", "jenis_denda": "kerusakan", "deskripsi": "Torn page"}),
            ]),
            requests: Mutex::default(),
            failing_path: Mutex::default(),
            reject_fines: AtomicBool::new(false),
            return_delay: Mutex::new(Duration::ZERO),
            next_id: AtomicU64::new(100),
        }
    }
}

impl Backend {
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, request: &str) -> usize {
        self.requests().iter().filter(|r| *r == request).count()
    }

    pub fn fail(&self, path: &str) {
        *self.failing_path.lock().unwrap() = Some(path.to_string());
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

pub fn id_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn not_found() -> Response {
    reply(StatusCode::NOT_FOUND, json!({"message": "Data tidak ditemukan"}))
}

async fn form_fields(mut multipart: Multipart) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let value = field.text().await.unwrap_or_default();
        fields.insert(name, value);
    }
    fields
}

async fn require_bearer(State(backend): State<Arc<Backend>>, req: Request, next: Next) -> Response {
    let line = format!("{} {}", req.method(), req.uri().path());
    backend.requests.lock().unwrap().push(line);

    let authorized = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == TOKEN);
    if !authorized {
        return reply(StatusCode::UNAUTHORIZED, json!({"message": "Unauthenticated."}));
    }

    let failing = backend.failing_path.lock().unwrap().clone();
    if req.method() == axum::http::Method::GET && failing.as_deref() == Some(req.uri().path()) {
        return reply(StatusCode::INTERNAL_SERVER_ERROR, json!({"message": "Server Error"}));
    }
    next.run(req).await
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["password"] == PASSWORD {
        reply(StatusCode::OK, json!({"message": "Login berhasil", "token": TOKEN}))
    } else {
        reply(StatusCode::UNAUTHORIZED, json!({"message": "Email atau password salah"}))
    }
}

async fn current_user() -> Response {
    reply(StatusCode::OK, json!({"id": 1, "name": "Admin", "email": "admin@library.test"}))
}

fn insert(list: &Mutex<Vec<Value>>, id: u64, fields: HashMap<String, String>) -> Value {
    let mut record = json!({"id": id});
    for (name, value) in fields {
        record[name] = Value::String(value);
    }
    list.lock().unwrap().push(record.clone());
    record
}

fn update(list: &Mutex<Vec<Value>>, id: &str, mut fields: HashMap<String, String>) -> Response {
    if fields.remove("_method").as_deref() != Some("PUT") {
        return reply(StatusCode::METHOD_NOT_ALLOWED, json!({"message": "Method not allowed"}));
    }
    let mut list = list.lock().unwrap();
    let Some(record) = list.iter_mut().find(|r| id_of(&r["id"]) == id) else {
        return not_found();
    };
    for (name, value) in fields {
        record[name] = Value::String(value);
    }
    reply(StatusCode::OK, json!({"message": "Data berhasil diubah"}))
}

fn remove(list: &Mutex<Vec<Value>>, id: &str) -> Response {
    let mut list = list.lock().unwrap();
    let before = list.len();
    list.retain(|r| id_of(&r["id"]) != id);
    if list.len() == before {
        return not_found();
    }
    reply(StatusCode::OK, json!({"message": "Data berhasil dihapus"}))
}

async fn list_members(State(b): State<Arc<Backend>>) -> Response {
    let members = b.members.lock().unwrap().clone();
    reply(StatusCode::OK, json!({"message": "ok", "data": members}))
}

async fn create_member(State(b): State<Arc<Backend>>, multipart: Multipart) -> Response {
    let fields = form_fields(multipart).await;
    let record = insert(&b.members, b.next_id(), fields);
    reply(StatusCode::CREATED, json!({"data": record}))
}

async fn update_member(
    State(b): State<Arc<Backend>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Response {
    update(&b.members, &id, form_fields(multipart).await)
}

async fn delete_member(State(b): State<Arc<Backend>>, Path(id): Path<String>) -> Response {
    remove(&b.members, &id)
}

async fn list_books(State(b): State<Arc<Backend>>) -> Response {
    let books = b.books.lock().unwrap().clone();
    reply(StatusCode::OK, Value::Array(books))
}

async fn create_book(State(b): State<Arc<Backend>>, multipart: Multipart) -> Response {
    let fields = form_fields(multipart).await;
    let record = insert(&b.books, b.next_id(), fields);
    reply(StatusCode::CREATED, json!({"data": record}))
}

async fn update_book(
    State(b): State<Arc<Backend>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Response {
    update(&b.books, &id, form_fields(multipart).await)
}

async fn delete_book(State(b): State<Arc<Backend>>, Path(id): Path<String>) -> Response {
    remove(&b.books, &id)
}

async fn list_loans(State(b): State<Arc<Backend>>) -> Response {
    let loans = b.loans.lock().unwrap().clone();
    reply(StatusCode::OK, Value::Array(loans))
}

async fn member_loans(State(b): State<Arc<Backend>>, Path(member): Path<String>) -> Response {
    let loans: Vec<Value> = b
        .loans
        .lock()
        .unwrap()
        .iter()
        .filter(|l| id_of(&l["id_member"]) == member)
        .cloned()
        .collect();
    reply(StatusCode::OK, json!({"data": loans}))
}

async fn create_loan(State(b): State<Arc<Backend>>, multipart: Multipart) -> Response {
    let mut fields = form_fields(multipart).await;
    fields.insert("status_pengembalian".into(), "0".into());
    let record = insert(&b.loans, b.next_id(), fields);
    reply(StatusCode::CREATED, json!({"message": "Peminjaman berhasil", "data": record}))
}

async fn return_loan(State(b): State<Arc<Backend>>, Path(id): Path<String>) -> Response {
    let delay = *b.return_delay.lock().unwrap();
    tokio::time::sleep(delay).await;
    let mut loans = b.loans.lock().unwrap();
    let Some(loan) = loans.iter_mut().find(|l| id_of(&l["id"]) == id) else {
        return not_found();
    };
    loan["status_pengembalian"] = json!(1);
    reply(StatusCode::OK, json!({"message": "Buku berhasil dikembalikan"}))
}

async fn list_fines(State(b): State<Arc<Backend>>) -> Response {
    let fines = b.fines.lock().unwrap().clone();
    reply(StatusCode::OK, json!({"data": fines}))
}

async fn create_fine(State(b): State<Arc<Backend>>, multipart: Multipart) -> Response {
    let fields = form_fields(multipart).await;
    if b.reject_fines.load(Ordering::Relaxed) {
        return reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"message": "Fine service unavailable"}),
        );
    }
    let record = insert(&b.fines, b.next_id(), fields);
    reply(StatusCode::CREATED, json!({"data": record}))
}

async fn delete_fine(State(b): State<Arc<Backend>>, Path(id): Path<String>) -> Response {
    remove(&b.fines, &id)
}

pub fn router(backend: Arc<Backend>) -> Router {
    let protected = Router::new()
        .route("/user", get(current_user))
        .route("/member", get(list_members).post(create_member))
        .route("/member/{id}", post(update_member).delete(delete_member))
        .route("/buku", get(list_books).post(create_book))
        .route("/buku/{id}", post(update_book).delete(delete_book))
        .route("/peminjaman", get(list_loans).post(create_loan))
        .route("/peminjaman/{member}", get(member_loans))
        .route("/peminjaman/pengembalian/{id}", put(return_loan))
        .route("/denda", get(list_fines).post(create_fine))
        .route("/denda/{id}", axum::routing::delete(delete_fine))
        .route_layer(middleware::from_fn_with_state(
            backend.clone(),
            require_bearer,
        ));

    Router::new()
        .route("/login", post(login))
        .merge(protected)
        .with_state(backend)
}

/// Serve `backend` on an ephemeral port and return its base URL.
pub async fn spawn(backend: Arc<Backend>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(backend)).await.unwrap();
    });
    format!("http://{addr}")
}

pub struct Harness {
    pub backend: Arc<Backend>,
    pub state: AppState,
}

/// Signed-in client state against a fresh backend.
pub async fn harness(clock: impl Clock + 'static) -> Harness {
    harness_with_token(clock, Some(TOKEN)).await
}

pub async fn harness_with_token(clock: impl Clock + 'static, token: Option<&str>) -> Harness {
    let backend = Arc::new(Backend::default());
    let url = spawn(backend.clone()).await;
    let config = Config::new(url.clone());
    let session = Session::new(token.map(str::to_string));
    let api = HttpApi::new(reqwest::Client::new(), url, session.clone());
    let state = AppState::with_api(config, session, Arc::new(api), Arc::new(clock));
    Harness { backend, state }
}
