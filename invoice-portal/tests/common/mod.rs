#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use invoice_portal::config::{get_configuration, StorageBackend};
use invoice_portal::models::invoice::{
    next_status, Invoice, InvoiceAction, InvoiceStatus, NewInvoice, PaymentRequest, RemarkRequest,
    ReuploadRequest,
};
use invoice_portal::models::user::{LoginRequest, Role, SignupRequest, UserProfile};
use invoice_portal::models::{AuditLogEntry, Vendor};
use invoice_portal::startup::Application;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use uuid::Uuid;

pub const VENDOR_EMAIL: &str = "ravi@acme.in";
pub const FINANCE_EMAIL: &str = "meera@finance.in";
pub const ADMIN_EMAIL: &str = "admin@portal.in";
pub const PASSWORD: &str = "s3cret";
pub const ACME_GST: &str = "29ABCDE1234F1Z5";

/// A request the fake backend received.
#[derive(Debug, Clone)]
pub struct Call {
    pub path: String,
    pub bearer: Option<String>,
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct Record {
    pub owner: String,
    pub invoice: Invoice,
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, (String, UserProfile)>,
    tokens: HashMap<String, String>,
    records: Vec<Record>,
    vendors: Vec<Vendor>,
    audit: Vec<AuditLogEntry>,
    calls: Vec<Call>,
    fail_with: Option<(u16, Value)>,
}

/// In-process stand-in for the invoice backend, enforcing the same lifecycle
/// table as the portal.
#[derive(Clone, Default)]
pub struct FakeBackend {
    inner: Arc<Mutex<Inner>>,
}

fn reject(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

impl FakeBackend {
    pub fn seeded() -> Self {
        let backend = Self::default();
        for (email, role) in [
            (VENDOR_EMAIL, Role::Vendor),
            (FINANCE_EMAIL, Role::Finance),
            (ADMIN_EMAIL, Role::Admin),
        ] {
            backend.add_user(email, role);
        }
        backend.inner.lock().unwrap().vendors.push(Vendor {
            id: "V-001".into(),
            name: "Acme Services".into(),
            address: "12 MG Road, Bengaluru".into(),
            state: "Karnataka".into(),
            gst_number: ACME_GST.into(),
            pan: "ABCDE1234F".into(),
        });
        backend
    }

    pub fn add_user(&self, email: &str, role: Role) {
        self.inner.lock().unwrap().users.insert(
            email.to_string(),
            (
                PASSWORD.to_string(),
                UserProfile {
                    email: email.to_string(),
                    role,
                    name: None,
                },
            ),
        );
    }

    pub fn records(&self) -> Vec<Record> {
        self.inner.lock().unwrap().records.clone()
    }

    pub fn invoice(&self, id: &str) -> Option<Invoice> {
        self.records()
            .into_iter()
            .map(|r| r.invoice)
            .find(|i| i.id() == id)
    }

    pub fn seed_invoice(&self, owner: &str, invoice: Invoice) {
        self.inner.lock().unwrap().records.push(Record {
            owner: owner.to_string(),
            invoice,
        });
    }

    pub fn vendors(&self) -> Vec<Vendor> {
        self.inner.lock().unwrap().vendors.clone()
    }

    pub fn seed_audit(&self, entries: Vec<AuditLogEntry>) {
        self.inner.lock().unwrap().audit = entries;
    }

    pub fn calls_to(&self, prefix: &str) -> Vec<Call> {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.path.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Invalidate every issued token, as if they had expired.
    pub fn revoke_tokens(&self) {
        self.inner.lock().unwrap().tokens.clear();
    }

    /// Answer the next mutating call with this status and body.
    pub fn fail_next(&self, status: u16, body: Value) {
        self.inner.lock().unwrap().fail_with = Some((status, body));
    }

    fn record_call(&self, path: String, headers: &HeaderMap, body: Value) {
        self.inner.lock().unwrap().calls.push(Call {
            path,
            bearer: bearer(headers),
            body,
        });
    }

    fn take_failure(&self) -> Option<Response> {
        self.inner.lock().unwrap().fail_with.take().map(|(status, body)| {
            (
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                Json(body),
            )
                .into_response()
        })
    }

    fn user_for(&self, headers: &HeaderMap) -> Result<UserProfile, Response> {
        let inner = self.inner.lock().unwrap();
        bearer(headers)
            .and_then(|token| inner.tokens.get(&token).cloned())
            .and_then(|email| inner.users.get(&email).map(|(_, u)| u.clone()))
            .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Invalid or expired token"))
    }

    fn transition(&self, id: &str, action: InvoiceAction, apply: impl FnOnce(&mut Invoice)) -> Response {
        let mut inner = self.inner.lock().unwrap();
        let Some(record) = inner.records.iter_mut().find(|r| r.invoice.id() == id) else {
            return reject(StatusCode::NOT_FOUND, "Invoice not found");
        };
        match next_status(Some(record.invoice.status), action) {
            Ok(next) => {
                apply(&mut record.invoice);
                record.invoice.status = next;
                Json(json!({ "message": "ok" })).into_response()
            }
            Err(e) => reject(StatusCode::CONFLICT, &e.to_string()),
        }
    }

    pub async fn spawn(&self) -> String {
        let router = Router::new()
            .route("/login", post(login))
            .route("/signup", post(signup))
            .route("/me", get(me))
            .route("/invoices", get(list_invoices))
            .route("/remark/:id", post(remark))
            .route("/send-for-payment/:id", post(send_for_payment))
            .route("/inbox/:email", get(inbox))
            .route("/vendor/upload", post(upload))
            .route("/reupload/:id", post(reupload))
            .route("/vendor/gst/:gst", get(vendor_by_gst))
            .route("/vendor", get(list_vendors).post(create_vendor))
            .route("/vendor/bulk-create", post(bulk_create))
            .route("/vendor/:id", delete(delete_vendor))
            .route("/:id", put(update_vendor))
            .route("/audit-logs", get(audit_logs))
            .with_state(self.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        address
    }
}

async fn login(State(backend): State<FakeBackend>, Json(body): Json<LoginRequest>) -> Response {
    let mut inner = backend.inner.lock().unwrap();
    match inner.users.get(&body.email).cloned() {
        Some((password, user)) if password == body.password => {
            let token = format!("token-{}", Uuid::new_v4());
            inner.tokens.insert(token.clone(), user.email.clone());
            Json(json!({ "token": token, "user": user })).into_response()
        }
        _ => reject(StatusCode::UNAUTHORIZED, "Invalid email or password"),
    }
}

async fn signup(State(backend): State<FakeBackend>, Json(body): Json<SignupRequest>) -> Response {
    let mut inner = backend.inner.lock().unwrap();
    if inner.users.contains_key(&body.email) {
        return reject(StatusCode::BAD_REQUEST, "User already exists");
    }
    inner.users.insert(
        body.email.clone(),
        (
            body.password,
            UserProfile {
                email: body.email,
                role: body.role,
                name: None,
            },
        ),
    );
    (StatusCode::CREATED, Json(json!({ "message": "created" }))).into_response()
}

async fn me(State(backend): State<FakeBackend>, headers: HeaderMap) -> Response {
    match backend.user_for(&headers) {
        Ok(user) => Json(user).into_response(),
        Err(response) => response,
    }
}

#[derive(Deserialize)]
struct StatusQuery {
    status: InvoiceStatus,
}

async fn list_invoices(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Query(query): Query<StatusQuery>,
) -> Response {
    if let Err(response) = backend.user_for(&headers) {
        return response;
    }
    let invoices: Vec<Invoice> = backend
        .records()
        .into_iter()
        .map(|r| r.invoice)
        .filter(|i| i.status == query.status)
        .collect();
    Json(invoices).into_response()
}

async fn remark(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<RemarkRequest>,
) -> Response {
    if let Err(response) = backend.user_for(&headers) {
        return response;
    }
    backend.record_call(format!("/remark/{}", id), &headers, json!(&body));
    if let Some(response) = backend.take_failure() {
        return response;
    }
    backend.transition(&id, InvoiceAction::SendRemark, |invoice| {
        invoice.remark = Some(body.remark);
        invoice.pdfs = body.pdfs;
    })
}

async fn send_for_payment(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<PaymentRequest>,
) -> Response {
    if let Err(response) = backend.user_for(&headers) {
        return response;
    }
    backend.record_call(format!("/send-for-payment/{}", id), &headers, json!(&body));
    if let Some(response) = backend.take_failure() {
        return response;
    }
    backend.transition(&id, InvoiceAction::SendForPayment, |_| {})
}

async fn inbox(State(backend): State<FakeBackend>, headers: HeaderMap, Path(email): Path<String>) -> Response {
    if let Err(response) = backend.user_for(&headers) {
        return response;
    }
    let invoices: Vec<Invoice> = backend
        .records()
        .into_iter()
        .filter(|r| r.owner == email && r.invoice.status == InvoiceStatus::ChangesRequested)
        .map(|r| r.invoice)
        .collect();
    Json(invoices).into_response()
}

async fn upload(State(backend): State<FakeBackend>, headers: HeaderMap, Json(body): Json<NewInvoice>) -> Response {
    if let Err(response) = backend.user_for(&headers) {
        return response;
    }
    backend.record_call("/vendor/upload".into(), &headers, json!(&body));
    if let Some(response) = backend.take_failure() {
        return response;
    }
    let status = match next_status(None, InvoiceAction::Submit) {
        Ok(status) => status,
        Err(e) => return reject(StatusCode::CONFLICT, &e.to_string()),
    };
    backend.seed_invoice(
        &body.email,
        Invoice {
            fields: body.fields,
            pdfs: body.pdfs,
            status,
            remark: None,
            reupload: false,
        },
    );
    (StatusCode::CREATED, Json(json!({ "message": "Invoice uploaded" }))).into_response()
}

async fn reupload(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ReuploadRequest>,
) -> Response {
    if let Err(response) = backend.user_for(&headers) {
        return response;
    }
    backend.record_call(format!("/reupload/{}", id), &headers, json!(&body));
    if let Some(response) = backend.take_failure() {
        return response;
    }
    backend.transition(&id, InvoiceAction::Reupload, |invoice| {
        invoice.pdfs.merge(&body.pdfs);
        invoice.fields = body.fields;
        invoice.reupload = body.reupload;
        invoice.remark = Some(body.remark);
    })
}

async fn vendor_by_gst(State(backend): State<FakeBackend>, headers: HeaderMap, Path(gst): Path<String>) -> Response {
    if let Err(response) = backend.user_for(&headers) {
        return response;
    }
    match backend.vendors().into_iter().find(|v| v.gst_number == gst) {
        Some(vendor) => Json(json!({ "vendor": vendor })).into_response(),
        None => reject(StatusCode::NOT_FOUND, "Vendor not found"),
    }
}

async fn list_vendors(State(backend): State<FakeBackend>, headers: HeaderMap) -> Response {
    if let Err(response) = backend.user_for(&headers) {
        return response;
    }
    Json(json!({ "vendors": backend.vendors() })).into_response()
}

async fn create_vendor(State(backend): State<FakeBackend>, headers: HeaderMap, Json(vendor): Json<Vendor>) -> Response {
    if let Err(response) = backend.user_for(&headers) {
        return response;
    }
    let mut inner = backend.inner.lock().unwrap();
    if inner.vendors.iter().any(|v| v.id == vendor.id) {
        return reject(StatusCode::BAD_REQUEST, "Vendor code already exists");
    }
    inner.vendors.push(vendor);
    (StatusCode::CREATED, Json(json!({ "message": "created" }))).into_response()
}

async fn update_vendor(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(vendor): Json<Vendor>,
) -> Response {
    if let Err(response) = backend.user_for(&headers) {
        return response;
    }
    let mut inner = backend.inner.lock().unwrap();
    match inner.vendors.iter_mut().find(|v| v.id == id) {
        Some(existing) => {
            *existing = vendor;
            Json(json!({ "message": "updated" })).into_response()
        }
        None => reject(StatusCode::NOT_FOUND, "Vendor not found"),
    }
}

async fn delete_vendor(State(backend): State<FakeBackend>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(response) = backend.user_for(&headers) {
        return response;
    }
    let mut inner = backend.inner.lock().unwrap();
    let before = inner.vendors.len();
    inner.vendors.retain(|v| v.id != id);
    if inner.vendors.len() == before {
        return reject(StatusCode::NOT_FOUND, "Vendor not found");
    }
    Json(json!({ "message": "deleted" })).into_response()
}

#[derive(Deserialize)]
struct BulkBody {
    vendors: Vec<Vendor>,
}

async fn bulk_create(State(backend): State<FakeBackend>, headers: HeaderMap, Json(body): Json<BulkBody>) -> Response {
    if let Err(response) = backend.user_for(&headers) {
        return response;
    }
    backend.record_call("/vendor/bulk-create".into(), &headers, json!({ "count": body.vendors.len() }));
    backend.inner.lock().unwrap().vendors.extend(body.vendors);
    (StatusCode::CREATED, Json(json!({ "message": "created" }))).into_response()
}

async fn audit_logs(State(backend): State<FakeBackend>, headers: HeaderMap) -> Response {
    if let Err(response) = backend.user_for(&headers) {
        return response;
    }
    let entries = backend.inner.lock().unwrap().audit.clone();
    Json(entries).into_response()
}

pub struct TestApp {
    pub address: String,
    pub backend: FakeBackend,
    pub storage: tempfile::TempDir,
    pub files_base: String,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let backend = FakeBackend::seeded();
        let backend_url = backend.spawn().await;
        let storage = tempfile::tempdir().expect("Failed to create storage dir");
        let files_base = "http://files.test/files".to_string();

        let mut settings = get_configuration().expect("Failed to load configuration");
        settings.server.host = "127.0.0.1".into();
        settings.server.port = 0;
        settings.backend.url = backend_url;
        settings.backend.timeout_seconds = 5;
        settings.storage.backend = StorageBackend::Local;
        settings.storage.local_path = storage.path().to_string_lossy().into_owned();
        settings.storage.public_url = Some(files_base.clone());

        let app = Application::build(settings)
            .await
            .expect("Failed to build test application");
        let address = format!("http://127.0.0.1:{}", app.port());
        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client.get(format!("{}/health", address)).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        TestApp {
            address,
            backend,
            storage,
            files_base,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// A browser: keeps cookies, does not follow redirects.
    pub fn browser(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap()
    }

    pub async fn login(&self, email: &str) -> reqwest::Client {
        let browser = self.browser();
        let response = browser
            .post(self.url("/login"))
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200, "login failed for {email}");
        browser
    }

    /// Storage key behind a URL this app handed out.
    pub fn key_of(&self, url: &str) -> String {
        url.strip_prefix(&format!("{}/", self.files_base))
            .expect("URL outside portal storage")
            .to_string()
    }

    pub fn stored(&self, url: &str) -> bool {
        self.storage.path().join(self.key_of(url)).exists()
    }
}

pub fn pdf_part(name: &str) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(b"%PDF-1.4 test".to_vec())
        .file_name(name.to_string())
        .mime_str("application/pdf")
        .unwrap()
}

pub fn png_part(name: &str) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(b"\x89PNG".to_vec())
        .file_name(name.to_string())
        .mime_str("image/png")
        .unwrap()
}

/// A complete pending invoice as the backend would hold it.
pub fn pending_invoice(id: &str, po_number: &str) -> Invoice {
    let mut invoice: Invoice = serde_json::from_value(json!({
        "id": id,
        "name": "Acme Services",
        "gst_number": ACME_GST,
        "po_number": po_number,
        "po_date": "2024-05-01",
        "taxable_amt": "1000",
        "status": "pending",
    }))
    .unwrap();
    invoice.pdfs.po_pdf = vec![format!("http://files.test/files/invoices/po_pdf_1_{}.pdf", po_number)];
    invoice
}
