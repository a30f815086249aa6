use invoice_portal::config::BackendSettings;
use invoice_portal::models::invoice::{InvoiceStatus, PaymentRequest, RemarkRequest};
use invoice_portal::services::backend_client::BackendClient;
use invoice_portal::services::session::SessionContext;
use serde_json::json;
use service_core::error::AppError;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> BackendClient {
    BackendClient::new(&BackendSettings {
        url: server.uri(),
        timeout_seconds: 5,
    })
    .unwrap()
}

fn session() -> SessionContext {
    SessionContext::new("tok-123", None)
}

#[tokio::test]
async fn sends_bearer_token_and_status_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/invoices"))
        .and(query_param("status", "changes_requested"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "V-001", "po_number": "PO-1", "status": "changes_requested" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let invoices = client(&server)
        .list_invoices(&session(), InvoiceStatus::ChangesRequested)
        .await
        .unwrap();

    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].id(), "V-001");
}

#[tokio::test]
async fn nulls_in_backend_records_do_not_break_lists() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/invoices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "V-001", "po_number": "PO-1", "status": "pending" },
            {
                "id": "V-002",
                "name": "Zenith Traders",
                "address": null,
                "po_number": 88,
                "po_date": null,
                "taxable_amt": null,
                "pdfs": null,
                "status": "pending",
                "remark": null,
                "reupload": null
            },
            {
                "id": "V-003",
                "pdfs": { "po_pdf": null, "invoice_pdf": ["https://b/inv.pdf"] },
                "status": "pending"
            }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vendor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "vendors": [{ "id": "V-002", "name": "Zenith Traders", "pan": null, "state": null }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/audit-logs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "timestamp": "2024-06-01T09:00:00Z", "action": "upload", "details": null, "role": null }
        ])))
        .mount(&server)
        .await;
    let client = client(&server);

    let invoices = client
        .list_invoices(&session(), InvoiceStatus::Pending)
        .await
        .unwrap();
    assert_eq!(invoices.len(), 3);
    assert_eq!(invoices[1].fields.address, "");
    assert_eq!(invoices[1].fields.po_number, "88");
    assert!(invoices[1].pdfs.is_empty());
    assert!(!invoices[1].reupload);
    assert_eq!(invoices[2].pdfs.invoice_pdf.len(), 1);

    let vendors = client.list_vendors(&session()).await.unwrap();
    assert_eq!(vendors[0].pan, "");

    let entries = client.audit_logs(&session()).await.unwrap();
    assert_eq!(entries[0].details, "");
    assert_eq!(entries[0].action, "upload");
}

#[tokio::test]
async fn remark_posts_remark_and_pdfs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/remark/V-001"))
        .and(body_json(json!({
            "remark": "Missing PAN copy",
            "pdfs": { "po_pdf": ["https://b/1.pdf"], "invoice_pdf": [] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut body = RemarkRequest {
        remark: "Missing PAN copy".into(),
        pdfs: Default::default(),
    };
    body.pdfs.po_pdf.push("https://b/1.pdf".into());

    client(&server)
        .send_remark(&session(), "V-001", &body)
        .await
        .unwrap();
}

#[tokio::test]
async fn inbox_is_addressed_by_email() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/inbox/ravi@acme.in"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let invoices = client(&server)
        .vendor_inbox(&session(), "ravi@acme.in")
        .await
        .unwrap();

    assert!(invoices.is_empty());
}

#[tokio::test]
async fn client_error_keeps_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send-for-payment/V-001"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({ "message": "Invoice already paid" })),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .send_for_payment(&session(), "V-001", &PaymentRequest { message: String::new() })
        .await
        .unwrap_err();

    match err {
        AppError::Upstream { status, message } => {
            assert_eq!(status, 409);
            assert_eq!(message.as_deref(), Some("Invoice already paid"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn error_field_is_used_when_message_is_absent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/audit-logs"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "error": "Admins only" })))
        .mount(&server)
        .await;

    let err = client(&server).audit_logs(&session()).await.unwrap_err();

    assert_eq!(err.user_message(), "Admins only");
}

#[tokio::test]
async fn server_error_without_body_uses_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vendor"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client(&server).list_vendors(&session()).await.unwrap_err();

    assert!(matches!(err, AppError::Upstream { status: 500, message: None }));
    assert_eq!(
        err.user_message(),
        service_core::error::UPSTREAM_FALLBACK_MESSAGE
    );
}

#[tokio::test]
async fn unauthorized_maps_to_session_expiry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client(&server).me(&session()).await.unwrap_err();

    assert!(matches!(err, AppError::Unauthorized(_)));
    assert_eq!(err.user_message(), "Session expired, please log in again");
}

#[tokio::test]
async fn unknown_gst_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vendor/gst/29ABCDE1234F1Z5"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Vendor not found" })))
        .mount(&server)
        .await;

    let vendor = client(&server)
        .vendor_by_gst(&session(), "29ABCDE1234F1Z5")
        .await
        .unwrap();

    assert!(vendor.is_none());
}

#[tokio::test]
async fn unreadable_success_body_is_a_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client(&server).login("a@b.in", "pw").await.unwrap_err();

    assert!(matches!(err, AppError::BadGateway(_)));
}

#[tokio::test]
async fn unreachable_backend_is_a_gateway_error() {
    let client = BackendClient::new(&BackendSettings {
        url: "http://127.0.0.1:1".into(),
        timeout_seconds: 2,
    })
    .unwrap();

    let err = client.me(&session()).await.unwrap_err();

    assert!(matches!(err, AppError::BadGateway(_)));
}
