//! REST client for the invoice backend.
//!
//! Every call made on behalf of a signed-in user takes the caller's
//! [`SessionContext`] and sends its bearer token. Non-2xx answers become
//! [`AppError::Upstream`] carrying the backend's `message` (or `error`) field;
//! a 401 becomes [`AppError::Unauthorized`].

use crate::config::BackendSettings;
use crate::models::audit::AuditLogEntry;
use crate::models::invoice::{
    Invoice, InvoiceStatus, NewInvoice, PaymentRequest, RemarkRequest, ReuploadRequest,
};
use crate::models::user::{LoginRequest, LoginResponse, SignupRequest, UserProfile};
use crate::models::vendor::{BulkCreateVendors, Vendor, VendorList, VendorLookup};
use crate::services::session::SessionContext;
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use service_core::observability::{TracedClientExt, TracedRequest};
use std::time::Duration;

pub struct BackendClient {
    client: Client,
    base_url: Url,
}

impl BackendClient {
    pub fn new(settings: &BackendSettings) -> Result<Self, AppError> {
        let base_url = Url::parse(&settings.url).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Invalid backend url '{}': {}",
                settings.url,
                e
            ))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Backend url '{}' cannot carry a path",
                settings.url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Build `<base>/<segment>/<segment>...`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str], session: Option<&SessionContext>) -> TracedRequest {
        self.client
            .traced(method, self.endpoint(segments))
            .maybe_bearer_auth(session.map(|s| s.token()))
    }

    async fn send(&self, request: TracedRequest, operation: &'static str) -> Result<Response, AppError> {
        let response = request.send().await.map_err(|e| {
            tracing::error!(operation, error = %e, "Backend request failed");
            AppError::BadGateway(format!("{} failed: {}", operation, e))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| {
                body.get("message")
                    .or_else(|| body.get("error"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            });

        tracing::warn!(
            operation,
            status = status.as_u16(),
            message = message.as_deref().unwrap_or("-"),
            "Backend rejected request"
        );

        if status == StatusCode::UNAUTHORIZED {
            return Err(AppError::Unauthorized(anyhow::anyhow!(message
                .unwrap_or_else(|| "Session expired, please log in again".to_string()))));
        }

        Err(AppError::Upstream {
            status: status.as_u16(),
            message,
        })
    }

    async fn read<T: DeserializeOwned>(response: Response, operation: &'static str) -> Result<T, AppError> {
        response.json::<T>().await.map_err(|e| {
            tracing::error!(operation, error = %e, "Unreadable backend response");
            AppError::BadGateway(format!("{} returned an unreadable body: {}", operation, e))
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AppError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self
            .send(self.request(Method::POST, &["login"], None).json(&body), "login")
            .await?;
        Self::read(response, "login").await
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<(), AppError> {
        self.send(
            self.request(Method::POST, &["signup"], None).json(request),
            "signup",
        )
        .await?;
        Ok(())
    }

    /// Resolve the identity behind the session's token.
    pub async fn me(&self, session: &SessionContext) -> Result<UserProfile, AppError> {
        let response = self
            .send(self.request(Method::GET, &["me"], Some(session)), "me")
            .await?;
        Self::read(response, "me").await
    }

    pub async fn list_invoices(
        &self,
        session: &SessionContext,
        status: InvoiceStatus,
    ) -> Result<Vec<Invoice>, AppError> {
        let response = self
            .send(
                self.request(Method::GET, &["invoices"], Some(session))
                    .query(&[("status", status.as_str())]),
                "list_invoices",
            )
            .await?;
        Self::read(response, "list_invoices").await
    }

    pub async fn send_remark(
        &self,
        session: &SessionContext,
        invoice_id: &str,
        body: &RemarkRequest,
    ) -> Result<(), AppError> {
        self.send(
            self.request(Method::POST, &["remark", invoice_id], Some(session))
                .json(body),
            "send_remark",
        )
        .await?;
        Ok(())
    }

    pub async fn send_for_payment(
        &self,
        session: &SessionContext,
        invoice_id: &str,
        body: &PaymentRequest,
    ) -> Result<(), AppError> {
        self.send(
            self.request(Method::POST, &["send-for-payment", invoice_id], Some(session))
                .json(body),
            "send_for_payment",
        )
        .await?;
        Ok(())
    }

    /// Invoices flagged for the vendor with this e-mail.
    pub async fn vendor_inbox(
        &self,
        session: &SessionContext,
        email: &str,
    ) -> Result<Vec<Invoice>, AppError> {
        let response = self
            .send(
                self.request(Method::GET, &["inbox", email], Some(session)),
                "vendor_inbox",
            )
            .await?;
        Self::read(response, "vendor_inbox").await
    }

    pub async fn submit_invoice(
        &self,
        session: &SessionContext,
        body: &NewInvoice,
    ) -> Result<(), AppError> {
        self.send(
            self.request(Method::POST, &["vendor", "upload"], Some(session))
                .json(body),
            "submit_invoice",
        )
        .await?;
        Ok(())
    }

    pub async fn reupload_invoice(
        &self,
        session: &SessionContext,
        invoice_id: &str,
        body: &ReuploadRequest,
    ) -> Result<(), AppError> {
        self.send(
            self.request(Method::POST, &["reupload", invoice_id], Some(session))
                .json(body),
            "reupload_invoice",
        )
        .await?;
        Ok(())
    }

    /// Vendor master lookup used to autofill the submission form.
    pub async fn vendor_by_gst(
        &self,
        session: &SessionContext,
        gst_number: &str,
    ) -> Result<Option<Vendor>, AppError> {
        let request = self.request(Method::GET, &["vendor", "gst", gst_number], Some(session));
        match self.send(request, "vendor_by_gst").await {
            Ok(response) => Ok(Self::read::<VendorLookup>(response, "vendor_by_gst")
                .await?
                .vendor),
            Err(AppError::Upstream { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn list_vendors(&self, session: &SessionContext) -> Result<Vec<Vendor>, AppError> {
        let response = self
            .send(
                self.request(Method::GET, &["vendor"], Some(session)),
                "list_vendors",
            )
            .await?;
        Ok(Self::read::<VendorList>(response, "list_vendors")
            .await?
            .vendors)
    }

    pub async fn create_vendor(&self, session: &SessionContext, vendor: &Vendor) -> Result<(), AppError> {
        self.send(
            self.request(Method::POST, &["vendor"], Some(session))
                .json(vendor),
            "create_vendor",
        )
        .await?;
        Ok(())
    }

    /// The backend mounts vendor updates at the root: `PUT /:id`.
    pub async fn update_vendor(&self, session: &SessionContext, vendor: &Vendor) -> Result<(), AppError> {
        self.send(
            self.request(Method::PUT, &[vendor.id.as_str()], Some(session))
                .json(vendor),
            "update_vendor",
        )
        .await?;
        Ok(())
    }

    pub async fn delete_vendor(&self, session: &SessionContext, vendor_id: &str) -> Result<(), AppError> {
        self.send(
            self.request(Method::DELETE, &["vendor", vendor_id], Some(session)),
            "delete_vendor",
        )
        .await?;
        Ok(())
    }

    pub async fn bulk_create_vendors(
        &self,
        session: &SessionContext,
        vendors: &[Vendor],
    ) -> Result<(), AppError> {
        self.send(
            self.request(Method::POST, &["vendor", "bulk-create"], Some(session))
                .json(&BulkCreateVendors { vendors }),
            "bulk_create_vendors",
        )
        .await?;
        Ok(())
    }

    pub async fn audit_logs(&self, session: &SessionContext) -> Result<Vec<AuditLogEntry>, AppError> {
        let response = self
            .send(
                self.request(Method::GET, &["audit-logs"], Some(session)),
                "audit_logs",
            )
            .await?;
        Self::read(response, "audit_logs").await
    }
}
