use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::client::DeliveryRouteService;
use crate::error::AppError;
use crate::models::service::{ActiveRoute, BookingStatusUpdate, RouteInfo, ServiceStatusUpdate};

pub struct HttpRouteService {
    http: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    error: String,
}

impl HttpRouteService {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::Internal(format!("failed to build http client: {err}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn route_info(
        &self,
        path: &str,
        transporter_id: &str,
    ) -> Result<Option<ActiveRoute>, AppError> {
        let url = format!("{}/{path}/{transporter_id}", self.base_url);
        let response = self.authorized(self.http.get(&url)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(path, transporter_id, "no active route");
            return Ok(None);
        }

        let response = ensure_success(response).await?;
        let info: RouteInfo = response.json().await?;
        Ok(info.into_active_route())
    }

    async fn post_status<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(), AppError> {
        let url = format!("{}/{path}", self.base_url);
        let response = self.authorized(self.http.post(&url)).json(body).send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}

/// Only 200 counts as accepted; any other status becomes a rejection carrying
/// the backend's `error` message when it sent one.
async fn ensure_success(response: Response) -> Result<Response, AppError> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(response);
    }

    let raw = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&raw)
        .map(|body| body.error)
        .unwrap_or_else(|_| format!("unexpected response status {status}"));

    Err(AppError::ServerRejection {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl DeliveryRouteService for HttpRouteService {
    async fn picking_info(&self, transporter_id: &str) -> Result<Option<ActiveRoute>, AppError> {
        self.route_info("get_picking_routes_info", transporter_id).await
    }

    async fn transit_info(&self, transporter_id: &str) -> Result<Option<ActiveRoute>, AppError> {
        self.route_info("get_transit_routes_info", transporter_id).await
    }

    async fn update_service_status(&self, update: &ServiceStatusUpdate) -> Result<(), AppError> {
        self.post_status("update-transport_service-status", update).await
    }

    async fn update_booking_status(&self, update: &BookingStatusUpdate) -> Result<(), AppError> {
        self.post_status("update-transport_booking-status", update).await
    }
}
