use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::api::rest::SharedController;
use crate::engine::events::PushEvent;
use crate::error::AppError;
use crate::models::booking::{Booking, BookingStatus};
use crate::models::geo::GeoPoint;
use crate::models::session::{ControllerState, DeliverySession, MapView};

pub fn router() -> Router<SharedController> {
    Router::new()
        .route("/transporter", put(sign_in))
        .route("/device/location", put(update_device_location))
        .route("/overlay/close", post(close_overlay))
        .route("/sessions/:transporter_id", get(get_session))
        .route("/sessions/:transporter_id/map", get(get_map))
        .route("/sessions/:transporter_id/reconcile", post(reconcile))
        .route("/sessions/:transporter_id/complete", post(complete))
        .route("/sessions/:transporter_id/select", post(select_booking))
        .route("/sessions/:transporter_id/confirm", post(confirm_selected))
        .route("/sessions/:transporter_id/push", post(push))
        .route(
            "/sessions/:transporter_id/bookings/:booking_id/status",
            post(update_booking_status),
        )
}

#[derive(Deserialize)]
pub struct SignInRequest {
    pub transporter_id: String,
}

#[derive(Deserialize)]
pub struct SelectBookingRequest {
    pub booking_id: String,
}

#[derive(Deserialize)]
pub struct UpdateBookingStatusRequest {
    pub status: BookingStatus,
}

#[derive(Serialize)]
pub struct StateResponse {
    pub state: ControllerState,
}

#[derive(Serialize)]
pub struct CompleteResponse {
    pub completed: bool,
}

#[derive(Serialize)]
pub struct PushResponse {
    pub applied: bool,
}

async fn sign_in(
    State(controller): State<SharedController>,
    Json(payload): Json<SignInRequest>,
) -> Result<Json<StateResponse>, AppError> {
    if payload.transporter_id.trim().is_empty() {
        return Err(AppError::Validation(
            "transporter_id cannot be empty".to_string(),
        ));
    }

    let state = controller.sign_in(&payload.transporter_id).await;
    Ok(Json(StateResponse { state }))
}

async fn update_device_location(
    State(controller): State<SharedController>,
    Json(point): Json<GeoPoint>,
) -> Result<Json<GeoPoint>, AppError> {
    if !point.is_valid() {
        return Err(AppError::Validation(format!(
            "coordinates out of range: {}, {}",
            point.lat, point.lng
        )));
    }

    controller.state().set_device_location(point).await;
    Ok(Json(point))
}

async fn close_overlay(State(controller): State<SharedController>) -> Json<StateResponse> {
    controller.close_overlay().await;
    let state = match controller.state().transporter_id().await {
        Some(id) => controller
            .state()
            .session(&id)
            .map(|s| s.state)
            .unwrap_or(ControllerState::NoSession),
        None => ControllerState::NoSession,
    };
    Json(StateResponse { state })
}

async fn get_session(
    State(controller): State<SharedController>,
    Path(transporter_id): Path<String>,
) -> Result<Json<DeliverySession>, AppError> {
    controller
        .state()
        .session(&transporter_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no active session for {transporter_id}")))
}

async fn get_map(
    State(controller): State<SharedController>,
    Path(transporter_id): Path<String>,
) -> Result<Json<MapView>, AppError> {
    controller
        .state()
        .session(&transporter_id)
        .map(|s| Json(s.map))
        .ok_or_else(|| AppError::NotFound(format!("no active session for {transporter_id}")))
}

async fn reconcile(
    State(controller): State<SharedController>,
    Path(transporter_id): Path<String>,
) -> Json<StateResponse> {
    let state = controller.reconcile(&transporter_id).await;
    Json(StateResponse { state })
}

async fn complete(
    State(controller): State<SharedController>,
    Path(transporter_id): Path<String>,
) -> Result<Json<CompleteResponse>, AppError> {
    let completed = controller.try_complete_session(&transporter_id).await?;
    Ok(Json(CompleteResponse { completed }))
}

async fn select_booking(
    State(controller): State<SharedController>,
    Path(transporter_id): Path<String>,
    Json(payload): Json<SelectBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = controller
        .select_booking(&transporter_id, &payload.booking_id)
        .await?;
    Ok(Json(booking))
}

async fn confirm_selected(
    State(controller): State<SharedController>,
    Path(transporter_id): Path<String>,
) -> Result<Json<DeliverySession>, AppError> {
    let session = controller.confirm_selected_booking(&transporter_id).await?;
    Ok(Json(session))
}

async fn push(
    State(controller): State<SharedController>,
    Path(transporter_id): Path<String>,
    Json(event): Json<PushEvent>,
) -> Json<PushResponse> {
    let applied = controller.apply_push(&transporter_id, event).await;
    Json(PushResponse { applied })
}

async fn update_booking_status(
    State(controller): State<SharedController>,
    Path((transporter_id, booking_id)): Path<(String, String)>,
    Json(payload): Json<UpdateBookingStatusRequest>,
) -> Result<Json<DeliverySession>, AppError> {
    let session = controller
        .update_booking_status(&transporter_id, &booking_id, payload.status)
        .await?;
    Ok(Json(session))
}
