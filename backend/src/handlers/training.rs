//! Training session, attendance and certificate handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{
    ApiResponse, Guard, PaginatedData, ATTENDANCE_MANAGEMENT, CERTIFICATE_MANAGEMENT,
    TRAINING_ATTEND, TRAINING_MANAGEMENT,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::attendance::{
    AttendanceRecord, CheckInInput, GenerateQrInput, ManualAttendanceInput, QrCode,
};
use crate::services::certificate::{Certificate, CertificateQuery, IssueCertificateInput};
use crate::services::training::{
    CreateSessionInput, SessionQuery, TrainingSession, UpdateSessionInput,
};
use crate::services::{AttendanceService, CertificateService, TrainingService};
use crate::AppState;

/// Volunteers and above; keeps civilians out by level
const MEMBERS: Guard = Guard::MinLevel(20);
const MANAGE_TRAINING: Guard = Guard::Permission(TRAINING_MANAGEMENT);
const MANAGE_ATTENDANCE: Guard = Guard::Permission(ATTENDANCE_MANAGEMENT);
const MANAGE_CERTIFICATES: Guard = Guard::Permission(CERTIFICATE_MANAGEMENT);

pub async fn list_training_sessions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<SessionQuery>,
) -> AppResult<Json<ApiResponse<PaginatedData<TrainingSession>>>> {
    user.authorize(&[MEMBERS])?;
    let sessions = TrainingService::new(state.db.clone()).list(query).await?;
    Ok(Json(ApiResponse::ok("Training sessions retrieved", sessions)))
}

pub async fn get_training_session(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<TrainingSession>>> {
    user.authorize(&[MEMBERS])?;
    let session = TrainingService::new(state.db.clone()).get(session_id).await?;
    Ok(Json(ApiResponse::ok("Training session retrieved", session)))
}

pub async fn create_training_session(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateSessionInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<TrainingSession>>)> {
    user.authorize(&[MANAGE_TRAINING])?;
    let session = TrainingService::new(state.db.clone())
        .create(user.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Training session created", session))))
}

pub async fn update_training_session(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<Uuid>,
    Json(input): Json<UpdateSessionInput>,
) -> AppResult<Json<ApiResponse<TrainingSession>>> {
    user.authorize(&[MANAGE_TRAINING])?;
    let session = TrainingService::new(state.db.clone())
        .update(session_id, input)
        .await?;
    Ok(Json(ApiResponse::ok("Training session updated", session)))
}

pub async fn delete_training_session(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    user.authorize(&[MANAGE_TRAINING])?;
    TrainingService::new(state.db.clone()).delete(session_id).await?;
    Ok(Json(ApiResponse::message("Training session deleted")))
}

pub async fn generate_session_qr(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<Uuid>,
    input: Option<Json<GenerateQrInput>>,
) -> AppResult<(StatusCode, Json<ApiResponse<QrCode>>)> {
    user.authorize(&[MANAGE_ATTENDANCE])?;
    let input = input.map(|Json(i)| i).unwrap_or_default();
    let qr = AttendanceService::new(state.db.clone(), &state.config)
        .generate_qr(user.user_id, session_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("QR code generated", qr))))
}

pub async fn list_session_attendance(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<AttendanceRecord>>>> {
    user.authorize(&[MANAGE_ATTENDANCE])?;
    let records = AttendanceService::new(state.db.clone(), &state.config)
        .list_for_session(session_id)
        .await?;
    Ok(Json(ApiResponse::ok("Attendance retrieved", records)))
}

pub async fn record_session_attendance(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<Uuid>,
    Json(input): Json<ManualAttendanceInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<AttendanceRecord>>)> {
    user.authorize(&[MANAGE_ATTENDANCE])?;
    let record = AttendanceService::new(state.db.clone(), &state.config)
        .record_manual(user.user_id, session_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Attendance recorded", record))))
}

pub async fn check_in(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CheckInInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<AttendanceRecord>>)> {
    user.authorize(&[Guard::AnyPermission(&[TRAINING_ATTEND, ATTENDANCE_MANAGEMENT])])?;
    let record = AttendanceService::new(state.db.clone(), &state.config)
        .check_in(user.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Checked in", record))))
}

pub async fn my_attendance(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<AttendanceRecord>>>> {
    user.authorize(&[MEMBERS])?;
    let records = AttendanceService::new(state.db.clone(), &state.config)
        .list_for_user(user.user_id)
        .await?;
    Ok(Json(ApiResponse::ok("Attendance retrieved", records)))
}

pub async fn list_certificates(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<CertificateQuery>,
) -> AppResult<Json<ApiResponse<PaginatedData<Certificate>>>> {
    user.authorize(&[MANAGE_CERTIFICATES])?;
    let certificates = CertificateService::new(state.db.clone()).list(query).await?;
    Ok(Json(ApiResponse::ok("Certificates retrieved", certificates)))
}

pub async fn my_certificates(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<Certificate>>>> {
    user.authorize(&[MEMBERS])?;
    let certificates = CertificateService::new(state.db.clone())
        .list_for_user(user.user_id)
        .await?;
    Ok(Json(ApiResponse::ok("Certificates retrieved", certificates)))
}

pub async fn get_certificate(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(certificate_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Certificate>>> {
    let certificate = CertificateService::new(state.db.clone())
        .get(&user, certificate_id)
        .await?;
    Ok(Json(ApiResponse::ok("Certificate retrieved", certificate)))
}

pub async fn issue_certificate(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<IssueCertificateInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<Certificate>>)> {
    user.authorize(&[MANAGE_CERTIFICATES])?;
    let certificate = CertificateService::new(state.db.clone())
        .issue(user.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Certificate issued", certificate))))
}

pub async fn delete_certificate(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(certificate_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    user.authorize(&[MANAGE_CERTIFICATES])?;
    CertificateService::new(state.db.clone()).delete(certificate_id).await?;
    Ok(Json(ApiResponse::message("Certificate deleted")))
}
