//! Member endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::member::{CreateMember, Member, MemberQuery, MemberSummary, UpdateMember},
};

use super::{AuthenticatedLibrarian, MessageResponse};

#[derive(Serialize, ToSchema)]
pub struct MemberResponse {
    pub member: Member,
    pub message: String,
}

/// List members with their current number of borrowed books
#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    security(("bearer_auth" = [])),
    params(MemberQuery),
    responses(
        (status = 200, description = "Members ordered by id", body = Vec<MemberSummary>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_members(
    State(state): State<crate::AppState>,
    AuthenticatedLibrarian(_claims): AuthenticatedLibrarian,
    Query(query): Query<MemberQuery>,
) -> AppResult<Json<Vec<MemberSummary>>> {
    let members = state.services.patrons.list_members(&query).await?;
    Ok(Json(members))
}

#[utoipa::path(
    get,
    path = "/members/{id}",
    tag = "members",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Member ID, e.g. MEM-001")
    ),
    responses(
        (status = 200, description = "Member details", body = MemberSummary),
        (status = 404, description = "Member not found")
    )
)]
pub async fn get_member(
    State(state): State<crate::AppState>,
    AuthenticatedLibrarian(_claims): AuthenticatedLibrarian,
    Path(id): Path<String>,
) -> AppResult<Json<MemberSummary>> {
    let member = state.services.patrons.get_member(&id).await?;
    Ok(Json(member))
}

/// Register a member
#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    security(("bearer_auth" = [])),
    request_body = CreateMember,
    responses(
        (status = 201, description = "Member registered", body = MemberResponse),
        (status = 400, description = "Invalid email or mobile number"),
        (status = 409, description = "Email already exists")
    )
)]
pub async fn create_member(
    State(state): State<crate::AppState>,
    AuthenticatedLibrarian(_claims): AuthenticatedLibrarian,
    Json(request): Json<CreateMember>,
) -> AppResult<(StatusCode, Json<MemberResponse>)> {
    let member = state.services.patrons.add_member(&request).await?;
    let message = format!("Member {} added successfully", member.member_id);
    Ok((StatusCode::CREATED, Json(MemberResponse { member, message })))
}

#[utoipa::path(
    put,
    path = "/members/{id}",
    tag = "members",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Member ID")
    ),
    request_body = UpdateMember,
    responses(
        (status = 200, description = "Member updated", body = MemberResponse),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Member not found"),
        (status = 409, description = "Email already exists")
    )
)]
pub async fn update_member(
    State(state): State<crate::AppState>,
    AuthenticatedLibrarian(_claims): AuthenticatedLibrarian,
    Path(id): Path<String>,
    Json(request): Json<UpdateMember>,
) -> AppResult<Json<MemberResponse>> {
    let member = state.services.patrons.update_member(&id, &request).await?;
    Ok(Json(MemberResponse {
        member,
        message: "Member updated successfully".to_string(),
    }))
}

#[utoipa::path(
    delete,
    path = "/members/{id}",
    tag = "members",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Member deleted", body = MessageResponse),
        (status = 404, description = "Member not found"),
        (status = 409, description = "Member has active loans")
    )
)]
pub async fn delete_member(
    State(state): State<crate::AppState>,
    AuthenticatedLibrarian(_claims): AuthenticatedLibrarian,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    state.services.patrons.delete_member(&id).await?;
    Ok(Json(MessageResponse::new("Member deleted successfully")))
}
