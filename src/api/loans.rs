//! Circulation endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    circulation::format_currency,
    error::AppResult,
    models::loan::{IssueLoan, Loan, LoanDetails, LoanQuery, UpdateLoan},
    services::circulation::{FinePreview, LoanReceipt, SweepReport},
};

use super::AuthenticatedLibrarian;

/// Loan after a circulation action
#[derive(Serialize, ToSchema)]
pub struct LoanResponse {
    pub loan: Loan,
    /// Extra information for the operator, e.g. a member activation
    pub notice: Option<String>,
    pub message: String,
}

impl LoanResponse {
    fn from_receipt(receipt: LoanReceipt, message: String) -> Self {
        Self {
            loan: receipt.loan,
            notice: receipt.notice,
            message,
        }
    }
}

/// List loans, bringing overdue statuses up to date first
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanQuery),
    responses(
        (status = 200, description = "Loans ordered by due date", body = Vec<LoanDetails>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    AuthenticatedLibrarian(_claims): AuthenticatedLibrarian,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.circulation.list_loans(&query).await?;
    Ok(Json(loans))
}

#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    AuthenticatedLibrarian(_claims): AuthenticatedLibrarian,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.circulation.get_loan(id).await?;
    Ok(Json(loan))
}

/// Issue a book to a member
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = IssueLoan,
    responses(
        (status = 201, description = "Book issued", body = LoanResponse),
        (status = 400, description = "Invalid borrowing period"),
        (status = 404, description = "Book or member not found"),
        (status = 409, description = "Book is not available for borrowing")
    )
)]
pub async fn issue_loan(
    State(state): State<crate::AppState>,
    AuthenticatedLibrarian(_claims): AuthenticatedLibrarian,
    Json(request): Json<IssueLoan>,
) -> AppResult<(StatusCode, Json<LoanResponse>)> {
    let receipt = state.services.circulation.issue(&request).await?;
    let message = format!(
        "Book {} issued to {}, due {}",
        receipt.loan.book_id, receipt.loan.member_id, receipt.loan.due_date
    );
    Ok((StatusCode::CREATED, Json(LoanResponse::from_receipt(receipt, message))))
}

/// Overwrite a loan record
#[utoipa::path(
    put,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow ID")
    ),
    request_body = UpdateLoan,
    responses(
        (status = 200, description = "Loan updated", body = LoanResponse),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Loan, book or member not found"),
        (status = 409, description = "Book not available or loan changed concurrently")
    )
)]
pub async fn update_loan(
    State(state): State<crate::AppState>,
    AuthenticatedLibrarian(_claims): AuthenticatedLibrarian,
    Path(id): Path<i32>,
    Json(request): Json<UpdateLoan>,
) -> AppResult<Json<LoanResponse>> {
    let receipt = state.services.circulation.update_loan(id, &request).await?;
    Ok(Json(LoanResponse::from_receipt(
        receipt,
        "Loan updated successfully".to_string(),
    )))
}

/// Delete a loan record and release its book
#[utoipa::path(
    delete,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow ID")
    ),
    responses(
        (status = 200, description = "Loan deleted", body = LoanResponse),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn delete_loan(
    State(state): State<crate::AppState>,
    AuthenticatedLibrarian(_claims): AuthenticatedLibrarian,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanResponse>> {
    let loan = state.services.circulation.delete_loan(id).await?;
    Ok(Json(LoanResponse {
        loan,
        notice: None,
        message: "Loan deleted successfully".to_string(),
    }))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = LoanResponse),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan already returned")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    AuthenticatedLibrarian(_claims): AuthenticatedLibrarian,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanResponse>> {
    let receipt = state.services.circulation.return_loan(id).await?;
    let message = if receipt.loan.fine_amount.is_zero() {
        "Book returned successfully".to_string()
    } else {
        format!(
            "Book returned successfully. Fine due: {}",
            format_currency(receipt.loan.fine_amount)
        )
    };
    Ok(Json(LoanResponse::from_receipt(receipt, message)))
}

/// Mark a book as lost
#[utoipa::path(
    post,
    path = "/loans/{id}/lost",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow ID")
    ),
    responses(
        (status = 200, description = "Book marked lost", body = LoanResponse),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan is not borrowed or overdue")
    )
)]
pub async fn mark_lost(
    State(state): State<crate::AppState>,
    AuthenticatedLibrarian(_claims): AuthenticatedLibrarian,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanResponse>> {
    let receipt = state.services.circulation.mark_lost(id).await?;
    let message = format!(
        "Book marked as lost. Fine due: {}",
        format_currency(receipt.loan.fine_amount)
    );
    Ok(Json(LoanResponse::from_receipt(receipt, message)))
}

/// Current potential fine for a loan
#[utoipa::path(
    get,
    path = "/loans/{id}/fine",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow ID")
    ),
    responses(
        (status = 200, description = "Fine preview", body = FinePreview),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn fine_preview(
    State(state): State<crate::AppState>,
    AuthenticatedLibrarian(_claims): AuthenticatedLibrarian,
    Path(id): Path<i32>,
) -> AppResult<Json<FinePreview>> {
    let preview = state.services.circulation.fine_preview(id).await?;
    Ok(Json(preview))
}

/// Run the overdue sweep now
#[utoipa::path(
    post,
    path = "/loans/sweep",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sweep finished", body = SweepReport)
    )
)]
pub async fn run_sweep(
    State(state): State<crate::AppState>,
    AuthenticatedLibrarian(_claims): AuthenticatedLibrarian,
) -> AppResult<Json<SweepReport>> {
    let report = state.services.circulation.sweep().await?;
    Ok(Json(report))
}
