//! Members repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use super::{map_unique_violation, search_pattern};
use crate::{
    error::{AppError, AppResult},
    models::member::{Member, MemberQuery, MemberRow, MemberSummary, MemberSummaryRow, UpdateMember},
};

const EMAIL_TAKEN: (&str, &str) = ("members_email_key", "Email already exists");

const SUMMARY_SELECT: &str = r#"
    SELECT m.*, COUNT(bb.borrow_id) AS borrowed_count
    FROM members m
    LEFT JOIN borrowed_books bb ON m.member_id = bb.member_id AND bb.status = 'Borrowed'
"#;

#[async_trait]
pub trait MemberRepository: Send + Sync {
    async fn last_id(&self) -> AppResult<Option<String>>;
    /// Insert a member. `DuplicateId` when its id is taken, `Conflict` on a duplicate email.
    async fn create(&self, member: &Member) -> AppResult<Member>;
    async fn get_by_id(&self, member_id: &str) -> AppResult<Member>;
    async fn get_summary(&self, member_id: &str) -> AppResult<MemberSummary>;
    async fn search(&self, query: &MemberQuery) -> AppResult<Vec<MemberSummary>>;
    async fn update(&self, member_id: &str, fields: &UpdateMember, at: DateTime<Utc>) -> AppResult<Member>;
    /// Delete the member unless they still hold an active loan
    async fn delete_if_idle(&self, member_id: &str) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgMemberRepository {
    pool: Pool<Postgres>,
}

impl PgMemberRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberRepository for PgMemberRepository {
    async fn last_id(&self) -> AppResult<Option<String>> {
        let id = sqlx::query_scalar::<_, String>(
            "SELECT member_id FROM members ORDER BY length(member_id) DESC, member_id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn create(&self, member: &Member) -> AppResult<Member> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            INSERT INTO members (member_id, full_name, email, mobile_number, status, added_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&member.member_id)
        .bind(&member.full_name)
        .bind(&member.email)
        .bind(&member.mobile_number)
        .bind(member.status.as_str())
        .bind(member.added_at)
        .bind(member.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "members_pkey", &member.member_id, &[EMAIL_TAKEN]))?;

        row.try_into()
    }

    async fn get_by_id(&self, member_id: &str) -> AppResult<Member> {
        sqlx::query_as::<_, MemberRow>("SELECT * FROM members WHERE member_id = $1")
            .bind(member_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member {} not found", member_id)))?
            .try_into()
    }

    async fn get_summary(&self, member_id: &str) -> AppResult<MemberSummary> {
        let query = format!("{} WHERE m.member_id = $1 GROUP BY m.member_id", SUMMARY_SELECT);
        sqlx::query_as::<_, MemberSummaryRow>(&query)
            .bind(member_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member {} not found", member_id)))?
            .try_into()
    }

    async fn search(&self, query: &MemberQuery) -> AppResult<Vec<MemberSummary>> {
        let sql = format!(
            r#"{}
            WHERE ($1::text IS NULL OR m.status = $1)
              AND ($2::text IS NULL
                   OR m.member_id ILIKE $2 ESCAPE '\' OR m.full_name ILIKE $2 ESCAPE '\'
                   OR m.email ILIKE $2 ESCAPE '\' OR m.mobile_number ILIKE $2 ESCAPE '\')
            GROUP BY m.member_id
            ORDER BY length(m.member_id), m.member_id
            "#,
            SUMMARY_SELECT
        );
        let rows = sqlx::query_as::<_, MemberSummaryRow>(&sql)
            .bind(query.status.map(|s| s.as_str()))
            .bind(search_pattern(query.search.as_deref()))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(MemberSummary::try_from).collect()
    }

    async fn update(&self, member_id: &str, fields: &UpdateMember, at: DateTime<Utc>) -> AppResult<Member> {
        sqlx::query_as::<_, MemberRow>(
            r#"
            UPDATE members
            SET full_name = $2, email = $3, mobile_number = $4, status = $5, updated_at = $6
            WHERE member_id = $1
            RETURNING *
            "#,
        )
        .bind(member_id)
        .bind(&fields.full_name)
        .bind(&fields.email)
        .bind(&fields.mobile_number)
        .bind(fields.status.as_str())
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "members_pkey", member_id, &[EMAIL_TAKEN]))?
        .ok_or_else(|| AppError::NotFound(format!("Member {} not found", member_id)))?
        .try_into()
    }

    async fn delete_if_idle(&self, member_id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM members
            WHERE member_id = $1
              AND NOT EXISTS (
                  SELECT 1 FROM borrowed_books
                  WHERE member_id = $1 AND status IN ('Borrowed', 'Overdue', 'Lost')
              )
            "#,
        )
        .bind(member_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
