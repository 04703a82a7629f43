//! Member (patron) service

use std::sync::Arc;

use validator::Validate;

use super::not_found_as;
use crate::{
    circulation::{generate_id, validate_email, validate_mobile, MEMBER_PREFIX},
    clock::Clock,
    error::{AppError, AppResult},
    models::member::{CreateMember, Member, MemberQuery, MemberStatus, MemberSummary, UpdateMember},
    repository::Repository,
};

#[derive(Clone)]
pub struct PatronsService {
    repository: Repository,
    clock: Arc<dyn Clock>,
    id_retry_attempts: u32,
}

fn check_contact(email: &str, mobile_number: &str) -> AppResult<()> {
    if !validate_email(email) {
        return Err(AppError::Validation("Invalid email format".to_string()));
    }
    if !validate_mobile(mobile_number) {
        return Err(AppError::Validation(
            "Invalid mobile format. Use: +63 9XX XXX XXXX".to_string(),
        ));
    }
    Ok(())
}

impl PatronsService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>, id_retry_attempts: u32) -> Self {
        Self {
            repository,
            clock,
            id_retry_attempts,
        }
    }

    /// Register a member with the next `MEM-NNN` id. New members start Active.
    pub async fn add_member(&self, request: &CreateMember) -> AppResult<Member> {
        let request = request.trimmed();
        request.validate()?;
        check_contact(&request.email, &request.mobile_number)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let last_id = self.repository.members.last_id().await?;
            let now = self.clock.now();
            let member = Member {
                member_id: generate_id(MEMBER_PREFIX, last_id.as_deref())?,
                full_name: request.full_name.clone(),
                email: request.email.clone(),
                mobile_number: request.mobile_number.clone(),
                status: MemberStatus::Active,
                added_at: now,
                updated_at: now,
            };

            match self.repository.members.create(&member).await {
                Err(AppError::DuplicateId(id)) if attempt < self.id_retry_attempts => {
                    tracing::warn!(member_id = %id, attempt, "Member id taken concurrently, retrying");
                }
                Ok(member) => {
                    tracing::info!(member_id = %member.member_id, "Member added");
                    return Ok(member);
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn get_member(&self, member_id: &str) -> AppResult<MemberSummary> {
        self.repository
            .members
            .get_summary(member_id.trim())
            .await
            .map_err(not_found_as("Member ID not found"))
    }

    pub async fn list_members(&self, query: &MemberQuery) -> AppResult<Vec<MemberSummary>> {
        self.repository.members.search(query).await
    }

    pub async fn update_member(&self, member_id: &str, request: &UpdateMember) -> AppResult<Member> {
        let request = request.trimmed();
        request.validate()?;
        check_contact(&request.email, &request.mobile_number)?;

        let member = self
            .repository
            .members
            .update(member_id.trim(), &request, self.clock.now())
            .await
            .map_err(not_found_as("Member ID not found"))?;
        tracing::info!(member_id = %member.member_id, status = %member.status, "Member updated");
        Ok(member)
    }

    /// Delete a member and their loan history. Refused while they hold active loans.
    pub async fn delete_member(&self, member_id: &str) -> AppResult<()> {
        let member_id = member_id.trim();
        if self.repository.members.delete_if_idle(member_id).await? {
            tracing::info!(member_id = %member_id, "Member deleted");
            return Ok(());
        }

        self.get_member(member_id).await?;
        Err(AppError::Conflict(
            "Member has active loans and cannot be deleted".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    fn service() -> PatronsService {
        PatronsService::new(Repository::in_memory(), Arc::new(SystemClock), 3)
    }

    fn request(email: &str) -> CreateMember {
        CreateMember {
            full_name: "Maria Clara".to_string(),
            email: email.to_string(),
            mobile_number: "+63 917 123 4567".to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_member() {
        let patrons = service();
        let member = patrons.add_member(&request("maria@example.com")).await.unwrap();
        assert_eq!(member.member_id, "MEM-001");
        assert_eq!(member.status, MemberStatus::Active);

        let summary = patrons.get_member("MEM-001").await.unwrap();
        assert_eq!(summary.borrowed_count, 0);
    }

    #[tokio::test]
    async fn test_add_member_validates_contact() {
        let patrons = service();
        let err = patrons.add_member(&request("not-an-email")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "Invalid email format"));

        let mut bad_mobile = request("maria@example.com");
        bad_mobile.mobile_number = "09171234567".to_string();
        let err = patrons.add_member(&bad_mobile).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.starts_with("Invalid mobile format")));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let patrons = service();
        patrons.add_member(&request("maria@example.com")).await.unwrap();
        assert!(matches!(
            patrons.add_member(&request("maria@example.com")).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_email_is_case_insensitive() {
        let patrons = service();
        let member = patrons.add_member(&request("Maria@Example.com")).await.unwrap();
        assert_eq!(member.email, "maria@example.com");

        assert!(matches!(
            patrons.add_member(&request("MARIA@example.COM")).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_update_status_and_delete() {
        let patrons = service();
        let member = patrons.add_member(&request("maria@example.com")).await.unwrap();

        let update = UpdateMember {
            full_name: "Maria Clara de los Santos".to_string(),
            email: "maria@example.com".to_string(),
            mobile_number: "+63 917 123 4567".to_string(),
            status: MemberStatus::Inactive,
        };
        let updated = patrons.update_member(&member.member_id, &update).await.unwrap();
        assert_eq!(updated.status, MemberStatus::Inactive);

        let query = MemberQuery {
            status: Some(MemberStatus::Inactive),
            ..Default::default()
        };
        assert_eq!(patrons.list_members(&query).await.unwrap().len(), 1);

        patrons.delete_member(&member.member_id).await.unwrap();
        assert!(matches!(
            patrons.get_member(&member.member_id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
