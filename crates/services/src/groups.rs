//! Group creation and membership.

use std::sync::Arc;

use domains::{Caller, Group, GroupId, GroupRepository, StoreError};
use tracing::info;

use crate::error::{Result, ServiceError};

pub const DEFAULT_GROUP_LIMIT: u32 = 10;

pub struct GroupService {
    repo: Arc<dyn GroupRepository>,
}

impl GroupService {
    pub fn new(repo: Arc<dyn GroupRepository>) -> Self {
        Self { repo }
    }

    /// Creates a group whose only member is its founder.
    pub async fn create_group(&self, caller: &Caller, name: &str) -> Result<Group> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::validation("Content is required"));
        }

        let group = Group::new(name, caller.user_id.clone());
        self.repo
            .create_group(group.clone())
            .await
            .map_err(ServiceError::store("create group"))?;

        info!(group_id = %group.id, founder = %caller.user_id, "group created");
        Ok(group)
    }

    pub async fn list_groups(&self, limit: Option<u32>) -> Result<Vec<Group>> {
        let limit = limit.unwrap_or(DEFAULT_GROUP_LIMIT).clamp(1, 100);
        self.repo
            .list_groups(limit)
            .await
            .map_err(ServiceError::store("fetch groups"))
    }

    /// Adds the caller to the group. Joining twice is a no-op.
    pub async fn join_group(&self, caller: &Caller, group_id: GroupId) -> Result<()> {
        match self.repo.add_member(group_id, caller.user_id.clone()).await {
            Ok(()) => {
                info!(%group_id, member = %caller.user_id, "group joined");
                Ok(())
            }
            Err(StoreError::NotFound) => Err(ServiceError::NotFound("Group not found")),
            Err(e) => Err(ServiceError::store("add user to group")(e)),
        }
    }

    /// Loads a group and checks that `caller` belongs to it.
    pub async fn require_member(
        &self,
        caller: Option<&Caller>,
        group_id: GroupId,
    ) -> Result<Group> {
        let group = self
            .repo
            .get_group(group_id)
            .await
            .map_err(ServiceError::store("fetch group"))?
            .ok_or(ServiceError::NotFound("Group not found"))?;

        let caller = caller.ok_or(ServiceError::Unauthenticated)?;
        if !group.is_member(&caller.user_id) {
            return Err(ServiceError::Forbidden("Not a member of this group"));
        }
        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::MockGroupRepository;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn blank_name_is_rejected_before_storage() {
        let mut repo = MockGroupRepository::new();
        repo.expect_create_group().times(0);

        let service = GroupService::new(Arc::new(repo));
        let err = assert_err!(service.create_group(&Caller::new("u1"), "   ").await);
        assert_eq!(err, ServiceError::validation("Content is required"));
    }

    #[tokio::test]
    async fn founder_is_first_member() {
        let mut repo = MockGroupRepository::new();
        repo.expect_create_group()
            .withf(|g| g.name == "Chess club" && g.members.len() == 1)
            .times(1)
            .returning(|_| Ok(()));

        let service = GroupService::new(Arc::new(repo));
        let group = assert_ok!(service.create_group(&Caller::new("u1"), " Chess club ").await);
        assert!(group.is_member(&Caller::new("u1").user_id));
    }

    #[tokio::test]
    async fn joining_unknown_group_is_not_found() {
        let mut repo = MockGroupRepository::new();
        repo.expect_add_member().returning(|_, _| Err(StoreError::NotFound));

        let service = GroupService::new(Arc::new(repo));
        let err = assert_err!(service.join_group(&Caller::new("u1"), GroupId::new()).await);
        assert_eq!(err, ServiceError::NotFound("Group not found"));
    }

    #[tokio::test]
    async fn outsiders_are_forbidden() {
        let group = Group::new("Private", Caller::new("owner").user_id);
        let group_id = group.id;
        let mut repo = MockGroupRepository::new();
        repo.expect_get_group()
            .returning(move |_| Ok(Some(group.clone())));

        let service = GroupService::new(Arc::new(repo));
        let stranger = Caller::new("stranger");
        let err = assert_err!(service.require_member(Some(&stranger), group_id).await);
        assert_eq!(err, ServiceError::Forbidden("Not a member of this group"));

        let err = assert_err!(service.require_member(None, group_id).await);
        assert_eq!(err, ServiceError::Unauthenticated);

        assert_ok!(service.require_member(Some(&Caller::new("owner")), group_id).await);
    }
}
