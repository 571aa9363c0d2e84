use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::ids::{GroupId, UserId};

/// A private space. Only members may post into it or read its posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub members: BTreeSet<UserId>,
}

impl Group {
    pub fn new(name: impl Into<String>, founder: UserId) -> Self {
        Self {
            id: GroupId::new(),
            name: name.into(),
            members: BTreeSet::from([founder]),
        }
    }

    pub fn is_member(&self, user: &UserId) -> bool {
        self.members.contains(user)
    }
}
