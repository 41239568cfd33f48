//! Role lists (`roles.csv`): who counts as a member, an operator, a blender.

use crate::entries::Entries;
use crate::store::RecordStore;
use crate::{Error, Result, RoleRecord};

pub const ROLES_FILE: &str = "roles.csv";

/// Look up the names holding a role
pub trait RoleLookup {
    /// Names listed for `role`. Fails if the role isn't known.
    fn find(&self, role: &str) -> Result<Vec<String>>;

    fn has_member(&self, role: &str, name: &str) -> Result<bool> {
        Ok(self.find(role)?.iter().any(|n| n == name))
    }
}

/// Role lists kept in the record store
#[derive(Clone, Debug)]
pub struct Roles {
    entries: Entries<RoleRecord>,
}

impl Roles {
    pub fn load(store: &dyn RecordStore) -> Result<Self> {
        Ok(Self {
            entries: Entries::load(store, ROLES_FILE)?,
        })
    }

    /// Replace (or add) the list for `role` and persist
    pub fn set_role(&mut self, store: &dyn RecordStore, role: &str, names: &[String]) -> Result<()> {
        self.entries.reload(store)?;
        let list = names.join(",");
        let existing = self.entries.iter().position(|r| r.role == role);
        match existing.and_then(|i| self.entries.get_mut(i)) {
            Some(record) => record.list = list,
            None => self.entries.push(RoleRecord {
                role: role.to_string(),
                list,
            }),
        }
        self.entries.save(store)
    }

    pub fn roles(&self) -> impl Iterator<Item = &RoleRecord> {
        self.entries.iter()
    }
}

impl RoleLookup for Roles {
    fn find(&self, role: &str) -> Result<Vec<String>> {
        self.entries
            .iter()
            .find(|r| r.role == role)
            .map(RoleRecord::names)
            .ok_or_else(|| Error::Store(format!("No '{}' role in {}", role, ROLES_FILE)))
    }
}
