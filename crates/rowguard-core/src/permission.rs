//! Owner/group/world permission model.
//!
//! A [`Permission`] is a bitmask split into three 4-bit scopes:
//!
//! | bits  | scope |
//! |-------|-------|
//! | 0-3   | world |
//! | 4-7   | group |
//! | 8-11  | owner |
//!
//! Each scope carries the same four capabilities: peek (execute), read, write
//! and delete.
//!
//! Evaluation of a [`PermissionInstance`] against a [`Principal`] follows one
//! fixed order and the first matching rule decides:
//!
//! 1. administrators are always allowed,
//! 2. the owning user is judged by the owner scope,
//! 3. a member of an owning group is judged by that group's grant,
//! 4. everybody else is judged by the world scope.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::Value;

/// The four capabilities of a single scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Capability(u8);

impl Capability {
    pub const NONE: Capability = Capability(0);
    /// Execute, or peek at the existence of a record.
    pub const PEEK: Capability = Capability(0b0001);
    pub const READ: Capability = Capability(0b0010);
    pub const WRITE: Capability = Capability(0b0100);
    pub const DELETE: Capability = Capability(0b1000);
    pub const ALL: Capability = Capability(0b1111);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Capability) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Capability) -> Capability {
        Capability(self.0 | other.0)
    }

    pub const fn intersect(self, other: Capability) -> Capability {
        Capability(self.0 & other.0)
    }
}

const WORLD_SHIFT: u32 = 0;
const GROUP_SHIFT: u32 = 4;
const OWNER_SHIFT: u32 = 8;
const SCOPE_MASK: u32 = 0xF;

/// Permission bitmask over the owner, group and world scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Permission(u32);

impl Permission {
    pub const NONE: Permission = Permission(0);

    pub const WORLD_PEEK: Permission = Permission::scoped(Capability::PEEK, WORLD_SHIFT);
    pub const WORLD_READ: Permission = Permission::scoped(Capability::READ, WORLD_SHIFT);
    pub const WORLD_WRITE: Permission = Permission::scoped(Capability::WRITE, WORLD_SHIFT);
    pub const WORLD_DELETE: Permission = Permission::scoped(Capability::DELETE, WORLD_SHIFT);

    pub const GROUP_PEEK: Permission = Permission::scoped(Capability::PEEK, GROUP_SHIFT);
    pub const GROUP_READ: Permission = Permission::scoped(Capability::READ, GROUP_SHIFT);
    pub const GROUP_WRITE: Permission = Permission::scoped(Capability::WRITE, GROUP_SHIFT);
    pub const GROUP_DELETE: Permission = Permission::scoped(Capability::DELETE, GROUP_SHIFT);

    pub const OWNER_PEEK: Permission = Permission::scoped(Capability::PEEK, OWNER_SHIFT);
    pub const OWNER_READ: Permission = Permission::scoped(Capability::READ, OWNER_SHIFT);
    pub const OWNER_WRITE: Permission = Permission::scoped(Capability::WRITE, OWNER_SHIFT);
    pub const OWNER_DELETE: Permission = Permission::scoped(Capability::DELETE, OWNER_SHIFT);

    /// Owner has everything, group members may read, everyone else may peek.
    pub const DEFAULT: Permission = Permission::from_scopes(
        Capability::ALL,
        Capability(Capability::PEEK.0 | Capability::READ.0),
        Capability::PEEK,
    );

    const fn scoped(cap: Capability, shift: u32) -> Permission {
        Permission((cap.0 as u32) << shift)
    }

    /// Build a permission from the capabilities of each scope.
    pub const fn from_scopes(owner: Capability, group: Capability, world: Capability) -> Self {
        Permission(
            ((owner.0 as u32) << OWNER_SHIFT)
                | ((group.0 as u32) << GROUP_SHIFT)
                | ((world.0 as u32) << WORLD_SHIFT),
        )
    }

    pub const fn from_bits(bits: u32) -> Self {
        Permission(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Read a stored permission column. Missing, null, negative or
    /// non-numeric values mean [`Permission::NONE`].
    pub fn from_value(value: Option<&Value>) -> Self {
        value
            .and_then(Value::as_i64)
            .and_then(|bits| u32::try_from(bits).ok())
            .map(Permission::from_bits)
            .unwrap_or(Permission::NONE)
    }

    pub const fn owner(self) -> Capability {
        Capability(((self.0 >> OWNER_SHIFT) & SCOPE_MASK) as u8)
    }

    pub const fn group(self) -> Capability {
        Capability(((self.0 >> GROUP_SHIFT) & SCOPE_MASK) as u8)
    }

    pub const fn world(self) -> Capability {
        Capability(((self.0 >> WORLD_SHIFT) & SCOPE_MASK) as u8)
    }

    pub const fn union(self, other: Permission) -> Permission {
        Permission(self.0 | other.0)
    }
}

impl std::ops::BitOr for Permission {
    type Output = Permission;

    fn bitor(self, rhs: Permission) -> Permission {
        self.union(rhs)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn scope(c: Capability) -> String {
            [
                (Capability::PEEK, 'x'),
                (Capability::READ, 'r'),
                (Capability::WRITE, 'w'),
                (Capability::DELETE, 'd'),
            ]
            .iter()
            .map(|(cap, ch)| if c.contains(*cap) { *ch } else { '-' })
            .collect()
        }
        write!(
            f,
            "{}{}{}",
            scope(self.owner()),
            scope(self.group()),
            scope(self.world())
        )
    }
}

/// A group membership (on the caller side) or a group ownership (on the record side).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPermission {
    /// Reference id of the group.
    pub group_reference_id: String,
    /// Reference id of the membership/ownership relation row, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_reference_id: Option<String>,
    /// Capabilities granted through this group.
    pub permission: Permission,
}

impl GroupPermission {
    pub fn new(group_reference_id: impl Into<String>, permission: Permission) -> Self {
        Self {
            group_reference_id: group_reference_id.into(),
            relation_reference_id: None,
            permission,
        }
    }
}

/// The caller of an operation, as attached to the request by the transport layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Reference id of the calling user; empty for anonymous callers.
    pub user_reference_id: String,
    /// Groups the caller belongs to.
    #[serde(default)]
    pub groups: Vec<GroupPermission>,
    /// Whether the caller is an administrator. Resolved once per request.
    #[serde(default)]
    pub is_admin: bool,
}

impl Principal {
    pub fn new(user_reference_id: impl Into<String>, groups: Vec<GroupPermission>) -> Self {
        Self {
            user_reference_id: user_reference_id.into(),
            groups,
            is_admin: false,
        }
    }

    /// An unauthenticated caller.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_reference_id.is_empty()
    }
}

/// Coarse class of a data operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationClass {
    Read,
    Write,
}

impl OperationClass {
    /// Map an HTTP-style verb onto an operation class.
    ///
    /// Returns `None` for verbs that are neither reads nor writes; callers
    /// must reject those.
    pub fn from_method(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Some(OperationClass::Read),
            "POST" | "PUT" | "PATCH" | "DELETE" => Some(OperationClass::Write),
            _ => None,
        }
    }
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationClass::Read => write!(f, "read"),
            OperationClass::Write => write!(f, "write"),
        }
    }
}

impl std::str::FromStr for OperationClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "read" => Ok(OperationClass::Read),
            "write" => Ok(OperationClass::Write),
            other => Err(format!("unknown operation class '{}'", other)),
        }
    }
}

/// Resolved permission of one record or table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionInstance {
    /// Reference id of the owning user.
    pub owner_reference_id: Option<String>,
    /// Groups owning the record, each with its own grant.
    pub groups: Vec<GroupPermission>,
    /// The record's bitmask.
    pub permission: Permission,
}

impl PermissionInstance {
    pub fn new(
        owner_reference_id: Option<String>,
        groups: Vec<GroupPermission>,
        permission: Permission,
    ) -> Self {
        Self {
            owner_reference_id,
            groups,
            permission,
        }
    }

    pub fn can_peek(&self, principal: &Principal) -> bool {
        self.check(principal, Capability::PEEK)
    }

    pub fn can_read(&self, principal: &Principal) -> bool {
        self.check(principal, Capability::READ)
    }

    pub fn can_write(&self, principal: &Principal) -> bool {
        self.check(principal, Capability::WRITE)
    }

    pub fn can_delete(&self, principal: &Principal) -> bool {
        self.check(principal, Capability::DELETE)
    }

    /// Check a capability for the principal. The first matching scope decides.
    pub fn check(&self, principal: &Principal, cap: Capability) -> bool {
        if principal.is_admin {
            return true;
        }

        if !principal.is_anonymous()
            && self.owner_reference_id.as_deref() == Some(principal.user_reference_id.as_str())
        {
            return self.permission.owner().contains(cap);
        }

        let record_group_scope = self.permission.group();
        let mut group_matched = false;
        for owning in &self.groups {
            let member = principal
                .groups
                .iter()
                .any(|g| g.group_reference_id == owning.group_reference_id);
            if !member {
                continue;
            }
            group_matched = true;
            let granted = owning.permission.group().intersect(record_group_scope);
            if granted.contains(cap) {
                return true;
            }
        }
        if group_matched {
            return false;
        }

        self.permission.world().contains(cap)
    }
}
