//! Permission gates.
//!
//! Every entity type carries a [`PermissionGate`] consulted before a row is
//! read, created, updated or deleted. The gate sees the instance and the
//! store's current [`Actor`].

use std::fmt;
use std::ops::{BitAnd, BitOr};

use oxide_sql_core::FieldDescriptor;

use crate::entity::Entity;

/// A permission bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Permissions(u32);

impl Permissions {
    /// No permission.
    pub const NONE: Self = Self(0);
    /// Read a row.
    pub const ACCESS: Self = Self(1);
    /// Insert a row.
    pub const CREATE: Self = Self(2);
    /// Update a row.
    pub const UPDATE: Self = Self(4);
    /// Delete a row.
    pub const DELETE: Self = Self(8);
    /// Every named permission.
    pub const ALL: Self = Self(15);

    const NAMED: [(Self, &'static str); 4] = [
        (Self::ACCESS, "access"),
        (Self::CREATE, "create"),
        (Self::UPDATE, "update"),
        (Self::DELETE, "delete"),
    ];

    /// Wraps raw bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for Permissions {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// `access, create, update, delete` for the named bits, `unknown` once for
/// any other bit, `none` for zero.
impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let mut names: Vec<&str> = Self::NAMED
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        if self.0 & !Self::ALL.0 != 0 {
            names.push("unknown");
        }
        f.write_str(&names.join(", "))
    }
}

/// Whoever the store is acting for.
pub trait Actor: fmt::Debug + Send + Sync {
    /// Id of the actor's own entity, when it has one.
    fn id(&self) -> Option<u64>;
}

/// Nobody in particular.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl Actor for Anonymous {
    fn id(&self) -> Option<u64> {
        None
    }
}

/// An actor identified by its entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorId(pub u64);

impl Actor for ActorId {
    fn id(&self) -> Option<u64> {
        Some(self.0)
    }
}

/// Decides whether an actor may perform an operation on an instance.
pub trait PermissionGate: fmt::Debug + Send + Sync {
    /// Whether `actor` holds every bit of `permission` on `entity`.
    fn has_permission(&self, entity: &Entity, actor: &dyn Actor, permission: Permissions)
        -> bool;
}

/// The default gate: everything is allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionGate for AllowAll {
    fn has_permission(&self, _: &Entity, _: &dyn Actor, _: Permissions) -> bool {
        true
    }
}

/// Ownership-aware gate.
///
/// The owner may do anything. Anyone else is limited to the bits stored in
/// the row's `otherPermissions` mask. Instances without an owner are open.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnerGate;

impl OwnerGate {
    /// Reference to the owner.
    pub const OWNER: &'static str = "owner";
    /// Bits granted to everyone else.
    pub const OTHER_PERMISSIONS: &'static str = "otherPermissions";

    /// The two fields an owned type declares: a cascading `owner` reference
    /// to `owner_type` and an `otherPermissions` mask defaulting to zero.
    #[must_use]
    pub fn fields(owner_type: &str) -> [FieldDescriptor; 2] {
        [
            FieldDescriptor::reference(Self::OWNER, owner_type).cascade(),
            FieldDescriptor::integer(Self::OTHER_PERMISSIONS)
                .min(0)
                .max(255)
                .default_value(0_i64),
        ]
    }
}

impl PermissionGate for OwnerGate {
    fn has_permission(&self, entity: &Entity, actor: &dyn Actor, permission: Permissions) -> bool {
        let Some(owner) = entity.reference_id(Self::OWNER) else {
            return true;
        };
        if actor.id() == Some(owner) {
            return true;
        }
        let granted = entity
            .value(Self::OTHER_PERMISSIONS)
            .and_then(crate::Value::as_i64)
            .and_then(|bits| u32::try_from(bits).ok())
            .map_or(Permissions::NONE, Permissions::from_bits);
        granted.contains(permission)
    }
}
