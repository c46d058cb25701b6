//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Namespace for identifiers derived from another identifier or a natural key.
const DERIVED_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_2c4e_93a7_4d0b_8e52_1f0c_7a9d_3e61);

/// Identifier of a tenant (one shop).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(Uuid);

/// Identifier of a user (cashier, manager, ...).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

/// Identifier of an aggregate root (the key of an event stream).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new time-ordered (UUIDv7) identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(TenantId, "TenantId");
impl_uuid_newtype!(UserId, "UserId");
impl_uuid_newtype!(AggregateId, "AggregateId");

impl AggregateId {
    /// Deterministic (UUIDv5) identifier for a stream keyed by something else.
    ///
    /// `scope` separates stream families, so the stock stream of a product and
    /// the return ledger of an invoice never collide even for the same `key`.
    pub fn derived(scope: &str, key: impl AsRef<[u8]>) -> Self {
        let mut name = Vec::with_capacity(scope.len() + 1 + key.as_ref().len());
        name.extend_from_slice(scope.as_bytes());
        name.push(b':');
        name.extend_from_slice(key.as_ref());
        Self(Uuid::new_v5(&DERIVED_NAMESPACE, &name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_ids_are_stable_and_scoped() {
        let product = AggregateId::new();
        let a = AggregateId::derived("inventory.stock", product.as_uuid().as_bytes());
        let b = AggregateId::derived("inventory.stock", product.as_uuid().as_bytes());
        let c = AggregateId::derived("returns.ledger", product.as_uuid().as_bytes());

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, product);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<TenantId>().unwrap_err();
        match err {
            DomainError::InvalidId(msg) if msg.starts_with("TenantId") => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
