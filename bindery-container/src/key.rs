//! Contract identification keys.
//!
//! [`ContractKey`] identifies a contract (usually a `dyn Trait`) within
//! the container. Equality and hashing use the [`TypeId`]; the type name
//! is carried along for error messages and logs.

use std::any::{TypeId, type_name};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use bindery_support::rendering::shorten_type_name;

/// Uniquely identifies a contract in the container.
///
/// # Examples
/// ```
/// use bindery_container::key::ContractKey;
///
/// trait Clock: Send + Sync {}
///
/// let key = ContractKey::of::<dyn Clock>();
/// assert!(key.type_name().starts_with("dyn "));
/// assert_eq!(key.short_name(), "dyn Clock");
/// assert_eq!(key, ContractKey::of::<dyn Clock>());
/// ```
#[derive(Clone, Copy)]
pub struct ContractKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl ContractKey {
    /// Creates the key for contract `C`.
    #[inline]
    pub fn of<C: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            type_name: type_name::<C>(),
        }
    }

    /// Returns the [`TypeId`] of the contract.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the fully qualified type name.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the type name with module paths stripped.
    pub fn short_name(&self) -> String {
        shorten_type_name(self.type_name)
    }
}

impl PartialEq for ContractKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ContractKey {}

impl Hash for ContractKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

// Ordered by name so that listings are stable between runs.
impl PartialOrd for ContractKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ContractKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.type_name
            .cmp(other.type_name)
            .then_with(|| self.type_id.cmp(&other.type_id))
    }
}

impl fmt::Debug for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContractKey({})", self.type_name)
    }
}

impl fmt::Display for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Storage: Send + Sync {}
    trait Cache: Send + Sync {}

    #[test]
    fn key_of_trait_object() {
        let key = ContractKey::of::<dyn Storage>();
        assert!(key.type_name().contains("Storage"));
        assert_eq!(key.short_name(), "dyn Storage");
    }

    #[test]
    fn key_equality_same_contract() {
        assert_eq!(ContractKey::of::<dyn Storage>(), ContractKey::of::<dyn Storage>());
    }

    #[test]
    fn key_inequality_different_contracts() {
        assert_ne!(ContractKey::of::<dyn Storage>(), ContractKey::of::<dyn Cache>());
    }

    #[test]
    fn key_in_hashmap() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ContractKey::of::<dyn Storage>(), "storage");
        map.insert(ContractKey::of::<dyn Cache>(), "cache");
        assert_eq!(map.get(&ContractKey::of::<dyn Storage>()), Some(&"storage"));
        assert_eq!(map.get(&ContractKey::of::<String>()), None);
    }

    #[test]
    fn keys_sort_by_name() {
        let mut keys = vec![ContractKey::of::<dyn Storage>(), ContractKey::of::<dyn Cache>()];
        keys.sort();
        assert!(keys[0].type_name().ends_with("Cache"));
    }
}
