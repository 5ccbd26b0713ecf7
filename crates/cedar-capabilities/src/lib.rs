//! Flow-sensitive capability tracking.
//!
//! A capability witnesses that accessing `attribute` on the value reached by
//! `variable_path` is safe at a given program point, because an enclosing
//! `has`/`hasTag` guard (reachable via `&&`, conjoined `if` conditions, etc.)
//! already checked it. Capability sets are persistent: every operation
//! returns a new set rather than mutating in place, so sibling branches of
//! `if`/`||` can't see each other's additions.

use std::collections::BTreeSet;
use std::sync::Arc;

/// A `(variable-path, attribute)` pair. The path uses `.`-separated
/// accessors, so `principal.address.zip` is distinct from `principal.zip`.
/// Tag capabilities encode their key as `"__tag:" + key`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Capability {
    pub path: String,
    pub attr: String,
}

impl Capability {
    pub fn new(path: impl Into<String>, attr: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            attr: attr.into(),
        }
    }

    pub fn tag(path: impl Into<String>, key: &str) -> Self {
        Self {
            path: path.into(),
            attr: format!("__tag:{key}"),
        }
    }
}

/// A persistent set of capabilities, backed by a cheaply-cloned `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet(Arc<BTreeSet<Capability>>);

impl CapabilitySet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has(&self, cap: &Capability) -> bool {
        self.0.contains(cap)
    }

    /// Return a new set with `cap` added; `self` is left untouched.
    pub fn add(&self, cap: Capability) -> Self {
        if self.0.contains(&cap) {
            return self.clone();
        }
        let mut next = (*self.0).clone();
        next.insert(cap);
        Self(Arc::new(next))
    }

    /// Union of `self` and `other`, used to propagate capabilities across
    /// the left side of `&&` into the right side.
    pub fn union(&self, other: &Self) -> Self {
        if Arc::ptr_eq(&self.0, &other.0) {
            return self.clone();
        }
        let merged: BTreeSet<Capability> = self.0.union(&other.0).cloned().collect();
        Self(Arc::new(merged))
    }

    /// Intersection of `self` and `other`, used at join points where only
    /// capabilities common to both branches can be trusted afterward.
    pub fn intersect(&self, other: &Self) -> Self {
        if Arc::ptr_eq(&self.0, &other.0) {
            return self.clone();
        }
        let merged: BTreeSet<Capability> = self.0.intersection(&other.0).cloned().collect();
        Self(Arc::new(merged))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.0.iter()
    }

    pub fn is_subset(&self, other: &Self) -> bool {
        self.0.is_subset(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_does_not_mutate_the_original() {
        let empty = CapabilitySet::empty();
        let with_cap = empty.add(Capability::new("principal", "age"));
        assert!(!empty.has(&Capability::new("principal", "age")));
        assert!(with_cap.has(&Capability::new("principal", "age")));
    }

    #[test]
    fn union_and_intersect() {
        let a = CapabilitySet::empty().add(Capability::new("principal", "age"));
        let b = CapabilitySet::empty().add(Capability::new("principal", "name"));
        let u = a.union(&b);
        assert!(u.has(&Capability::new("principal", "age")));
        assert!(u.has(&Capability::new("principal", "name")));

        let both = a.add(Capability::new("principal", "name"));
        let i = both.intersect(&b);
        assert!(!i.has(&Capability::new("principal", "age")));
        assert!(i.has(&Capability::new("principal", "name")));
    }

    #[test]
    fn monotonic_superset_retains_membership() {
        let a = CapabilitySet::empty().add(Capability::new("p", "x"));
        let b = a.add(Capability::new("p", "y"));
        assert!(a.is_subset(&b));
        assert!(b.has(&Capability::new("p", "x")));
    }

    #[test]
    fn tag_capability_key_is_namespaced() {
        let cap = Capability::tag("resource", "team");
        assert_eq!(cap.attr, "__tag:team");
    }
}
