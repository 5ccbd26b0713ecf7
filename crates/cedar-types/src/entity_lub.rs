use cedar_schema_model::EntityTypeName;

/// The least upper bound of a set of entity types: a sorted, deduplicated
/// sequence of type names. Two LUBs are equal iff their sequences are
/// element-wise equal; this deliberately avoids hash-order nondeterminism.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityLub(Vec<EntityTypeName>);

impl EntityLub {
    pub fn single(name: EntityTypeName) -> Self {
        Self(vec![name])
    }

    pub fn from_names(names: impl IntoIterator<Item = EntityTypeName>) -> Self {
        let mut v: Vec<EntityTypeName> = names.into_iter().collect();
        v.sort();
        v.dedup();
        Self(v)
    }

    pub fn as_slice(&self) -> &[EntityTypeName] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The single member name, if this LUB names exactly one entity type.
    pub fn as_single(&self) -> Option<&EntityTypeName> {
        match self.0.as_slice() {
            [single] => Some(single),
            _ => None,
        }
    }

    pub fn contains(&self, name: &EntityTypeName) -> bool {
        self.0.binary_search(name).is_ok()
    }

    pub fn is_subset(&self, other: &EntityLub) -> bool {
        self.0.iter().all(|n| other.contains(n))
    }

    /// Sorted-merge union, used by the type lattice's entity LUB rule.
    pub fn union(&self, other: &EntityLub) -> EntityLub {
        EntityLub::from_names(self.0.iter().cloned().chain(other.0.iter().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_sorts_and_dedups() {
        let a = EntityLub::from_names([EntityTypeName::new("B"), EntityTypeName::new("A")]);
        let b = EntityLub::from_names([EntityTypeName::new("A"), EntityTypeName::new("C")]);
        let u = a.union(&b);
        assert_eq!(
            u.as_slice(),
            &[
                EntityTypeName::new("A"),
                EntityTypeName::new("B"),
                EntityTypeName::new("C"),
            ]
        );
    }

    #[test]
    fn subset_and_equality() {
        let a = EntityLub::single(EntityTypeName::new("User"));
        let b = EntityLub::from_names([EntityTypeName::new("User"), EntityTypeName::new("Admin")]);
        assert!(a.is_subset(&b));
        assert!(!b.is_subset(&a));
        assert_eq!(a, EntityLub::single(EntityTypeName::new("User")));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn type_name() -> impl Strategy<Value = EntityTypeName> {
        "[A-Z][a-zA-Z0-9]{0,6}".prop_map(EntityTypeName::new)
    }

    fn lub() -> impl Strategy<Value = EntityLub> {
        prop::collection::vec(type_name(), 0..5).prop_map(EntityLub::from_names)
    }

    proptest! {
        #[test]
        fn union_is_commutative(a in lub(), b in lub()) {
            prop_assert_eq!(a.union(&b), b.union(&a));
        }

        #[test]
        fn union_is_idempotent(a in lub()) {
            prop_assert_eq!(a.union(&a), a.clone());
        }

        #[test]
        fn each_side_is_a_subset_of_the_union(a in lub(), b in lub()) {
            let u = a.union(&b);
            prop_assert!(a.is_subset(&u));
            prop_assert!(b.is_subset(&u));
        }
    }
}
