use std::fmt;

use crate::{InternalType, Mode, RecordAttr, RecordShape};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompatibleTypesError {
    pub a: InternalType,
    pub b: InternalType,
}

impl fmt::Display for IncompatibleTypesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no least upper bound between `{}` and `{}`",
            self.a, self.b
        )
    }
}

impl std::error::Error for IncompatibleTypesError {}

/// `a <: b` under `mode`.
pub fn is_subtype(a: &InternalType, b: &InternalType, mode: Mode) -> bool {
    use InternalType::*;
    match (a, b) {
        (Never, _) => true,
        (True, True) | (False, False) | (Bool, Bool) => true,
        (True, Bool) | (False, Bool) => true,
        (Long, Long) => true,
        (String, String) => true,
        (Extension(x), Extension(y)) => x == y,
        (Set(x), Set(y)) => is_subtype(x, y, mode),
        (Record(x), Record(y)) => record_is_subtype(x, y, mode),
        (Entity(_), AnyEntity) => true,
        (AnyEntity, AnyEntity) => true,
        (AnyEntity, Entity(_)) => false,
        (Entity(x), Entity(y)) => {
            if mode.is_strict() {
                x == y
            } else {
                x.is_subset(y)
            }
        }
        _ => false,
    }
}

fn record_is_subtype(a: &RecordShape, b: &RecordShape, mode: Mode) -> bool {
    if a.open && !b.open {
        return false;
    }
    for (name, b_attr) in &b.attrs {
        match a.attrs.get(name) {
            Some(a_attr) => {
                if b_attr.required && !a_attr.required {
                    return false;
                }
                if !is_subtype(&a_attr.ty, &b_attr.ty, mode) {
                    return false;
                }
            }
            None => {
                if b_attr.required {
                    return false;
                }
                // missing attribute is a subtype of the optional case
            }
        }
    }
    if !b.open || mode.is_strict() {
        for name in a.attrs.keys() {
            if !b.attrs.contains_key(name) {
                return false;
            }
        }
    }
    true
}

/// `leastUpperBound(a, b, mode)`: the smallest type both `a` and `b` are
/// subtypes of, or an error if none exists.
pub fn least_upper_bound(
    a: &InternalType,
    b: &InternalType,
    mode: Mode,
) -> Result<InternalType, IncompatibleTypesError> {
    use InternalType::*;
    let incompatible = || IncompatibleTypesError {
        a: a.clone(),
        b: b.clone(),
    };
    match (a, b) {
        (Never, other) | (other, Never) => Ok(other.clone()),
        (True, True) => Ok(True),
        (False, False) => Ok(False),
        (Bool, Bool) => Ok(Bool),
        (True, False) | (False, True) => Ok(Bool),
        (True, Bool) | (Bool, True) => Ok(Bool),
        (False, Bool) | (Bool, False) => Ok(Bool),
        (Long, Long) => Ok(Long),
        (String, String) => Ok(String),
        (Extension(x), Extension(y)) if x == y => Ok(Extension(x.clone())),
        (Set(x), Set(y)) => Ok(InternalType::set(least_upper_bound(x, y, mode)?)),
        (Record(x), Record(y)) => record_lub(x, y, mode).map(Record).ok_or_else(incompatible),
        (Entity(x), Entity(y)) => {
            if mode.is_strict() && x != y {
                Err(incompatible())
            } else {
                Ok(Entity(x.union(y)))
            }
        }
        (Entity(_), AnyEntity) | (AnyEntity, Entity(_)) | (AnyEntity, AnyEntity) => Ok(AnyEntity),
        _ => Err(incompatible()),
    }
}

fn record_lub(a: &RecordShape, b: &RecordShape, mode: Mode) -> Option<RecordShape> {
    if mode.is_strict() {
        let a_keys: std::collections::BTreeSet<_> = a.attrs.keys().collect();
        let b_keys: std::collections::BTreeSet<_> = b.attrs.keys().collect();
        if a_keys != b_keys {
            return None;
        }
    }

    let mut attrs = std::collections::BTreeMap::new();
    let all_keys: std::collections::BTreeSet<_> =
        a.attrs.keys().chain(b.attrs.keys()).cloned().collect();
    for key in all_keys {
        match (a.attrs.get(&key), b.attrs.get(&key)) {
            (Some(av), Some(bv)) => {
                if mode.is_strict() && av.required != bv.required {
                    return None;
                }
                let ty = least_upper_bound(&av.ty, &bv.ty, mode).ok()?;
                attrs.insert(
                    key,
                    RecordAttr {
                        ty,
                        required: av.required && bv.required,
                    },
                );
            }
            (Some(v), None) | (None, Some(v)) => {
                attrs.insert(
                    key,
                    RecordAttr {
                        ty: v.ty.clone(),
                        required: false,
                    },
                );
            }
            (None, None) => unreachable!(),
        }
    }

    Some(RecordShape {
        attrs,
        open: a.open || b.open,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityLub;
    use cedar_schema_model::EntityTypeName;

    #[test]
    fn never_is_subtype_of_everything() {
        assert!(is_subtype(&InternalType::Never, &InternalType::Long, Mode::Permissive));
        assert!(is_subtype(&InternalType::Never, &InternalType::AnyEntity, Mode::Strict));
    }

    #[test]
    fn singleton_bools() {
        assert!(is_subtype(&InternalType::True, &InternalType::Bool, Mode::Permissive));
        assert!(is_subtype(&InternalType::False, &InternalType::Bool, Mode::Permissive));
        assert!(!is_subtype(&InternalType::True, &InternalType::False, Mode::Permissive));
        assert_eq!(
            least_upper_bound(&InternalType::True, &InternalType::False, Mode::Permissive).unwrap(),
            InternalType::Bool
        );
    }

    #[test]
    fn entity_lub_strict_requires_equality() {
        let user = InternalType::Entity(EntityLub::single(EntityTypeName::new("User")));
        let admin_user = InternalType::Entity(EntityLub::from_names([
            EntityTypeName::new("User"),
            EntityTypeName::new("Admin"),
        ]));
        assert!(is_subtype(&user, &admin_user, Mode::Permissive));
        assert!(!is_subtype(&user, &admin_user, Mode::Strict));
    }

    #[test]
    fn entity_lub_strict_rejects_unrelated_types() {
        let user = InternalType::Entity(EntityLub::single(EntityTypeName::new("User")));
        let photo = InternalType::Entity(EntityLub::single(EntityTypeName::new("Photo")));
        assert!(least_upper_bound(&user, &photo, Mode::Strict).is_err());
        assert_eq!(
            least_upper_bound(&user, &photo, Mode::Permissive).unwrap(),
            InternalType::Entity(EntityLub::from_names([
                EntityTypeName::new("Photo"),
                EntityTypeName::new("User"),
            ]))
        );
        assert_eq!(least_upper_bound(&user, &user, Mode::Strict).unwrap(), user);
    }

    #[test]
    fn any_entity_is_top_only_one_way() {
        let user = InternalType::Entity(EntityLub::single(EntityTypeName::new("User")));
        assert!(is_subtype(&user, &InternalType::AnyEntity, Mode::Permissive));
        assert!(!is_subtype(&InternalType::AnyEntity, &user, Mode::Permissive));
    }

    #[test]
    fn record_width_subtyping_needs_open_supertype_and_permissive_mode() {
        let mut narrow = std::collections::BTreeMap::new();
        narrow.insert("a".to_string(), RecordAttr { ty: InternalType::Long, required: true });
        narrow.insert("b".to_string(), RecordAttr { ty: InternalType::Long, required: true });
        let wide = RecordShape { attrs: narrow, open: false };

        let mut base = std::collections::BTreeMap::new();
        base.insert("a".to_string(), RecordAttr { ty: InternalType::Long, required: true });
        let open_super = RecordShape { attrs: base.clone(), open: true };
        let closed_super = RecordShape { attrs: base, open: false };

        assert!(record_is_subtype(&wide, &open_super, Mode::Permissive));
        assert!(!record_is_subtype(&wide, &open_super, Mode::Strict));
        assert!(!record_is_subtype(&wide, &closed_super, Mode::Permissive));
    }

    #[test]
    fn record_lub_missing_key_becomes_optional() {
        let mut a = std::collections::BTreeMap::new();
        a.insert("x".to_string(), RecordAttr { ty: InternalType::Long, required: true });
        let a_shape = RecordShape { attrs: a, open: false };
        let b_shape = RecordShape { attrs: std::collections::BTreeMap::new(), open: false };

        let joined = record_lub(&a_shape, &b_shape, Mode::Permissive).unwrap();
        assert!(!joined.attrs["x"].required);

        assert!(record_lub(&a_shape, &b_shape, Mode::Strict).is_none());
    }
}
