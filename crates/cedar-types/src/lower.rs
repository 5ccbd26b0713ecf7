use std::collections::BTreeMap;

use cedar_schema_model::{self as model, Type};

use crate::{EntityLub, InternalType, RecordAttr, RecordShape};

/// Convert a resolved-schema `Type` into an `InternalType`. Records are
/// always lowered closed (the source shape declares no `open` bit); entity
/// refs lower to single-element entity LUBs.
pub fn lower_schema_type(ty: &Type) -> InternalType {
    match ty {
        Type::Long => InternalType::Long,
        Type::String => InternalType::String,
        Type::Bool => InternalType::Bool,
        Type::Set(elem) => InternalType::set(lower_schema_type(elem)),
        Type::Record(record) => InternalType::Record(lower_record(record)),
        Type::EntityRef(name) => InternalType::Entity(EntityLub::single(name.clone())),
        Type::Extension(name) => InternalType::Extension(name.clone()),
    }
}

pub fn lower_record(record: &model::RecordType) -> RecordShape {
    let attrs: BTreeMap<String, RecordAttr> = record
        .attrs
        .iter()
        .map(|(name, attr)| {
            (
                name.clone(),
                RecordAttr {
                    ty: lower_schema_type(&attr.ty),
                    required: attr.required,
                },
            )
        })
        .collect();
    RecordShape {
        attrs,
        open: record.open,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cedar_schema_model::{AttrType, EntityTypeName};

    #[test]
    fn lowers_entity_ref_to_singleton_lub() {
        let lowered = lower_schema_type(&Type::EntityRef(EntityTypeName::new("User")));
        match lowered {
            InternalType::Entity(lub) => {
                assert_eq!(lub.as_single(), Some(&EntityTypeName::new("User")))
            }
            other => panic!("expected Entity, got {other:?}"),
        }
    }

    #[test]
    fn lowers_record_closed_with_required_bits_preserved() {
        let mut attrs = BTreeMap::new();
        attrs.insert("name".to_string(), AttrType::required(Type::String));
        attrs.insert("age".to_string(), AttrType::optional(Type::Long));
        let record = model::RecordType { attrs, open: false };
        let lowered = lower_record(&record);
        assert!(lowered.attrs["name"].required);
        assert!(!lowered.attrs["age"].required);
        assert!(!lowered.open);
    }
}
