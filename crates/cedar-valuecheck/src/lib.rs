//! Structural validation of runtime entities, entity stores, and requests
//! against a resolved schema. Unlike the type checker, this works directly
//! against `cedar_schema_model::Type` — there's no lattice here, only a
//! straightforward structural match between a value and its declared shape.

mod error;
mod value;

pub use error::{ValueError, ValueErrorKind};
pub use value::{Entity, EntityUid, Request, Value};

use std::collections::BTreeMap;

use cedar_schema_model::{ActionUid, RecordType, ResolvedSchema, Type};
use tracing::trace;

/// `Entity(entity, schema)`. Validates UID type, parent set, attribute
/// shape, and tags.
pub fn validate_entity(uid: &EntityUid, entity: &Entity, schema: &ResolvedSchema) -> Result<(), ValueError> {
    trace!(%uid, "validating entity");

    if let Some(values) = schema.enum_types.get(&uid.ty) {
        if !values.iter().any(|v| v == &uid.id) {
            return Err(ValueError::new(ValueErrorKind::UnknownEnumId {
                ty: uid.ty.as_str().to_string(),
                id: uid.id.clone(),
            }));
        }
        if !entity.parents.is_empty() || !entity.attrs.is_empty() || !entity.tags.is_empty() {
            return Err(ValueError::new(ValueErrorKind::EnumEntityHasExtraState { uid: uid.to_string() }));
        }
        return Ok(());
    }

    let action_uid = ActionUid::new(uid.ty.as_str().to_string(), uid.id.clone());
    if let Some(decl) = schema.actions.get(&action_uid) {
        let declared: std::collections::BTreeSet<(String, String)> =
            decl.parents.iter().map(|p| (p.ty.clone(), p.id.clone())).collect();
        let actual: std::collections::BTreeSet<(String, String)> = entity
            .parents
            .iter()
            .map(|p| (p.ty.as_str().to_string(), p.id.clone()))
            .collect();
        if declared != actual {
            return Err(ValueError::new(ValueErrorKind::ActionWrongParents { uid: action_uid.to_string() }));
        }
        return Ok(());
    }

    let decl = match schema.entity_types.get(&uid.ty) {
        Some(d) => d,
        None => return Err(ValueError::new(ValueErrorKind::UnknownEntityType { name: uid.ty.as_str().to_string() })),
    };

    for parent in &entity.parents {
        if !decl.parents.contains(&parent.ty) {
            return Err(ValueError::new(ValueErrorKind::ParentTypeNotDeclared {
                parent: parent.ty.as_str().to_string(),
                entity_type: uid.ty.as_str().to_string(),
            }));
        }
    }

    check_record_value(&entity.attrs, &decl.shape)?;

    match &decl.tags {
        Some(tag_ty) => {
            for value in entity.tags.values() {
                if !type_matches(value, tag_ty) {
                    return Err(ValueError::new(ValueErrorKind::WrongTagType {
                        expected: describe_type(tag_ty),
                        found: describe_value(value),
                    }));
                }
            }
        }
        None => {
            if !entity.tags.is_empty() {
                return Err(ValueError::new(ValueErrorKind::UnexpectedTags {
                    entity_type: uid.ty.as_str().to_string(),
                }));
            }
        }
    }

    Ok(())
}

/// `Entities(map, schema)`. Applies `validate_entity` to every entry,
/// reporting the offending UID alongside each failure.
pub fn validate_entities(
    entities: &BTreeMap<EntityUid, Entity>,
    schema: &ResolvedSchema,
) -> Result<(), Vec<(EntityUid, ValueError)>> {
    let errors: Vec<(EntityUid, ValueError)> = entities
        .iter()
        .filter_map(|(uid, entity)| validate_entity(uid, entity, schema).err().map(|e| (uid.clone(), e)))
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `Request(request, schema)`. Looks up the action, checks principal and
/// resource type membership in its `appliesTo`, and validates the context.
pub fn validate_request(request: &Request, schema: &ResolvedSchema) -> Result<(), ValueError> {
    if !schema.is_known_entity_or_enum(&request.principal.ty) {
        return Err(ValueError::new(ValueErrorKind::UnknownEntityType {
            name: request.principal.ty.as_str().to_string(),
        }));
    }
    if !schema.is_known_entity_or_enum(&request.resource.ty) {
        return Err(ValueError::new(ValueErrorKind::UnknownEntityType {
            name: request.resource.ty.as_str().to_string(),
        }));
    }

    let decl = schema
        .actions
        .get(&request.action)
        .ok_or_else(|| ValueError::new(ValueErrorKind::UnknownAction { uid: request.action.to_string() }))?;
    let applies = decl
        .applies_to
        .as_ref()
        .ok_or_else(|| ValueError::new(ValueErrorKind::NoAppliesTo { uid: request.action.to_string() }))?;

    if !applies.principals.contains(&request.principal.ty) {
        return Err(ValueError::new(ValueErrorKind::PrincipalTypeNotAllowed {
            ty: request.principal.ty.as_str().to_string(),
        }));
    }
    if !applies.resources.contains(&request.resource.ty) {
        return Err(ValueError::new(ValueErrorKind::ResourceTypeNotAllowed {
            ty: request.resource.ty.as_str().to_string(),
        }));
    }

    validate_enum_id(&request.principal, schema)?;
    validate_enum_id(&request.resource, schema)?;

    check_record_value(&request.context, &applies.context)
}

fn validate_enum_id(uid: &EntityUid, schema: &ResolvedSchema) -> Result<(), ValueError> {
    if let Some(values) = schema.enum_types.get(&uid.ty) {
        if !values.iter().any(|v| v == &uid.id) {
            return Err(ValueError::new(ValueErrorKind::UnknownEnumId {
                ty: uid.ty.as_str().to_string(),
                id: uid.id.clone(),
            }));
        }
    }
    Ok(())
}

fn check_record_value(fields: &BTreeMap<String, Value>, record: &RecordType) -> Result<(), ValueError> {
    for (name, attr) in &record.attrs {
        match fields.get(name) {
            Some(v) => {
                if !type_matches(v, &attr.ty) {
                    return Err(ValueError::new(ValueErrorKind::WrongAttributeType {
                        attr: name.clone(),
                        expected: describe_type(&attr.ty),
                        found: describe_value(v),
                    }));
                }
            }
            None => {
                if attr.required {
                    return Err(ValueError::new(ValueErrorKind::MissingRequiredAttribute { attr: name.clone() }));
                }
            }
        }
    }
    if !record.open {
        for name in fields.keys() {
            if !record.attrs.contains_key(name) {
                return Err(ValueError::new(ValueErrorKind::ExtraneousAttribute { attr: name.clone() }));
            }
        }
    }
    Ok(())
}

fn type_matches(value: &Value, ty: &Type) -> bool {
    match (value, ty) {
        (Value::Bool(_), Type::Bool) => true,
        (Value::Long(_), Type::Long) => true,
        (Value::String(_), Type::String) => true,
        (Value::Set(items), Type::Set(elem)) => items.iter().all(|i| type_matches(i, elem)),
        (Value::Record(fields), Type::Record(record)) => check_record_value(fields, record).is_ok(),
        (Value::EntityUid(ety, _), Type::EntityRef(expected)) => ety == expected,
        (Value::Extension(name, _), Type::Extension(expected)) => name == expected,
        _ => false,
    }
}

fn describe_type(ty: &Type) -> String {
    match ty {
        Type::Long => "Long".to_string(),
        Type::String => "String".to_string(),
        Type::Bool => "Bool".to_string(),
        Type::Set(elem) => format!("Set<{}>", describe_type(elem)),
        Type::Record(_) => "a record".to_string(),
        Type::EntityRef(name) => name.to_string(),
        Type::Extension(name) => name.clone(),
    }
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::Bool(_) => "a Bool".to_string(),
        Value::Long(_) => "a Long".to_string(),
        Value::String(_) => "a String".to_string(),
        Value::Set(_) => "a Set".to_string(),
        Value::Record(_) => "a record".to_string(),
        Value::EntityUid(ty, _) => format!("an entity of type `{ty}`"),
        Value::Extension(name, _) => format!("a {name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cedar_schema_model::{AttrType, EntityTypeDecl};

    fn schema_with_user() -> ResolvedSchema {
        let mut schema = ResolvedSchema::default();
        let mut attrs = BTreeMap::new();
        attrs.insert("age".to_string(), AttrType::required(Type::Long));
        schema.entity_types.insert(
            cedar_schema_model::EntityTypeName::new("User"),
            EntityTypeDecl {
                parents: vec![],
                shape: RecordType::closed(attrs),
                tags: None,
            },
        );
        schema
    }

    #[test]
    fn entity_with_matching_shape_is_valid() {
        let schema = schema_with_user();
        let uid = EntityUid::new(cedar_schema_model::EntityTypeName::new("User"), "alice");
        let mut attrs = BTreeMap::new();
        attrs.insert("age".to_string(), Value::Long(30));
        let entity = Entity { parents: Default::default(), attrs, tags: Default::default() };
        assert!(validate_entity(&uid, &entity, &schema).is_ok());
    }

    #[test]
    fn missing_required_attribute_is_rejected() {
        let schema = schema_with_user();
        let uid = EntityUid::new(cedar_schema_model::EntityTypeName::new("User"), "alice");
        let entity = Entity::default();
        let err = validate_entity(&uid, &entity, &schema).unwrap_err();
        assert!(matches!(err.kind, ValueErrorKind::MissingRequiredAttribute { .. }));
    }

    #[test]
    fn extraneous_attribute_is_rejected() {
        let schema = schema_with_user();
        let uid = EntityUid::new(cedar_schema_model::EntityTypeName::new("User"), "alice");
        let mut attrs = BTreeMap::new();
        attrs.insert("age".to_string(), Value::Long(30));
        attrs.insert("nickname".to_string(), Value::String("al".to_string()));
        let entity = Entity { parents: Default::default(), attrs, tags: Default::default() };
        let err = validate_entity(&uid, &entity, &schema).unwrap_err();
        assert!(matches!(err.kind, ValueErrorKind::ExtraneousAttribute { .. }));
    }

    #[test]
    fn unknown_entity_type_is_rejected() {
        let schema = ResolvedSchema::default();
        let uid = EntityUid::new(cedar_schema_model::EntityTypeName::new("Ghost"), "x");
        let entity = Entity::default();
        let err = validate_entity(&uid, &entity, &schema).unwrap_err();
        assert!(matches!(err.kind, ValueErrorKind::UnknownEntityType { .. }));
    }
}
