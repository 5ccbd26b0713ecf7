//! JSON file format for entities and requests: the entity-value convention
//! Cedar tooling uses (`__entity`/`__extn` tags to disambiguate a string from
//! an entity reference or extension value inside an otherwise-plain JSON
//! tree), decoded into `cedar_validator`'s native `Value`/`Entity`/`Request`.

use std::collections::BTreeMap;

use cedar_schema_model::{ActionUid, EntityTypeName};
use cedar_validator::{Entity, EntityUid, Request, Value};
use serde_json::Value as Json;

use crate::CliError;

pub fn value_from_json(json: &Json) -> Result<Value, CliError> {
    match json {
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => n
            .as_i64()
            .map(Value::Long)
            .ok_or_else(|| CliError::Parse(format!("not an integer: {n}"))),
        Json::String(s) => Ok(Value::String(s.clone())),
        Json::Array(items) => Ok(Value::Set(
            items.iter().map(value_from_json).collect::<Result<_, _>>()?,
        )),
        Json::Object(map) => {
            if let Some(entity) = map.get("__entity") {
                let uid = entity_uid_from_json(entity)?;
                return Ok(Value::EntityUid(uid.ty, uid.id));
            }
            if let Some(extn) = map.get("__extn") {
                let name = extn
                    .get("fn")
                    .and_then(Json::as_str)
                    .ok_or_else(|| CliError::Parse("__extn missing `fn`".to_string()))?;
                let arg = extn
                    .get("arg")
                    .and_then(Json::as_str)
                    .ok_or_else(|| CliError::Parse("__extn missing `arg`".to_string()))?;
                return Ok(Value::Extension(name.to_string(), arg.to_string()));
            }
            let mut fields = BTreeMap::new();
            for (k, v) in map {
                fields.insert(k.clone(), value_from_json(v)?);
            }
            Ok(Value::Record(fields))
        }
        Json::Null => Err(CliError::Parse("null is not a Cedar value".to_string())),
    }
}

pub fn entity_uid_from_json(json: &Json) -> Result<EntityUid, CliError> {
    let ty = json
        .get("type")
        .and_then(Json::as_str)
        .ok_or_else(|| CliError::Parse("entity uid missing `type`".to_string()))?;
    let id = json
        .get("id")
        .and_then(Json::as_str)
        .ok_or_else(|| CliError::Parse("entity uid missing `id`".to_string()))?;
    Ok(EntityUid::new(EntityTypeName::new(ty), id))
}

pub fn entity_from_json(json: &Json) -> Result<Entity, CliError> {
    let obj = json
        .as_object()
        .ok_or_else(|| CliError::Parse("entity must be a JSON object".to_string()))?;

    let parents = match obj.get("parents") {
        Some(Json::Array(items)) => items
            .iter()
            .map(entity_uid_from_json)
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(CliError::Parse("`parents` must be an array".to_string())),
        None => Default::default(),
    };

    let attrs = match obj.get("attrs") {
        Some(Json::Object(map)) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), value_from_json(v)?)))
            .collect::<Result<_, CliError>>()?,
        Some(_) => return Err(CliError::Parse("`attrs` must be an object".to_string())),
        None => Default::default(),
    };

    let tags = match obj.get("tags") {
        Some(Json::Object(map)) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), value_from_json(v)?)))
            .collect::<Result<_, CliError>>()?,
        Some(_) => return Err(CliError::Parse("`tags` must be an object".to_string())),
        None => Default::default(),
    };

    Ok(Entity { parents, attrs, tags })
}

/// Parses a `{ "<uid-json>": <entity-json>, ... }` entity store file, one
/// entry per entity, keyed by its stringified `{type, id}` uid.
pub fn entities_from_json(json: &Json) -> Result<BTreeMap<EntityUid, Entity>, CliError> {
    let items = json
        .as_array()
        .ok_or_else(|| CliError::Parse("entity store must be a JSON array".to_string()))?;

    let mut entities = BTreeMap::new();
    for item in items {
        let uid_json = item
            .get("uid")
            .ok_or_else(|| CliError::Parse("entity entry missing `uid`".to_string()))?;
        let uid = entity_uid_from_json(uid_json)?;
        let entity = entity_from_json(item)?;
        entities.insert(uid, entity);
    }
    Ok(entities)
}

pub fn request_from_json(json: &Json) -> Result<Request, CliError> {
    let principal = json
        .get("principal")
        .ok_or_else(|| CliError::Parse("request missing `principal`".to_string()))
        .and_then(entity_uid_from_json)?;
    let resource = json
        .get("resource")
        .ok_or_else(|| CliError::Parse("request missing `resource`".to_string()))
        .and_then(entity_uid_from_json)?;
    let action_json = json
        .get("action")
        .ok_or_else(|| CliError::Parse("request missing `action`".to_string()))?;
    let action_uid = entity_uid_from_json(action_json)?;
    let action = ActionUid::new(action_uid.ty.as_str().to_string(), action_uid.id);

    let context = match json.get("context") {
        Some(Json::Object(map)) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), value_from_json(v)?)))
            .collect::<Result<_, CliError>>()?,
        Some(_) => return Err(CliError::Parse("`context` must be an object".to_string())),
        None => Default::default(),
    };

    Ok(Request { principal, action, resource, context })
}
