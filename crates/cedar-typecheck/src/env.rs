use cedar_schema_model::{ActionUid, EntityTypeName, RecordType};

/// The `(principal type, action UID, resource type, context type)` tuple a
/// policy condition is checked against. One is enumerated per
/// `(action, principal, resource)` triple in the action's `appliesTo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnv {
    pub principal_type: EntityTypeName,
    pub action_uid: ActionUid,
    pub resource_type: EntityTypeName,
    pub context_type: RecordType,
}
