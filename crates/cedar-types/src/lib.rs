//! The internal type lattice: the set of types the checker reasons in,
//! subtyping, least-upper-bound, and lowering from resolved-schema types.

mod entity_lub;
mod internal_type;
mod lattice;
mod lower;
mod mode;

pub use entity_lub::EntityLub;
pub use internal_type::{InternalType, RecordAttr, RecordShape};
pub use lattice::{is_subtype, least_upper_bound, IncompatibleTypesError};
pub use lower::{lower_record, lower_schema_type};
pub use mode::Mode;
