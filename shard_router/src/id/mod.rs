mod composite;
mod errors;

pub use composite::{CompositeId, RecordId, decode, encode, is_composite_format};
pub use errors::IdError;
