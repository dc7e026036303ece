//! World-object classification and identifiers.

pub mod ids;
pub mod instance_type;
pub mod taxonomy;
