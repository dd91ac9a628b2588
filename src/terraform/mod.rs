//! Terraform configuration generation and resource schemas.

mod schema;
mod template;

pub use schema::{
    effective_config, immutable_violations, schema, validate_config,
    ResourceSchema,
};
pub use template::render;
