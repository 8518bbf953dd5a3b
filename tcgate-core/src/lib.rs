//! tcgate Core
//!
//! Core library for declarative cloud resource management: the resource model,
//! schemas, planning, effect interpretation and consistency polling.

pub mod composite_id;
pub mod differ;
pub mod effect;
pub mod interpreter;
pub mod plan;
pub mod poll;
pub mod provider;
pub mod resource;
pub mod schema;
