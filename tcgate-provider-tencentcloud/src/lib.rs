//! Tencent Cloud provider for tcgate
//!
//! Resources and data sources for API Gateway, CLB listener redirection and
//! Cloud Audit, served through [`TencentCloudProvider`].

pub mod client;
pub mod data_sources;
pub mod provider;
pub mod resources;
pub mod services;

#[cfg(test)]
mod testing;

pub use provider::{TencentCloudProvider, resource_types};
