//! Data Transfer Objects for REST request/response serialization.

pub mod publish_dto;
pub mod subscription_dto;

pub use publish_dto::*;
pub use subscription_dto::*;
