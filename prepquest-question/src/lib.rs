pub mod entity;
pub mod infra;
pub mod mapper;
pub mod schema;
