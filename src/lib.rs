pub mod authentication;
pub mod config;
pub mod crud_ops;
pub mod entities;
pub mod error;
pub mod memory_store;
pub mod notify;
pub mod policy;
pub mod repository;
pub mod routes;
pub mod session;
pub mod views;
