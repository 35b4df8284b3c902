pub mod agent_client;
pub mod config;
pub mod error;
pub mod finance_repository;
pub mod settings_repository;
pub mod sse;
pub mod storage;
