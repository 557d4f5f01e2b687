//! Application services: report delivery, identity resolution and chat history.

pub mod chat;
pub mod error;
pub mod identity;
pub mod report;
pub mod repos;
