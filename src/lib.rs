//! Salary extract report service: renders payslip PDFs through an external
//! report process and keeps a per-phone chat history.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
