//! Data models for payslip records, eligibility rules and configuration.

pub mod config;
pub mod eligibility;
pub mod payslip;
