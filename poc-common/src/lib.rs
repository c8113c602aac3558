//! # POC Common Library
//!
//! Shared code for the shift-assignment service:
//! - Database initialization and schema
//! - Record models (publishers, availability, shift days and slots)
//! - Bootstrap configuration loading
//! - Common error type

pub mod config;
pub mod db;
pub mod error;

pub use db::models::{AssignmentEntry, AvailabilityRecord, Category, Publisher, ShiftDay, ShiftSlot};
pub use error::{Error, Result};
