//! Storage collaborators
//!
//! Record management for publishers, availability and shift days/slots.
//! Lookups used inside engine transactions take `&mut SqliteConnection`
//! so they run on the caller's transaction; plain CRUD takes the pool.

pub mod availability;
pub mod publishers;
pub mod shifts;
