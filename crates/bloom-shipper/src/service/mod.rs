//! Service Layer
//!
//! Contains the application service that orchestrates domain logic
//! and coordinates with external dependencies via ports.

mod callback;
pub mod shipper;


pub use shipper::BloomShipper;
