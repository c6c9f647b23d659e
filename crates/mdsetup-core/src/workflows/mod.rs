//! # Workflows Module
//!
//! High-level entry points that turn a validated protocol into files on disk.
//!
//! ## Architecture
//!
//! - **Script Emission** ([`emit`]) - Selects the engine adapter, renders every stage in
//!   ordinal order, the production deck and then the driver scripts, handing each text
//!   to the layout
//! - **Project Layout** ([`layout`]) - Destination paths, the canonical project tree and
//!   atomic file writes
//!
//! Rendering stays pure; [`layout::ProjectLayout`] is the single I/O boundary.

pub mod emit;
pub mod layout;
