//! # Engine Module
//!
//! This module renders an engine-independent [`ProtocolModel`](crate::core::models::protocol::ProtocolModel)
//! into the native input decks of a specific molecular-dynamics engine.
//!
//! ## Overview
//!
//! Every supported engine is one [`adapter::EngineAdapter`] implementation. An adapter maps
//! stage kinds onto the engine's minimization and dynamics blocks, converts units where the
//! engine expects something other than kcal/mol, Å and bar, translates abstract restraint
//! selections into native mask syntax, and writes a driver script that runs the stages in
//! order. Adapters are pure: they return text and never perform I/O.
//!
//! ## Architecture
//!
//! - **Engine Identifiers** ([`kind`]) - The closed set of supported engines
//! - **Adapter Contract** ([`adapter`]) - The shared trait, settings and adapter selection
//! - **Engine Renderers** ([`amber`], [`charmm`], [`gromacs`]) - One adapter per engine
//! - **Native Names** ([`names`]) - Residue names of water models and ions per engine
//! - **Error Handling** ([`error`]) - Render-time failures
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//!
//! Adding an engine means adding one adapter module and one [`kind::Engine`] variant;
//! existing adapters are untouched.

pub mod adapter;
pub mod amber;
pub mod charmm;
pub mod error;
pub mod gromacs;
pub mod kind;
pub(crate) mod names;
pub mod progress;
