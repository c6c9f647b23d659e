//! # mdsetup Core Library
//!
//! A library for preparing solvated, neutralized molecular structures for production
//! molecular-dynamics runs. It compiles a staged equilibration protocol into the native
//! input decks and driver scripts of Amber, CHARMM and Gromacs.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture so that protocol construction,
//! rendering and file output stay independently testable.
//!
//! - **[`core`]: The Foundation.** Immutable data models (`Stage`, `ProtocolModel`,
//!   `SolvationMetadata`), the pure restraint-decay schedule generator, unit conversions
//!   and TOML loaders for user-supplied protocols and metadata.
//!
//! - **[`engine`]: The Renderers.** One [`engine::adapter::EngineAdapter`] implementation
//!   per simulation engine. Adapters turn a stage plus metadata into text and never touch
//!   the filesystem.
//!
//! - **[`workflows`]: The Public API.** The script emitter drives an adapter over a whole
//!   protocol in ordinal order and hands every rendered file to a project layout for
//!   writing.

pub mod core;
pub mod engine;
pub mod workflows;
