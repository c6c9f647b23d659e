//! # Models Module
//!
//! Engine-independent description of an equilibration run.
//!
//! - [`stage`] - A single minimization or dynamics step and its control parameters
//! - [`protocol`] - The validated, ordered protocol and the built-in recipe
//! - [`production`] - The production run that continues an equilibrated system
//! - [`selection`] - Abstract restraint atom selections
//! - [`metadata`] - Solvation facts supplied by the structure-preparation step

pub mod metadata;
pub mod production;
pub mod protocol;
pub mod selection;
pub mod stage;
