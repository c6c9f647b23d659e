//! # Core Module
//!
//! Engine-independent building blocks of the equilibration protocol compiler.
//!
//! ## Overview
//!
//! Everything in this module is plain data or a pure function. Nothing here knows about
//! Amber, CHARMM or Gromacs syntax, and nothing here writes files.
//!
//! ## Architecture
//!
//! - **Protocol Representation** ([`models`]) - Stages, the validated protocol model,
//!   abstract atom selections and the solvation metadata handed over by structure
//!   preparation
//! - **Restraint Decay** ([`schedule`]) - Geometric force-constant schedules
//! - **Units** ([`units`]) - Conversions between the protocol's units and engine units
//! - **File I/O** ([`io`]) - TOML loaders for protocol overrides and solvation metadata

pub mod io;
pub mod models;
pub mod schedule;
pub mod units;
