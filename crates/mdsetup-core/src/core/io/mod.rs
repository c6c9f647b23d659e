//! # I/O Module
//!
//! TOML loaders for the two user-facing inputs of the compiler: protocol override files
//! ([`protocol_file`]) and solvation metadata files ([`metadata_file`]).

pub mod metadata_file;
pub mod protocol_file;
