//! Inbound interfaces: file formats the binary consumes.

pub mod csv;
