//! Outer surfaces: CSV replay for the binary and provider webhook intake.

pub mod csv;
pub mod webhook;
