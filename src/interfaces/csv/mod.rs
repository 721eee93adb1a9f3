//! CSV replay surface used by the binary.

pub mod catalog_reader;
pub mod command_reader;
pub mod order_writer;
