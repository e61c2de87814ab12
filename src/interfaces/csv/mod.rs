//! CSV input and output used by the command-line interface.

pub mod directory_reader;
pub mod link_writer;
pub mod participant_reader;
