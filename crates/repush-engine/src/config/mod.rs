//! Forwarder configuration: YAML types, parsing, CLI overrides, validation.

pub mod parser;
pub mod types;
pub mod validator;
