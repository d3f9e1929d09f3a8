//! # Lexicon schema compiler and Elixir code generation for dobby
//!
//! Lexicon documents are JSON files describing records, objects and
//! XRPC operations. This crate compiles them into an intermediate
//! representation and renders that as Elixir source: plain structs,
//! Ecto schemas with changesets, and XRPC call stubs.
//!
//! ## Usage
//!
//! The `dobby-codegen` binary takes files, directories or globs and writes
//! the generated modules under an output directory:
//!
//! ```bash
//! cargo run -p dobby-lexicon --bin dobby-codegen -- \
//!     'lexicons/**/*.json' \
//!     -o ./lib/lexicons
//! ```
//!
//! Defaults can also come from a `dobby.kdl` file in the working directory.
//!
//! ## Modules
//!
//! - [`lexicon`] - Raw document parsing and definition kinds
//! - [`types`] - Native and storage type resolution
//! - [`constraints`] - Constraint extraction from property schemas
//! - [`compiler`] - The compiled intermediate representation
//! - [`corpus`] - Path expansion, document loading and reference checking
//! - [`codegen`] - Elixir code generation from compiled lexicons
//! - [`config`] - KDL configuration file

pub mod cli;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod constraints;
pub mod corpus;
pub mod error;
pub mod lexicon;
pub mod names;
pub mod syntax;
pub mod types;
