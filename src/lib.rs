//! Core library for the tuneset command line application.
//!
//! The library turns a spreadsheet of prompt/completion pairs into a
//! newline-delimited JSON dataset ready for fine-tuning. Spreadsheet access and
//! dataset output live under [`tuneset::tools::io`], the record types inside
//! [`tuneset::tools::model`], token accounting in [`tuneset::tools::tokens`],
//! the text rules in [`tuneset::tools::normalize`], row handling in
//! [`tuneset::tools::extract`], and the end-to-end run under
//! [`tuneset::tools::pipeline`].

pub mod tuneset;

pub use tuneset::tools::{
    Result, ToolError, config, error, extract, io, model, normalize, pipeline, tokens,
};
