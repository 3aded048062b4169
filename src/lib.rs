//! Core library for the roster-tools command line application.
//!
//! The library reconciles exports from unrelated source systems into one
//! persistent roster (the Master List) and derives follow-up and
//! contact-restriction signals from the notes attached to each student. IO
//! adapters live under [`roster::tools::io`], the value model inside
//! [`roster::tools::model`], header resolution in [`roster::tools::schema`],
//! the merge engine under [`roster::tools::merge`], and the file-level
//! orchestration under [`roster::tools::sync`].

pub mod roster;

pub use roster::tools::{
    Result, ToolError, config, dates, error, identity, io, merge, model, report, schema, sync,
    tags, warning,
};
