//! Spreadsheet adapters. Everything outside this module works on in-memory
//! grids.

pub mod excel_read;
pub mod excel_write;
