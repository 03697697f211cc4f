//! TrailGuard Core Types
//!
//! This crate provides the fundamental types shared across TrailGuard:
//! - Tabular data model fed in by ingestion (`Table`, `Column`, `Cell`)
//! - The outbound analysis request (`AnalysisRequest`)
//! - Core error types

pub mod error;
pub mod request;
pub mod table;

pub use error::{Error, Result};
pub use request::AnalysisRequest;
pub use table::{Cell, Column, Table};
