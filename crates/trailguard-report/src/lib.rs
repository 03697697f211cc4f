//! TrailGuard Report Assembly
//!
//! Builds the outbound analysis request from masked content and reads the
//! markdown report that comes back:
//! - Versioned, non-editable audit framework template
//! - Context rendering with row and character limits
//! - Request assembly and best-effort report parsing

pub mod assembler;
pub mod context;
pub mod error;
pub mod template;

pub use assembler::{Assessment, AuditReport, SeverityCounts, build_request, parse_report};
pub use context::{ContentKind, ContextLimits, MaskedContent};
pub use error::{ReportError, Result};
pub use template::AuditTemplate;
