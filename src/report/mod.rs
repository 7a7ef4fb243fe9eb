//! Result aggregation and reporting.

mod aggregate;
mod render;
mod writer;

pub use aggregate::{group_by_profile, rank, summarize, ProfileSummary};
pub use render::{render_report, render_summary, SECTION_PREFIX};
pub use writer::{ReportError, ReportWriter};
