//! Page pipeline.
//!
//! Wires the stages together: layers -> candidates -> verification ->
//! dedup and reading order -> leader tracing -> capture placement.
//! Algorithms live in `crate::detector`, `crate::leader` and
//! `crate::capture`; this module owns call order and result assembly.

mod result;
mod run;

pub use result::{ExpandedBubble, PageResult};
pub(crate) use run::DetectionStages;
pub use run::{detect_bubbles, process_page, process_page_with_debug};
