//! Segments, speakers and the optimistic store that owns them.

mod demo;
mod edit;
mod filter;
mod store;
mod types;

pub use demo::demo_segments;
pub use edit::{reduce, EditEffect, EditIntent, EditSessions, EditState};
pub use filter::{project, FilterMode};
pub use store::{AnnotationStore, MutationPolicy};
pub use types::{format_time, Segment, SegmentId, Speaker, Video};
