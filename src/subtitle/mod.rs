pub mod segment;

pub use segment::{active_segment, segment_windows, segments_for, Segment};
