pub mod track;

pub use track::{build_export_track, write_f32le_file, ExportTrack};
