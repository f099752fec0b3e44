pub mod engine;
pub mod wrap;

pub use engine::ParleyTextEngine;
pub use wrap::{wrap_greedy, FixedAdvanceMeasurer, TextMeasurer};

/// RGBA8 brush color used by Parley text layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrush {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}
