pub mod compositor;

/// A rendered frame as premultiplied RGBA8 pixels.
///
/// The `premultiplied` flag makes the alpha convention explicit at API
/// boundaries; encoder sinks flatten over their configured background.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether `data` is premultiplied alpha.
    pub premultiplied: bool,
}
