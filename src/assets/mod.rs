pub mod decode;

pub use decode::{decode_image, PreparedImage};
