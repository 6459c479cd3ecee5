pub mod color;
pub mod packets;

pub use color::{parse_hex_color, Color, ColorError};
pub use packets::{Command, CommandError};
