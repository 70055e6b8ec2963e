#![no_std]

pub mod builder;
pub mod chip8;
pub mod context;
pub mod error;
pub mod font;
pub mod frame;
pub mod opcode;
pub mod quirks;
pub mod timer;
pub mod utils;

pub use builder::Builder;
pub use chip8::Chip8;
pub use context::Context;
pub use error::Error;
pub use frame::{Frame, FrameView};
pub use opcode::OpCode;
pub use quirks::Quirks;

pub use nb;

#[cfg(feature = "embedded-graphics")]
pub use embedded_graphics;
