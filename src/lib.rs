#![crate_name = "rust_ofp13"]
#![crate_type = "lib"]

#[macro_use]
extern crate log;

mod bits;
pub mod ofp_message;
pub mod ofp_utils;
pub mod openflow0x04;

pub use crate::ofp_message::{OfpCodec, OfpSerializationError};
