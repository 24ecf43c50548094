pub mod codec;
pub mod commands;
pub mod frame;
pub mod status;

pub use codec::ElcomCodec;
pub use commands::Command;
pub use frame::{LinkResponse, Request, encode_request, parse_request};
pub use status::decode_status;
