//! Binary encoding/decoding of object graphs.
//!
//! A stream is a 3-byte header (`OG` + version) followed by value tokens.
//! Object and type tables are built implicitly as the stream is written or
//! read; repeats are expressed as 4-byte offsets back into the stream.

pub mod decoder;
pub mod encoder;
pub mod primitives;
pub mod schema;

pub use decoder::{
    DecodeOptions, Decoder, decode, decode_all, decode_all_with_options, decode_from,
    decode_with_options, decompress,
};
pub use encoder::{
    EncodeOptions, EncodeStats, Encoder, encode, encode_all, encode_compressed, encode_profiled,
    encode_to, encode_with_options,
};
pub use primitives::{Reader, Writer};
