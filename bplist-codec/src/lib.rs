#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

pub mod bplist;
pub mod error;
pub mod util;

pub use bplist::{
    models::{PlistObject, SizedInteger, Uid, Value, CLASS_KEY, MAX_DEPTH},
    options::{ArchiveHook, DecodeOptions, EncodeOptions, UnarchiveHook},
    reader::{decode, decode_with, is_signature_valid, BinaryPlistReader},
    trailer::{HEADER_MAGIC, HEADER_VERSION, TRAILER_SIZE},
    varint::IntWidth,
    writer::{encode, encode_with},
};
pub use error::bplist::BinaryPlistError;
