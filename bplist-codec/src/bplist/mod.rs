/*!
 Contains logic and data structures used to decode and encode Apple's binary property list format.

 ## Overview

 A binary property list is a serialized graph of objects: booleans, integers, reals, dates, data,
 strings, UIDs, arrays, sets, and dictionaries. Every object is stored once in an object table and
 containers refer to their children by index, so shared and self-referential structures survive a
 round trip.

 ## Layout

 ```txt
 +--------------+---------------+--------------+-----------------+
 | "bplist00"   | object table  | offset table | 32-byte trailer |
 +--------------+---------------+--------------+-----------------+
 ```

 Each object starts with a one-byte marker. The high nibble is the type and the low nibble is either
 a width exponent or an inline length; a low nibble of `0xF` means the length follows as a marked integer.

 ## Features

 - Decoding of any `bplist00` buffer, or a window inside a larger buffer
 - Encoding with minimal integer, reference, and offset widths
 - Deduplication of shared containers, strings, and UIDs
 - Hooks to substitute application objects for dictionaries tagged with a class name
*/

pub mod flatten;
pub mod marker;
pub mod measure;
pub mod models;
pub mod options;
pub mod reader;
pub mod trailer;
pub mod varint;
pub mod writer;
mod tests;
