/*!
 This module defines utilities shared by the decoder and encoder.
*/

pub mod dates;
pub mod plist;
