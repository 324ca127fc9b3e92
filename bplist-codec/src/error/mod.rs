/*!
 Errors that can happen when decoding or encoding binary property lists.
*/

pub mod bplist;
