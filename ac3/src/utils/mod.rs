//! Utility functions and supporting infrastructure.
//!
//! Provides bitstream I/O, CRC computation, the standard tables and error
//! handling shared by the encoder and the stream parser.

pub mod bitstream_io;
pub mod crc;
pub mod errors;
pub mod tables;
pub mod timing;
