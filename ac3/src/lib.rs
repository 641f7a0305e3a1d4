#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! Encoder for AC-3 bitstreams following the A/52 frame syntax.
//!
//! ### Frame Organization
//!
//! A frame carries 1536 samples per channel as six audio blocks of 256.
//! Syncinfo and the bitstream information (BSI) come first, the blocks
//! follow, and the frame ends on auxiliary padding and CRC2.
//!
//! ### Encoding Pipeline
//!
//! Each block goes through a 512-point MDCT. Coefficients are split into
//! exponents and mantissas; exponents are coded differentially with a
//! strategy chosen per block, and a masking model derived from the coded
//! exponents drives the bit allocation. The SNR offsets are searched so
//! that the mantissas fill the frame without overflowing it.
//!
//! ### Frame Sizes
//!
//! Frame size follows from bit rate and sample rate. At 44.1 kHz frames
//! alternate between two sizes one word apart to hold the nominal rate.
//!
//! ## Quick Start
//!
//! 1. Encode PCM with [`process::encode::Encoder`]
//! 2. Cut frames back out of a stream with [`process::extract::Extractor`]
//! 3. Read their headers with [`process::parse::Parser`]
//!
//! ```rust
//! use ac3::process::{encode::Encoder, extract::Extractor, parse::Parser};
//! use ac3::structs::config::EncoderConfig;
//!
//! let mut encoder = Encoder::new(EncoderConfig::new(44100, 64000, 2))?;
//! let samples = vec![0i16; encoder.samples_per_frame()];
//!
//! let mut extractor = Extractor::default();
//! for _ in 0..4 {
//!     extractor.push_bytes(&encoder.encode(&samples)?.data);
//! }
//!
//! let mut parser = Parser::default();
//! for frame_result in extractor {
//!     match frame_result {
//!         Ok(frame) => {
//!             let header = parser.parse(&frame)?;
//!             assert_eq!(header.sample_rate(), 44100);
//!         }
//!         Err(extract_error) => {
//!             // Damaged frames are skipped; the stream continues.
//!             eprintln!("Frame extraction error: {extract_error}");
//!         }
//!     }
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

/// Processing stages of the encoder and the stream reader.
///
/// 1. **Transform** ([`process::transform`]): Windowed MDCT per block.
///
/// 2. **Exponents** ([`process::exponent`]): Strategy choice and coding.
///
/// 3. **Masking and allocation** ([`process::masking`], [`process::allocate`]):
///    Masking curve and SNR offset search.
///
/// 4. **Packing** ([`process::mantissa`], [`process::assemble`]): Quantized
///    mantissas and the final frame.
///
/// 5. **Reading** ([`process::extract`], [`process::parse`]): Frame
///    extraction and header parsing.
pub mod process;

/// Data structures representing AC-3 format components.
///
/// - **Sync Info** ([`structs::sync`]): Syncword, sample rate and frame size codes
/// - **BSI** ([`structs::bsi`]): Bitstream information
/// - **Channels** ([`structs::channel`]): Audio coding modes and layouts
/// - **Blocks** ([`structs::block`]): Per-block exponents and allocation
/// - **Configuration** ([`structs::config`]): Encoder parameters
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): Bit-level reading/writing
/// - **CRC** ([`utils::crc`]): CRC1 and CRC2 computation
/// - **Error Handling** ([`utils::errors`]): Error types
/// - **Tables** ([`utils::tables`]): Standard tables
/// - **Timing** ([`utils::timing`]): Frame size pacing
pub mod utils;
