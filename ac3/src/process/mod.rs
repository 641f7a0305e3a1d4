/// MDCT analysis with the KBD window.
///
/// Provides the [`Transform`](transform::Transform) that turns 256 new
/// samples plus the previous half block into 256 frequency coefficients.
pub mod transform;

/// Exponent extraction, strategy selection and differential coding.
pub mod exponent;

/// The psychoacoustic model: band power, excitation and masking curve.
pub mod masking;

/// Bit allocation pointers and the SNR offset search.
///
/// Provides the [`AllocationSearch`](allocate::AllocationSearch) that finds
/// the largest SNR offsets whose mantissas fit the frame budget.
pub mod allocate;

/// Mantissa quantization and grouped packing.
pub mod mantissa;

/// Frame assembly: syncinfo, BSI, audio blocks and both CRCs.
pub mod assemble;

/// PCM to AC-3 frame encoding.
///
/// Provides the [`Encoder`](encode::Encoder) that runs every stage above for
/// one frame of interleaved samples and returns an
/// [`EncodedFrame`](encode::EncodedFrame).
pub mod encode;

/// Frame extraction from AC-3 bitstreams.
///
/// Provides the [`Extractor`](extract::Extractor) for finding syncwords and
/// cutting CRC-checked [`Frame`](extract::Frame) objects from continuous
/// bitstream data.
pub mod extract;

/// Header parsing of extracted frames.
///
/// Provides the [`Parser`](parse::Parser) for reading the syncinfo and BSI
/// of a [`Frame`](extract::Frame) into a [`FrameHeader`](parse::FrameHeader).
pub mod parse;
