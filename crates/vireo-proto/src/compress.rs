//! Frame and row-delta compression.
//!
//! Every inbound server frame starts with a one-byte compression tag
//! (0 none, 1 brotli, 2 zlib); the remainder is the possibly-compressed
//! ATN-encoded server message. Outbound frames are never compressed.
//! Row deltas additionally carry per-query compression at the ATN level
//! (see [`crate::CompressableQueryUpdate`]), where the compressed variant
//! is gzip rather than raw zlib.
//!
//! Decompression sizes the output buffer heuristically: 4x the compressed
//! length first, retried once at 64x when the decoder produced nothing or
//! filled the buffer exactly. Both bounds failing is reported as a
//! decompression failure naming the algorithm.

use flate2::read::GzDecoder;
use flate2::read::GzEncoder;
use flate2::read::ZlibDecoder;
use flate2::read::ZlibEncoder;
use snafu::Snafu;
use std::io::Read;

/// First growth factor for the decompression buffer.
const GROWTH_FIRST: usize = 4;

/// Fallback growth factor when the first bound was too tight.
const GROWTH_RETRY: usize = 64;

/// Internal scratch buffer size for the streaming decoders.
const DECODER_BUFFER_SIZE: usize = 4096;

/// Brotli encoder quality used by [`compress_frame`] (test and loopback paths).
const BROTLI_QUALITY: u32 = 9;

/// Brotli encoder window size (log2).
const BROTLI_LGWIN: u32 = 22;

/// Frame-level compression algorithms, tagged by their wire byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Tag 0: payload is the raw ATN message.
    None,
    /// Tag 1: payload is brotli-compressed.
    Brotli,
    /// Tag 2: payload is zlib(deflate)-compressed.
    Zlib,
}

impl Compression {
    /// All algorithms, for exhaustive round-trip tests.
    pub const ALL: [Compression; 3] = [Compression::None, Compression::Brotli, Compression::Zlib];

    /// The wire tag byte.
    pub fn tag(self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::Brotli => 1,
            Compression::Zlib => 2,
        }
    }

    /// Parse a wire tag byte.
    pub fn from_tag(tag: u8) -> Result<Self, CompressionError> {
        match tag {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Brotli),
            2 => Ok(Compression::Zlib),
            tag => Err(CompressionError::UnknownCompressionTag { tag }),
        }
    }
}

/// Errors from frame and row-delta (de)compression.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CompressionError {
    /// The frame was empty; not even a compression tag was present.
    #[snafu(display("frame too short to carry a compression tag"))]
    InsufficientData,

    /// The leading tag byte named no known algorithm.
    #[snafu(display("unknown compression tag {tag}"))]
    UnknownCompressionTag {
        /// The offending tag byte.
        tag: u8,
    },

    /// The payload could not be decompressed within the size heuristics.
    #[snafu(display("{algorithm} decompression failed"))]
    DecompressionFailed {
        /// Name of the algorithm that failed.
        algorithm: &'static str,
    },

    /// The payload could not be compressed.
    #[snafu(display("{algorithm} compression failed"))]
    CompressionFailed {
        /// Name of the algorithm that failed.
        algorithm: &'static str,
    },
}

/// Strip the compression tag from an inbound frame and decompress the body.
pub fn decompress_frame(frame: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let (&tag, body) = frame.split_first().ok_or(CompressionError::InsufficientData)?;
    match Compression::from_tag(tag)? {
        Compression::None => Ok(body.to_vec()),
        Compression::Brotli => decompress_brotli(body),
        Compression::Zlib => decompress_zlib(body),
    }
}

/// Produce a tagged frame: `[tag][compressed payload]`.
///
/// The client never compresses what it sends; this exists for the test
/// servers and loopback tooling that speak the server side of the wire.
pub fn compress_frame(payload: &[u8], compression: Compression) -> Result<Vec<u8>, CompressionError> {
    let mut frame = Vec::with_capacity(payload.len() + 1);
    frame.push(compression.tag());
    match compression {
        Compression::None => frame.extend_from_slice(payload),
        Compression::Brotli => frame.extend_from_slice(&compress_brotli(payload)?),
        Compression::Zlib => {
            frame.extend_from_slice(&read_all(ZlibEncoder::new(payload, flate2::Compression::default()), "zlib")?);
        }
    }
    Ok(frame)
}

/// Decompress a brotli payload (frames and row deltas).
pub fn decompress_brotli(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    decompress_with_heuristic("brotli", data, |input| {
        Box::new(brotli::Decompressor::new(input, DECODER_BUFFER_SIZE))
    })
}

/// Decompress a zlib(deflate) payload (frame tag 2).
pub fn decompress_zlib(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    decompress_with_heuristic("zlib", data, |input| Box::new(ZlibDecoder::new(input)))
}

/// Decompress a gzip payload (row-delta compression).
pub fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    decompress_with_heuristic("gzip", data, |input| Box::new(GzDecoder::new(input)))
}

/// Compress a payload with brotli (row deltas and test frames).
pub fn compress_brotli(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    read_all(
        brotli::CompressorReader::new(data, DECODER_BUFFER_SIZE, BROTLI_QUALITY, BROTLI_LGWIN),
        "brotli",
    )
}

/// Compress a payload with gzip (row deltas).
pub fn compress_gzip(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    read_all(GzEncoder::new(data, flate2::Compression::default()), "gzip")
}

fn read_all<R: Read>(mut reader: R, algorithm: &'static str) -> Result<Vec<u8>, CompressionError> {
    let mut out = Vec::new();
    reader
        .read_to_end(&mut out)
        .map_err(|_| CompressionError::CompressionFailed { algorithm })?;
    Ok(out)
}

/// Run a decoder against `data` with a capped output buffer.
///
/// Returns `None` when the result is suspect: the decoder produced nothing
/// from a non-empty input, or filled the cap exactly (output may be
/// truncated).
fn decompress_capped<'a>(
    decoder: Box<dyn Read + 'a>,
    input_len: usize,
    cap: usize,
) -> Result<Option<Vec<u8>>, CompressionError> {
    let mut out = Vec::new();
    let mut limited = decoder.take(cap as u64);
    match limited.read_to_end(&mut out) {
        Ok(_) => {
            if (out.is_empty() && input_len > 0) || out.len() == cap {
                Ok(None)
            } else {
                Ok(Some(out))
            }
        }
        // A hard decoder error is not recoverable by a bigger buffer, but
        // the caller maps it the same way as an exhausted heuristic.
        Err(_) => Ok(None),
    }
}

fn decompress_with_heuristic<'a>(
    algorithm: &'static str,
    data: &'a [u8],
    make_decoder: impl Fn(&'a [u8]) -> Box<dyn Read + 'a>,
) -> Result<Vec<u8>, CompressionError> {
    let first_cap = data.len().saturating_mul(GROWTH_FIRST).max(1);
    if let Some(out) = decompress_capped(make_decoder(data), data.len(), first_cap)? {
        return Ok(out);
    }
    let retry_cap = data.len().saturating_mul(GROWTH_RETRY).max(1);
    match decompress_capped(make_decoder(data), data.len(), retry_cap)? {
        Some(out) => Ok(out),
        None => Err(CompressionError::DecompressionFailed { algorithm }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic incompressible-ish bytes from a multiplicative generator.
    fn noise(mut seed: u64, len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            out.push((seed >> 33) as u8);
        }
        out
    }

    /// Pairs of duplicated noise blocks: compresses roughly 2:1, so the
    /// first 4x buffer bound always holds.
    fn mildly_redundant(len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        let mut seed = 1;
        while out.len() < len {
            let block = noise(seed, 512.min(len - out.len()));
            seed += 1;
            out.extend_from_slice(&block);
            let dup = block.len().min(len - out.len());
            out.extend_from_slice(&block[..dup]);
        }
        out.truncate(len);
        out
    }

    /// One noise block repeated: ratio lands between 4x and 64x, forcing
    /// the retry bound.
    fn block_repeated(reps: usize) -> Vec<u8> {
        let block = noise(99, 1024);
        let mut out = Vec::with_capacity(reps * block.len());
        for _ in 0..reps {
            out.extend_from_slice(&block);
        }
        out
    }

    #[test]
    fn empty_frame_is_insufficient_data() {
        let err = decompress_frame(&[]).unwrap_err();
        assert!(matches!(err, CompressionError::InsufficientData));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = decompress_frame(&[3, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, CompressionError::UnknownCompressionTag { tag: 3 }));
    }

    #[test]
    fn empty_uncompressed_payload_decodes_to_empty() {
        assert_eq!(decompress_frame(&[0]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn frame_roundtrip_all_algorithms_small_and_large() {
        for payload in [vec![0x42], noise(7, 100), mildly_redundant(128 * 1024)] {
            for compression in Compression::ALL {
                let frame = compress_frame(&payload, compression).unwrap();
                assert_eq!(frame[0], compression.tag());
                assert_eq!(decompress_frame(&frame).unwrap(), payload, "{compression:?}");
            }
        }
    }

    #[test]
    fn compressed_frames_shrink_redundant_payloads() {
        let payload = mildly_redundant(64 * 1024);
        for compression in [Compression::Brotli, Compression::Zlib] {
            let frame = compress_frame(&payload, compression).unwrap();
            assert!(frame.len() < payload.len(), "{compression:?} did not shrink the payload");
        }
    }

    #[test]
    fn gzip_row_delta_roundtrip_shrinks() {
        let payload = mildly_redundant(64 * 1024);
        let packed = compress_gzip(&payload).unwrap();
        assert!(packed.len() < payload.len());
        assert_eq!(decompress_gzip(&packed).unwrap(), payload);
    }

    #[test]
    fn moderate_ratio_payload_exercises_retry_bound() {
        // 16 KiB that compresses to roughly a tenth: the 4x first bound is
        // exceeded and the 64x retry must carry it.
        let payload = block_repeated(16);
        let frame = compress_frame(&payload, Compression::Zlib).unwrap();
        let compressed_len = frame.len() - 1;
        assert!(compressed_len * GROWTH_FIRST < payload.len(), "payload not compressible enough");
        assert!(compressed_len * GROWTH_RETRY > payload.len(), "payload too compressible for the retry bound");
        assert_eq!(decompress_frame(&frame).unwrap(), payload);
    }

    #[test]
    fn over_compressible_payload_exceeds_both_bounds() {
        // A megabyte of zeros compresses beyond 64:1; the heuristic gives
        // up rather than guessing a third buffer size.
        let payload = vec![0u8; 1024 * 1024];
        let frame = compress_frame(&payload, Compression::Zlib).unwrap();
        let err = decompress_frame(&frame).unwrap_err();
        assert!(matches!(err, CompressionError::DecompressionFailed { algorithm: "zlib" }));
    }

    #[test]
    fn corrupt_brotli_payload_fails_with_algorithm_name() {
        let err = decompress_brotli(&[0xFF; 16]).unwrap_err();
        assert_eq!(err.to_string(), "brotli decompression failed");
    }

    #[test]
    fn corrupt_zlib_payload_fails() {
        let err = decompress_zlib(&[0x01, 0x02, 0x03]).unwrap_err();
        assert!(matches!(err, CompressionError::DecompressionFailed { algorithm: "zlib" }));
    }
}
