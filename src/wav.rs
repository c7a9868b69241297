//! PCM → WAV container encoding.
//!
//! TTS providers hand back headerless linear PCM (Gemini reports it as
//! `audio/L16;codec=pcm;rate=24000`). Audio players need a container, so the
//! raw samples are wrapped in the canonical 44-byte RIFF/WAVE header:
//!
//! ```text
//! offset  size  field
//!      0     4  "RIFF"
//!      4     4  36 + data length
//!      8     4  "WAVE"
//!     12     4  "fmt "
//!     16     4  16 (fmt chunk size)
//!     20     2  1 (PCM)
//!     22     2  channels
//!     24     4  sample rate
//!     28     4  byte rate   = rate × channels × width
//!     32     2  block align = channels × width
//!     34     2  bits/sample = width × 8
//!     36     4  "data"
//!     40     4  data length
//!     44     …  PCM payload
//! ```
//!
//! All integers are little-endian. The result is exposed to the wizard as a
//! `data:audio/wav;base64,…` URI.

use crate::error::EncodingError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Length of the canonical header written by [`encode_wav`].
pub const WAV_HEADER_LEN: usize = 44;

/// Prefix of every audio resource stored by the wizard.
pub const WAV_DATA_URI_PREFIX: &str = "data:audio/wav;base64,";

const FORMAT_TAG_PCM: u16 = 1;
const FMT_CHUNK_LEN: u32 = 16;

/// Sample layout of a PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WavFormat {
    /// Interleaved channel count. Default: 1.
    pub channels: u16,
    /// Samples per second per channel. Default: 24 000 Hz.
    pub sample_rate: u32,
    /// Bytes per sample. Default: 2 (16-bit).
    pub sample_width: u16,
}

impl Default for WavFormat {
    fn default() -> Self {
        Self {
            channels: 1,
            sample_rate: 24_000,
            sample_width: 2,
        }
    }
}

impl WavFormat {
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * u32::from(self.channels) * u32::from(self.sample_width)
    }

    pub fn block_align(&self) -> u16 {
        self.channels * self.sample_width
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.sample_width * 8
    }

    /// Reject zero-valued parameters.
    pub fn validate(&self) -> Result<(), EncodingError> {
        if self.channels == 0 {
            return Err(EncodingError::InvalidFormat("channel count must be ≥ 1".into()));
        }
        if self.sample_rate == 0 {
            return Err(EncodingError::InvalidFormat("sample rate must be ≥ 1".into()));
        }
        if self.sample_width == 0 {
            return Err(EncodingError::InvalidFormat("sample width must be ≥ 1".into()));
        }
        let align = u32::from(self.channels) * u32::from(self.sample_width);
        if align > u32::from(u16::MAX) / 8
            || u64::from(self.sample_rate) * u64::from(align) > u64::from(u32::MAX)
        {
            return Err(EncodingError::InvalidFormat(format!(
                "{} ch × {} bytes at {} Hz overflows the header fields",
                self.channels, self.sample_width, self.sample_rate
            )));
        }
        Ok(())
    }

    /// Derive a format from a provider MIME type, falling back to `self`.
    ///
    /// Understands the `audio/L16;codec=pcm;rate=24000` style used by Gemini:
    /// `L16`/`L8`/`L24` set the width and `rate=`/`channels=` parameters
    /// override the fallback. Unknown parameters are ignored.
    pub fn from_mime_type(mime_type: &str, fallback: WavFormat) -> WavFormat {
        let mut format = fallback;
        let mut parts = mime_type.split(';').map(str::trim);

        if let Some(essence) = parts.next() {
            match essence.to_ascii_lowercase().as_str() {
                "audio/l8" => format.sample_width = 1,
                "audio/l16" => format.sample_width = 2,
                "audio/l24" => format.sample_width = 3,
                _ => {}
            }
        }

        for param in parts {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            match key.trim().to_ascii_lowercase().as_str() {
                "rate" => {
                    if let Ok(rate) = value.trim().parse::<u32>() {
                        format.sample_rate = rate;
                    }
                }
                "channels" => {
                    if let Ok(ch) = value.trim().parse::<u16>() {
                        format.channels = ch;
                    }
                }
                _ => {}
            }
        }

        format
    }
}

/// Wrap raw PCM in a canonical 44-byte WAV header.
///
/// # Errors
/// - [`EncodingError::EmptyPayload`] when `pcm` is empty
/// - [`EncodingError::InvalidFormat`] when any format parameter is zero
/// - [`EncodingError::PayloadTooLarge`] when the payload overflows the RIFF size field
pub fn encode_wav(pcm: &[u8], format: &WavFormat) -> Result<Vec<u8>, EncodingError> {
    if pcm.is_empty() {
        return Err(EncodingError::EmptyPayload);
    }
    format.validate()?;

    let data_len = u32::try_from(pcm.len())
        .ok()
        .filter(|len| *len <= u32::MAX - 36)
        .ok_or(EncodingError::PayloadTooLarge { len: pcm.len() })?;

    if pcm.len() % usize::from(format.block_align()) != 0 {
        warn!(
            "PCM length {} is not a multiple of block align {}; trailing bytes kept as-is",
            pcm.len(),
            format.block_align()
        );
    }

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    out.extend_from_slice(&FORMAT_TAG_PCM.to_le_bytes());
    out.extend_from_slice(&format.channels.to_le_bytes());
    out.extend_from_slice(&format.sample_rate.to_le_bytes());
    out.extend_from_slice(&format.byte_rate().to_le_bytes());
    out.extend_from_slice(&format.block_align().to_le_bytes());
    out.extend_from_slice(&format.bits_per_sample().to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(pcm);

    debug!(
        "Encoded {} PCM bytes → {} byte WAV ({} ch, {} Hz, {}-bit)",
        pcm.len(),
        out.len(),
        format.channels,
        format.sample_rate,
        format.bits_per_sample()
    );
    Ok(out)
}

/// Fields decoded from a canonical WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub format: WavFormat,
    /// `RIFF` chunk size (total length − 8).
    pub riff_len: u32,
    /// `data` chunk size, i.e. the PCM payload length.
    pub data_len: u32,
}

impl WavHeader {
    /// Parse the 44-byte header at the start of `bytes`.
    ///
    /// Only the canonical single-`fmt `/single-`data` layout is accepted.
    pub fn parse(bytes: &[u8]) -> Result<Self, EncodingError> {
        if bytes.len() < WAV_HEADER_LEN {
            return Err(EncodingError::MalformedHeader(format!(
                "need {WAV_HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        expect_tag(bytes, 0, b"RIFF")?;
        expect_tag(bytes, 8, b"WAVE")?;
        expect_tag(bytes, 12, b"fmt ")?;
        expect_tag(bytes, 36, b"data")?;

        let fmt_len = read_u32(bytes, 16);
        if fmt_len != FMT_CHUNK_LEN {
            return Err(EncodingError::MalformedHeader(format!(
                "fmt chunk is {fmt_len} bytes, expected {FMT_CHUNK_LEN}"
            )));
        }
        let tag = read_u16(bytes, 20);
        if tag != FORMAT_TAG_PCM {
            return Err(EncodingError::MalformedHeader(format!(
                "format tag {tag} is not PCM"
            )));
        }

        let bits = read_u16(bytes, 34);
        if bits % 8 != 0 {
            return Err(EncodingError::MalformedHeader(format!(
                "{bits} bits per sample is not byte aligned"
            )));
        }

        Ok(Self {
            format: WavFormat {
                channels: read_u16(bytes, 22),
                sample_rate: read_u32(bytes, 24),
                sample_width: bits / 8,
            },
            riff_len: read_u32(bytes, 4),
            data_len: read_u32(bytes, 40),
        })
    }
}

fn expect_tag(bytes: &[u8], at: usize, tag: &[u8; 4]) -> Result<(), EncodingError> {
    if &bytes[at..at + 4] == tag {
        Ok(())
    } else {
        Err(EncodingError::MalformedHeader(format!(
            "expected {:?} at offset {at}",
            String::from_utf8_lossy(tag)
        )))
    }
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Encode WAV bytes as a `data:audio/wav;base64,` URI.
pub fn to_data_uri(wav: &[u8]) -> String {
    let mut uri = String::with_capacity(WAV_DATA_URI_PREFIX.len() + wav.len() * 4 / 3 + 4);
    uri.push_str(WAV_DATA_URI_PREFIX);
    STANDARD.encode_string(wav, &mut uri);
    uri
}

/// Recover the WAV bytes from a URI produced by [`to_data_uri`].
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, EncodingError> {
    let payload = uri.strip_prefix(WAV_DATA_URI_PREFIX).ok_or_else(|| {
        let head: String = uri.chars().take(32).collect();
        EncodingError::InvalidDataUri(format!("missing '{WAV_DATA_URI_PREFIX}' prefix: {head:?}"))
    })?;
    STANDARD
        .decode(payload)
        .map_err(|e| EncodingError::InvalidDataUri(e.to_string()))
}

/// Convenience: PCM straight to a data URI.
pub fn pcm_to_data_uri(pcm: &[u8], format: &WavFormat) -> Result<String, EncodingError> {
    encode_wav(pcm, format).map(|wav| to_data_uri(&wav))
}
