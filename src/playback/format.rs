use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleEncoding {
    Pcm,
    Float,
}

/// Interleaved sample layout reported by a pull source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaveFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub encoding: SampleEncoding,
}

impl WaveFormat {
    pub fn pcm(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
            encoding: SampleEncoding::Pcm,
        }
    }

    pub fn float(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample: 32,
            encoding: SampleEncoding::Float,
        }
    }

    pub fn block_align(&self) -> usize {
        usize::from(self.channels) * usize::from(self.bits_per_sample / 8)
    }

    pub fn bytes_per_second(&self) -> usize {
        self.block_align() * self.sample_rate as usize
    }

    /// Byte value that encodes silence. 8-bit PCM is unsigned and centred
    /// on 0x80; every other layout is signed or float and silent at zero.
    pub fn silence_byte(&self) -> u8 {
        match (self.encoding, self.bits_per_sample) {
            (SampleEncoding::Pcm, 8) => 0x80,
            _ => 0x00,
        }
    }
}

impl Default for WaveFormat {
    fn default() -> Self {
        Self::pcm(44_100, 2, 16)
    }
}

impl fmt::Display for WaveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoding = match self.encoding {
            SampleEncoding::Pcm => "PCM",
            SampleEncoding::Float => "float",
        };
        write!(
            f,
            "{} Hz, {} ch, {}-bit {}",
            self.sample_rate, self.channels, self.bits_per_sample, encoding
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_align_and_rate() {
        let format = WaveFormat::pcm(48_000, 2, 16);
        assert_eq!(format.block_align(), 4);
        assert_eq!(format.bytes_per_second(), 192_000);
    }

    #[test]
    fn test_silence_byte_depends_on_layout() {
        assert_eq!(WaveFormat::pcm(8_000, 1, 8).silence_byte(), 0x80);
        assert_eq!(WaveFormat::pcm(44_100, 2, 16).silence_byte(), 0x00);
        assert_eq!(WaveFormat::float(48_000, 2).silence_byte(), 0x00);
    }
}
