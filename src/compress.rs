use std::{
    fmt,
    io::{self, Read, Write},
    str::FromStr,
};

use crate::err::{Error, Result};

/// Compression of persisted chains. Every packed blob starts with one magic
/// byte naming the compression, so blobs written with different settings
/// can live in the same store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CompressionType {
    /// GZip (RFC1952)
    Gzip,
    /// Zlib (RFC1950)
    Zlib,
    /// Uncompressed
    No,
    /// LZ4
    LZ4,
}

impl FromStr for CompressionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gzip" => Ok(Self::Gzip),
            "zlib" => Ok(Self::Zlib),
            "no" => Ok(Self::No),
            "lz4" => Ok(Self::LZ4),
            _ => Err(format!("Invalid value: {}", s)),
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Gzip => "GZip",
                Self::Zlib => "Zlib",
                Self::No => "No",
                Self::LZ4 => "LZ4",
            }
        )
    }
}

impl CompressionType {
    pub fn to_magic(&self) -> u8 {
        match self {
            CompressionType::Gzip => 1,
            CompressionType::Zlib => 2,
            CompressionType::No => 3,
            CompressionType::LZ4 => 4,
        }
    }

    pub fn from_magic(magic: u8) -> Result<Self> {
        match magic {
            1 => Ok(CompressionType::Gzip),
            2 => Ok(CompressionType::Zlib),
            3 => Ok(CompressionType::No),
            4 => Ok(CompressionType::LZ4),
            _ => Err(Error::Codec(format!("unknown compression magic {}", magic))),
        }
    }

    /// Magic byte followed by the compressed payload.
    pub fn pack(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut packed = vec![self.to_magic()];
        let mut reader = data;
        self.compress(&mut reader, &mut packed)?;
        Ok(packed)
    }

    /// Reverses [`CompressionType::pack`], whatever compression it used.
    pub fn unpack(packed: &[u8]) -> Result<Vec<u8>> {
        let (&magic, payload) = packed
            .split_first()
            .ok_or_else(|| Error::Codec("empty packed blob".to_string()))?;
        let mut reader = payload;
        let mut data = Vec::new();
        Self::from_magic(magic)?.decompress(&mut reader, &mut data)?;
        Ok(data)
    }

    pub fn compress(&self, input: &mut impl Read, output: &mut impl Write) -> io::Result<()> {
        match self {
            CompressionType::Gzip => {
                let mut encoder =
                    flate2::write::GzEncoder::new(output, flate2::Compression::default());
                io::copy(input, &mut encoder)?;
                encoder.finish()?;
            }
            CompressionType::Zlib => {
                let mut encoder =
                    flate2::write::ZlibEncoder::new(output, flate2::Compression::default());
                io::copy(input, &mut encoder)?;
                encoder.finish()?;
            }
            CompressionType::No => {
                io::copy(input, output)?;
            }
            CompressionType::LZ4 => {
                let mut encoder = lz4_flex::frame::FrameEncoder::new(output);
                io::copy(input, &mut encoder)?;
                encoder.finish().map_err(io::Error::other)?;
            }
        }
        Ok(())
    }

    pub fn decompress(&self, input: &mut impl Read, output: &mut impl Write) -> io::Result<()> {
        match self {
            CompressionType::Gzip => {
                let mut decoder = flate2::write::GzDecoder::new(output);
                io::copy(input, &mut decoder)?;
                decoder.finish()?;
            }
            CompressionType::Zlib => {
                let mut decoder = flate2::write::ZlibDecoder::new(output);
                io::copy(input, &mut decoder)?;
                decoder.finish()?;
            }
            CompressionType::No => {
                io::copy(input, output)?;
            }
            CompressionType::LZ4 => {
                let mut decoder = lz4_flex::frame::FrameDecoder::new(input);
                io::copy(&mut decoder, output)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [CompressionType; 4] = [
        CompressionType::Gzip,
        CompressionType::Zlib,
        CompressionType::No,
        CompressionType::LZ4,
    ];

    #[test]
    fn test_pack_unpack() {
        let data = "Bunch of content here. ".repeat(64);
        for compression in ALL {
            let packed = compression.pack(data.as_bytes()).unwrap();
            assert_eq!(packed[0], compression.to_magic());
            assert_eq!(CompressionType::unpack(&packed).unwrap(), data.as_bytes());
        }
    }

    #[test]
    fn test_unpack_rejects_garbage() {
        assert!(CompressionType::unpack(&[]).is_err());
        assert!(CompressionType::unpack(&[9, 1, 2]).is_err());
        assert!(CompressionType::unpack(&[2, 1, 2, 3]).is_err());
    }

    #[test]
    fn test_from_str() {
        assert_eq!("LZ4".parse::<CompressionType>(), Ok(CompressionType::LZ4));
        assert!("brotli".parse::<CompressionType>().is_err());
    }
}
