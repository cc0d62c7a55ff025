use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use std::fmt;
use std::io::{self, Read};

/// Read size per chunk. Bounds peak memory regardless of image size.
pub const CHUNK_SIZE: usize = 1024 * 1024; // 1MB

/// CRC32, MD5 and SHA1 of one byte stream, computed in a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentIdentity {
    pub crc32: u32,
    pub md5: [u8; 16],
    pub sha1: [u8; 20],
}

impl ContentIdentity {
    pub fn crc32_hex(&self) -> String {
        format!("{:08x}", self.crc32)
    }

    pub fn md5_hex(&self) -> String {
        hex::encode(self.md5)
    }

    pub fn sha1_hex(&self) -> String {
        hex::encode(self.sha1)
    }

    pub fn from_hex(crc32: &str, md5: &str, sha1: &str) -> Result<Self, String> {
        let crc32 = u32::from_str_radix(crc32, 16).map_err(|e| format!("crc32 '{}': {}", crc32, e))?;

        let mut md5_bytes = [0u8; 16];
        hex::decode_to_slice(md5, &mut md5_bytes).map_err(|e| format!("md5 '{}': {}", md5, e))?;

        let mut sha1_bytes = [0u8; 20];
        hex::decode_to_slice(sha1, &mut sha1_bytes)
            .map_err(|e| format!("sha1 '{}': {}", sha1, e))?;

        Ok(Self {
            crc32,
            md5: md5_bytes,
            sha1: sha1_bytes,
        })
    }
}

impl fmt::Display for ContentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.crc32_hex(), self.md5_hex(), self.sha1_hex())
    }
}

/// Three incremental accumulators fed from the same chunks.
pub struct IdentityAccumulator {
    crc32: crc32fast::Hasher,
    md5: Md5,
    sha1: Sha1,
}

impl Default for IdentityAccumulator {
    fn default() -> Self {
        Self {
            crc32: crc32fast::Hasher::new(),
            md5: Md5::new(),
            sha1: Sha1::new(),
        }
    }
}

impl IdentityAccumulator {
    pub fn update(&mut self, chunk: &[u8]) {
        self.crc32.update(chunk);
        self.md5.update(chunk);
        self.sha1.update(chunk);
    }

    pub fn finalize(self) -> ContentIdentity {
        let mut md5 = [0u8; 16];
        md5.copy_from_slice(&self.md5.finalize());
        let mut sha1 = [0u8; 20];
        sha1.copy_from_slice(&self.sha1.finalize());

        ContentIdentity {
            crc32: self.crc32.finalize(),
            md5,
            sha1,
        }
    }
}

/// Consumes `reader` to the end exactly once.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<ContentIdentity> {
    let mut acc = IdentityAccumulator::default();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        acc.update(&buffer[..bytes_read]);
    }

    Ok(acc.finalize())
}

pub fn hash_bytes(data: &[u8]) -> ContentIdentity {
    let mut acc = IdentityAccumulator::default();
    acc.update(data);
    acc.finalize()
}
