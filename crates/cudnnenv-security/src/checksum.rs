use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

/// Outcome of comparing a computed digest with the expected one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sha256Check {
    pub expected: String,
    pub actual: String,
}

impl Sha256Check {
    pub fn matches(&self) -> bool {
        self.expected.eq_ignore_ascii_case(&self.actual)
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn verify_sha256(bytes: &[u8], expected_hex: &str) -> Sha256Check {
    Sha256Check {
        expected: expected_hex.trim().to_ascii_lowercase(),
        actual: sha256_hex(bytes),
    }
}

pub fn verify_sha256_reader<R: Read>(mut reader: R, expected_hex: &str) -> Result<Sha256Check> {
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 64 * 1024];
    loop {
        let read = reader
            .read(&mut buffer)
            .context("failed to read payload while hashing")?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(Sha256Check {
        expected: expected_hex.trim().to_ascii_lowercase(),
        actual: hex::encode(hasher.finalize()),
    })
}

pub fn verify_sha256_file(path: &Path, expected_hex: &str) -> Result<Sha256Check> {
    let file = File::open(path)
        .with_context(|| format!("failed to open {} for hashing", path.display()))?;
    verify_sha256_reader(BufReader::new(file), expected_hex)
        .with_context(|| format!("failed to hash {}", path.display()))
}
