//! JSON key files for hosts that hand a sifted key between processes.
//!
//! Layout: `{"version": 1, "bits": "1011..."}`. The core itself keeps all
//! state in memory; only callers that opt in touch the filesystem.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bits::SharedKey;
use crate::error::QkdError;
use crate::versioning::{KEY_FILE_VERSION, expect_version};

#[derive(Debug, Serialize, Deserialize)]
struct KeyFile {
    version: u16,
    bits: String,
}

impl KeyFile {
    fn for_key(key: &SharedKey) -> Self {
        Self {
            version: KEY_FILE_VERSION,
            bits: key.to_string(),
        }
    }
}

pub fn encode_key(key: &SharedKey) -> Result<String, QkdError> {
    Ok(serde_json::to_string_pretty(&KeyFile::for_key(key))?)
}

pub fn decode_key(text: &str) -> Result<SharedKey, QkdError> {
    let record: KeyFile = serde_json::from_str(text)?;
    into_key(record)
}

pub fn save_key(path: &Path, key: &SharedKey) -> Result<(), QkdError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &KeyFile::for_key(key))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

pub fn load_key(path: &Path) -> Result<SharedKey, QkdError> {
    let reader = BufReader::new(File::open(path)?);
    let record: KeyFile = serde_json::from_reader(reader)?;
    into_key(record)
}

fn into_key(record: KeyFile) -> Result<SharedKey, QkdError> {
    expect_version(record.version, KEY_FILE_VERSION, "KeyFile")?;
    SharedKey::from_bit_str(&record.bits)
}
