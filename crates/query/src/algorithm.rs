use cmpack_pdsc::models::AlgorithmRef;
use std::io::{Cursor, Read};

/// A flash algorithm extracted from its pack archive.
///
/// Reads yield the raw ELF bytes of the algorithm.
#[derive(Debug, Clone)]
pub struct FlashAlgorithm {
    algorithm: AlgorithmRef,
    entry: String,
    data: Cursor<Vec<u8>>,
}

impl FlashAlgorithm {
    pub(crate) fn new(algorithm: AlgorithmRef, entry: String, data: Vec<u8>) -> Self {
        Self {
            algorithm,
            entry,
            data: Cursor::new(data),
        }
    }

    /// Where the descriptor says the algorithm applies.
    pub fn algorithm(&self) -> &AlgorithmRef {
        &self.algorithm
    }

    /// Member name the algorithm was read from.
    pub fn entry_name(&self) -> &str {
        &self.entry
    }

    /// File name without any directory, e.g. `LPC_IAP_512.FLM`.
    pub fn file_name(&self) -> &str {
        self.entry.rsplit('/').next().unwrap_or(&self.entry)
    }

    pub fn bytes(&self) -> &[u8] {
        self.data.get_ref()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data.into_inner()
    }
}

impl Read for FlashAlgorithm {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.data.read(buf)
    }
}
