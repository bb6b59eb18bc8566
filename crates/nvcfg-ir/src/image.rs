//! Binary image contract.

use std::io;
use std::path::Path;

/// A GPU binary image as the reconstruction consumes it: an architecture
/// id, raw bytes, and the ability to dump itself for the external tool.
pub trait BinaryImage {
    /// SM architecture generation (e.g. 70 for sm_70).
    fn sm_arch(&self) -> u32;

    /// Raw image bytes.
    fn data(&self) -> &[u8];

    /// Image length in bytes.
    fn len(&self) -> usize {
        self.data().len()
    }

    /// Whether the image is empty.
    fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    /// Write the image to a file for the external tool to consume.
    ///
    /// # Errors
    /// Propagates the underlying I/O error.
    fn write_to(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, self.data())
    }
}

/// An in-memory image with an explicit architecture id.
#[derive(Clone, Debug)]
pub struct RawImage {
    pub arch: u32,
    pub data: Vec<u8>,
}

impl RawImage {
    /// Wrap raw bytes with an architecture id.
    #[must_use]
    pub const fn new(arch: u32, data: Vec<u8>) -> Self {
        Self { arch, data }
    }
}

impl BinaryImage for RawImage {
    fn sm_arch(&self) -> u32 {
        self.arch
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}
