//! Binary image loading.
//!
//! The loader populates main memory with a program's bytes at their
//! link-time addresses. The core then receives an entry word with the
//! promise that the four bytes at `entry - 4` hold the entry method's
//! big-endian byte length; the method cache reads that word on its first
//! miss. Raw images carry the size word at offset 0 and code from offset 4,
//! so their entry point is 4.

use std::fs;
use std::io;

use crate::common::data::Uword;
use crate::common::error::SimResult;
use crate::soc::MainMemory;

/// Reads a binary file into a byte buffer.
pub fn load_file(path: &str) -> io::Result<Vec<u8>> {
    let data = fs::read(path)?;
    log::info!("loaded {} bytes from {}", data.len(), path);
    Ok(data)
}

/// Places an image into main memory at `address`, without timing.
pub fn load_image(mem: &mut MainMemory, image: &[u8], address: Uword) -> SimResult<()> {
    mem.write_peek(address, image)
}
