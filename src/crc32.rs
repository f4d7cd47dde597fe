//! CRC-32 computation used by the `qCRC` command.
//!
//! GDB's `qCRC:addr,len` does *not* use the standard zlib/IEEE CRC-32: the
//! reference implementation (`original_source/GDBStub.cpp::Handle_qCRC`,
//! `original_source/CRC32.h`) seeds the accumulator with `-1U` and prints it
//! with `"C%08X"` directly, with no final complement, over a non-reflected,
//! MSB-first table walk. A reflected crate like `crc32fast` (which XORs the
//! result with `0xFFFFFFFF` at the end and processes bits LSB-first) computes
//! a different value for the same bytes and would disagree with every real
//! GDB client's local recomputation. This hand-rolled accumulator matches the
//! bit-exact algorithm instead (see also
//! `examples/other_examples/.../kelpsyberry-dust_.../server.rs.rs`'s `qCRC`
//! handler, which reimplements the same table and update step).

use std::sync::OnceLock;

const POLY: u32 = 0x04C1_1DB7;

fn table() -> &'static [u32; 256] {
    static TABLE: OnceLock<[u32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u32; 256];
        let mut crc = 0x8000_0000u32;
        let mut i = 1usize;
        while i < 256 {
            crc = if crc & 0x8000_0000 == 0 {
                crc << 1
            } else {
                (crc << 1) ^ POLY
            };
            for v in &mut table[i..i << 1] {
                *v ^= crc;
            }
            i <<= 1;
        }
        table
    })
}

/// Largest single chunk read from the target while computing a CRC.
pub const CRC_CHUNK_LEN: usize = 64 * 1024;

/// Incremental accumulator for GDB's `qCRC` checksum, chunked the same way
/// the original reference implementation chunks its `ReadTargetMemory` calls.
pub struct Crc32 {
    crc: u32,
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc32 {
    pub fn new() -> Self {
        Self { crc: 0xFFFF_FFFF }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        let table = table();
        for &byte in chunk {
            self.crc = (self.crc << 8) ^ table[(((self.crc >> 24) as u8) ^ byte) as usize];
        }
    }

    pub fn finalize(self) -> u32 {
        self.crc
    }
}
