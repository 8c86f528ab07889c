//! Key-to-slot hashing for the sharded keyspace.
//!
//! Every client must agree on which shard owns which key, so the hash is
//! fixed: CRC-64 (Jones polynomial, reflected, zero init and xorout)
//! reduced modulo the slot count.

/// Total number of hash slots in the cluster keyspace
pub const SLOT_COUNT: u16 = 1024;

/// Reflected form of the Jones polynomial 0xad93d23594c935a9
const CRC64_POLY: u64 = 0x95ac_9329_ac4b_c9b5;

const fn build_crc64_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u64;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 == 1 {
                (crc >> 1) ^ CRC64_POLY
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

const CRC64_TABLE: [u64; 256] = build_crc64_table();

/// Calculate the CRC-64 checksum of data
pub fn crc64(data: &[u8]) -> u64 {
    let mut crc: u64 = 0;
    for &byte in data {
        let index = ((crc ^ byte as u64) & 0xff) as usize;
        crc = CRC64_TABLE[index] ^ (crc >> 8);
    }
    crc
}

/// Calculate the slot owning a partition key.
///
/// Total over all byte strings, including empty input, and deterministic
/// across processes and restarts.
pub fn slot_for(key: &[u8]) -> u16 {
    (crc64(key) % SLOT_COUNT as u64) as u16
}
