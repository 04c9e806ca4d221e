// src/chain/block.rs
//! Consensus serialization
//!
//! Byte-exact construction of the coinbase transaction, merkle root, block
//! header, and the serialized block relayed to the node. The coinbase is
//! assembled non-witness; when the template carries a witness commitment
//! the ready-made commitment scriptPubKey is appended as an extra output.

use crate::jobs::Job;
use sha2::{Digest, Sha256};

/// Header version bits a miner may roll (BIP310 default mask).
pub const VERSION_ROLLING_MASK: u32 = 0x1fff_e000;

/// Double SHA-256, the proof-of-work and txid hash function.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

/// Combines the job's advertised header version with optionally rolled bits.
///
/// Only bits inside [`VERSION_ROLLING_MASK`] may differ from the template
/// version; everything else is forced back to the template's value.
pub fn rolled_version(template_version: i32, submitted: Option<u32>) -> u32 {
    let base = template_version as u32;
    match submitted {
        Some(bits) => (base & !VERSION_ROLLING_MASK) | (bits & VERSION_ROLLING_MASK),
        None => base,
    }
}

/// Builds the coinbase transaction for a job and a concrete extranonce pair.
///
/// The scriptSig carries the BIP34 height push, the pool's coinbase tag,
/// and the concatenated extranonce1‖extranonce2 as one push. Outputs are the
/// payout script with the full coinbase value, plus the template's witness
/// commitment output when present.
pub fn build_coinbase(job: &Job, extranonce1: &[u8], extranonce2: &[u8]) -> Vec<u8> {
    let mut script_sig = Vec::with_capacity(64);
    push_height(job.template.height, &mut script_sig);
    push_data(job.coinbase_msg.as_bytes(), &mut script_sig);
    let mut nonces = Vec::with_capacity(extranonce1.len() + extranonce2.len());
    nonces.extend_from_slice(extranonce1);
    nonces.extend_from_slice(extranonce2);
    push_data(&nonces, &mut script_sig);

    let mut tx = Vec::with_capacity(128 + script_sig.len() + job.payout_script.len());
    tx.extend_from_slice(&1u32.to_le_bytes()); // tx version

    // One input spending the null outpoint.
    write_varint(1, &mut tx);
    tx.extend_from_slice(&[0u8; 32]);
    tx.extend_from_slice(&0xffff_ffffu32.to_le_bytes());
    write_varint(script_sig.len() as u64, &mut tx);
    tx.extend_from_slice(&script_sig);
    tx.extend_from_slice(&0xffff_ffffu32.to_le_bytes()); // sequence

    let has_commitment = !job.template.witness_commitment.is_empty();
    write_varint(if has_commitment { 2 } else { 1 }, &mut tx);
    tx.extend_from_slice(&job.template.coinbase_value.to_le_bytes());
    write_varint(job.payout_script.len() as u64, &mut tx);
    tx.extend_from_slice(&job.payout_script);
    if has_commitment {
        tx.extend_from_slice(&0u64.to_le_bytes());
        write_varint(job.template.witness_commitment.len() as u64, &mut tx);
        tx.extend_from_slice(&job.template.witness_commitment);
    }

    tx.extend_from_slice(&0u32.to_le_bytes()); // locktime
    tx
}

/// Folds a coinbase txid up the job's merkle branches to the root.
///
/// Branch hashes are already in internal byte order; each step hashes the
/// running value on the left and the branch on the right, the Stratum
/// convention for coinbase paths.
pub fn merkle_root(coinbase_txid: [u8; 32], branches: &[[u8; 32]]) -> [u8; 32] {
    let mut root = coinbase_txid;
    let mut buf = [0u8; 64];
    for branch in branches {
        buf[..32].copy_from_slice(&root);
        buf[32..].copy_from_slice(branch);
        root = sha256d(&buf);
    }
    root
}

/// Assembles the 80-byte block header for a job.
///
/// All multi-byte header fields are little-endian; the previous hash is
/// already stored on the job in header order and the merkle root is used
/// as computed.
pub fn build_header(
    job: &Job,
    version: u32,
    merkle_root: &[u8; 32],
    ntime: u32,
    nonce: u32,
) -> [u8; 80] {
    let mut header = [0u8; 80];
    header[0..4].copy_from_slice(&version.to_le_bytes());
    header[4..36].copy_from_slice(&job.prev_hash);
    header[36..68].copy_from_slice(merkle_root);
    header[68..72].copy_from_slice(&ntime.to_le_bytes());
    header[72..76].copy_from_slice(&job.bits.to_le_bytes());
    header[76..80].copy_from_slice(&nonce.to_le_bytes());
    header
}

/// Serializes a complete block: header, transaction count, coinbase, then
/// the template's transactions verbatim.
pub fn serialize_block(header: &[u8; 80], coinbase: &[u8], transactions: &[Vec<u8>]) -> Vec<u8> {
    let tx_bytes: usize = transactions.iter().map(Vec::len).sum();
    let mut block = Vec::with_capacity(80 + 9 + coinbase.len() + tx_bytes);
    block.extend_from_slice(header);
    write_varint(1 + transactions.len() as u64, &mut block);
    block.extend_from_slice(coinbase);
    for tx in transactions {
        block.extend_from_slice(tx);
    }
    block
}

/// Writes a Bitcoin variable-length integer (compact size).
fn write_varint(n: u64, out: &mut Vec<u8>) {
    if n < 0xfd {
        out.push(n as u8);
    } else if n <= 0xffff {
        out.push(0xfd);
        out.extend_from_slice(&(n as u16).to_le_bytes());
    } else if n <= 0xffff_ffff {
        out.push(0xfe);
        out.extend_from_slice(&(n as u32).to_le_bytes());
    } else {
        out.push(0xff);
        out.extend_from_slice(&n.to_le_bytes());
    }
}

/// Appends a minimal script data push.
fn push_data(data: &[u8], out: &mut Vec<u8>) {
    match data.len() {
        0 => out.push(0x00),
        len @ 1..=75 => {
            out.push(len as u8);
            out.extend_from_slice(data);
        }
        len @ 76..=255 => {
            out.push(0x4c); // OP_PUSHDATA1
            out.push(len as u8);
            out.extend_from_slice(data);
        }
        len => {
            // Coinbase script components stay far under this bound; a
            // larger push would truncate the length prefix.
            debug_assert!(len <= u16::MAX as usize, "push exceeds OP_PUSHDATA2 range");
            out.push(0x4d); // OP_PUSHDATA2
            out.extend_from_slice(&(len as u16).to_le_bytes());
            out.extend_from_slice(data);
        }
    }
}

/// Appends the BIP34 height push: the height as a minimal little-endian
/// script number, padded with a zero byte when the top bit would read as a
/// sign bit.
fn push_height(height: u64, out: &mut Vec<u8>) {
    let mut bytes = Vec::with_capacity(5);
    let mut rest = height;
    while rest > 0 {
        bytes.push((rest & 0xff) as u8);
        rest >>= 8;
    }
    if bytes.is_empty() {
        bytes.push(0);
    } else if bytes[bytes.len() - 1] & 0x80 != 0 {
        bytes.push(0);
    }
    push_data(&bytes, out);
}
