//! BND4 archive save container (Dark Souls III `.sl2`).
//!
//! Unlike the flat remastered container, the archive format carries a real
//! header: a 4-byte magic, an entry count, and a table of per-entry
//! headers giving each entry's declared size and data offset. Entry data
//! is a 16-byte MD5 tag, a 16-byte IV, then the ciphertext; the tag covers
//! IV + ciphertext. One corrupt entry must not take the rest of the file
//! down with it, so slot loads fail individually.

mod inventory;
mod stats;

pub use inventory::{
    encode_item_id, DecodedItem, Inventory, InventoryError, InventoryItem, ItemInfusion,
    ItemSeparator,
};
pub use stats::{PlayerClass, Stat, StatsEditor};

use crate::character::{Character, RecordError};
use crate::crypto::{self, CryptoError};
use thiserror::Error;

/// Fixed AES-128 key baked into the archive save format.
pub const AES_KEY: [u8; 16] = [
    0xFD, 0x46, 0x4D, 0x69, 0x5E, 0x69, 0xA3, 0x9A, 0x10, 0xE3, 0x19, 0xA7, 0xAC, 0xE8, 0xB7,
    0xFA,
];

pub const MAGIC: [u8; 4] = *b"BND4";
pub const HEADER_SIZE: usize = 0x40;
pub const ENTRY_HEADER_SIZE: usize = 0x20;
/// Entry count lives in the file header.
const ENTRY_COUNT_OFFSET: usize = 0x0C;
/// Within an entry header: declared entry size and data offset.
const ENTRY_SIZE_OFFSET: usize = 0x08;
const ENTRY_DATA_OFFSET: usize = 0x10;

/// Checksum + IV preamble inside each entry.
const ENTRY_PREAMBLE: usize = 32;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Not a BND4 archive ({0} bytes, bad or missing magic)")]
    InvalidFormat(usize),

    #[error("Entry {slot} header or data lies outside the file")]
    TruncatedEntry { slot: usize },

    #[error("Checksum mismatch for slot {slot}")]
    ChecksumMismatch { slot: usize },

    #[error("Slot {slot} payload is {actual} bytes, expected {expected}")]
    SizeMismatch {
        slot: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Slot index {slot} out of range (archive has {max} entries)")]
    SlotOutOfRange { slot: usize, max: usize },

    #[error("Slot {0} did not load (see load_failures)")]
    SlotUnavailable(usize),

    #[error("Anchor pattern not found in character record")]
    AnchorNotFound,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

struct EntryHeader {
    size: usize,
    data_offset: usize,
}

fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64_le(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

fn entry_header(data: &[u8], slot: usize) -> Result<EntryHeader, SaveError> {
    let header_offset = HEADER_SIZE + slot * ENTRY_HEADER_SIZE;
    if header_offset + ENTRY_HEADER_SIZE > data.len() {
        return Err(SaveError::TruncatedEntry { slot });
    }

    let size = read_u64_le(data, header_offset + ENTRY_SIZE_OFFSET) as usize;
    let data_offset = read_u32_le(data, header_offset + ENTRY_DATA_OFFSET) as usize;

    if size < ENTRY_PREAMBLE || data_offset.checked_add(size).is_none_or(|end| end > data.len()) {
        return Err(SaveError::TruncatedEntry { slot });
    }

    Ok(EntryHeader { size, data_offset })
}

fn load_slot(data: &[u8], slot: usize) -> Result<Character, SaveError> {
    let header = entry_header(data, slot)?;
    let base = header.data_offset;

    let stored_checksum = &data[base..base + 16];
    let computed = crypto::md5_digest(&data[base + 16..base + header.size]);
    if stored_checksum != computed.as_slice() {
        return Err(SaveError::ChecksumMismatch { slot });
    }

    let mut iv = [0u8; 16];
    iv.copy_from_slice(&data[base + 16..base + 32]);

    let ciphertext = &data[base + ENTRY_PREAMBLE..base + header.size];
    let plaintext = crypto::decrypt_cbc(ciphertext, &AES_KEY, &iv)?;

    Ok(Character::new(plaintext, slot))
}

/// A loaded archive save: original container bytes plus per-slot load
/// results. Failed slots keep their error; the rest stay editable.
pub struct SaveFile {
    data: Vec<u8>,
    slots: Vec<Result<Character, SaveError>>,
}

impl SaveFile {
    /// Parse the archive and decrypt every entry that verifies.
    pub fn load(data: Vec<u8>) -> Result<Self, SaveError> {
        if data.len() < HEADER_SIZE || data[..4] != MAGIC {
            return Err(SaveError::InvalidFormat(data.len()));
        }

        let entry_count = read_u32_le(&data, ENTRY_COUNT_OFFSET) as usize;
        let slots = (0..entry_count).map(|slot| load_slot(&data, slot)).collect();

        Ok(SaveFile { data, slots })
    }

    pub fn entry_count(&self) -> usize {
        self.slots.len()
    }

    /// Loaded character for a slot; `SlotUnavailable` when that entry
    /// failed verification at load time.
    pub fn character(&self, slot: usize) -> Result<&Character, SaveError> {
        match self.slots.get(slot) {
            None => Err(SaveError::SlotOutOfRange {
                slot,
                max: self.slots.len(),
            }),
            Some(Err(_)) => Err(SaveError::SlotUnavailable(slot)),
            Some(Ok(ch)) => Ok(ch),
        }
    }

    pub fn character_mut(&mut self, slot: usize) -> Result<&mut Character, SaveError> {
        let max = self.slots.len();
        match self.slots.get_mut(slot) {
            None => Err(SaveError::SlotOutOfRange { slot, max }),
            Some(Err(_)) => Err(SaveError::SlotUnavailable(slot)),
            Some(Ok(ch)) => Ok(ch),
        }
    }

    /// Slots that failed to load, with their reasons.
    pub fn load_failures(&self) -> impl Iterator<Item = (usize, &SaveError)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, state)| state.as_ref().err().map(|e| (slot, e)))
    }

    /// Emptiness heuristic for archive records.
    pub fn is_slot_empty(&self, slot: usize) -> Result<bool, SaveError> {
        let ch = self.character(slot)?;
        Ok(ch.len() < 0x100 || ch.is_zeroed(0x10, 0x30))
    }

    /// Re-encrypt every loaded slot into a copy of the original archive.
    ///
    /// The entry's original IV is reused — regenerating it would break
    /// compatibility with the game's reader — and the declared entry size
    /// is immutable, so a record whose plaintext length drifted since
    /// load fails with `SizeMismatch`. Failed slots and all non-entry
    /// bytes are copied through unchanged.
    pub fn export(&self) -> Result<Vec<u8>, SaveError> {
        let mut out = self.data.clone();

        for (slot, state) in self.slots.iter().enumerate() {
            let Ok(ch) = state else {
                continue;
            };

            let header = entry_header(&out, slot)?;
            let base = header.data_offset;
            let expected = header.size - ENTRY_PREAMBLE;

            let mut iv = [0u8; 16];
            iv.copy_from_slice(&out[base + 16..base + 32]);

            let ciphertext = crypto::encrypt_cbc(ch.as_bytes(), &AES_KEY, &iv)?;
            if ciphertext.len() != expected {
                return Err(SaveError::SizeMismatch {
                    slot,
                    expected,
                    actual: ciphertext.len(),
                });
            }

            out[base + ENTRY_PREAMBLE..base + header.size].copy_from_slice(&ciphertext);

            let checksum = crypto::md5_digest(&out[base + 16..base + header.size]);
            out[base..base + 16].copy_from_slice(&checksum);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal archive the way the game writes one.
    pub(crate) fn synthetic_archive(payloads: &[Vec<u8>]) -> Vec<u8> {
        let mut data = vec![0u8; HEADER_SIZE + payloads.len() * ENTRY_HEADER_SIZE];
        data[..4].copy_from_slice(&MAGIC);
        data[ENTRY_COUNT_OFFSET..ENTRY_COUNT_OFFSET + 4]
            .copy_from_slice(&(payloads.len() as u32).to_le_bytes());

        for (slot, payload) in payloads.iter().enumerate() {
            assert!(payload.len().is_multiple_of(16));

            let iv: [u8; 16] = crypto::md5_digest(&[slot as u8]);
            let ciphertext = crypto::encrypt_cbc(payload, &AES_KEY, &iv).unwrap();

            let data_offset = data.len();
            let entry_size = ENTRY_PREAMBLE + ciphertext.len();

            let header_offset = HEADER_SIZE + slot * ENTRY_HEADER_SIZE;
            data[header_offset + ENTRY_SIZE_OFFSET..header_offset + ENTRY_SIZE_OFFSET + 8]
                .copy_from_slice(&(entry_size as u64).to_le_bytes());
            data[header_offset + ENTRY_DATA_OFFSET..header_offset + ENTRY_DATA_OFFSET + 4]
                .copy_from_slice(&(data_offset as u32).to_le_bytes());

            let mut tagged = Vec::with_capacity(16 + ciphertext.len());
            tagged.extend_from_slice(&iv);
            tagged.extend_from_slice(&ciphertext);
            let checksum = crypto::md5_digest(&tagged);

            data.extend_from_slice(&checksum);
            data.extend_from_slice(&tagged);
        }

        data
    }

    fn payload_with(marker: u8) -> Vec<u8> {
        let mut payload = vec![0u8; 0x800];
        payload[0x20] = marker;
        payload
    }

    #[test]
    fn test_load_rejects_bad_magic() {
        let mut data = synthetic_archive(&[payload_with(1)]);
        data[0] = b'X';
        assert!(matches!(
            SaveFile::load(data),
            Err(SaveError::InvalidFormat(_))
        ));
        assert!(matches!(
            SaveFile::load(vec![0u8; 8]),
            Err(SaveError::InvalidFormat(8))
        ));
    }

    #[test]
    fn test_load_decrypts_entries() {
        let data = synthetic_archive(&[payload_with(1), payload_with(2)]);
        let save = SaveFile::load(data).unwrap();

        assert_eq!(save.entry_count(), 2);
        assert_eq!(save.character(0).unwrap().get_byte(0x20).unwrap(), 1);
        assert_eq!(save.character(1).unwrap().get_byte(0x20).unwrap(), 2);
        assert_eq!(save.load_failures().count(), 0);
    }

    #[test]
    fn test_corrupt_slot_fails_alone() {
        let mut data = synthetic_archive(&[payload_with(1), payload_with(2)]);
        // flip one ciphertext byte of entry 0
        let header = entry_header(&data, 0).unwrap();
        data[header.data_offset + ENTRY_PREAMBLE + 5] ^= 0xFF;

        let save = SaveFile::load(data).unwrap();
        assert!(matches!(
            save.character(0),
            Err(SaveError::SlotUnavailable(0))
        ));
        let failures: Vec<_> = save.load_failures().collect();
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            failures[0],
            (0, SaveError::ChecksumMismatch { slot: 0 })
        ));

        // the other slot is intact and editable
        assert_eq!(save.character(1).unwrap().get_byte(0x20).unwrap(), 2);
    }

    #[test]
    fn test_export_unmodified_is_byte_identical() {
        let data = synthetic_archive(&[payload_with(1), payload_with(2), payload_with(3)]);
        let save = SaveFile::load(data.clone()).unwrap();
        assert_eq!(save.export().unwrap(), data);
    }

    #[test]
    fn test_export_roundtrips_mutation() {
        let data = synthetic_archive(&[payload_with(1)]);
        let mut save = SaveFile::load(data).unwrap();

        save.character_mut(0).unwrap().set_byte(0x100, 0x42).unwrap();
        let exported = save.export().unwrap();

        let reloaded = SaveFile::load(exported).unwrap();
        assert_eq!(reloaded.character(0).unwrap().get_byte(0x100).unwrap(), 0x42);
        assert_eq!(reloaded.load_failures().count(), 0);
    }

    #[test]
    fn test_export_preserves_failed_slot_bytes() {
        let mut data = synthetic_archive(&[payload_with(1), payload_with(2)]);
        let header = entry_header(&data, 0).unwrap();
        data[header.data_offset] ^= 0xFF; // corrupt stored checksum

        let save = SaveFile::load(data.clone()).unwrap();
        let exported = save.export().unwrap();

        // failed entry's bytes pass through untouched
        let start = header.data_offset;
        let end = start + header.size;
        assert_eq!(exported[start..end], data[start..end]);
    }

    #[test]
    fn test_export_rejects_resized_record() {
        let data = synthetic_archive(&[payload_with(1)]);
        let mut save = SaveFile::load(data).unwrap();

        save.slots[0] = Ok(Character::new(vec![0u8; 0x810], 0));
        assert!(matches!(
            save.export(),
            Err(SaveError::SizeMismatch { slot: 0, .. })
        ));
    }

    #[test]
    fn test_truncated_entry_table() {
        let mut data = synthetic_archive(&[payload_with(1)]);
        // claim more entries than the table holds
        data[ENTRY_COUNT_OFFSET] = 5;

        let save = SaveFile::load(data).unwrap();
        assert!(matches!(
            save.load_failures().next(),
            Some((1, SaveError::TruncatedEntry { slot: 1 }))
        ));
    }
}
