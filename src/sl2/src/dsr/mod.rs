//! Remastered-format flat save container (`DRAKS0005.sl2`).
//!
//! The file is a fixed-size blob: eleven slots at fixed offsets, ten
//! character slots plus one technical metadata slot holding the load-menu
//! summaries and per-slot occupied flags. Each slot is a 16-byte header
//! followed by an AES-128-CBC payload; the header bytes are read as the
//! CBC IV on load and overwritten with the MD5 of the fresh ciphertext on
//! export, which is how the game itself stamps them.

mod inventory;
mod stats;
mod transfer;

pub use inventory::{
    EquipSlot, Inventory, InventoryError, InventoryItem, ItemCategory, ItemInfusion,
};
pub use stats::{PlayerClass, Stat, StatsEditor};
pub use transfer::{copy_slot, duplicate_slot, export_slot, import_slot, repair_slot};

use crate::character::{Character, RecordError};
use crate::crypto::{self, CryptoError};
use thiserror::Error;

/// Fixed AES-128 key baked into the remastered save format.
pub const AES_KEY: [u8; 16] = [
    0xB5, 0x61, 0x3F, 0xA9, 0x44, 0x8C, 0xD0, 0x17, 0x9A, 0xE1, 0x76, 0x2B, 0x58, 0xC3, 0x0E,
    0xF4,
];

/// First slot begins after the container preamble.
pub const BASE_SLOT_OFFSET: usize = 0x2C0;
/// Whole slot: 16-byte IV/checksum header + payload.
pub const SLOT_SIZE: usize = 0x60030;
/// Decrypted character record size.
pub const SLOT_PAYLOAD_SIZE: usize = 0x60020;
/// Ten character slots plus the technical metadata slot.
pub const SLOT_COUNT: usize = 11;
pub const CHARACTER_SLOTS: usize = 10;
/// Index of the technical metadata slot.
pub const METADATA_SLOT: usize = 10;
/// Minimum valid container size.
pub const SAVE_FILE_SIZE: usize = BASE_SLOT_OFFSET + SLOT_COUNT * SLOT_SIZE;

/// Load-menu summary blocks inside the metadata slot.
pub const METADATA_BLOCK_OFFSET: usize = 0xC0;
pub const METADATA_BLOCK_SIZE: usize = 400;
/// Per-slot occupied flag bytes inside the metadata slot.
pub const OCCUPIED_FLAG_OFFSET: usize = 0xC4;

/// Emptiness heuristic range: a slot with these bytes all zero holds no
/// character.
const EMPTY_PROBE_START: usize = 0x20;
const EMPTY_PROBE_LEN: usize = 0x71; // 0x20..=0x90

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Invalid save file: {actual} bytes, expected at least {expected}")]
    InvalidFormat { actual: usize, expected: usize },

    #[error("Slot index {slot} out of range (container has {max} slots)")]
    SlotOutOfRange { slot: usize, max: usize },

    #[error("Slot {0} is empty")]
    EmptySlot(usize),

    #[error("Anchor pattern not found in character record")]
    AnchorNotFound,

    #[error("Slot {slot} payload is {actual} bytes, expected {expected}")]
    SizeMismatch {
        slot: usize,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// A loaded remastered save: the original container bytes plus every
/// slot's decrypted record. Mutations are applied to the records in
/// memory and committed in a single [`SaveFile::export`] pass.
pub struct SaveFile {
    data: Vec<u8>,
    characters: Vec<Character>,
}

fn slot_offset(slot: usize) -> usize {
    BASE_SLOT_OFFSET + slot * SLOT_SIZE
}

impl SaveFile {
    /// Parse and decrypt a container.
    pub fn load(data: Vec<u8>) -> Result<Self, SaveError> {
        if data.len() < SAVE_FILE_SIZE {
            return Err(SaveError::InvalidFormat {
                actual: data.len(),
                expected: SAVE_FILE_SIZE,
            });
        }

        let mut characters = Vec::with_capacity(SLOT_COUNT);
        for slot in 0..SLOT_COUNT {
            let offset = slot_offset(slot);

            let mut iv = [0u8; 16];
            iv.copy_from_slice(&data[offset..offset + 16]);

            let ciphertext = &data[offset + 16..offset + 16 + SLOT_PAYLOAD_SIZE];
            let plaintext = crypto::decrypt_cbc(ciphertext, &AES_KEY, &iv)?;
            characters.push(Character::new(plaintext, slot));
        }

        Ok(SaveFile { data, characters })
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn character(&self, slot: usize) -> Result<&Character, SaveError> {
        self.characters.get(slot).ok_or(SaveError::SlotOutOfRange {
            slot,
            max: SLOT_COUNT,
        })
    }

    pub fn character_mut(&mut self, slot: usize) -> Result<&mut Character, SaveError> {
        self.characters
            .get_mut(slot)
            .ok_or(SaveError::SlotOutOfRange {
                slot,
                max: SLOT_COUNT,
            })
    }

    /// The technical metadata slot (load-menu summaries, occupied flags).
    pub fn metadata(&self) -> &Character {
        &self.characters[METADATA_SLOT]
    }

    pub fn metadata_mut(&mut self) -> &mut Character {
        &mut self.characters[METADATA_SLOT]
    }

    /// Replace a slot's record wholesale (slot transfer/import paths).
    pub(crate) fn replace_character(
        &mut self,
        slot: usize,
        data: Vec<u8>,
    ) -> Result<(), SaveError> {
        if slot >= SLOT_COUNT {
            return Err(SaveError::SlotOutOfRange {
                slot,
                max: SLOT_COUNT,
            });
        }
        self.characters[slot] = Character::new(data, slot);
        Ok(())
    }

    /// A slot is empty when its probe range holds only zeros.
    pub fn is_slot_empty(&self, slot: usize) -> Result<bool, SaveError> {
        let ch = self.character(slot)?;
        Ok(ch.len() <= EMPTY_PROBE_START + EMPTY_PROBE_LEN - 1
            || ch.is_zeroed(EMPTY_PROBE_START, EMPTY_PROBE_LEN))
    }

    /// Re-encrypt every record into a copy of the original container.
    ///
    /// Each slot keeps its IV (the current header bytes), then the header
    /// is restamped with the MD5 of the new ciphertext. Bytes outside the
    /// slots are copied unchanged.
    pub fn export(&self) -> Result<Vec<u8>, SaveError> {
        let mut out = self.data.clone();

        for ch in &self.characters {
            if ch.len() != SLOT_PAYLOAD_SIZE {
                return Err(SaveError::SizeMismatch {
                    slot: ch.slot(),
                    expected: SLOT_PAYLOAD_SIZE,
                    actual: ch.len(),
                });
            }

            let offset = slot_offset(ch.slot());

            let mut iv = [0u8; 16];
            iv.copy_from_slice(&out[offset..offset + 16]);

            let ciphertext = crypto::encrypt_cbc(ch.as_bytes(), &AES_KEY, &iv)?;
            let checksum = crypto::md5_digest(&ciphertext);

            out[offset..offset + 16].copy_from_slice(&checksum);
            out[offset + 16..offset + 16 + SLOT_PAYLOAD_SIZE].copy_from_slice(&ciphertext);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a container the way the game would: encrypt zeroed records,
    /// stamp headers with MD5(ciphertext) so load/export is a fixed point.
    pub(crate) fn synthetic_save(fill: impl Fn(usize, &mut [u8])) -> Vec<u8> {
        let mut data = vec![0u8; SAVE_FILE_SIZE];

        for slot in 0..SLOT_COUNT {
            let mut payload = vec![0u8; SLOT_PAYLOAD_SIZE];
            fill(slot, &mut payload);

            let offset = slot_offset(slot);
            // Encrypt with a scratch IV, then stamp the header the way the
            // game does; the first plaintext block is sacrificial.
            let iv = crypto::md5_digest(&payload);
            let ciphertext = crypto::encrypt_cbc(&payload, &AES_KEY, &iv).unwrap();
            data[offset..offset + 16].copy_from_slice(&iv);
            data[offset + 16..offset + 16 + SLOT_PAYLOAD_SIZE].copy_from_slice(&ciphertext);
        }

        data
    }

    #[test]
    fn test_load_rejects_short_file() {
        let result = SaveFile::load(vec![0u8; 1024]);
        assert!(matches!(result, Err(SaveError::InvalidFormat { .. })));
    }

    #[test]
    fn test_load_decrypts_every_slot() {
        let data = synthetic_save(|slot, payload| {
            payload[0x100] = slot as u8 + 1;
        });

        let save = SaveFile::load(data).unwrap();
        assert_eq!(save.characters().len(), SLOT_COUNT);
        for slot in 0..SLOT_COUNT {
            assert_eq!(save.character(slot).unwrap().get_byte(0x100).unwrap(), slot as u8 + 1);
        }
    }

    #[test]
    fn test_export_is_stable_after_one_pass() {
        let data = synthetic_save(|_, payload| {
            payload[0x400] = 0x7F;
        });

        // First export rewrites the headers into their fixed point.
        let first = SaveFile::load(data).unwrap().export().unwrap();
        let second = SaveFile::load(first.clone()).unwrap().export().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_export_keeps_container_preamble() {
        let mut data = synthetic_save(|_, _| {});
        data[0x40] = 0xAB; // untouched container byte

        let out = SaveFile::load(data).unwrap().export().unwrap();
        assert_eq!(out[0x40], 0xAB);
    }

    #[test]
    fn test_mutation_survives_roundtrip() {
        let data = synthetic_save(|_, _| {});
        let mut save = SaveFile::load(data).unwrap();

        save.character_mut(2).unwrap().set_byte(0x1000, 0x5A).unwrap();
        let exported = save.export().unwrap();

        let reloaded = SaveFile::load(exported).unwrap();
        assert_eq!(reloaded.character(2).unwrap().get_byte(0x1000).unwrap(), 0x5A);
    }

    #[test]
    fn test_export_rejects_resized_record() {
        let data = synthetic_save(|_, _| {});
        let mut save = SaveFile::load(data).unwrap();
        save.replace_character(1, vec![0u8; 64]).unwrap();

        assert!(matches!(
            save.export(),
            Err(SaveError::SizeMismatch { slot: 1, .. })
        ));
    }

    #[test]
    fn test_slot_emptiness_probe() {
        let data = synthetic_save(|slot, payload| {
            if slot == 3 {
                payload[0x50] = 1; // inside the probe range
            }
        });

        let save = SaveFile::load(data).unwrap();
        assert!(!save.is_slot_empty(3).unwrap());
        assert!(save.is_slot_empty(4).unwrap());
        assert!(save.is_slot_empty(99).is_err());
    }
}
