//! Bit layout of the 16-bit entry flags and the version 3 extended flags

use crate::artifacts::index::stage::Stage;
use bitflags::bitflags;

/// Mask of the path length stored in the low 12 bits of the flags
pub const NAME_MASK: u16 = 0x0fff;

const STAGE_SHIFT: u16 = 12;

bitflags! {
    /// High bits of the on-disk flags field
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EntryFlags: u16 {
        const ASSUME_VALID = 0x8000;
        const EXTENDED = 0x4000;
        const STAGE = 0x3000;
    }
}

bitflags! {
    /// Extended flags, present on disk only for version 3 entries
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ExtendedFlags: u16 {
        const INTENT_TO_ADD = 0x2000;
        const SKIP_WORKTREE = 0x4000;
    }
}

impl EntryFlags {
    /// Pack flags, stage and path length into the on-disk field
    pub fn pack(self, stage: Stage, name_len: usize) -> u16 {
        let name_len = name_len.min(NAME_MASK as usize) as u16;
        let flags = self.difference(EntryFlags::STAGE).bits();

        flags | (stage.as_u16() << STAGE_SHIFT) | name_len
    }

    /// Split the on-disk field into flags, stage and path length
    pub fn unpack(raw: u16) -> (EntryFlags, Stage, usize) {
        let stage = u32::from((raw & EntryFlags::STAGE.bits()) >> STAGE_SHIFT);
        let stage = Stage::try_from(stage).unwrap_or_default();
        let flags = EntryFlags::from_bits_truncate(raw).difference(EntryFlags::STAGE);

        (flags, stage, (raw & NAME_MASK) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn packs_stage_into_bits_twelve_and_thirteen() {
        let raw = EntryFlags::empty().pack(Stage::Ours, 13);

        assert_eq!(raw, 0x2000 | 13);
        assert_eq!(EntryFlags::unpack(raw), (EntryFlags::empty(), Stage::Ours, 13));
    }

    #[test]
    fn caps_long_names_at_the_mask() {
        let raw = EntryFlags::ASSUME_VALID.pack(Stage::Normal, 5000);

        assert_eq!(raw, 0x8000 | NAME_MASK);
    }
}
