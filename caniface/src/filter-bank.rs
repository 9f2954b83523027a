/*
 * Copyright (C) 2015-2023 IoT.bzh Company
 * Author: Fulup Ar Foll <fulup@iot.bzh>
 *
 * Redpesk interface code/config use MIT License and can be freely copy/modified even within proprietary code
 * License: $RP_BEGIN_LICENSE$ SPDX:MIT https://opensource.org/licenses/MIT $RP_END_LICENSE$
 *
*/
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// SocketCAN filters are emulated in software, their number is virtually unlimited.
pub const CAN_FILTER_NUMBER: u16 = 512;

/// Acceptance rule in link neutral encoding: `CanFrame::FLAG_EFF`/`FLAG_RTR`
/// may be set in both id and mask.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanFilterConfig {
    pub id: u32,
    pub mask: u32,
}

impl CanFilterConfig {
    pub fn new(id: u32, mask: u32) -> Self {
        CanFilterConfig { id, mask }
    }
}

/// Same layout as kernel `struct can_filter`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SockCanFilter {
    pub can_id: SockCanId,
    pub can_mask: SockCanId,
}

impl From<&CanFilterConfig> for SockCanFilter {
    fn from(config: &CanFilterConfig) -> Self {
        let mut can_id = config.id & CanFrame::MASK_EXT_ID;
        let mut can_mask = config.mask & CanFrame::MASK_EXT_ID;
        if config.id & CanFrame::FLAG_EFF != 0 {
            can_id |= FilterMask::EFF_FLAG.bits();
        }
        if config.id & CanFrame::FLAG_RTR != 0 {
            can_id |= FilterMask::RTR_FLAG.bits();
        }
        if config.mask & CanFrame::FLAG_EFF != 0 {
            can_mask |= FilterMask::EFF_FLAG.bits();
        }
        if config.mask & CanFrame::FLAG_RTR != 0 {
            can_mask |= FilterMask::RTR_FLAG.bits();
        }
        SockCanFilter { can_id, can_mask }
    }
}

impl SockCanFilter {
    /// Packets are matched when `received_id & mask == filter_id & mask`.
    pub fn matches(&self, canid: SockCanId) -> bool {
        (canid & self.can_mask) == (self.can_id & self.can_mask)
    }
}

/// Software acceptance filters. An empty bank accepts every frame.
#[derive(Clone, Debug, Default)]
pub struct SockCanFilterBank {
    masks: Vec<SockCanFilter>,
}

impl SockCanFilterBank {
    pub fn new() -> Self {
        SockCanFilterBank { masks: Vec::new() }
    }

    /// Replace the whole rule set.
    pub fn configure(&mut self, configs: &[CanFilterConfig]) {
        self.masks = configs.iter().map(SockCanFilter::from).collect();
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    pub fn accepts(&self, frame: &CanFrameRaw) -> bool {
        if self.masks.is_empty() {
            return true;
        }
        let canid = frame.get_id();
        self.masks.iter().any(|filter| filter.matches(canid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: u32, flags: FrameFlags) -> CanFrameRaw {
        CanFrameRaw::from(&CanFrame::new(id, &[0x55], flags).unwrap())
    }

    #[test]
    fn empty_bank_accepts_everything() {
        let bank = SockCanFilterBank::new();
        assert!(bank.accepts(&raw(0x000, FrameFlags::empty())));
        assert!(bank.accepts(&raw(0x1FFF_FFFF, FrameFlags::EXTENDED)));
    }

    #[test]
    fn single_rule_exact_match() {
        let mut bank = SockCanFilterBank::new();
        bank.configure(&[CanFilterConfig::new(0x100, 0x7FF)]);
        assert!(bank.accepts(&raw(0x100, FrameFlags::empty())));
        assert!(!bank.accepts(&raw(0x101, FrameFlags::empty())));
    }

    #[test]
    fn any_rule_matches() {
        let mut bank = SockCanFilterBank::new();
        bank.configure(&[CanFilterConfig::new(0x100, 0x7F0), CanFilterConfig::new(0x300, 0x7FF)]);
        assert!(bank.accepts(&raw(0x10F, FrameFlags::empty())));
        assert!(bank.accepts(&raw(0x300, FrameFlags::empty())));
        assert!(!bank.accepts(&raw(0x301, FrameFlags::empty())));
    }

    #[test]
    fn extended_flag_is_folded() {
        let mut bank = SockCanFilterBank::new();
        bank.configure(&[CanFilterConfig::new(
            0x100 | CanFrame::FLAG_EFF,
            CanFrame::MASK_EXT_ID | CanFrame::FLAG_EFF,
        )]);
        assert!(bank.accepts(&raw(0x100, FrameFlags::EXTENDED)));
        assert!(!bank.accepts(&raw(0x100, FrameFlags::empty())));
    }

    #[test]
    fn configure_replaces_rules() {
        let mut bank = SockCanFilterBank::new();
        bank.configure(&[CanFilterConfig::new(0x200, 0x7FF)]);
        bank.configure(&[CanFilterConfig::new(0x100, 0x7FF)]);
        assert_eq!(bank.len(), 1);
        assert!(!bank.accepts(&raw(0x200, FrameFlags::empty())));
        bank.configure(&[]);
        assert!(bank.is_empty());
        assert!(bank.accepts(&raw(0x200, FrameFlags::empty())));
    }
}
