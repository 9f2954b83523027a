/*
 * Copyright (C) 2015-2023 IoT.bzh Company
 * Author: Fulup Ar Foll <fulup@iot.bzh>
 *
 * Redpesk interface code/config use MIT License and can be freely copy/modified even within proprietary code
 * License: $RP_BEGIN_LICENSE$ SPDX:MIT https://opensource.org/licenses/MIT $RP_END_LICENSE$
 *
 * References:
 *    https://www.kernel.org/doc/html/latest/networking/can.html#how-to-use-socketcan
 *
*/
use bitflags::bitflags;
use embedded_can::{ExtendedId, Id, StandardId};

use super::cglue;
use crate::prelude::*;
use std::mem;

pub type SockCanId = u32;
bitflags! {
    #[derive(PartialEq, Eq, Debug, Clone, Copy)]
    pub struct FilterMask: SockCanId {
        /// SFF_MASK valid bits in standard frame id
        const SFF_MASK = cglue::can_MASK_x_SFF_MASK;
        /// EFF_MASK valid bits in extended frame id
        const EFF_MASK = cglue::can_MASK_x_EFF_MASK;
        /// EFF_FLAG indicate 29 bit extended format
        const EFF_FLAG= cglue::can_FLAGS_x_EFF_FLAG;
        /// RTR_FLAG remote transmission request flag
        const RTR_FLAG= cglue::can_FLAGS_x_RTR_FLAG;
        /// ERR_FLAG error flag
        const ERR_FLAG= cglue::can_FLAGS_x_ERR_FLAG;
        /// ERR_MASK valid bits in error frame
        const ERR_MASK=cglue::can_MASK_x_ERR_MASK;
    }
}

bitflags! {
    /// Frame kind flags of the link neutral representation.
    #[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Default)]
    pub struct FrameFlags: u8 {
        const EXTENDED = 0b001;
        const REMOTE   = 0b010;
        const ERROR    = 0b100;
    }
}

/// Link neutral CAN frame. The identifier is kept without flag bits,
/// `get_raw_id()` folds them back using the `FLAG_*` convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CanFrame {
    id: u32,
    flags: FrameFlags,
    len: u8,
    data: [u8; 8],
}

impl CanFrame {
    pub const MASK_STD_ID: u32 = 0x0000_07FF;
    pub const MASK_EXT_ID: u32 = 0x1FFF_FFFF;
    pub const FLAG_EFF: u32 = 1 << 31;
    pub const FLAG_RTR: u32 = 1 << 30;
    pub const FLAG_ERR: u32 = 1 << 29;
    pub const MAX_DATA_LEN: usize = cglue::can_MTU_x_MAX_DLEN as usize;

    pub fn new(id: u32, data: &[u8], flags: FrameFlags) -> Result<Self, CanError> {
        if data.len() > Self::MAX_DATA_LEN {
            return Err(CanError::new(
                "can-invalid-len",
                format!("len={} max={}", data.len(), Self::MAX_DATA_LEN),
            ));
        }

        let range = if flags.intersects(FrameFlags::EXTENDED | FrameFlags::ERROR) {
            Self::MASK_EXT_ID
        } else {
            Self::MASK_STD_ID
        };
        if id & !range != 0 {
            return Err(CanError::new("can-invalid-id", format!("id={:#x} flags={:?}", id, flags)));
        }

        let mut buffer = [0u8; 8];
        buffer[..data.len()].copy_from_slice(data);
        Ok(CanFrame { id, flags, len: data.len() as u8, data: buffer })
    }

    pub fn get_id(&self) -> u32 {
        self.id
    }

    pub fn get_raw_id(&self) -> u32 {
        let mut raw = self.id;
        if self.is_extended() {
            raw |= Self::FLAG_EFF;
        }
        if self.is_remote() {
            raw |= Self::FLAG_RTR;
        }
        if self.is_error() {
            raw |= Self::FLAG_ERR;
        }
        raw
    }

    pub fn get_flags(&self) -> FrameFlags {
        self.flags
    }

    pub fn get_len(&self) -> u8 {
        self.len
    }

    pub fn get_data(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    pub fn is_extended(&self) -> bool {
        self.flags.contains(FrameFlags::EXTENDED)
    }

    pub fn is_remote(&self) -> bool {
        self.flags.contains(FrameFlags::REMOTE)
    }

    pub fn is_error(&self) -> bool {
        self.flags.contains(FrameFlags::ERROR)
    }

    // (11 arbitration bits, IDE, 18 extension bits, RTR): smaller wins the bus
    fn arbitration_key(&self) -> (u32, bool, u32, bool) {
        if self.is_extended() {
            (self.id >> 18, true, self.id & 0x3_FFFF, self.is_remote())
        } else {
            (self.id, false, 0, self.is_remote())
        }
    }

    /// Bus arbitration order: lower identifier wins, a standard frame beats an
    /// extended one sharing its 11 base bits, a data frame beats a remote one.
    pub fn priority_higher_than(&self, other: &CanFrame) -> bool {
        self.arbitration_key() < other.arbitration_key()
    }
}

impl embedded_can::Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        match id.into() {
            Id::Standard(id) => CanFrame::new(id.as_raw() as u32, data, FrameFlags::empty()).ok(),
            Id::Extended(id) => CanFrame::new(id.as_raw(), data, FrameFlags::EXTENDED).ok(),
        }
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > CanFrame::MAX_DATA_LEN {
            return None;
        }
        let zero = [0u8; 8];
        match id.into() {
            Id::Standard(id) => {
                CanFrame::new(id.as_raw() as u32, &zero[..dlc], FrameFlags::REMOTE).ok()
            }
            Id::Extended(id) => CanFrame::new(
                id.as_raw(),
                &zero[..dlc],
                FrameFlags::EXTENDED | FrameFlags::REMOTE,
            )
            .ok(),
        }
    }

    fn is_extended(&self) -> bool {
        CanFrame::is_extended(self)
    }

    fn is_remote_frame(&self) -> bool {
        self.is_remote()
    }

    fn id(&self) -> Id {
        // constructor guarantees the range, fallbacks are unreachable
        if self.is_extended() {
            Id::Extended(ExtendedId::new(self.id).unwrap_or(ExtendedId::ZERO))
        } else {
            Id::Standard(StandardId::new(self.id as u16).unwrap_or(StandardId::ZERO))
        }
    }

    fn dlc(&self) -> usize {
        self.len as usize
    }

    fn data(&self) -> &[u8] {
        self.get_data()
    }
}

/// Classical CAN frame structure (aka CAN 2.0B) as read/written on a raw socket
/// canid:     CAN ID of the frame and CAN_*_FLAG flags, see canid_t definition
/// @len:      CAN frame payload length in byte (0 .. 8)
/// @__pad:    padding
/// @__res0:   reserved / padding
/// @len8_dlc: optional DLC value (9 .. 15) at 8 byte payload length
/// @data:     CAN frame payload (up to 8 byte)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanFrameRaw {
    can_id: SockCanId,
    len: u8,
    pad: u8,
    res0: u8,
    len8_dlc: u8,
    data: [u8; 8],
}

impl CanFrameRaw {
    pub const MTU: usize = cglue::can_MTU_x_CAN_MTU as usize;

    pub fn new(canid: SockCanId, len: u8, data: [u8; 8usize]) -> Self {
        CanFrameRaw { can_id: canid, len, pad: 0, res0: 0, len8_dlc: 0, data }
    }

    pub fn empty(canid: u32) -> Self {
        let mut frame: CanFrameRaw = unsafe { mem::zeroed::<Self>() };
        frame.can_id = canid;
        frame
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_void {
        self as *const _ as *const std::ffi::c_void
    }

    pub fn as_mut_ptr(&mut self) -> *mut std::ffi::c_void {
        self as *mut _ as *mut std::ffi::c_void
    }

    pub fn get_id(&self) -> SockCanId {
        self.can_id
    }

    pub fn get_len(&self) -> u8 {
        self.len
    }

    pub fn get_data(&self) -> &[u8] {
        &self.data[..(self.len as usize).min(8)]
    }
}

impl From<&CanFrame> for CanFrameRaw {
    fn from(frame: &CanFrame) -> Self {
        let mut canid = frame.get_id() & FilterMask::EFF_MASK.bits();
        if frame.is_extended() {
            canid |= FilterMask::EFF_FLAG.bits();
        }
        if frame.is_error() {
            canid |= FilterMask::ERR_FLAG.bits();
        }
        if frame.is_remote() {
            canid |= FilterMask::RTR_FLAG.bits();
        }
        CanFrameRaw::new(canid, frame.len, frame.data)
    }
}

impl From<&CanFrameRaw> for CanFrame {
    fn from(raw: &CanFrameRaw) -> Self {
        let mut flags = FrameFlags::empty();
        if raw.can_id & FilterMask::EFF_FLAG.bits() != 0 {
            flags |= FrameFlags::EXTENDED;
        }
        if raw.can_id & FilterMask::ERR_FLAG.bits() != 0 {
            flags |= FrameFlags::ERROR;
        }
        if raw.can_id & FilterMask::RTR_FLAG.bits() != 0 {
            flags |= FrameFlags::REMOTE;
        }
        let len = raw.len.min(8);
        let mut data = [0u8; 8];
        data[..len as usize].copy_from_slice(&raw.data[..len as usize]);
        CanFrame { id: raw.can_id & FilterMask::EFF_MASK.bits(), flags, len, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_frame_matches_kernel_mtu() {
        assert_eq!(mem::size_of::<CanFrameRaw>(), CanFrameRaw::MTU);
    }

    #[test]
    fn flags_map_to_kernel_bits() {
        let frame =
            CanFrame::new(0x1234_5678, &[1, 2, 3], FrameFlags::EXTENDED | FrameFlags::REMOTE)
                .unwrap();
        let raw = CanFrameRaw::from(&frame);
        assert_eq!(raw.get_id() & FilterMask::EFF_MASK.bits(), 0x1234_5678);
        assert_ne!(raw.get_id() & FilterMask::EFF_FLAG.bits(), 0);
        assert_ne!(raw.get_id() & FilterMask::RTR_FLAG.bits(), 0);
        assert_eq!(raw.get_id() & FilterMask::ERR_FLAG.bits(), 0);
        assert_eq!(raw.get_len(), 3);
    }

    #[test]
    fn round_trip_every_frame_kind() {
        let kinds = [
            (0x123, FrameFlags::empty()),
            (0x1ABC_DEF0, FrameFlags::EXTENDED),
            (0x0000_0004, FrameFlags::ERROR),
            (0x7FF, FrameFlags::REMOTE),
            (0x1FFF_FFFF, FrameFlags::EXTENDED | FrameFlags::REMOTE),
        ];
        for (id, flags) in kinds {
            let frame = CanFrame::new(id, &[0xDE, 0xAD, 0xBE, 0xEF], flags).unwrap();
            let back = CanFrame::from(&CanFrameRaw::from(&frame));
            assert_eq!(frame, back, "id={:#x} flags={:?}", id, flags);
        }
    }

    #[test]
    fn raw_id_folds_flags() {
        let frame = CanFrame::new(0x100, &[], FrameFlags::EXTENDED).unwrap();
        assert_eq!(frame.get_raw_id(), 0x100 | CanFrame::FLAG_EFF);
        let raw = CanFrameRaw::from(&frame);
        assert_eq!(raw.get_id(), frame.get_raw_id());
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(CanFrame::new(0x800, &[], FrameFlags::empty()).is_err());
        assert!(CanFrame::new(0x100, &[0; 9], FrameFlags::empty()).is_err());
        assert!(CanFrame::new(0x2000_0000, &[], FrameFlags::EXTENDED).is_err());
    }

    #[test]
    fn arbitration_order() {
        let low = CanFrame::new(0x100, &[], FrameFlags::empty()).unwrap();
        let high = CanFrame::new(0x200, &[], FrameFlags::empty()).unwrap();
        assert!(low.priority_higher_than(&high));
        assert!(!high.priority_higher_than(&low));

        // same 11 base bits: standard beats extended
        let ext = CanFrame::new(0x100 << 18, &[], FrameFlags::EXTENDED).unwrap();
        assert!(low.priority_higher_than(&ext));

        // same id: data beats remote
        let rtr = CanFrame::new(0x100, &[], FrameFlags::REMOTE).unwrap();
        assert!(low.priority_higher_than(&rtr));
        assert!(!low.priority_higher_than(&low));
    }

    #[test]
    fn embedded_can_frame() {
        use embedded_can::Frame;
        let id = StandardId::new(0x42).unwrap();
        let frame = <CanFrame as Frame>::new(id, &[7, 8]).unwrap();
        assert_eq!(frame.dlc(), 2);
        assert_eq!(Frame::id(&frame), Id::Standard(id));
        let remote = <CanFrame as Frame>::new_remote(ExtendedId::new(0x1_0000).unwrap(), 4).unwrap();
        assert!(remote.is_remote_frame());
        assert!(Frame::is_extended(&remote));
        assert_eq!(remote.get_len(), 4);
    }
}
