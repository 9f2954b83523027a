/*
 * Copyright (C) 2015-2023 IoT.bzh Company
 * Author: Fulup Ar Foll <fulup@iot.bzh>
 *
 * Redpesk interface code/config use MIT License and can be freely copy/modified even within proprietary code
 * License: $RP_BEGIN_LICENSE$ SPDX:MIT https://opensource.org/licenses/MIT $RP_END_LICENSE$
 *
*/
//! Minimal contract of a raw non-blocking CAN channel. `SockCanHandle` is the
//! Linux implementation, tests plug scripted channels.
use bitflags::bitflags;

use super::cglue;
use crate::prelude::*;

bitflags! {
    #[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
    pub struct PollEvents: i16 {
        const POLLIN = cglue::can_POLL_x_POLLIN as i16;
        const POLLOUT = cglue::can_POLL_x_POLLOUT as i16;
        const POLLERR = cglue::can_POLL_x_POLLERR as i16;
    }
}

/// Outcome of one non-blocking write.
#[derive(Debug)]
pub enum ChannelWrite {
    Sent,
    /// kernel buffer momentarily full, retry later
    WouldBlock,
    Error(CanError),
}

/// Outcome of one non-blocking read.
#[derive(Debug)]
pub enum ChannelRead {
    /// `loopback` is set when the kernel echoes back a frame sent by this socket
    Frame { frame: CanFrameRaw, loopback: bool },
    WouldBlock,
    Error(CanError),
}

pub trait CanChannel: Send {
    /// Open, bind and configure a channel; a failing channel is never returned half built.
    fn open(ifname: &str) -> Result<Self, CanError>
    where
        Self: Sized;

    fn write_frame(&mut self, frame: &CanFrameRaw) -> ChannelWrite;

    fn read_frame(&mut self) -> ChannelRead;

    /// Report which of `events` are ready. POLLERR is always reported.
    fn poll_events(&mut self, events: PollEvents, timeout_ms: i32) -> Result<PollEvents, CanError>;

    /// Fetch and clear the pending socket level error (errno value, 0 when none).
    fn socket_error(&mut self) -> i32;

    fn as_rawfd(&self) -> i32;
}

/// errno values a channel may report through `socket_error`
pub const CAN_ERRNO_NETDOWN: i32 = cglue::can_ERRNO_x_ENETDOWN as i32;
pub const CAN_ERRNO_NODEV: i32 = cglue::can_ERRNO_x_ENODEV as i32;
pub const CAN_ERRNO_NOBUFS: i32 = cglue::can_ERRNO_x_ENOBUFS as i32;
