/*
 * Copyright (C) 2015-2023 IoT.bzh Company
 * Author: Fulup Ar Foll <fulup@iot.bzh>
 *
 * Redpesk interface code/config use MIT License and can be freely copy/modified even within proprietary code
 * License: $RP_BEGIN_LICENSE$ SPDX:MIT https://opensource.org/licenses/MIT $RP_END_LICENSE$
 *
 * References:
 *    https://www.kernel.org/doc/html/latest/networking/can.html#raw-protocol-sockets-with-can-filters-sock-raw
 *    https://www.kernel.org/doc/html/latest/networking/can.html#local-loopback-of-sent-frames
 *
*/
use std::ffi::CString;

use super::cglue;
use crate::prelude::*;
use std::mem;

/// Raw CAN socket bound to one interface, non-blocking, receiving its own frames.
pub struct SockCanHandle {
    sockfd: ::std::os::raw::c_int,
}

// interface name to kernel index
fn map_can_iface(iface: &str) -> Result<i32, CanError> {
    if iface.len() >= cglue::can_SOCK_x_IFACE_LEN as usize {
        return Err(CanError::new(
            "fail-socketcan-iface",
            cglue::strerror(cglue::can_ERRNO_x_ENAMETOOLONG as i32),
        ));
    }
    let cname = match CString::new(iface) {
        Err(error) => return Err(CanError::new("fail-socketcan-iface", error.to_string())),
        Ok(value) => value,
    };

    let index = unsafe { cglue::if_nametoindex(cname.as_ptr()) };
    if index == 0 {
        Err(CanError::new("fail-socketcan-iface", format!("{}: {}", iface, cglue::get_perror())))
    } else {
        Ok(index as i32)
    }
}

impl SockCanHandle {
    pub fn open_raw(candev: &str) -> Result<Self, CanError> {
        let sockfd = unsafe {
            cglue::socket(
                cglue::can_SOCK_x_PF_CAN as i32,
                cglue::can_SOCK_x_RAW as i32,
                cglue::can_SOCK_x_CANRAW as i32,
            )
        };
        if sockfd < 0 {
            return Err(CanError::new("fail-socketcan-open", cglue::get_perror()));
        }

        // from here any early return drops (closes) the socket
        let mut sockcan = SockCanHandle { sockfd };

        let index = map_can_iface(candev)?;

        let status = unsafe { cglue::can_raw_bind(sockfd, index) };
        if status < 0 {
            return Err(CanError::new("fail-socketcan-bind", cglue::get_perror()));
        }

        sockcan.set_timestamp()?.set_recv_own(true)?.set_blocking(false)?;

        // validate the resulting socket
        let error = unsafe { cglue::can_sock_error(sockfd) };
        if error != 0 {
            return Err(CanError::new("fail-socketcan-validate", cglue::strerror(error.abs())));
        }

        log::debug!("raw socketcan fd:{} bound on ifindex:{}", sockfd, index);
        Ok(sockcan)
    }

    pub fn as_rawfd(&self) -> i32 {
        self.sockfd
    }

    pub fn set_blocking(&mut self, blocking: bool) -> Result<&mut Self, CanError> {
        // retrieve current flags
        let current_flag = unsafe { cglue::fcntl(self.sockfd, cglue::can_SOCK_x_F_GETFL as i32) };
        if current_flag < 0 {
            return Err(CanError::new("can-nonblock-fail", cglue::get_perror()));
        }

        let new_flag = if blocking {
            current_flag & !(cglue::can_SOCK_x_NONBLOCK as i32)
        } else {
            current_flag | cglue::can_SOCK_x_NONBLOCK as i32
        };

        let status =
            unsafe { cglue::fcntl(self.sockfd, cglue::can_SOCK_x_F_SETFL as i32, new_flag) };
        if status < 0 {
            return Err(CanError::new("can-nonblock-fail", cglue::get_perror()));
        }
        Ok(self)
    }

    pub fn set_recv_own(&mut self, loopback: bool) -> Result<&mut Self, CanError> {
        let flag: i32 = if loopback { 1 } else { 0 };
        let status = unsafe {
            cglue::setsockopt(
                self.sockfd,
                cglue::can_RAW_x_SOL_CAN_RAW as i32,
                cglue::can_RAW_x_RECV_OWN_MSGS as i32,
                &flag as *const _ as *const std::ffi::c_void,
                mem::size_of::<i32>() as cglue::socklen_t,
            )
        };
        if status < 0 {
            return Err(CanError::new("can-recv-own-fail", cglue::get_perror()));
        }
        Ok(self)
    }

    /// Enable SO_TIMESTAMP on received frames.
    pub fn set_timestamp(&mut self) -> Result<&mut Self, CanError> {
        let flag: i32 = 1;
        let status = unsafe {
            cglue::setsockopt(
                self.sockfd,
                cglue::can_SOCK_x_SOL_SOCKET as i32,
                cglue::can_SOCK_x_SO_TIMESTAMP as i32,
                &flag as *const _ as *const std::ffi::c_void,
                mem::size_of::<i32>() as cglue::socklen_t,
            )
        };

        if status < 0 {
            return Err(CanError::new("can-setsock-stamp-fail", cglue::get_perror()));
        }
        Ok(self)
    }
}

impl Drop for SockCanHandle {
    fn drop(&mut self) {
        if self.sockfd >= 0 {
            unsafe { cglue::close(self.sockfd) };
            self.sockfd = -1;
        }
    }
}

impl CanChannel for SockCanHandle {
    fn open(ifname: &str) -> Result<Self, CanError> {
        SockCanHandle::open_raw(ifname)
    }

    fn write_frame(&mut self, frame: &CanFrameRaw) -> ChannelWrite {
        let count = unsafe {
            cglue::write(self.sockfd, frame.as_ptr(), mem::size_of::<CanFrameRaw>())
        } as isize;

        if count <= 0 {
            let errno = cglue::get_errno();
            if count < 0 && cglue::is_tx_full(errno) {
                return ChannelWrite::WouldBlock;
            }
            return ChannelWrite::Error(CanError::new("can-write-fail", cglue::strerror(errno)));
        }
        if count != mem::size_of::<CanFrameRaw>() as isize {
            return ChannelWrite::Error(CanError::new(
                "can-write-partial",
                format!("wrote {} of {} bytes", count, mem::size_of::<CanFrameRaw>()),
            ));
        }
        ChannelWrite::Sent
    }

    fn read_frame(&mut self) -> ChannelRead {
        let mut frame = CanFrameRaw::empty(0);
        let mut msgflags: i32 = 0;
        let count = unsafe {
            cglue::can_raw_recv(
                self.sockfd,
                frame.as_mut_ptr(),
                mem::size_of::<CanFrameRaw>() as i32,
                &mut msgflags,
            )
        };

        if count < 0 {
            let errno = cglue::get_errno();
            if cglue::is_would_block(errno) {
                return ChannelRead::WouldBlock;
            }
            return ChannelRead::Error(CanError::new("can-read-fail", cglue::strerror(errno)));
        }
        if count == 0 {
            return ChannelRead::WouldBlock;
        }
        if count as usize != mem::size_of::<CanFrameRaw>() {
            return ChannelRead::Error(CanError::new(
                "can-invalid-frame",
                format!("read {} bytes", count),
            ));
        }

        // MSG_CONFIRM flags the echo of a frame sent through this very socket
        let loopback = msgflags & cglue::can_SOCK_x_MSG_CONFIRM as i32 != 0;
        ChannelRead::Frame { frame, loopback }
    }

    fn poll_events(&mut self, events: PollEvents, timeout_ms: i32) -> Result<PollEvents, CanError> {
        let mut revents: i16 = 0;
        let status =
            unsafe { cglue::can_sock_poll(self.sockfd, events.bits(), &mut revents, timeout_ms) };
        if status < 0 {
            return Err(CanError::new("can-poll-fail", cglue::get_perror()));
        }
        Ok(PollEvents::from_bits_truncate(revents))
    }

    fn socket_error(&mut self) -> i32 {
        let error = unsafe { cglue::can_sock_error(self.sockfd) };
        error.abs()
    }

    fn as_rawfd(&self) -> i32 {
        self.sockfd
    }
}
