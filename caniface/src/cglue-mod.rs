/*
 * Copyright (C) 2015-2023 IoT.bzh Company
 * Author: Fulup Ar Foll <fulup@iot.bzh>
 *
 * $RP_BEGIN_LICENSE$
 * Commercial License Usage
 *  Licensees holding valid commercial IoT.bzh licenses may use this file in
 *  accordance with the commercial license agreement provided with the
 *  Software or, alternatively, in accordance with the terms contained in
 *  a written agreement between you and The IoT.bzh Company. For licensing terms
 *  and conditions see https://www.iot.bzh/terms-conditions. For further
 *  information use the contact form at https://www.iot.bzh/contact.
 *
 * GNU General Public License Usage
 *  Alternatively, this file may be used under the terms of the GNU General
 *  Public license version 3. This license is as published by the Free Software
 *  Foundation and appearing in the file LICENSE.GPLv3 included in the packaging
 *  of this file. Please review the following information to ensure the GNU
 *  General Public License requirements will be met
 *  https://www.gnu.org/licenses/gpl-3.0.html.
 * $RP_END_LICENSE$
 */

#![allow(dead_code)]
#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(clippy::all)]

include!(concat!(env!("OUT_DIR"), "/caniface-map.rs"));

use std::io;

/// errno of the last failing libc call from this thread
pub fn get_errno() -> i32 {
    unsafe { *__errno_location() }
}

pub fn get_perror() -> String {
    strerror(get_errno())
}

pub fn strerror(errno: i32) -> String {
    io::Error::from_raw_os_error(errno).to_string()
}

/// true when errno only means "try again later"
pub fn is_would_block(errno: i32) -> bool {
    errno == can_ERRNO_x_EAGAIN as i32 || errno == can_ERRNO_x_EWOULDBLOCK as i32
}

/// true when the kernel transmit buffer is momentarily full
pub fn is_tx_full(errno: i32) -> bool {
    is_would_block(errno) || errno == can_ERRNO_x_ENOBUFS as i32
}

/// true when errno reports a dead link (interface down or removed)
pub fn is_link_fatal(errno: i32) -> bool {
    errno == can_ERRNO_x_ENETDOWN as i32 || errno == can_ERRNO_x_ENODEV as i32
}
