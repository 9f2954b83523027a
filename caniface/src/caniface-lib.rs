/*
 * Copyright (C) 2015-2023 IoT.bzh Company
 * Author: Fulup Ar Foll <fulup@iot.bzh>
 *
 * Redpesk interface code/config use MIT License and can be freely copy/modified even within proprietary code
 * License: $RP_BEGIN_LICENSE$ SPDX:MIT https://opensource.org/licenses/MIT $RP_END_LICENSE$
 *
*/

#![doc(
    html_logo_url = "https://iot.bzh/images/defaults/company/512-479-max-transp.png",
    html_favicon_url = "https://iot.bzh/images/defaults/favicon.ico"
)]
extern crate bitflags;

#[cfg(feature = "serde")]
extern crate serde;

#[path = "./cglue-mod.rs"]
mod cglue;

#[path = "./utils-mod.rs"]
mod utils;

#[path = "./frame-codec.rs"]
mod frame;

#[path = "./filter-bank.rs"]
mod filter;

#[path = "./channel-mod.rs"]
mod channel;

#[path = "./socket-can.rs"]
mod sockcan;

#[path = "./event-mod.rs"]
mod event;

#[path = "./config-mod.rs"]
mod config;

#[path = "./stats-mod.rs"]
mod stats;

#[path = "./tx-sched.rs"]
mod tx;

#[path = "./rx-pipe.rs"]
mod rx;

#[path = "./link-mod.rs"]
mod link;

#[path = "./iface-mod.rs"]
mod iface;

pub mod prelude {
    pub use crate::channel::*;
    pub use crate::config::*;
    pub use crate::event::*;
    pub use crate::filter::*;
    pub use crate::frame::*;
    pub use crate::iface::{CanIface, IoReady};
    pub use crate::link::*;
    pub use crate::rx::*;
    pub use crate::sockcan::*;
    pub use crate::stats::*;
    pub use crate::tx::*;
    pub use crate::utils::*;
}
