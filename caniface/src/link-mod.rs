/*
 * Copyright (C) 2015-2023 IoT.bzh Company
 * Author: Fulup Ar Foll <fulup@iot.bzh>
 *
 * Redpesk interface code/config use MIT License and can be freely copy/modified even within proprietary code
 * License: $RP_BEGIN_LICENSE$ SPDX:MIT https://opensource.org/licenses/MIT $RP_END_LICENSE$
 *
*/
use super::cglue;
use super::iface::IfaceInner;
use crate::prelude::*;

/// Once Down the interface stays Down until it is re-created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LinkStatus {
    #[default]
    Up,
    Down,
}

impl LinkStatus {
    pub fn is_down(&self) -> bool {
        *self == LinkStatus::Down
    }
}

impl<C: CanChannel> IfaceInner<C> {
    /// Latch the link Down when the socket reports ENETDOWN or ENODEV.
    pub(crate) fn update_down_status(&mut self) {
        if self.link.is_down() {
            return;
        }
        let channel = match self.channel.as_mut() {
            Some(channel) => channel,
            None => return,
        };

        let revents = match channel.poll_events(PollEvents::empty(), 0) {
            Ok(revents) => revents,
            Err(error) => {
                log::debug!("{} poll failed {}", self.ifname, error);
                return;
            }
        };
        if !revents.contains(PollEvents::POLLERR) {
            return;
        }

        let errno = channel.socket_error();
        if cglue::is_link_fatal(errno) {
            self.link = LinkStatus::Down;
            self.stats.num_downs += 1;
            log::warn!("{} is dead fd:{} error:{}", self.ifname, channel.as_rawfd(), cglue::strerror(errno));
        } else {
            log::debug!("{} socket error {} ignored", self.ifname, errno);
        }
    }
}
