/*
 * Copyright (C) 2015-2023 IoT.bzh Company
 * Author: Fulup Ar Foll <fulup@iot.bzh>
 *
 * Redpesk interface code/config use MIT License and can be freely copy/modified even within proprietary code
 * License: $RP_BEGIN_LICENSE$ SPDX:MIT https://opensource.org/licenses/MIT $RP_END_LICENSE$
 *
*/
use super::iface::IfaceInner;
use crate::prelude::*;

/// Frame accepted by the receive pipeline, waiting for `CanIface::receive`.
#[derive(Clone, Copy, Debug)]
pub struct CanRxItem {
    frame: CanFrame,
    stamp: u64,
    flags: CanIoFlags,
}

impl CanRxItem {
    pub fn get_frame(&self) -> &CanFrame {
        &self.frame
    }

    /// monotonic arrival time in microseconds
    pub fn get_stamp(&self) -> u64 {
        self.stamp
    }

    pub fn get_flags(&self) -> CanIoFlags {
        self.flags
    }

    pub fn is_loopback(&self) -> bool {
        self.flags.contains(CanIoFlags::LOOPBACK)
    }
}

impl<C: CanChannel> IfaceInner<C> {
    pub(crate) fn has_ready_rx(&self) -> bool {
        !self.rx_queue.is_empty()
    }

    fn confirm_sent_frame(&mut self) {
        if self.in_socket > 0 {
            self.in_socket -= 1;
        }
    }

    // ids sharing the same value collapse: one echo consumes the entry
    fn was_in_pending_loopback_set(&mut self, frame: &CanFrame) -> bool {
        self.pending_loopback.remove(&frame.get_raw_id())
    }

    fn push_rx(&mut self, item: CanRxItem) {
        if let Some(limit) = self.config.rx_queue_limit {
            if self.rx_queue.len() >= limit {
                log::trace!("{} rx queue full, id:{:#x} dropped", self.ifname, item.frame.get_id());
                self.stats.rx_errors += 1;
                return;
            }
        }
        self.rx_queue.push_back(item);
        self.stats.rx_received += 1;
        self.signal_event();
    }

    /// Pull up to `max_poll_iterations` frames from the channel.
    pub(crate) fn poll_read(&mut self) {
        for _ in 0..self.config.max_poll_iterations {
            let status = match self.channel.as_mut() {
                Some(channel) => channel.read_frame(),
                None => break,
            };

            match status {
                ChannelRead::Frame { frame: raw, loopback } => {
                    let stamp = self.clock.now_us();
                    let frame = CanFrame::from(&raw);
                    let mut flags = CanIoFlags::empty();

                    let accept = if loopback {
                        // every own frame comes back, whether or not loopback was requested
                        self.confirm_sent_frame();
                        self.stats.tx_confirmed += 1;
                        flags |= CanIoFlags::LOOPBACK;
                        self.was_in_pending_loopback_set(&frame)
                    } else {
                        self.filters.accepts(&raw)
                    };

                    if accept {
                        self.push_rx(CanRxItem { frame, stamp, flags });
                    }
                }
                ChannelRead::WouldBlock => break,
                ChannelRead::Error(error) => {
                    log::debug!("{} rx error {}", self.ifname, error);
                    self.stats.rx_errors += 1;
                    self.count_error(&error);
                    break;
                }
            }
        }
    }
}
