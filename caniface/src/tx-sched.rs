/*
 * Copyright (C) 2015-2023 IoT.bzh Company
 * Author: Fulup Ar Foll <fulup@iot.bzh>
 *
 * Redpesk interface code/config use MIT License and can be freely copy/modified even within proprietary code
 * License: $RP_BEGIN_LICENSE$ SPDX:MIT https://opensource.org/licenses/MIT $RP_END_LICENSE$
 *
*/
use bitflags::bitflags;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::iface::IfaceInner;
use crate::prelude::*;

bitflags! {
    /// Per frame options on send, per record flags on receive.
    #[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
    pub struct CanIoFlags: u16 {
        /// send: deliver the echo back once on the bus; receive: record is that echo
        const LOOPBACK = 0b01;
        /// send: drop the frame instead of retrying once the link is down
        const ABORT_ON_ERROR = 0b10;
    }
}

/// Frame waiting in the transmit queue.
#[derive(Clone, Copy, Debug)]
pub struct CanTxItem {
    pub frame: CanFrame,
    pub index: u64,
    pub deadline: u64,
    pub loopback: bool,
    pub abort_on_error: bool,
    pub setup: bool,
}

// max-heap order: the top entry wins bus arbitration, FIFO between equals
impl Ord for CanTxItem {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.frame.priority_higher_than(&other.frame) {
            Ordering::Greater
        } else if other.frame.priority_higher_than(&self.frame) {
            Ordering::Less
        } else {
            other.index.cmp(&self.index)
        }
    }
}

impl PartialOrd for CanTxItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for CanTxItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CanTxItem {}

#[derive(Default)]
pub struct TxQueue {
    heap: BinaryHeap<CanTxItem>,
}

impl TxQueue {
    pub fn new() -> Self {
        TxQueue { heap: BinaryHeap::new() }
    }

    pub fn push(&mut self, item: CanTxItem) {
        self.heap.push(item);
    }

    /// highest priority entry
    pub fn peek(&self) -> Option<&CanTxItem> {
        self.heap.peek()
    }

    pub fn pop(&mut self) -> Option<CanTxItem> {
        self.heap.pop()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<C: CanChannel> IfaceInner<C> {
    pub(crate) fn has_ready_tx(&self) -> bool {
        !self.tx_queue.is_empty() && self.in_socket < self.config.max_in_socket_frames
    }

    fn increment_frames_in_socket(&mut self) {
        if self.in_socket < self.config.max_in_socket_frames {
            self.in_socket += 1;
        }
    }

    /// Push queued frames to the channel while the socket depth allows it.
    pub(crate) fn poll_write(&mut self) {
        while self.has_ready_tx() {
            let item = match self.tx_queue.peek() {
                Some(item) => *item,
                None => break,
            };
            let now = self.clock.now_us();

            if item.deadline < now {
                log::trace!(
                    "{} tx id:{:#x} expired deadline:{} now:{}",
                    self.ifname,
                    item.frame.get_id(),
                    item.deadline,
                    now
                );
                self.stats.tx_timedout += 1;
            } else if item.abort_on_error && self.link.is_down() {
                self.stats.tx_rejected += 1;
            } else {
                let raw = CanFrameRaw::from(&item.frame);
                let status = match self.channel.as_mut() {
                    Some(channel) => channel.write_frame(&raw),
                    None => ChannelWrite::Error(CanError::new("can-iface-closed", "no socket")),
                };
                match status {
                    ChannelWrite::Sent => {
                        self.increment_frames_in_socket();
                        if item.loopback {
                            self.pending_loopback.insert(item.frame.get_raw_id());
                        }
                        self.stats.tx_success += 1;
                        self.stats.last_transmit_us = now;
                    }
                    ChannelWrite::WouldBlock => {
                        // frame stays queued for the next attempt
                        self.stats.tx_overflow += 1;
                        break;
                    }
                    ChannelWrite::Error(error) => {
                        log::debug!("{} tx id:{:#x} dropped {}", self.ifname, item.frame.get_id(), error);
                        self.stats.tx_rejected += 1;
                        self.count_error(&error);
                    }
                }
            }

            self.tx_queue.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u32, index: u64) -> CanTxItem {
        CanTxItem {
            frame: CanFrame::new(id, &[index as u8], FrameFlags::empty()).unwrap(),
            index,
            deadline: 0,
            loopback: false,
            abort_on_error: false,
            setup: true,
        }
    }

    #[test]
    fn lowest_id_first_then_fifo() {
        let mut queue = TxQueue::new();
        queue.push(item(0x200, 0));
        queue.push(item(0x100, 1));
        queue.push(item(0x300, 2));
        queue.push(item(0x100, 3));
        queue.push(item(0x200, 4));

        let order: Vec<(u32, u64)> = std::iter::from_fn(|| queue.pop())
            .map(|tx| (tx.frame.get_id(), tx.index))
            .collect();
        assert_eq!(order, vec![(0x100, 1), (0x100, 3), (0x200, 0), (0x200, 4), (0x300, 2)]);
    }

    #[test]
    fn peek_is_what_pop_returns() {
        let mut queue = TxQueue::new();
        queue.push(item(0x010, 0));
        queue.push(item(0x001, 1));
        let top = *queue.peek().unwrap();
        assert_eq!(queue.pop().unwrap().index, top.index);
        assert_eq!(queue.len(), 1);
        queue.pop();
        assert!(queue.is_empty());
    }
}
