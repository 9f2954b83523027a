/*
 * Copyright (C) 2015-2023 IoT.bzh Company
 * Author: Fulup Ar Foll <fulup@iot.bzh>
 *
 * Redpesk interface code/config use MIT License and can be freely copy/modified even within proprietary code
 * License: $RP_BEGIN_LICENSE$ SPDX:MIT https://opensource.org/licenses/MIT $RP_END_LICENSE$
 *
 * References:
 *    https://www.kernel.org/doc/html/latest/networking/can.html#local-loopback-of-sent-frames
 *
*/
use bitflags::bitflags;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::prelude::*;

bitflags! {
    /// select() interest on input, readiness on output
    #[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
    pub struct IoReady: u8 {
        const READ = 0b01;
        const WRITE = 0b10;
    }
}

/// Everything guarded by the interface lock.
pub(crate) struct IfaceInner<C> {
    pub(crate) ifname: String,
    pub(crate) config: CanIfaceConfig,
    pub(crate) channel: Option<C>,
    pub(crate) bitrate: u32,
    pub(crate) clock: Arc<dyn MonoClock>,
    pub(crate) event: Option<Arc<dyn CanEventHandle>>,
    pub(crate) tx_queue: TxQueue,
    pub(crate) tx_counter: u64,
    pub(crate) rx_queue: VecDeque<CanRxItem>,
    pub(crate) pending_loopback: HashSet<u32>,
    pub(crate) in_socket: usize,
    pub(crate) filters: SockCanFilterBank,
    pub(crate) link: LinkStatus,
    pub(crate) poll_request: PollEvents,
    pub(crate) stats: IfaceStats,
    pub(crate) errors: HashMap<String, u64>,
}

impl<C: CanChannel> IfaceInner<C> {
    pub(crate) fn signal_event(&self) {
        if let Some(event) = &self.event {
            event.signal();
        }
    }

    pub(crate) fn count_error(&mut self, error: &CanError) {
        *self.errors.entry(error.get_uid()).or_insert(0) += 1;
    }

    // read first: loopback echoes free socket depth for the write pass
    pub(crate) fn poll(&mut self, read: bool, write: bool) {
        if read {
            self.stats.num_poll_rx_events += 1;
            self.poll_read();
        }
        if write {
            self.stats.num_poll_tx_events += 1;
            self.poll_write();
        }
    }
}

/// One CAN interface bound to a raw socket channel.
///
/// Outbound frames are queued with a deadline and sent in bus arbitration
/// order, at most `max_in_socket_frames` at a time; inbound frames are
/// filtered and queued in arrival order. All calls are non-blocking except
/// `select` (bounded by its deadline) and `flush_tx`.
pub struct CanIface<C: CanChannel = SockCanHandle> {
    self_index: u8,
    inner: Mutex<IfaceInner<C>>,
}

impl CanIface<SockCanHandle> {
    pub fn new(self_index: u8, config: CanIfaceConfig) -> Self {
        Self::with_clock(self_index, config, Arc::new(SystemClock::new()))
    }
}

impl<C: CanChannel> CanIface<C> {
    pub fn with_clock(self_index: u8, mut config: CanIfaceConfig, clock: Arc<dyn MonoClock>) -> Self {
        let ifname = config.get_ifname(self_index);
        if let Err(error) = config.check() {
            log::warn!("{} {}, zero limits raised to 1", ifname, error);
            config.max_in_socket_frames = config.max_in_socket_frames.max(1);
            config.max_poll_iterations = config.max_poll_iterations.max(1);
        }
        CanIface {
            self_index,
            inner: Mutex::new(IfaceInner {
                ifname,
                config,
                channel: None,
                bitrate: 0,
                clock,
                event: None,
                tx_queue: TxQueue::new(),
                tx_counter: 0,
                rx_queue: VecDeque::new(),
                pending_loopback: HashSet::new(),
                in_socket: 0,
                filters: SockCanFilterBank::new(),
                link: LinkStatus::Up,
                poll_request: PollEvents::empty(),
                stats: IfaceStats::default(),
                errors: HashMap::new(),
            }),
        }
    }

    /// Wrap an already opened channel, the interface is initialized on return.
    pub fn from_channel(
        self_index: u8,
        config: CanIfaceConfig,
        channel: C,
        clock: Arc<dyn MonoClock>,
    ) -> Self {
        let iface = Self::with_clock(self_index, config, clock);
        iface.lock().channel = Some(channel);
        iface
    }

    fn lock(&self) -> MutexGuard<'_, IfaceInner<C>> {
        // a poisoned lock is taken over as is
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Open the channel once; later calls only report the current state.
    pub fn init(&self, bitrate: u32, mode: OperatingMode) -> bool {
        let mut inner = self.lock();
        if inner.channel.is_some() {
            return true;
        }

        match C::open(&inner.ifname) {
            Ok(channel) => {
                log::debug!("{} socket opened fd:{}", inner.ifname, channel.as_rawfd());
                inner.channel = Some(channel);
                inner.bitrate = bitrate;
                inner.config.mode = mode;
                true
            }
            Err(error) => {
                log::debug!("{} init failed {}", inner.ifname, error);
                false
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().channel.is_some()
    }

    pub fn get_index(&self) -> u8 {
        self.self_index
    }

    pub fn get_ifname(&self) -> String {
        self.lock().ifname.clone()
    }

    pub fn get_bitrate(&self) -> u32 {
        self.lock().bitrate
    }

    pub fn get_mode(&self) -> OperatingMode {
        self.lock().config.mode
    }

    pub fn get_link_status(&self) -> LinkStatus {
        self.lock().link
    }

    /// Current time of the interface clock, deadlines are expressed against it.
    pub fn now_us(&self) -> u64 {
        self.lock().clock.now_us()
    }

    /// Queue a frame for transmission before `deadline_us` (monotonic clock).
    /// Fails only when a `tx_queue_limit` is configured and reached.
    pub fn send(&self, frame: &CanFrame, deadline_us: u64, flags: CanIoFlags) -> Result<(), CanError> {
        let mut inner = self.lock();
        inner.stats.tx_requests += 1;

        if let Some(limit) = inner.config.tx_queue_limit {
            if inner.tx_queue.len() >= limit {
                inner.stats.tx_rejected += 1;
                return Err(CanError::new("tx-queue-full", format!("{} limit={}", inner.ifname, limit)));
            }
        }

        let item = CanTxItem {
            frame: *frame,
            index: inner.tx_counter,
            deadline: deadline_us,
            loopback: flags.contains(CanIoFlags::LOOPBACK),
            abort_on_error: flags.contains(CanIoFlags::ABORT_ON_ERROR),
            setup: true,
        };
        inner.tx_queue.push(item);
        inner.tx_counter += 1;

        inner.poll_read();
        inner.poll_write();
        Ok(())
    }

    /// Oldest accepted frame, None when nothing is available. Never blocks.
    pub fn receive(&self) -> Option<CanRxItem> {
        let mut inner = self.lock();
        if inner.rx_queue.is_empty() {
            inner.poll_read();
        }
        let item = inner.rx_queue.pop_front()?;
        inner.signal_event();
        Some(item)
    }

    /// Report which operations are possible. When the caller only waits for input
    /// and none is queued, sleep on the event handle until `deadline_us` at most.
    pub fn select(
        &self,
        interest: IoReady,
        pending_tx: Option<&CanFrame>,
        deadline_us: u64,
    ) -> Result<IoReady, CanError> {
        let (event, timeout) = {
            let mut inner = self.lock();
            inner.update_down_status();
            inner.poll_read();
            inner.poll_write();

            if let Some(frame) = pending_tx {
                log::trace!("{} select pending tx id:{:#x}", inner.ifname, frame.get_id());
            }

            // the transmit queue is unbounded: write interest never needs to wait
            let mut need_block = !interest.contains(IoReady::WRITE);
            if interest.contains(IoReady::READ) && inner.has_ready_rx() {
                need_block = false;
            }

            if !need_block {
                (None, Duration::ZERO)
            } else {
                if inner.link.is_down() {
                    return Err(CanError::new("can-link-down", inner.ifname.clone()));
                }

                let mut events = PollEvents::POLLIN;
                inner.stats.num_rx_poll_req += 1;
                if inner.has_ready_tx() {
                    events |= PollEvents::POLLOUT;
                    inner.stats.num_tx_poll_req += 1;
                }
                inner.poll_request = events;

                let now = inner.clock.now_us();
                let timeout = Duration::from_micros(deadline_us.saturating_sub(now));
                match inner.event.clone() {
                    Some(event) if !timeout.is_zero() => {
                        inner.stats.num_poll_waits += 1;
                        (Some(event), timeout)
                    }
                    _ => (None, Duration::ZERO),
                }
            }
        };

        // never hold the lock while sleeping, the rx pipeline signals through it
        if let Some(event) = event {
            event.wait(timeout);
        }

        let mut inner = self.lock();
        inner.poll_read();
        inner.poll_write();

        let mut ready = IoReady::empty();
        if !inner.link.is_down() {
            ready |= IoReady::WRITE;
        }
        // readability only depends on the rx queue, even when down
        if inner.has_ready_rx() {
            ready |= IoReady::READ;
        }
        Ok(ready)
    }

    /// Reactor entry point once the descriptor reported activity.
    pub fn poll(&self, read: bool, write: bool) {
        self.lock().poll(read, write);
    }

    /// Descriptor and events the external reactor should wait on, as requested
    /// by the last blocking `select`.
    pub fn poll_request(&self) -> (i32, PollEvents) {
        let inner = self.lock();
        let fd = match &inner.channel {
            Some(channel) => channel.as_rawfd(),
            None => -1,
        };
        (fd, inner.poll_request)
    }

    /// Drive both pipelines until the transmit queue is empty or the link dies.
    /// May spin forever when echoes never come back: tests and shutdown only.
    pub fn flush_tx(&self) {
        loop {
            {
                let mut inner = self.lock();
                inner.update_down_status();
                inner.poll(true, true);
                if inner.tx_queue.is_empty() || inner.link.is_down() {
                    break;
                }
            }
            thread::yield_now();
        }
    }

    pub fn clear_rx(&self) {
        self.lock().rx_queue.clear();
    }

    /// Replace the acceptance filters; only allowed in `OperatingMode::Filtered`.
    pub fn configure_filters(&self, configs: Option<&[CanFilterConfig]>) -> bool {
        let mut inner = self.lock();
        let configs = match configs {
            Some(configs) => configs,
            None => return false,
        };
        if inner.config.mode != OperatingMode::Filtered {
            return false;
        }
        inner.filters.configure(configs);
        true
    }

    pub fn get_num_filters(&self) -> u16 {
        CAN_FILTER_NUMBER
    }

    pub fn get_error_count(&self) -> u64 {
        self.lock().errors.values().sum()
    }

    pub fn set_event_handle(&self, handle: Arc<dyn CanEventHandle>) -> bool {
        self.lock().event = Some(handle);
        true
    }

    pub fn get_stats(&self) -> IfaceStats {
        self.lock().stats.clone()
    }

    pub fn get_stats_report(&self) -> String {
        self.lock().stats.to_string()
    }

    pub fn tx_pending(&self) -> usize {
        self.lock().tx_queue.len()
    }

    pub fn rx_pending(&self) -> usize {
        self.lock().rx_queue.len()
    }

    /// frames handed to the kernel and not yet echoed back
    pub fn frames_in_socket(&self) -> usize {
        self.lock().in_socket
    }

    pub fn pending_loopback_count(&self) -> usize {
        self.lock().pending_loopback.len()
    }
}
