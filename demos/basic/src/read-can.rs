/*
 * Copyright (C) 2015-2023 IoT.bzh Company
 * Author: Fulup Ar Foll <fulup@iot.bzh>
 *
 * Redpesk interface code/config use MIT License and can be freely copy/modified even within proprietary code
 * License: $RP_BEGIN_LICENSE$ SPDX:MIT https://opensource.org/licenses/MIT $RP_END_LICENSE$
 *
 */
extern crate caniface;
use caniface::prelude::*;
use env_logger::Env;
use std::sync::Arc;

fn main() -> Result<(), String> {
    // Initialize logging backend for the `log` facade (idempotent).
    let env = Env::default().default_filter_or("info");
    let _ = env_logger::Builder::from_env(env).format_timestamp_millis().try_init();

    // optional json config, ex: {"virtual_can":true,"mode":"Filtered"}
    let config = match std::env::args().nth(1) {
        Some(jconf) => CanIfaceConfig::from_json(&jconf).map_err(|error| error.to_string())?,
        None => CanIfaceConfig { virtual_can: true, ..Default::default() },
    };
    let mode = config.mode;

    let iface = CanIface::new(0, config);
    if !iface.init(500_000, mode) {
        return Err(format!("fail opening candev {}", iface.get_ifname()));
    }
    iface.set_event_handle(Arc::new(BinarySemaphore::new()));

    if mode == OperatingMode::Filtered {
        let filters = [CanFilterConfig::new(0x257, 0x7FF), CanFilterConfig::new(0x118, 0x7FF)];
        if !iface.configure_filters(Some(&filters)) {
            return Err(format!("{} filter config refused", iface.get_ifname()));
        }
    }

    log::info!("Waiting for Raw CAN package on {}", iface.get_ifname());
    loop {
        let deadline = iface.now_us() + 1_000_000;
        let ready = match iface.select(IoReady::READ, None, deadline) {
            Ok(value) => value,
            Err(error) => return Err(format!("fail reading candev: {error}")),
        };

        if !ready.contains(IoReady::READ) {
            log::debug!("Got timeout {}", iface.get_ifname());
            continue;
        }

        while let Some(item) = iface.receive() {
            let frame = item.get_frame();
            log::info!(
                "Received id:{:#04x} stamp:{} len:{} data:{:?}",
                frame.get_id(),
                item.get_stamp(),
                frame.get_len(),
                frame.get_data()
            );
        }
    }
}
