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

// usage: can-send [count] [timeout_ms], frames go out on vcan0
fn main() -> Result<(), String> {
    // Initialize logging backend for the `log` facade (idempotent).
    let env = Env::default().default_filter_or("info");
    let _ = env_logger::Builder::from_env(env).format_timestamp_millis().try_init();

    let mut args = std::env::args().skip(1);
    let count: u32 = match args.next() {
        Some(value) => value.parse().map_err(|error| format!("invalid count {value}: {error}"))?,
        None => 16,
    };
    let timeout_ms: u64 = match args.next() {
        Some(value) => value.parse().map_err(|error| format!("invalid timeout {value}: {error}"))?,
        None => 100,
    };

    let config = CanIfaceConfig { virtual_can: true, ..Default::default() };
    let iface = CanIface::new(0, config);
    if !iface.init(500_000, OperatingMode::Normal) {
        return Err(format!("fail opening candev {}", iface.get_ifname()));
    }

    let deadline = iface.now_us() + timeout_ms * 1000;
    for index in 0..count {
        // ids walk downward, the bus still sees the lowest id first
        let canid = 0x200 - (index % 0x100);
        let frame = CanFrame::new(canid, &index.to_le_bytes(), FrameFlags::empty())
            .map_err(|error| error.to_string())?;
        let flags = if index == 0 { CanIoFlags::LOOPBACK } else { CanIoFlags::empty() };
        if let Err(error) = iface.send(&frame, deadline, flags) {
            log::warn!("send id:{:#04x} refused {}", canid, error);
        }
    }

    iface.flush_tx();
    if let Some(echo) = iface.receive() {
        log::info!(
            "loopback id:{:#04x} stamp:{} data:{:?}",
            echo.get_frame().get_id(),
            echo.get_stamp(),
            echo.get_frame().get_data()
        );
    }

    log::info!("{} done link:{:?}", iface.get_ifname(), iface.get_link_status());
    println!("{}", iface.get_stats_report());
    Ok(())
}
