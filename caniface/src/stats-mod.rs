/*
 * Copyright (C) 2015-2023 IoT.bzh Company
 * Author: Fulup Ar Foll <fulup@iot.bzh>
 *
 * Redpesk interface code/config use MIT License and can be freely copy/modified even within proprietary code
 * License: $RP_BEGIN_LICENSE$ SPDX:MIT https://opensource.org/licenses/MIT $RP_END_LICENSE$
 *
*/
#[cfg(feature = "serde")]
use serde::Serialize;
use std::fmt;

/// Per interface lifecycle counters, they only ever grow.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IfaceStats {
    pub tx_requests: u64,
    pub tx_rejected: u64,
    pub tx_overflow: u64,
    pub tx_confirmed: u64,
    pub tx_success: u64,
    pub tx_timedout: u64,
    pub rx_received: u64,
    pub rx_errors: u64,
    pub num_downs: u64,
    pub num_rx_poll_req: u64,
    pub num_tx_poll_req: u64,
    pub num_poll_waits: u64,
    pub num_poll_tx_events: u64,
    pub num_poll_rx_events: u64,
    pub last_transmit_us: u64,
}

// diagnostic consumers parse this layout, keep names and order
impl fmt::Display for IfaceStats {
    fn fmt(&self, format: &mut fmt::Formatter) -> fmt::Result {
        writeln!(format, "tx_requests:    {}", self.tx_requests)?;
        writeln!(format, "tx_rejected:    {}", self.tx_rejected)?;
        writeln!(format, "tx_overflow:    {}", self.tx_overflow)?;
        writeln!(format, "tx_confirmed:   {}", self.tx_confirmed)?;
        writeln!(format, "tx_success:     {}", self.tx_success)?;
        writeln!(format, "tx_timedout:    {}", self.tx_timedout)?;
        writeln!(format, "rx_received:    {}", self.rx_received)?;
        writeln!(format, "rx_errors:      {}", self.rx_errors)?;
        writeln!(format, "num_downs:      {}", self.num_downs)?;
        writeln!(format, "num_rx_poll_req:  {}", self.num_rx_poll_req)?;
        writeln!(format, "num_tx_poll_req:  {}", self.num_tx_poll_req)?;
        writeln!(format, "num_poll_waits:   {}", self.num_poll_waits)?;
        writeln!(format, "num_poll_tx_events: {}", self.num_poll_tx_events)?;
        writeln!(format, "num_poll_rx_events: {}", self.num_poll_rx_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_order_and_names() {
        let stats = IfaceStats { tx_requests: 3, num_poll_rx_events: 7, ..Default::default() };
        let report = stats.to_string();
        let names: Vec<&str> =
            report.lines().map(|line| line.split(':').next().unwrap_or_default()).collect();
        assert_eq!(
            names,
            vec![
                "tx_requests",
                "tx_rejected",
                "tx_overflow",
                "tx_confirmed",
                "tx_success",
                "tx_timedout",
                "rx_received",
                "rx_errors",
                "num_downs",
                "num_rx_poll_req",
                "num_tx_poll_req",
                "num_poll_waits",
                "num_poll_tx_events",
                "num_poll_rx_events",
            ]
        );
        assert!(report.starts_with("tx_requests:    3\n"));
        assert!(report.ends_with("num_poll_rx_events: 7\n"));
    }

    #[test]
    fn counters_grow_past_u32() {
        let mut stats = IfaceStats { num_rx_poll_req: u32::MAX as u64, ..Default::default() };
        stats.num_rx_poll_req += 1;
        assert!(stats.to_string().contains("num_rx_poll_req:  4294967296\n"));
    }
}
