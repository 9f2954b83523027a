/*
 * Copyright (C) 2015-2023 IoT.bzh Company
 * Author: Fulup Ar Foll <fulup@iot.bzh>
 *
 * Redpesk interface code/config use MIT License and can be freely copy/modified even within proprietary code
 * License: $RP_BEGIN_LICENSE$ SPDX:MIT https://opensource.org/licenses/MIT $RP_END_LICENSE$
 *
*/
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::prelude::CanError;

/// Kernel transmit frames allowed in flight before waiting for their loopback.
pub const CAN_MAX_FRAMES_IN_SOCKET: usize = 2;
/// Max reads per rx drain, bounds the latency of one poll call.
pub const CAN_MAX_POLL_ITERATIONS_COUNT: u8 = 100;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OperatingMode {
    #[default]
    Normal,
    Filtered,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanIfaceConfig {
    pub mode: OperatingMode,
    /// bind `vcan<N>` instead of `can<N>`
    pub virtual_can: bool,
    pub max_in_socket_frames: usize,
    pub max_poll_iterations: u8,
    /// None keeps the transmit queue unbounded
    pub tx_queue_limit: Option<usize>,
    /// None keeps the delivery queue unbounded
    pub rx_queue_limit: Option<usize>,
}

impl Default for CanIfaceConfig {
    fn default() -> Self {
        CanIfaceConfig {
            mode: OperatingMode::Normal,
            virtual_can: false,
            max_in_socket_frames: CAN_MAX_FRAMES_IN_SOCKET,
            max_poll_iterations: CAN_MAX_POLL_ITERATIONS_COUNT,
            tx_queue_limit: None,
            rx_queue_limit: None,
        }
    }
}

impl CanIfaceConfig {
    pub fn get_ifname(&self, index: u8) -> String {
        if self.virtual_can {
            format!("vcan{}", index)
        } else {
            format!("can{}", index)
        }
    }

    /// Both limits must be at least 1, otherwise the drains never run.
    pub fn check(&self) -> Result<(), CanError> {
        if self.max_in_socket_frames == 0 {
            return Err(CanError::new("invalid-iface-config", "max_in_socket_frames=0"));
        }
        if self.max_poll_iterations == 0 {
            return Err(CanError::new("invalid-iface-config", "max_poll_iterations=0"));
        }
        Ok(())
    }

    #[cfg(all(feature = "serde", feature = "serde_json"))]
    pub fn from_json(jconf: &str) -> Result<Self, CanError> {
        let config = match serde_json::from_str::<CanIfaceConfig>(jconf) {
            Err(error) => return Err(CanError::new("invalid-iface-config", error.to_string())),
            Ok(config) => config,
        };
        config.check()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_unbounded() {
        let config = CanIfaceConfig::default();
        assert_eq!(config.max_in_socket_frames, 2);
        assert_eq!(config.max_poll_iterations, 100);
        assert_eq!(config.tx_queue_limit, None);
        assert_eq!(config.rx_queue_limit, None);
        assert_eq!(config.get_ifname(3), "can3");
    }

    #[test]
    #[cfg(all(feature = "serde", feature = "serde_json"))]
    fn partial_json_keeps_defaults() {
        let config =
            CanIfaceConfig::from_json(r#"{"mode":"Filtered","virtual_can":true,"tx_queue_limit":64}"#)
                .unwrap();
        assert_eq!(config.mode, OperatingMode::Filtered);
        assert_eq!(config.get_ifname(0), "vcan0");
        assert_eq!(config.tx_queue_limit, Some(64));
        assert_eq!(config.max_in_socket_frames, CAN_MAX_FRAMES_IN_SOCKET);
    }

    #[test]
    #[cfg(all(feature = "serde", feature = "serde_json"))]
    fn bad_json_is_reported() {
        let error = CanIfaceConfig::from_json("{mode:").unwrap_err();
        assert_eq!(error.get_uid(), "invalid-iface-config");
    }

    #[test]
    #[cfg(all(feature = "serde", feature = "serde_json"))]
    fn zero_limits_are_refused() {
        let error = CanIfaceConfig::from_json(r#"{"max_poll_iterations":0}"#).unwrap_err();
        assert_eq!(error.get_uid(), "invalid-iface-config");
        let error = CanIfaceConfig::from_json(r#"{"max_in_socket_frames":0}"#).unwrap_err();
        assert_eq!(error.get_uid(), "invalid-iface-config");
    }

    #[test]
    fn check_accepts_defaults() {
        assert!(CanIfaceConfig::default().check().is_ok());
        let config = CanIfaceConfig { max_in_socket_frames: 0, ..Default::default() };
        assert!(config.check().is_err());
    }
}
