/*
 * Copyright (C) 2015-2023 IoT.bzh Company
 * Author: Fulup Ar Foll <fulup@iot.bzh>
 *
 * Redpesk interface code/config use MIT License and can be freely copy/modified even within proprietary code
 * License: $RP_BEGIN_LICENSE$ SPDX:MIT https://opensource.org/licenses/MIT $RP_END_LICENSE$
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CanError {
    uid: String,
    info: String,
}

impl Clone for CanError {
    fn clone(&self) -> CanError {
        CanError { uid: self.uid.clone(), info: self.info.clone() }
    }
}

pub trait MakeError<T> {
    fn make(uid: &str, msg: T) -> CanError;
}

impl MakeError<&str> for CanError {
    fn make(uid: &str, msg: &str) -> CanError {
        CanError { uid: uid.to_string(), info: msg.to_string() }
    }
}

impl MakeError<String> for CanError {
    fn make(uid: &str, msg: String) -> CanError {
        CanError { uid: uid.to_string(), info: msg }
    }
}

impl CanError {
    pub fn new<T>(uid: &str, msg: T) -> CanError
    where
        CanError: MakeError<T>,
    {
        Self::make(uid, msg)
    }
    #[must_use]
    pub fn get_uid(&self) -> String {
        self.uid.clone()
    }
    #[must_use]
    pub fn get_info(&self) -> String {
        self.info.clone()
    }
}

impl fmt::Display for CanError {
    fn fmt(&self, format: &mut fmt::Formatter) -> fmt::Result {
        write!(format, "uid:{} info:{}", self.uid, self.info)
    }
}

impl fmt::Debug for CanError {
    fn fmt(&self, format: &mut fmt::Formatter) -> fmt::Result {
        write!(format, "uid:{} info:{}", self.uid, self.info)
    }
}

impl std::error::Error for CanError {}

/// Monotonic microsecond time source. Deadlines and rx timestamps are expressed with it.
pub trait MonoClock: Send + Sync {
    fn now_us(&self) -> u64;
}

/// Default clock, microseconds elapsed since the clock was created.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonoClock for SystemClock {
    fn now_us(&self) -> u64 {
        // u64 microseconds wraps after ~584k years
        self.origin.elapsed().as_micros() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_keeps_uid_and_info() {
        let error = CanError::new("can-write-fail", format!("errno={}", 5));
        assert_eq!(error.to_string(), "uid:can-write-fail info:errno=5");
        assert_eq!(error.get_uid(), "can-write-fail");
        assert_eq!(error.clone().get_info(), "errno=5");
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.now_us();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(clock.now_us() >= first + 1000);
    }
}
