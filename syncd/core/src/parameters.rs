// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Operational configuration of the synchronization daemon.
///
/// NOTE: default values should make sense, so most operators should not need
/// to specify any field.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Parameters {
    /// Whether producer writes are collected into a temporary view between
    /// INIT_VIEW and APPLY_VIEW. When disabled every write goes straight to
    /// the driver.
    #[serde(default = "Parameters::default_use_temp_view")]
    pub use_temp_view: bool,

    /// Time a producer waits on the get-response channel before giving up.
    #[serde(default = "Parameters::default_get_response_timeout")]
    pub get_response_timeout: Duration,

    /// Upper bound on elements fetched per object-list attribute during
    /// switch discovery.
    #[serde(default = "Parameters::default_discovery_list_capacity")]
    pub discovery_list_capacity: usize,

    /// Seed for the comparison logic's tie-break choices. Fixed seed makes
    /// two identical APPLY runs emit identical operation sequences.
    #[serde(default = "Parameters::default_compare_seed")]
    pub compare_seed: u64,

    /// Bound of the notification dispatch queue.
    #[serde(default = "Parameters::default_notification_queue_size")]
    pub notification_queue_size: usize,

    /// Directory for the recording file. Recording stays off when unset.
    pub recording_dir: Option<PathBuf>,
}

impl Parameters {
    pub fn default_use_temp_view() -> bool {
        true
    }

    pub fn default_get_response_timeout() -> Duration {
        Duration::from_secs(6 * 60)
    }

    pub fn default_discovery_list_capacity() -> usize {
        1024
    }

    pub fn default_compare_seed() -> u64 {
        0
    }

    pub fn default_notification_queue_size() -> usize {
        1024
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            use_temp_view: Parameters::default_use_temp_view(),
            get_response_timeout: Parameters::default_get_response_timeout(),
            discovery_list_capacity: Parameters::default_discovery_list_capacity(),
            compare_seed: Parameters::default_compare_seed(),
            notification_queue_size: Parameters::default_notification_queue_size(),
            recording_dir: None,
        }
    }
}
