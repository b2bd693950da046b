// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;

use syncd_sai::{metadata, ObjectType};

use crate::parameters::Parameters;

/// Context carries configuration shared by all components of the daemon.
/// Replaces the process-wide globals of older implementations; every
/// component receives an `Arc<Context>` explicitly.
#[derive(Clone)]
pub struct Context {
    /// Operational parameters.
    pub parameters: Parameters,
    /// (object type, attribute) reads skipped during switch discovery.
    /// Some vendors misbehave on specific attribute reads; the set is
    /// pluggable rather than hard-coded at the call sites.
    pub discovery_skips: HashSet<(ObjectType, &'static str)>,
}

impl Context {
    pub fn new(parameters: Parameters) -> Self {
        Self {
            parameters,
            discovery_skips: Context::default_discovery_skips(),
        }
    }

    /// Reads known to crash or hang on at least one vendor.
    pub fn default_discovery_skips() -> HashSet<(ObjectType, &'static str)> {
        [
            (ObjectType::Stp, metadata::STP_BRIDGE_ID),
            (ObjectType::BridgePort, metadata::BRIDGE_PORT_TUNNEL_ID),
            (ObjectType::BridgePort, metadata::BRIDGE_PORT_RIF_ID),
        ]
        .into_iter()
        .collect()
    }

    #[cfg(test)]
    pub(crate) fn new_for_test() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Context::new(Parameters::default()))
    }
}
