// Copyright 2025 RustFS Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::Args;
use snafu::Snafu;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("rpc timeout must be greater than zero"))]
    ZeroRpcTimeout,

    #[snafu(display("concurrency must be greater than zero"))]
    ZeroConcurrency,

    #[snafu(display("csi address must be not empty"))]
    EmptyCsiAddress,
}

/// Settings for the `server` subcommand.
#[derive(Args, Debug, Clone)]
pub struct DriverConfig {
    /// Name of the CSI driver served by this operator instance. Discovered
    /// from the driver's GetPluginInfo when empty.
    #[arg(long, env = "DRIVER_NAME", default_value = "")]
    pub driver_name: String,

    /// Address of the CSI driver socket.
    #[arg(long, env = "CSI_ADDRESS", default_value = "/run/csi/socket")]
    pub csi_address: String,

    /// Timeout in seconds for every RPC to the driver.
    #[arg(long = "rpc-timeout", value_name = "SECONDS", default_value_t = 60)]
    pub rpc_timeout_secs: u64,

    /// Number of volume groups reconciled in parallel.
    #[arg(long, default_value_t = 4)]
    pub concurrency: u16,

    /// Address of the /healthz and /readyz endpoints.
    #[arg(long, default_value = "0.0.0.0:8081")]
    pub health_address: SocketAddr,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            driver_name: String::new(),
            csi_address: "/run/csi/socket".to_owned(),
            rpc_timeout_secs: 60,
            concurrency: 4,
            health_address: SocketAddr::from(([0, 0, 0, 0], 8081)),
        }
    }
}

impl DriverConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.rpc_timeout_secs == 0 {
            return ZeroRpcTimeoutSnafu.fail();
        }
        if self.concurrency == 0 {
            return ZeroConcurrencySnafu.fail();
        }
        if self.csi_address.trim().is_empty() {
            return EmptyCsiAddressSnafu.fail();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::DriverConfig;
    use std::time::Duration;

    #[test]
    fn test_defaults_are_valid() {
        let config = DriverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rpc_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let config = DriverConfig {
            rpc_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let config = DriverConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
