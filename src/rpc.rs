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

//! Volume group calls to the CSI driver.
//!
//! Every call is a single unary RPC bounded by the configured timeout. The
//! client never retries; a failed call fails the reconcile pass and the
//! controller's requeue repeats it.

pub mod client;
pub mod proto;

use async_trait::async_trait;
use snafu::Snafu;
use std::collections::BTreeMap;
use std::time::Duration;

pub use client::GrpcDriver;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("{} failed: {}", method, source.message()))]
    Status {
        method: &'static str,
        source: tonic::Status,
    },

    #[snafu(display("{} timed out after {:?}", method, timeout))]
    Timeout {
        method: &'static str,
        timeout: Duration,
    },

    #[snafu(display("failed to connect to driver at '{}': {}", address, source))]
    Connect {
        address: String,
        source: tonic::transport::Error,
    },

    #[snafu(display("{} returned no volume group", method))]
    MissingVolumeGroup { method: &'static str },
}

impl Error {
    /// The text surfaced in a group's `status.error.message`: the driver's own
    /// message when there is one.
    pub fn message(&self) -> String {
        match self {
            Error::Status { source, .. } if !source.message().is_empty() => {
                source.message().to_owned()
            }
            e => e.to_string(),
        }
    }

    pub fn code(&self) -> Option<tonic::Code> {
        match self {
            Error::Status { source, .. } => Some(source.code()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Some(tonic::Code::NotFound)
    }
}

/// What the driver returns for a created group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreatedGroup {
    pub volume_group_id: String,
    pub attributes: BTreeMap<String, String>,
}

/// The driver's volume group contract. Implementations must be safe to share
/// between reconcile workers.
#[async_trait]
pub trait VolumeGroupRpc: Send + Sync {
    async fn create_volume_group(
        &self,
        name: &str,
        secrets: &BTreeMap<String, String>,
        parameters: &BTreeMap<String, String>,
    ) -> Result<CreatedGroup, Error>;

    async fn delete_volume_group(
        &self,
        volume_group_id: &str,
        secrets: &BTreeMap<String, String>,
    ) -> Result<(), Error>;

    async fn modify_volume_group_membership(
        &self,
        volume_group_id: &str,
        volume_ids: &[String],
        secrets: &BTreeMap<String, String>,
    ) -> Result<(), Error>;
}
