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

use super::proto::{
    ControllerClient, CreateVolumeGroupRequest, DeleteVolumeGroupRequest, GetPluginInfoRequest,
    IdentityClient, ModifyVolumeGroupMembershipRequest, ProbeRequest,
};
use super::{ConnectSnafu, CreatedGroup, Error, StatusSnafu, VolumeGroupRpc};
use async_trait::async_trait;
use hyper_util::rt::TokioIo;
use snafu::{OptionExt, ResultExt};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint, Uri};
use tracing::{debug, info, warn};

const PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Driver client over a single shared channel.
#[derive(Clone)]
pub struct GrpcDriver {
    controller: ControllerClient,
    identity: IdentityClient,
    timeout: Duration,
}

impl GrpcDriver {
    /// Connects to `address`, which is either a unix socket path (optionally
    /// prefixed with `unix://`) or an `http(s)://` endpoint.
    pub async fn connect(address: &str, timeout: Duration) -> Result<Self, Error> {
        let channel = match address.strip_prefix("unix://") {
            Some(path) => connect_unix(path, address).await?,
            None if address.starts_with("http://") || address.starts_with("https://") => {
                Endpoint::from_shared(address.to_owned())
                    .context(ConnectSnafu { address })?
                    .connect()
                    .await
                    .context(ConnectSnafu { address })?
            }
            None => connect_unix(address, address).await?,
        };

        info!("Connected to CSI driver at {}", address);
        Ok(Self::from_channel(channel, timeout))
    }

    pub fn from_channel(channel: Channel, timeout: Duration) -> Self {
        Self {
            controller: ControllerClient::new(channel.clone()),
            identity: IdentityClient::new(channel),
            timeout,
        }
    }

    /// Probes the driver until it reports ready.
    pub async fn wait_until_ready(&self) -> Result<(), Error> {
        loop {
            let mut identity = self.identity.clone();
            match self
                .call("Probe", identity.probe(ProbeRequest {}))
                .await
            {
                Ok(response) if response.ready.unwrap_or(true) => return Ok(()),
                Ok(_) => debug!("CSI driver is not ready yet"),
                Err(e @ Error::Status { .. }) if e.code() == Some(tonic::Code::Unimplemented) => {
                    return Ok(());
                }
                Err(e) => warn!("CSI driver probe failed: {}", e),
            }
            tokio::time::sleep(PROBE_INTERVAL).await;
        }
    }

    /// The name the driver reports for itself.
    pub async fn plugin_name(&self) -> Result<String, Error> {
        let mut identity = self.identity.clone();
        let info = self
            .call("GetPluginInfo", identity.get_plugin_info(GetPluginInfoRequest {}))
            .await?;
        Ok(info.name)
    }

    async fn call<T>(
        &self,
        method: &'static str,
        fut: impl Future<Output = Result<tonic::Response<T>, tonic::Status>>,
    ) -> Result<T, Error> {
        debug!(method, "Calling CSI driver");
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result
                .map(tonic::Response::into_inner)
                .context(StatusSnafu { method }),
            Err(_) => Err(Error::Timeout {
                method,
                timeout: self.timeout,
            }),
        }
    }

    fn request<T>(&self, message: T) -> tonic::Request<T> {
        let mut request = tonic::Request::new(message);
        request.set_timeout(self.timeout);
        request
    }
}

async fn connect_unix(path: &str, address: &str) -> Result<Channel, Error> {
    let path = path.to_owned();
    // The URI is ignored by the connector; tonic only needs a valid one.
    Endpoint::from_static("http://[::]:50051")
        .connect_with_connector(tower::service_fn(move |_: Uri| {
            let path = path.clone();
            async move { Ok::<_, std::io::Error>(TokioIo::new(UnixStream::connect(path).await?)) }
        }))
        .await
        .context(ConnectSnafu { address })
}

#[async_trait]
impl VolumeGroupRpc for GrpcDriver {
    async fn create_volume_group(
        &self,
        name: &str,
        secrets: &BTreeMap<String, String>,
        parameters: &BTreeMap<String, String>,
    ) -> Result<CreatedGroup, Error> {
        let method = "CreateVolumeGroup";
        let mut controller = self.controller.clone();
        let request = self.request(CreateVolumeGroupRequest {
            name: name.to_owned(),
            parameters: parameters.clone(),
            secrets: secrets.clone(),
        });

        let group = self
            .call(method, controller.create_volume_group(request))
            .await?
            .volume_group
            .context(super::MissingVolumeGroupSnafu { method })?;

        info!(
            "Driver created volume group {} for {}",
            group.volume_group_id, name
        );
        Ok(CreatedGroup {
            volume_group_id: group.volume_group_id,
            attributes: group.volume_group_context,
        })
    }

    async fn delete_volume_group(
        &self,
        volume_group_id: &str,
        secrets: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        let mut controller = self.controller.clone();
        let request = self.request(DeleteVolumeGroupRequest {
            volume_group_id: volume_group_id.to_owned(),
            secrets: secrets.clone(),
        });

        self.call("DeleteVolumeGroup", controller.delete_volume_group(request))
            .await?;
        info!("Driver deleted volume group {}", volume_group_id);
        Ok(())
    }

    async fn modify_volume_group_membership(
        &self,
        volume_group_id: &str,
        volume_ids: &[String],
        secrets: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        let mut controller = self.controller.clone();
        let request = self.request(ModifyVolumeGroupMembershipRequest {
            volume_group_id: volume_group_id.to_owned(),
            volume_ids: volume_ids.to_vec(),
            secrets: secrets.clone(),
        });

        self.call(
            "ModifyVolumeGroupMembership",
            controller.modify_volume_group_membership(request),
        )
        .await?;
        debug!(
            "Volume group {} now holds {} volume(s)",
            volume_group_id,
            volume_ids.len()
        );
        Ok(())
    }
}
