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

//! Messages and clients for the subset of `csi.v1` the operator speaks:
//! Identity `Probe`/`GetPluginInfo` and the Controller volume group calls.
//! `proto/csi.proto` is the schema; field tags and method paths here must
//! match it, which the tests check.

use std::collections::BTreeMap;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProbeRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProbeResponse {
    /// google.protobuf.BoolValue; absent means ready.
    #[prost(message, optional, tag = "1")]
    pub ready: ::core::option::Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetPluginInfoRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetPluginInfoResponse {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub vendor_version: ::prost::alloc::string::String,
    #[prost(btree_map = "string, string", tag = "3")]
    pub manifest: BTreeMap<::prost::alloc::string::String, ::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateVolumeGroupRequest {
    /// Suggested name; drivers use it for idempotency.
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(btree_map = "string, string", tag = "2")]
    pub parameters: BTreeMap<::prost::alloc::string::String, ::prost::alloc::string::String>,
    #[prost(btree_map = "string, string", tag = "3")]
    pub secrets: BTreeMap<::prost::alloc::string::String, ::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateVolumeGroupResponse {
    #[prost(message, optional, tag = "1")]
    pub volume_group: ::core::option::Option<VolumeGroup>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VolumeGroup {
    #[prost(string, tag = "1")]
    pub volume_group_id: ::prost::alloc::string::String,
    #[prost(btree_map = "string, string", tag = "2")]
    pub volume_group_context: BTreeMap<::prost::alloc::string::String, ::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteVolumeGroupRequest {
    #[prost(string, tag = "1")]
    pub volume_group_id: ::prost::alloc::string::String,
    #[prost(btree_map = "string, string", tag = "2")]
    pub secrets: BTreeMap<::prost::alloc::string::String, ::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteVolumeGroupResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModifyVolumeGroupMembershipRequest {
    #[prost(string, tag = "1")]
    pub volume_group_id: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "2")]
    pub volume_ids: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(btree_map = "string, string", tag = "3")]
    pub secrets: BTreeMap<::prost::alloc::string::String, ::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModifyVolumeGroupMembershipResponse {
    #[prost(message, optional, tag = "1")]
    pub volume_group: ::core::option::Option<VolumeGroup>,
}

const PROBE: &str = "/csi.v1.Identity/Probe";
const GET_PLUGIN_INFO: &str = "/csi.v1.Identity/GetPluginInfo";
const CREATE_VOLUME_GROUP: &str = "/csi.v1.Controller/CreateVolumeGroup";
const DELETE_VOLUME_GROUP: &str = "/csi.v1.Controller/DeleteVolumeGroup";
const MODIFY_VOLUME_GROUP_MEMBERSHIP: &str = "/csi.v1.Controller/ModifyVolumeGroupMembership";

async fn unary<Req, Resp>(
    inner: &mut tonic::client::Grpc<Channel>,
    request: tonic::Request<Req>,
    path: &'static str,
) -> Result<tonic::Response<Resp>, tonic::Status>
where
    Req: ::prost::Message + 'static,
    Resp: ::prost::Message + Default + 'static,
{
    inner
        .ready()
        .await
        .map_err(|e| tonic::Status::unknown(format!("Service was not ready: {e}")))?;
    let codec = tonic::codec::ProstCodec::default();
    inner
        .unary(request, PathAndQuery::from_static(path), codec)
        .await
}

/// Client for `csi.v1.Identity`.
#[derive(Debug, Clone)]
pub struct IdentityClient {
    inner: tonic::client::Grpc<Channel>,
}

impl IdentityClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    pub async fn probe(
        &mut self,
        request: impl tonic::IntoRequest<ProbeRequest>,
    ) -> Result<tonic::Response<ProbeResponse>, tonic::Status> {
        unary(&mut self.inner, request.into_request(), PROBE).await
    }

    pub async fn get_plugin_info(
        &mut self,
        request: impl tonic::IntoRequest<GetPluginInfoRequest>,
    ) -> Result<tonic::Response<GetPluginInfoResponse>, tonic::Status> {
        unary(&mut self.inner, request.into_request(), GET_PLUGIN_INFO).await
    }
}

/// Client for the volume group calls of `csi.v1.Controller`.
#[derive(Debug, Clone)]
pub struct ControllerClient {
    inner: tonic::client::Grpc<Channel>,
}

impl ControllerClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    pub async fn create_volume_group(
        &mut self,
        request: impl tonic::IntoRequest<CreateVolumeGroupRequest>,
    ) -> Result<tonic::Response<CreateVolumeGroupResponse>, tonic::Status> {
        unary(&mut self.inner, request.into_request(), CREATE_VOLUME_GROUP).await
    }

    pub async fn delete_volume_group(
        &mut self,
        request: impl tonic::IntoRequest<DeleteVolumeGroupRequest>,
    ) -> Result<tonic::Response<DeleteVolumeGroupResponse>, tonic::Status> {
        unary(&mut self.inner, request.into_request(), DELETE_VOLUME_GROUP).await
    }

    pub async fn modify_volume_group_membership(
        &mut self,
        request: impl tonic::IntoRequest<ModifyVolumeGroupMembershipRequest>,
    ) -> Result<tonic::Response<ModifyVolumeGroupMembershipResponse>, tonic::Status> {
        unary(
            &mut self.inner,
            request.into_request(),
            MODIFY_VOLUME_GROUP_MEMBERSHIP,
        )
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use prost::Message;
    use std::collections::BTreeSet;

    const CSI_PROTO: &str = include_str!("../../proto/csi.proto");

    fn pair() -> BTreeMap<String, String> {
        BTreeMap::from([("k".to_owned(), "v".to_owned())])
    }

    /// Top-level field numbers present in the encoding of `message`.
    fn encoded_tags(message: &impl Message) -> BTreeSet<u32> {
        let bytes = message.encode_to_vec();
        let mut buf = bytes.as_slice();
        let mut tags = BTreeSet::new();
        while !buf.is_empty() {
            let key = prost::encoding::decode_varint(&mut buf).unwrap();
            tags.insert((key >> 3) as u32);
            match key & 0x7 {
                0 => {
                    prost::encoding::decode_varint(&mut buf).unwrap();
                }
                1 => buf = &buf[8..],
                2 => {
                    let len = prost::encoding::decode_varint(&mut buf).unwrap() as usize;
                    buf = &buf[len..];
                }
                5 => buf = &buf[4..],
                wire_type => panic!("unexpected wire type {wire_type}"),
            }
        }
        tags
    }

    /// Field numbers per message declared in the schema.
    fn declared_tags() -> BTreeMap<String, BTreeSet<u32>> {
        let mut messages = BTreeMap::new();
        let mut current: Option<String> = None;
        for line in CSI_PROTO.lines().map(str::trim) {
            if let Some(rest) = line.strip_prefix("message ") {
                let name = rest.trim_end_matches('{').trim().to_owned();
                messages.insert(name.clone(), BTreeSet::new());
                current = Some(name);
            } else if line == "}" {
                current = None;
            } else if let (Some(name), Some((_, tag))) = (&current, line.split_once(" = ")) {
                let tag = tag.trim_end_matches(';').parse().unwrap();
                messages.get_mut(name).unwrap().insert(tag);
            }
        }
        messages
    }

    #[test]
    fn test_messages_match_schema() {
        let encoded: BTreeMap<String, BTreeSet<u32>> = [
            ("GetPluginInfoRequest", encoded_tags(&GetPluginInfoRequest {})),
            (
                "GetPluginInfoResponse",
                encoded_tags(&GetPluginInfoResponse {
                    name: "n".to_owned(),
                    vendor_version: "1".to_owned(),
                    manifest: pair(),
                }),
            ),
            ("ProbeRequest", encoded_tags(&ProbeRequest {})),
            ("ProbeResponse", encoded_tags(&ProbeResponse { ready: Some(true) })),
            (
                "CreateVolumeGroupRequest",
                encoded_tags(&CreateVolumeGroupRequest {
                    name: "n".to_owned(),
                    parameters: pair(),
                    secrets: pair(),
                }),
            ),
            (
                "CreateVolumeGroupResponse",
                encoded_tags(&CreateVolumeGroupResponse {
                    volume_group: Some(VolumeGroup::default()),
                }),
            ),
            (
                "VolumeGroup",
                encoded_tags(&VolumeGroup {
                    volume_group_id: "g".to_owned(),
                    volume_group_context: pair(),
                }),
            ),
            (
                "DeleteVolumeGroupRequest",
                encoded_tags(&DeleteVolumeGroupRequest {
                    volume_group_id: "g".to_owned(),
                    secrets: pair(),
                }),
            ),
            ("DeleteVolumeGroupResponse", encoded_tags(&DeleteVolumeGroupResponse {})),
            (
                "ModifyVolumeGroupMembershipRequest",
                encoded_tags(&ModifyVolumeGroupMembershipRequest {
                    volume_group_id: "g".to_owned(),
                    volume_ids: vec!["a".to_owned()],
                    secrets: pair(),
                }),
            ),
            (
                "ModifyVolumeGroupMembershipResponse",
                encoded_tags(&ModifyVolumeGroupMembershipResponse {
                    volume_group: Some(VolumeGroup::default()),
                }),
            ),
        ]
        .into_iter()
        .map(|(name, tags)| (name.to_owned(), tags))
        .collect();

        assert_eq!(encoded, declared_tags());
    }

    #[test]
    fn test_method_paths_match_schema() {
        let mut declared = BTreeSet::new();
        let mut service = "";
        for line in CSI_PROTO.lines().map(str::trim) {
            if let Some(rest) = line.strip_prefix("service ") {
                service = rest.trim_end_matches('{').trim();
            } else if let Some(rest) = line.strip_prefix("rpc ") {
                let method = rest.split('(').next().unwrap();
                declared.insert(format!("/csi.v1.{service}/{method}"));
            }
        }

        let used: BTreeSet<String> = [
            PROBE,
            GET_PLUGIN_INFO,
            CREATE_VOLUME_GROUP,
            DELETE_VOLUME_GROUP,
            MODIFY_VOLUME_GROUP_MEMBERSHIP,
        ]
        .into_iter()
        .map(str::to_owned)
        .collect();

        assert_eq!(used, declared);
    }

    #[test]
    fn test_modify_request_wire_layout() {
        let request = ModifyVolumeGroupMembershipRequest {
            volume_group_id: "g".to_owned(),
            volume_ids: vec!["a".to_owned()],
            secrets: BTreeMap::new(),
        };
        // field 1 "g", field 2 "a"
        assert_eq!(request.encode_to_vec(), vec![0x0a, 0x01, b'g', 0x12, 0x01, b'a']);
    }

    #[test]
    fn test_create_response_decodes_group() {
        // field 1 { field 1 "id", field 2 { "k": "v" } }
        let bytes = [
            0x0a, 0x0c, 0x0a, 0x02, b'i', b'd', 0x12, 0x06, 0x0a, 0x01, b'k', 0x12, 0x01, b'v',
        ];
        let response = CreateVolumeGroupResponse::decode(&bytes[..]).unwrap();
        let group = response.volume_group.unwrap();

        assert_eq!(group.volume_group_id, "id");
        assert_eq!(group.volume_group_context.get("k").map(String::as_str), Some("v"));
    }
}
