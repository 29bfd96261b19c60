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

use k8s_openapi::api::core::v1 as corev1;
use kube::{CustomResource, KubeSchema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The driver's view of a realized group. Created by the operator only.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, KubeSchema, Default)]
#[kube(
    group = "csi.ibm.com",
    version = "v1",
    kind = "VolumeGroupContent",
    namespaced,
    status = "crate::types::v1::status::VolumeGroupContentStatus",
    shortname = "vgcontent",
    plural = "volumegroupcontents",
    singular = "volumegroupcontent",
    printcolumn = r#"{"name":"Handle", "type":"string", "jsonPath":".spec.source.volumeGroupHandle"}"#,
    printcolumn = r#"{"name":"Ready", "type":"boolean", "jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#,
    crates(serde_json = "k8s_openapi::serde_json")
)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupContentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_group_class_name: Option<String>,

    /// Back-reference to the owning VolumeGroup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_group_ref: Option<corev1::ObjectReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<VolumeGroupContentSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_group_secret_ref: Option<corev1::SecretReference>,
}

#[derive(Deserialize, Serialize, Clone, Debug, KubeSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupContentSource {
    pub driver: String,

    pub volume_group_handle: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volume_group_attributes: BTreeMap<String, String>,
}

impl VolumeGroupContent {
    pub fn handle(&self) -> Option<&str> {
        self.spec
            .source
            .as_ref()
            .map(|source| source.volume_group_handle.as_str())
            .filter(|handle| !handle.is_empty())
    }

    /// UID of the group this content was created for.
    pub fn owner_uid(&self) -> Option<&str> {
        self.spec
            .volume_group_ref
            .as_ref()
            .and_then(|r| r.uid.as_deref())
    }
}
