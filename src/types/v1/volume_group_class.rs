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

use kube::{CustomResource, KubeSchema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Binds groups to a driver, like a StorageClass does for volumes.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, KubeSchema, Default)]
#[kube(
    group = "csi.ibm.com",
    version = "v1",
    kind = "VolumeGroupClass",
    shortname = "vgclass",
    plural = "volumegroupclasses",
    singular = "volumegroupclass",
    printcolumn = r#"{"name":"Driver", "type":"string", "jsonPath":".spec.driver"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#,
    crates(serde_json = "k8s_openapi::serde_json")
)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupClassSpec {
    #[x_kube(validation = Rule::new("self != ''").message("driver must be not empty"))]
    pub driver: String,

    /// Opaque driver parameters plus the reserved
    /// `volumegroup.storage.ibm.io/*` keys.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}
