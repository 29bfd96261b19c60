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

//! Maps claim changes to the groups they can affect.

use crate::types::v1::VolumeGroup;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::runtime::reflector::ObjectRef;
use std::sync::Arc;
use tracing::debug;

/// Groups whose membership may change because of `claim`: those listing it
/// and those whose selector matches it. A group with an unusable selector is
/// included so its pass reports the error.
pub fn groups_for_claim(
    groups: &[Arc<VolumeGroup>],
    claim: &PersistentVolumeClaim,
) -> Vec<ObjectRef<VolumeGroup>> {
    groups
        .iter()
        .filter(|group| group.metadata.namespace == claim.metadata.namespace)
        .filter(|group| group.lists(claim) || group.selects(claim).unwrap_or(true))
        .map(|group| {
            debug!(
                "claim {:?} affects volumeGroup {:?}",
                claim.metadata.name, group.metadata.name
            );
            ObjectRef::from_obj(group.as_ref())
        })
        .collect()
}
