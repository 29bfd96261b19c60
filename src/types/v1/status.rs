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

use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::KubeSchema;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Observed state of a VolumeGroup. A fresh value is computed on every pass
/// and only written when it differs from the stored one.
#[derive(Deserialize, Serialize, Clone, Debug, KubeSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_volume_group_content_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_creation_time: Option<metav1::Time>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<VolumeGroupError>,

    /// Names of the member claims, sorted.
    #[serde(default, rename = "pvcList")]
    pub pvc_list: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, KubeSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl VolumeGroupStatus {
    /// The stored status with its error replaced; used when a pass fails
    /// before it can compute the full picture.
    pub fn failed(previous: Option<&VolumeGroupStatus>, message: String, ready: Option<bool>) -> Self {
        let mut status = previous.cloned().unwrap_or_default();
        status.error = Some(VolumeGroupError {
            message: Some(message),
        });
        if ready.is_some() {
            status.ready = ready;
        }
        status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().and_then(|e| e.message.as_deref())
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, KubeSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupContentStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_creation_time: Option<metav1::Time>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,

    /// Names of the member PersistentVolumes, in member order.
    #[serde(default, rename = "pvList")]
    pub pv_list: Vec<String>,
}

/// Reasons of the events the reconciler records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Reason {
    VolumeGroupCreated,
    MembershipChanged,
    MembershipRejected,
    ClassResolutionFailed,
    InvalidParameters,
    SecretResolutionFailed,
    MembershipResolutionFailed,
    CreateVolumeGroupFailed,
    ModifyVolumeGroupFailed,
    DeleteVolumeGroupFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_keeps_members_and_sets_error() {
        let previous = VolumeGroupStatus {
            ready: Some(true),
            pvc_list: vec!["pvc-a".to_owned()],
            ..Default::default()
        };

        let status = VolumeGroupStatus::failed(Some(&previous), "boom".to_owned(), Some(false));
        assert_eq!(status.error_message(), Some("boom"));
        assert_eq!(status.ready, Some(false));
        assert_eq!(status.pvc_list, previous.pvc_list);

        let status = VolumeGroupStatus::failed(Some(&previous), "boom".to_owned(), None);
        assert_eq!(status.ready, Some(true));
    }

    #[test]
    fn test_reason_names() {
        assert_eq!(Reason::MembershipRejected.to_string(), "MembershipRejected");
        assert_eq!(Reason::DeleteVolumeGroupFailed.to_string(), "DeleteVolumeGroupFailed");
    }

    #[test]
    fn test_lists_use_short_json_names() {
        let status = VolumeGroupStatus {
            pvc_list: vec!["pvc-a".to_owned()],
            ..Default::default()
        };
        let json = serde_json::to_value(&status).unwrap_or_default();
        assert_eq!(json["pvcList"][0], "pvc-a");
    }
}
