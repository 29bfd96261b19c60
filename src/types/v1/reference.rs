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

use super::{VolumeGroup, VolumeGroupContent};
use k8s_openapi::Resource as _;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::Resource;

/// An object the operator points at: from a content's back-reference, from an
/// owner reference, or from an event.
#[derive(Clone, Copy, Debug)]
pub enum Referent<'a> {
    Group(&'a VolumeGroup),
    Content(&'a VolumeGroupContent),
    Claim(&'a corev1::PersistentVolumeClaim),
}

impl<'a> Referent<'a> {
    fn api_version_and_kind(&self) -> (String, String) {
        match self {
            Referent::Group(_) => (
                VolumeGroup::api_version(&()).to_string(),
                VolumeGroup::kind(&()).to_string(),
            ),
            Referent::Content(_) => (
                VolumeGroupContent::api_version(&()).to_string(),
                VolumeGroupContent::kind(&()).to_string(),
            ),
            Referent::Claim(_) => (
                corev1::PersistentVolumeClaim::API_VERSION.to_owned(),
                corev1::PersistentVolumeClaim::KIND.to_owned(),
            ),
        }
    }

    pub fn meta(&self) -> &'a metav1::ObjectMeta {
        match *self {
            Referent::Group(group) => &group.metadata,
            Referent::Content(content) => &content.metadata,
            Referent::Claim(claim) => &claim.metadata,
        }
    }

    /// `namespace/name` for log lines.
    pub fn key(&self) -> String {
        let meta = self.meta();
        format!(
            "{}/{}",
            meta.namespace.as_deref().unwrap_or_default(),
            meta.name.as_deref().unwrap_or_default()
        )
    }

    pub fn object_ref(&self) -> corev1::ObjectReference {
        let (api_version, kind) = self.api_version_and_kind();
        let meta = self.meta();

        corev1::ObjectReference {
            api_version: Some(api_version),
            kind: Some(kind),
            name: meta.name.clone(),
            namespace: meta.namespace.clone(),
            uid: meta.uid.clone(),
            resource_version: meta.resource_version.clone(),
            ..Default::default()
        }
    }

    /// A controller owner reference, so the referent's deletion cascades.
    pub fn owner_ref(&self) -> metav1::OwnerReference {
        let (api_version, kind) = self.api_version_and_kind();
        let meta = self.meta();

        metav1::OwnerReference {
            api_version,
            kind,
            name: meta.name.clone().unwrap_or_default(),
            uid: meta.uid.clone().unwrap_or_default(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::Referent;
    use crate::tests::{claim, group};

    #[test]
    fn test_group_object_ref_carries_identity() {
        let vg = group("vg-1", "class-1");
        let reference = Referent::Group(&vg).object_ref();

        assert_eq!(reference.kind.as_deref(), Some("VolumeGroup"));
        assert_eq!(reference.api_version.as_deref(), Some("csi.ibm.com/v1"));
        assert_eq!(reference.name.as_deref(), Some("vg-1"));
        assert_eq!(reference.namespace.as_deref(), Some("default"));
        assert_eq!(reference.uid.as_deref(), Some("uid-vg-1"));
    }

    #[test]
    fn test_claim_object_ref_uses_core_kind() {
        let pvc = claim("pvc-a", &[]);
        let reference = Referent::Claim(&pvc).object_ref();

        assert_eq!(reference.kind.as_deref(), Some("PersistentVolumeClaim"));
        assert_eq!(reference.api_version.as_deref(), Some("v1"));
        assert_eq!(Referent::Claim(&pvc).key(), "default/pvc-a");
    }

    #[test]
    fn test_owner_ref_is_controller() {
        let vg = group("vg-1", "class-1");
        let owner = Referent::Group(&vg).owner_ref();

        assert_eq!(owner.kind, "VolumeGroup");
        assert_eq!(owner.uid, "uid-vg-1");
        assert_eq!(owner.controller, Some(true));
        assert_eq!(owner.block_owner_deletion, Some(true));
    }
}
