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

use crate::types;
use crate::types::error::{InvalidSelectorSnafu, MissingUidSnafu, NoNamespaceSnafu};
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::core::{Selector, SelectorExt};
use kube::{CustomResource, KubeSchema, ResourceExt};
use serde::{Deserialize, Serialize};
use snafu::OptionExt;
use std::collections::BTreeMap;

/// Label a claim carries to join a group that has no explicit selector.
pub const DEFAULT_SELECTOR_LABEL: &str = "volumegroup";

/// Prefix of the group name handed to the driver.
const DRIVER_GROUP_NAME_PREFIX: &str = "volumegroup";

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, KubeSchema, Default)]
#[kube(
    group = "csi.ibm.com",
    version = "v1",
    kind = "VolumeGroup",
    namespaced,
    status = "crate::types::v1::status::VolumeGroupStatus",
    shortname = "vg",
    plural = "volumegroups",
    singular = "volumegroup",
    printcolumn = r#"{"name":"Class", "type":"string", "jsonPath":".spec.volumeGroupClassName"}"#,
    printcolumn = r#"{"name":"Content", "type":"string", "jsonPath":".status.boundVolumeGroupContentName"}"#,
    printcolumn = r#"{"name":"Ready", "type":"boolean", "jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#,
    crates(serde_json = "k8s_openapi::serde_json")
)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[x_kube(validation = Rule::new("self != ''").message("volumeGroupClassName must be not empty when specified"))]
    pub volume_group_class_name: Option<String>,

    #[serde(default)]
    pub source: VolumeGroupSource,
}

#[derive(Deserialize, Serialize, Clone, Debug, KubeSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupSource {
    /// Set by the operator once the group is bound to its content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_group_content_name: Option<String>,

    /// Claims in the group's namespace whose labels match join the group.
    /// Defaults to `volumegroup=<group name>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<metav1::LabelSelector>,
}

impl VolumeGroup {
    pub fn namespace(&self) -> Result<String, types::error::Error> {
        ResourceExt::namespace(self).context(NoNamespaceSnafu)
    }

    pub fn name(&self) -> String {
        ResourceExt::name_any(self)
    }

    pub fn uid(&self) -> Result<String, types::error::Error> {
        ResourceExt::uid(self).context(MissingUidSnafu {
            kind: "VolumeGroup",
            name: self.name(),
        })
    }

    /// Name under which the driver knows this group, `volumegroup-<uid>`.
    pub fn driver_group_name(&self) -> Result<String, types::error::Error> {
        Ok(format!("{}-{}", DRIVER_GROUP_NAME_PREFIX, self.uid()?))
    }

    /// Name of the content bound to this group, either recorded in the spec
    /// or derived from the group name.
    pub fn content_name(&self) -> String {
        self.spec
            .source
            .volume_group_content_name
            .clone()
            .unwrap_or_else(|| format!("{}-content", self.name()))
    }

    pub fn class_name(&self) -> Option<&str> {
        self.spec
            .volume_group_class_name
            .as_deref()
            .filter(|name| !name.is_empty())
    }

    pub fn label_selector(&self) -> metav1::LabelSelector {
        self.spec
            .source
            .selector
            .clone()
            .unwrap_or_else(|| metav1::LabelSelector {
                match_labels: Some(BTreeMap::from([(
                    DEFAULT_SELECTOR_LABEL.to_owned(),
                    self.name(),
                )])),
                ..Default::default()
            })
    }

    /// Whether the claim's labels match the group's selector. Claims in other
    /// namespaces never match.
    pub fn selects(&self, claim: &corev1::PersistentVolumeClaim) -> Result<bool, types::error::Error> {
        if claim.metadata.namespace != self.metadata.namespace {
            return Ok(false);
        }

        let selector = Selector::try_from(self.label_selector()).map_err(|e| {
            InvalidSelectorSnafu {
                name: self.name(),
                message: e.to_string(),
            }
            .build()
        })?;

        let empty = BTreeMap::new();
        Ok(selector.matches(claim.metadata.labels.as_ref().unwrap_or(&empty)))
    }

    /// Whether the claim is recorded as a current member of the group.
    pub fn lists(&self, claim: &corev1::PersistentVolumeClaim) -> bool {
        claim.metadata.namespace == self.metadata.namespace
            && self.status.as_ref().is_some_and(|status| {
                status
                    .pvc_list
                    .iter()
                    .any(|name| Some(name) == claim.metadata.name.as_ref())
            })
    }

    pub fn members(&self) -> &[String] {
        self.status
            .as_ref()
            .map(|status| status.pvc_list.as_slice())
            .unwrap_or_default()
    }

    pub fn is_terminating(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use crate::tests::{claim, group};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
    use std::collections::BTreeMap;

    #[test]
    fn test_default_selector_uses_group_name() {
        let vg = group("vg-1", "class-1");
        let selector = vg.label_selector();

        assert_eq!(
            selector.match_labels,
            Some(BTreeMap::from([(
                "volumegroup".to_owned(),
                "vg-1".to_owned()
            )]))
        );
        assert!(vg.selects(&claim("pvc-a", &[("volumegroup", "vg-1")])).unwrap());
        assert!(!vg.selects(&claim("pvc-b", &[("volumegroup", "vg-2")])).unwrap());
        assert!(!vg.selects(&claim("pvc-c", &[])).unwrap());
    }

    #[test]
    fn test_selector_ignores_other_namespaces() {
        let vg = group("vg-1", "class-1");
        let mut pvc = claim("pvc-a", &[("volumegroup", "vg-1")]);
        pvc.metadata.namespace = Some("other".to_owned());

        assert!(!vg.selects(&pvc).unwrap());
    }

    #[test]
    fn test_explicit_selector_with_expressions() {
        let mut vg = group("vg-1", "class-1");
        vg.spec.source.selector = Some(metav1::LabelSelector {
            match_expressions: Some(vec![metav1::LabelSelectorRequirement {
                key: "tier".to_owned(),
                operator: "In".to_owned(),
                values: Some(vec!["db".to_owned(), "log".to_owned()]),
            }]),
            ..Default::default()
        });

        assert!(vg.selects(&claim("pvc-a", &[("tier", "db")])).unwrap());
        assert!(!vg.selects(&claim("pvc-b", &[("tier", "web")])).unwrap());
    }

    #[test]
    fn test_invalid_selector_is_reported() {
        let mut vg = group("vg-1", "class-1");
        vg.spec.source.selector = Some(metav1::LabelSelector {
            match_expressions: Some(vec![metav1::LabelSelectorRequirement {
                key: "tier".to_owned(),
                operator: "Near".to_owned(),
                values: None,
            }]),
            ..Default::default()
        });

        assert!(vg.selects(&claim("pvc-a", &[("tier", "db")])).is_err());
    }

    #[test]
    fn test_names_derived_from_group() {
        let vg = group("vg-1", "class-1");

        assert_eq!(vg.content_name(), "vg-1-content");
        assert_eq!(vg.driver_group_name().unwrap(), "volumegroup-uid-vg-1");

        let mut orphan = vg.clone();
        orphan.metadata.uid = None;
        assert!(orphan.driver_group_name().is_err());
    }
}
