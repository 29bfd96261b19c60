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

//! Which claims belong to a group.
//!
//! A claim is a member of at most one group. Membership is read from the
//! groups' `status.pvcList` and their selectors on every pass; nothing else
//! records it.

use crate::context::{self, Cluster};
use crate::types;
use crate::types::v1::VolumeGroup;
use crate::types::v1::reference::Referent;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::ResourceExt;
use snafu::Snafu;
use tracing::{debug, warn};

/// StorageClass parameter of drivers that group volumes on their own.
pub const STORAGE_CLASS_GROUP_PARAMETER: &str = "volume_group";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display(
        "failed to add {} persistentVolumeClaim to volumeGroups {:?} because it belongs to other volumeGroups {:?}",
        claim,
        candidates,
        existing
    ))]
    AlreadyInGroup {
        claim: String,
        candidates: Vec<String>,
        existing: Vec<String>,
    },

    #[snafu(display(
        "failed to add {} persistentVolumeClaim to volumeGroups {:?} because it matched more than one new volumeGroup",
        claim,
        candidates
    ))]
    MultipleNewGroups {
        claim: String,
        candidates: Vec<String>,
    },

    #[snafu(display(
        "{} persistentVolumeClaim uses storageClass '{}', which groups its volumes through the '{}' parameter",
        claim,
        storage_class,
        STORAGE_CLASS_GROUP_PARAMETER
    ))]
    GroupedByStorageClass { claim: String, storage_class: String },

    #[snafu(display("{} persistentVolume of claim {} does not exist", volume, claim))]
    PersistentVolumeNotFound { claim: String, volume: String },

    #[snafu(display("{} persistentVolume of claim {} is not a CSI volume", volume, claim))]
    NotCsiVolume { claim: String, volume: String },

    #[snafu(transparent)]
    Context { source: context::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },
}

impl Error {
    /// Errors that name a claim the group may not take. They clear only when
    /// a user changes labels or groups.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::AlreadyInGroup { .. }
                | Error::MultipleNewGroups { .. }
                | Error::GroupedByStorageClass { .. }
        )
    }
}

/// Decides whether `claim` may join a group it newly matches, given every
/// group in its namespace.
pub fn check_exclusive(claim: &PersistentVolumeClaim, groups: &[VolumeGroup]) -> Result<(), Error> {
    let mut existing = Vec::new();
    let mut candidates = Vec::new();

    for group in groups {
        if group.lists(claim) {
            existing.push(group.name());
            continue;
        }
        if group.is_terminating() {
            continue;
        }
        match group.selects(claim) {
            Ok(true) => candidates.push(group.name()),
            Ok(false) => {}
            Err(e) => warn!("skipping volumeGroup {}: {}", group.name(), e),
        }
    }

    let claim = Referent::Claim(claim).key();
    if !existing.is_empty() && !candidates.is_empty() {
        return AlreadyInGroupSnafu {
            claim,
            candidates,
            existing,
        }
        .fail();
    }
    if candidates.len() > 1 {
        return MultipleNewGroupsSnafu { claim, candidates }.fail();
    }

    Ok(())
}

/// A claim accepted into the group together with its bound volume.
#[derive(Debug, Clone)]
pub struct Member {
    pub claim: PersistentVolumeClaim,
    pub volume_name: String,
    pub volume_id: String,
}

/// The outcome of matching a group against the claims of its namespace.
#[derive(Debug, Default)]
pub struct MembershipPlan {
    /// Sorted by claim name.
    pub members: Vec<Member>,
    /// Claims the group newly matches but may not take.
    pub rejected: Vec<(PersistentVolumeClaim, Error)>,
    /// Listed claims that no longer belong: unmatched or being deleted.
    pub departed: Vec<PersistentVolumeClaim>,
}

impl MembershipPlan {
    pub fn volume_ids(&self) -> Vec<String> {
        self.members.iter().map(|m| m.volume_id.clone()).collect()
    }

    pub fn claim_names(&self) -> Vec<String> {
        self.members.iter().map(|m| m.claim.name_any()).collect()
    }

    pub fn volume_names(&self) -> Vec<String> {
        self.members.iter().map(|m| m.volume_name.clone()).collect()
    }

    /// One line summarizing every rejection, for `status.error.message`.
    pub fn rejection_message(&self) -> Option<String> {
        if self.rejected.is_empty() {
            return None;
        }
        Some(
            self.rejected
                .iter()
                .map(|(_, e)| e.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Matches `group` against every claim in its namespace. `groups` is the
/// namespace's group snapshot and must include `group` itself.
pub async fn plan(
    cluster: &dyn Cluster,
    group: &VolumeGroup,
    groups: &[VolumeGroup],
) -> Result<MembershipPlan, Error> {
    let mut claims = cluster.list_claims(&group.namespace()?).await?;
    claims.sort_by_key(|claim| claim.name_any());

    let mut plan = MembershipPlan::default();
    for claim in claims {
        let listed = group.lists(&claim);

        if claim.metadata.deletion_timestamp.is_some() || !group.selects(&claim)? {
            if listed {
                debug!("{} leaves volumeGroup {}", Referent::Claim(&claim).key(), group.name());
                plan.departed.push(claim);
            }
            continue;
        }

        if !listed {
            if let Err(e) = check_exclusive(&claim, groups) {
                plan.rejected.push((claim, e));
                continue;
            }
            if let Some(e) = storage_class_guard(cluster, &claim).await? {
                plan.rejected.push((claim, e));
                continue;
            }
        }

        match bound_volume(cluster, &claim).await? {
            Some((volume_name, volume_id)) => plan.members.push(Member {
                claim,
                volume_name,
                volume_id,
            }),
            None => debug!(
                "{} is not bound to a persistentVolume yet",
                Referent::Claim(&claim).key()
            ),
        }
    }

    Ok(plan)
}

/// A rejection when the claim's StorageClass groups volumes by itself.
async fn storage_class_guard(
    cluster: &dyn Cluster,
    claim: &PersistentVolumeClaim,
) -> Result<Option<Error>, Error> {
    let Some(name) = claim
        .spec
        .as_ref()
        .and_then(|spec| spec.storage_class_name.as_deref())
        .filter(|name| !name.is_empty())
    else {
        return Ok(None);
    };

    let storage_class = match cluster.get_storage_class(name).await {
        Ok(storage_class) => storage_class,
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let grouped = storage_class
        .parameters
        .as_ref()
        .is_some_and(|parameters| parameters.contains_key(STORAGE_CLASS_GROUP_PARAMETER));

    Ok(grouped.then(|| Error::GroupedByStorageClass {
        claim: Referent::Claim(claim).key(),
        storage_class: name.to_owned(),
    }))
}

/// The PersistentVolume the claim is bound to, if any.
pub fn volume_name(claim: &PersistentVolumeClaim) -> Option<&str> {
    claim
        .spec
        .as_ref()
        .and_then(|spec| spec.volume_name.as_deref())
        .filter(|name| !name.is_empty())
}

/// Follows claim to PersistentVolume to CSI volume handle. `None` while the
/// claim is unbound.
pub async fn bound_volume(
    cluster: &dyn Cluster,
    claim: &PersistentVolumeClaim,
) -> Result<Option<(String, String)>, Error> {
    let Some(volume) = volume_name(claim) else {
        return Ok(None);
    };

    let pv = match cluster.get_persistent_volume(volume).await {
        Ok(pv) => pv,
        Err(e) if e.is_not_found() => {
            return PersistentVolumeNotFoundSnafu {
                claim: Referent::Claim(claim).key(),
                volume,
            }
            .fail();
        }
        Err(e) => return Err(e.into()),
    };

    let handle = pv
        .spec
        .as_ref()
        .and_then(|spec| spec.csi.as_ref())
        .map(|csi| csi.volume_handle.clone())
        .filter(|handle| !handle.is_empty());

    match handle {
        Some(handle) => Ok(Some((volume.to_owned(), handle))),
        None => NotCsiVolumeSnafu {
            claim: Referent::Claim(claim).key(),
            volume,
        }
        .fail(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tests::{FakeCluster, bound_claim, claim, csi_volume, group, with_members};

    #[test]
    fn test_new_claim_is_accepted() {
        let pvc = claim("pvc-a", &[("volumegroup", "vg-1")]);
        let groups = [group("vg-1", "class-1"), group("vg-2", "class-1")];

        assert!(check_exclusive(&pvc, &groups).is_ok());
    }

    #[test]
    fn test_claim_cannot_move_groups() {
        let pvc = claim("pvc-a", &[("volumegroup", "vg-2")]);
        let groups = [
            with_members(group("vg-1", "class-1"), &["pvc-a"]),
            group("vg-2", "class-1"),
        ];

        let err = check_exclusive(&pvc, &groups).unwrap_err();

        assert!(err.is_rejection());
        match err {
            Error::AlreadyInGroup {
                candidates,
                existing,
                ..
            } => {
                assert_eq!(candidates, vec!["vg-2".to_owned()]);
                assert_eq!(existing, vec!["vg-1".to_owned()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_listed_member_is_not_a_conflict() {
        let pvc = claim("pvc-a", &[("volumegroup", "vg-1")]);
        let groups = [with_members(group("vg-1", "class-1"), &["pvc-a"])];

        assert!(check_exclusive(&pvc, &groups).is_ok());
    }

    #[test]
    fn test_ambiguous_claim_is_rejected() {
        let pvc = claim("pvc-a", &[("tier", "db")]);
        let mut first = group("vg-1", "class-1");
        let mut second = group("vg-2", "class-1");
        for vg in [&mut first, &mut second] {
            vg.spec.source.selector = Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector {
                match_labels: Some([("tier".to_owned(), "db".to_owned())].into()),
                ..Default::default()
            });
        }

        let err = check_exclusive(&pvc, &[first, second]).unwrap_err();

        assert!(matches!(err, Error::MultipleNewGroups { ref candidates, .. } if candidates.len() == 2));
        assert!(err.to_string().contains("default/pvc-a"));
    }

    #[test]
    fn test_terminating_group_takes_no_new_claims() {
        let pvc = claim("pvc-a", &[("tier", "db")]);
        let selector = k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector {
            match_labels: Some([("tier".to_owned(), "db".to_owned())].into()),
            ..Default::default()
        };
        let mut live = group("vg-1", "class-1");
        live.spec.source.selector = Some(selector.clone());
        let mut gone = group("vg-2", "class-1");
        gone.spec.source.selector = Some(selector);
        gone.metadata.deletion_timestamp = Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(
            jiff::Timestamp::now(),
        ));

        assert!(check_exclusive(&pvc, &[live, gone]).is_ok());
    }

    #[tokio::test]
    async fn test_plan_skips_unbound_and_records_departures() {
        let cluster = FakeCluster::default();
        cluster.insert_volume(csi_volume("pv-a", "vol-a"));
        cluster.insert_claim(bound_claim("pvc-a", "vg-1", "pv-a"));
        cluster.insert_claim(claim("pvc-b", &[("volumegroup", "vg-1")]));
        cluster.insert_claim(claim("pvc-old", &[]));
        let vg = with_members(group("vg-1", "class-1"), &["pvc-old"]);

        let plan = plan(&cluster, &vg, std::slice::from_ref(&vg)).await.unwrap();

        assert_eq!(plan.claim_names(), vec!["pvc-a".to_owned()]);
        assert_eq!(plan.volume_ids(), vec!["vol-a".to_owned()]);
        assert_eq!(plan.volume_names(), vec!["pv-a".to_owned()]);
        assert_eq!(plan.departed.len(), 1);
        assert_eq!(plan.departed[0].name_any(), "pvc-old");
        assert!(plan.rejected.is_empty());
    }

    #[tokio::test]
    async fn test_plan_rejects_storage_class_grouping() {
        let cluster = FakeCluster::default();
        cluster.insert_volume(csi_volume("pv-a", "vol-a"));
        let mut pvc = bound_claim("pvc-a", "vg-1", "pv-a");
        pvc.spec.as_mut().unwrap().storage_class_name = Some("grouped".to_owned());
        cluster.insert_claim(pvc);
        cluster.insert_storage_class("grouped", &[(STORAGE_CLASS_GROUP_PARAMETER, "true")]);
        let vg = group("vg-1", "class-1");

        let plan = plan(&cluster, &vg, std::slice::from_ref(&vg)).await.unwrap();

        assert!(plan.members.is_empty());
        assert_eq!(plan.rejected.len(), 1);
        assert!(plan.rejection_message().unwrap().contains("grouped"));
    }

    #[tokio::test]
    async fn test_missing_or_foreign_volume_fails() {
        let cluster = FakeCluster::default();
        let pvc = bound_claim("pvc-a", "vg-1", "pv-a");

        let err = bound_volume(&cluster, &pvc).await.unwrap_err();
        assert!(matches!(err, Error::PersistentVolumeNotFound { .. }));

        let mut pv = csi_volume("pv-a", "vol-a");
        pv.spec.as_mut().unwrap().csi = None;
        cluster.insert_volume(pv);

        let err = bound_volume(&cluster, &pvc).await.unwrap_err();
        assert!(matches!(err, Error::NotCsiVolume { .. }));
        assert!(!err.is_rejection());
    }
}
