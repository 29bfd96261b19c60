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

//! Protection markers that order deletion: a group outlives its content and
//! the release of its member claims.

use crate::context::{self, Cluster};
use crate::types::v1::reference::Referent;
use crate::types::v1::{GROUP_DOMAIN, GROUP_DOMAIN_PREFIX, VolumeGroup, VolumeGroupContent};
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use tracing::info;

pub const GROUP_FINALIZER: &str = GROUP_DOMAIN;
pub const CONTENT_FINALIZER: &str = const_str::concat!(GROUP_DOMAIN_PREFIX, "vgc-protection");
pub const CLAIM_FINALIZER: &str = const_str::concat!(GROUP_DOMAIN_PREFIX, "pvc-protection");

pub fn has(meta: &metav1::ObjectMeta, finalizer: &str) -> bool {
    meta.finalizers
        .as_ref()
        .is_some_and(|finalizers| finalizers.iter().any(|f| f == finalizer))
}

/// Returns whether the finalizer was added.
pub fn add(meta: &mut metav1::ObjectMeta, finalizer: &str) -> bool {
    if has(meta, finalizer) {
        return false;
    }
    meta.finalizers
        .get_or_insert_with(Vec::new)
        .push(finalizer.to_owned());
    true
}

/// Returns whether the finalizer was removed.
pub fn remove(meta: &mut metav1::ObjectMeta, finalizer: &str) -> bool {
    if !has(meta, finalizer) {
        return false;
    }
    if let Some(finalizers) = meta.finalizers.as_mut() {
        finalizers.retain(|f| f != finalizer);
    }
    true
}

/// Adds the group finalizer, returning the stored group.
pub async fn ensure_on_group(
    cluster: &dyn Cluster,
    group: VolumeGroup,
) -> Result<VolumeGroup, context::Error> {
    let mut updated = group.clone();
    if !add(&mut updated.metadata, GROUP_FINALIZER) {
        return Ok(group);
    }

    info!("adding finalizer {} to volumeGroup {}", GROUP_FINALIZER, Referent::Group(&group).key());
    cluster.replace_volume_group(&updated).await
}

pub async fn release_group(cluster: &dyn Cluster, group: &VolumeGroup) -> Result<(), context::Error> {
    let mut updated = group.clone();
    if !remove(&mut updated.metadata, GROUP_FINALIZER) {
        return Ok(());
    }

    info!("removing finalizer {} from volumeGroup {}", GROUP_FINALIZER, Referent::Group(group).key());
    cluster.replace_volume_group(&updated).await?;
    Ok(())
}

pub async fn release_content(
    cluster: &dyn Cluster,
    content: &VolumeGroupContent,
) -> Result<(), context::Error> {
    let mut updated = content.clone();
    if !remove(&mut updated.metadata, CONTENT_FINALIZER) {
        return Ok(());
    }

    info!(
        "removing finalizer {} from volumeGroupContent {}",
        CONTENT_FINALIZER,
        Referent::Content(content).key()
    );
    cluster.replace_volume_group_content(&updated).await?;
    Ok(())
}

/// Adds the claim finalizer with a conditional write. A conflict means the
/// claim changed since it was matched; the next pass matches it again.
pub async fn ensure_on_claim(
    cluster: &dyn Cluster,
    claim: &PersistentVolumeClaim,
) -> Result<(), context::Error> {
    let mut updated = claim.clone();
    if !add(&mut updated.metadata, CLAIM_FINALIZER) {
        return Ok(());
    }

    info!("adding finalizer {} to {}", CLAIM_FINALIZER, Referent::Claim(claim).key());
    cluster.replace_claim(&updated).await?;
    Ok(())
}

/// Removes the claim finalizer unless one of `others` still lists the claim.
pub async fn release_claim(
    cluster: &dyn Cluster,
    claim: &PersistentVolumeClaim,
    others: &[VolumeGroup],
) -> Result<(), context::Error> {
    if others.iter().any(|group| group.lists(claim)) {
        return Ok(());
    }

    let mut updated = claim.clone();
    if !remove(&mut updated.metadata, CLAIM_FINALIZER) {
        return Ok(());
    }

    info!("removing finalizer {} from {}", CLAIM_FINALIZER, Referent::Claim(claim).key());
    cluster.replace_claim(&updated).await?;
    Ok(())
}
