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

use super::finalizer::CONTENT_FINALIZER;
use super::parameters::SecretLocation;
use crate::context::{self, Cluster};
use crate::rpc::CreatedGroup;
use crate::types;
use crate::types::v1::reference::Referent;
use crate::types::v1::status::VolumeGroupContentStatus;
use crate::types::v1::volume_group_content::{VolumeGroupContentSource, VolumeGroupContentSpec};
use crate::types::v1::{VolumeGroup, VolumeGroupContent};
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use snafu::Snafu;
use tracing::info;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display(
        "volumeGroupContent '{}' is bound to volumeGroup uid {:?}, not {}",
        name,
        owner_uid,
        group_uid
    ))]
    ForeignContent {
        name: String,
        owner_uid: Option<String>,
        group_uid: String,
    },

    #[snafu(transparent)]
    Context { source: context::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },
}

/// The content bound to `group`, if one exists. Content created for a
/// different group under the same name is an error.
pub async fn lookup(
    cluster: &dyn Cluster,
    group: &VolumeGroup,
) -> Result<Option<VolumeGroupContent>, Error> {
    let name = group.content_name();
    let content = match cluster
        .get_volume_group_content(&name, &group.namespace()?)
        .await
    {
        Ok(content) => content,
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    bound_to(content, &group.uid()?).map(Some)
}

fn bound_to(content: VolumeGroupContent, group_uid: &str) -> Result<VolumeGroupContent, Error> {
    if content.owner_uid() != Some(group_uid) {
        return ForeignContentSnafu {
            name: Referent::Content(&content).meta().name.clone().unwrap_or_default(),
            owner_uid: content.owner_uid().map(str::to_owned),
            group_uid,
        }
        .fail();
    }

    Ok(content)
}

/// The content record for a group the driver just created.
pub fn build(
    group: &VolumeGroup,
    class_name: &str,
    driver: &str,
    created: &CreatedGroup,
    secret: &SecretLocation,
) -> Result<VolumeGroupContent, types::error::Error> {
    let volume_group_secret_ref = secret.both().map(|(name, namespace)| corev1::SecretReference {
        name: Some(name.to_owned()),
        namespace: Some(namespace.to_owned()),
    });

    Ok(VolumeGroupContent {
        metadata: metav1::ObjectMeta {
            name: Some(group.content_name()),
            namespace: Some(group.namespace()?),
            owner_references: Some(vec![Referent::Group(group).owner_ref()]),
            finalizers: Some(vec![CONTENT_FINALIZER.to_owned()]),
            ..Default::default()
        },
        spec: VolumeGroupContentSpec {
            volume_group_class_name: Some(class_name.to_owned()),
            volume_group_ref: Some(Referent::Group(group).object_ref()),
            source: Some(VolumeGroupContentSource {
                driver: driver.to_owned(),
                volume_group_handle: created.volume_group_id.clone(),
                volume_group_attributes: created.attributes.clone(),
            }),
            volume_group_secret_ref,
        },
        status: None,
    })
}

/// Creates the content. An existing one of the same name is read back
/// instead, so a repeated pass converges.
pub async fn create(
    cluster: &dyn Cluster,
    content: &VolumeGroupContent,
) -> Result<VolumeGroupContent, Error> {
    match cluster.create_volume_group_content(content).await {
        Ok(created) => {
            info!("created volumeGroupContent {}", Referent::Content(&created).key());
            Ok(created)
        }
        Err(e) if e.is_already_exists() => {
            let meta = Referent::Content(content).meta();
            let name = meta.name.clone().unwrap_or_default();
            let namespace = meta.namespace.clone().unwrap_or_default();
            let existing = cluster.get_volume_group_content(&name, &namespace).await?;
            bound_to(existing, content.owner_uid().unwrap_or_default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Content status for a ready group. The creation time is kept once set.
pub fn ready_status(content: &VolumeGroupContent, pv_list: Vec<String>) -> VolumeGroupContentStatus {
    let group_creation_time = content
        .status
        .as_ref()
        .and_then(|status| status.group_creation_time.clone())
        .unwrap_or_else(|| metav1::Time(jiff::Timestamp::now()));

    VolumeGroupContentStatus {
        group_creation_time: Some(group_creation_time),
        ready: Some(true),
        pv_list,
    }
}

/// Writes `status` when it differs from the stored one.
pub async fn sync_status(
    cluster: &dyn Cluster,
    content: VolumeGroupContent,
    status: VolumeGroupContentStatus,
) -> Result<VolumeGroupContent, Error> {
    if content.status.as_ref() == Some(&status) {
        return Ok(content);
    }

    let mut updated = content;
    updated.status = Some(status);
    Ok(cluster.replace_volume_group_content_status(&updated).await?)
}

/// Removes the content's finalizer and deletes it. Content that is already
/// gone is fine.
pub async fn delete(cluster: &dyn Cluster, content: &VolumeGroupContent) -> Result<(), Error> {
    super::finalizer::release_content(cluster, content).await?;

    let meta = Referent::Content(content).meta();
    let name = meta.name.clone().unwrap_or_default();
    let namespace = meta.namespace.clone().unwrap_or_default();
    match cluster.delete_volume_group_content(&name, &namespace).await {
        Ok(()) => {
            info!("deleted volumeGroupContent {}/{}", namespace, name);
            Ok(())
        }
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::reconcile::finalizer;
    use crate::tests::{FakeCluster, group};
    use std::collections::BTreeMap;

    fn created() -> CreatedGroup {
        CreatedGroup {
            volume_group_id: "handle-1".to_owned(),
            attributes: BTreeMap::from([("pool".to_owned(), "gold".to_owned())]),
        }
    }

    #[test]
    fn test_build_links_content_to_group() {
        let vg = group("vg-1", "class-1");
        let secret = SecretLocation {
            name: Some("creds".to_owned()),
            namespace: Some("storage".to_owned()),
        };

        let content = build(&vg, "class-1", "driver.example.com", &created(), &secret).unwrap();

        assert_eq!(content.metadata.name.as_deref(), Some("vg-1-content"));
        assert_eq!(content.metadata.namespace.as_deref(), Some("default"));
        assert!(finalizer::has(&content.metadata, CONTENT_FINALIZER));
        assert_eq!(content.owner_uid(), Some("uid-vg-1"));
        assert_eq!(content.handle(), Some("handle-1"));
        assert_eq!(
            content.metadata.owner_references.as_ref().unwrap()[0].uid,
            "uid-vg-1"
        );
        let secret_ref = content.spec.volume_group_secret_ref.unwrap();
        assert_eq!(secret_ref.name.as_deref(), Some("creds"));
        assert_eq!(secret_ref.namespace.as_deref(), Some("storage"));
    }

    #[tokio::test]
    async fn test_create_tolerates_existing_content() {
        let cluster = FakeCluster::default();
        let vg = group("vg-1", "class-1");
        let content = build(&vg, "class-1", "driver.example.com", &created(), &Default::default()).unwrap();

        let first = create(&cluster, &content).await.unwrap();
        let second = create(&cluster, &content).await.unwrap();

        assert_eq!(first.metadata.uid, second.metadata.uid);
    }

    #[tokio::test]
    async fn test_create_refuses_existing_content_of_other_group() {
        let cluster = FakeCluster::default();
        let vg = group("vg-1", "class-1");
        let content = build(&vg, "class-1", "driver.example.com", &created(), &Default::default()).unwrap();
        create(&cluster, &content).await.unwrap();

        let mut recreated = vg.clone();
        recreated.metadata.uid = Some("uid-other".to_owned());
        let desired = build(&recreated, "class-1", "driver.example.com", &created(), &Default::default()).unwrap();
        let err = create(&cluster, &desired).await.unwrap_err();

        match err {
            Error::ForeignContent { name, owner_uid, group_uid } => {
                assert_eq!(name, "vg-1-content");
                assert_eq!(owner_uid.as_deref(), Some("uid-vg-1"));
                assert_eq!(group_uid, "uid-other");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_lookup_rejects_foreign_content() {
        let cluster = FakeCluster::default();
        let vg = group("vg-1", "class-1");
        let content = build(&vg, "class-1", "driver.example.com", &created(), &Default::default()).unwrap();
        create(&cluster, &content).await.unwrap();

        assert!(lookup(&cluster, &vg).await.unwrap().is_some());

        let mut recreated = vg.clone();
        recreated.metadata.uid = Some("uid-other".to_owned());
        let err = lookup(&cluster, &recreated).await.unwrap_err();
        assert!(matches!(err, Error::ForeignContent { .. }));
    }

    #[test]
    fn test_ready_status_keeps_creation_time() {
        let vg = group("vg-1", "class-1");
        let mut content = build(&vg, "class-1", "driver.example.com", &created(), &Default::default()).unwrap();
        let first = ready_status(&content, vec!["pv-a".to_owned()]);
        content.status = Some(first.clone());

        let second = ready_status(&content, vec!["pv-a".to_owned(), "pv-b".to_owned()]);

        assert_eq!(second.group_creation_time, first.group_creation_time);
        assert_eq!(second.pv_list.len(), 2);
        assert_eq!(second.ready, Some(true));
    }
}
