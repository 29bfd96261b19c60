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

use crate::config::DriverConfig;
use crate::rpc::VolumeGroupRpc;
use crate::types;
use crate::types::v1::{VolumeGroup, VolumeGroupClass, VolumeGroupContent};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    ObjectReference, PersistentVolume, PersistentVolumeClaim, Secret,
};
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Resource, ResourceExt, api::Api};
use serde::Serialize;
use serde::de::DeserializeOwned;
use snafu::Snafu;
use snafu::futures::TryFutureExt;
use std::fmt::Debug;
use std::sync::Arc;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("{} '{}' not found", kind, name))]
    NotFound { kind: String, name: String },

    #[snafu(display("{} '{}' already exists", kind, name))]
    AlreadyExists { kind: String, name: String },

    #[snafu(display(
        "conflict writing {} '{}': the object has been modified, the pass will be retried",
        kind,
        name
    ))]
    Conflict { kind: String, name: String },

    #[snafu(display("Kubernetes API error: {}", source))]
    Kube { source: kube::Error },

    #[snafu(display("record event error: {}", source))]
    Record { source: kube::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    /// Sorts an API error into the cases callers branch on.
    fn classify<K: Resource<DynamicType = ()>>(
        name: &str,
    ) -> impl FnOnce(kube::Error) -> Error + use<K> {
        let kind = K::kind(&()).to_string();
        let name = name.to_owned();

        move |source| {
            let (code, reason) = match &source {
                kube::Error::Api(response) => (response.code, response.reason.clone()),
                _ => (0, String::new()),
            };

            match code {
                404 => Error::NotFound { kind, name },
                409 if reason == "AlreadyExists" => Error::AlreadyExists { kind, name },
                409 => Error::Conflict { kind, name },
                _ => Error::Kube { source },
            }
        }
    }
}

/// Every read and write the reconciler performs against the cluster. Writes
/// carry the object's resourceVersion, so a stale object fails with
/// [`Error::Conflict`].
#[async_trait]
pub trait Cluster: Send + Sync {
    async fn get_volume_group(&self, name: &str, namespace: &str) -> Result<VolumeGroup, Error>;

    async fn list_volume_groups(&self, namespace: &str) -> Result<Vec<VolumeGroup>, Error>;

    async fn replace_volume_group(&self, group: &VolumeGroup) -> Result<VolumeGroup, Error>;

    async fn replace_volume_group_status(&self, group: &VolumeGroup) -> Result<VolumeGroup, Error>;

    async fn get_volume_group_class(&self, name: &str) -> Result<VolumeGroupClass, Error>;

    async fn get_volume_group_content(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<VolumeGroupContent, Error>;

    async fn create_volume_group_content(
        &self,
        content: &VolumeGroupContent,
    ) -> Result<VolumeGroupContent, Error>;

    async fn replace_volume_group_content(
        &self,
        content: &VolumeGroupContent,
    ) -> Result<VolumeGroupContent, Error>;

    async fn replace_volume_group_content_status(
        &self,
        content: &VolumeGroupContent,
    ) -> Result<VolumeGroupContent, Error>;

    async fn delete_volume_group_content(&self, name: &str, namespace: &str) -> Result<(), Error>;

    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Secret, Error>;

    async fn list_claims(&self, namespace: &str) -> Result<Vec<PersistentVolumeClaim>, Error>;

    async fn replace_claim(&self, claim: &PersistentVolumeClaim) -> Result<PersistentVolumeClaim, Error>;

    async fn get_persistent_volume(&self, name: &str) -> Result<PersistentVolume, Error>;

    async fn get_storage_class(&self, name: &str) -> Result<StorageClass, Error>;

    /// send event
    async fn record(
        &self,
        reference: &ObjectReference,
        event_type: EventType,
        reason: &str,
        message: &str,
    ) -> Result<(), Error>;
}

/// [`Cluster`] backed by the Kubernetes API.
pub struct KubeCluster {
    pub(crate) client: kube::Client,
    pub(crate) recorder: Recorder,
}

impl KubeCluster {
    pub fn new(client: kube::Client) -> Self {
        let reporter = Reporter {
            controller: "volume-group-operator".into(),
            instance: std::env::var("HOSTNAME").ok(),
        };

        let recorder = Recorder::new(client.clone(), reporter);
        Self { client, recorder }
    }

    async fn get<T>(&self, name: &str, namespace: &str) -> Result<T, Error>
    where
        T: Clone + DeserializeOwned + Debug + Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        let api: Api<T> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).await.map_err(Error::classify::<T>(name))
    }

    async fn get_cluster_scoped<T>(&self, name: &str) -> Result<T, Error>
    where
        T: Clone + DeserializeOwned + Debug + Resource<Scope = ClusterResourceScope, DynamicType = ()>,
    {
        let api: Api<T> = Api::all(self.client.clone());
        api.get(name).await.map_err(Error::classify::<T>(name))
    }

    async fn list<T>(&self, namespace: &str) -> Result<Vec<T>, Error>
    where
        T: Clone + DeserializeOwned + Debug + Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        let api: Api<T> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(Error::classify::<T>(namespace))?;
        Ok(list.items)
    }

    async fn create<T>(&self, resource: &T) -> Result<T, Error>
    where
        T: Clone + Serialize + DeserializeOwned + Debug + Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        let namespace = resource.namespace().ok_or(types::error::Error::NoNamespace)?;
        let api: Api<T> = Api::namespaced(self.client.clone(), &namespace);
        api.create(&PostParams::default(), resource)
            .await
            .map_err(Error::classify::<T>(&resource.name_any()))
    }

    async fn replace<T>(&self, resource: &T) -> Result<T, Error>
    where
        T: Clone + Serialize + DeserializeOwned + Debug + Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        let namespace = resource.namespace().ok_or(types::error::Error::NoNamespace)?;
        let name = resource.name_any();
        let api: Api<T> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&name, &PostParams::default(), resource)
            .await
            .map_err(Error::classify::<T>(&name))
    }

    async fn replace_status<T>(&self, resource: &T) -> Result<T, Error>
    where
        T: Clone + Serialize + DeserializeOwned + Debug + Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        let namespace = resource.namespace().ok_or(types::error::Error::NoNamespace)?;
        let name = resource.name_any();
        let api: Api<T> = Api::namespaced(self.client.clone(), &namespace);
        api.replace_status(&name, &PostParams::default(), resource)
            .await
            .map_err(Error::classify::<T>(&name))
    }

    async fn delete<T>(&self, name: &str, namespace: &str) -> Result<(), Error>
    where
        T: Clone + DeserializeOwned + Debug + Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        let api: Api<T> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default())
            .await
            .map_err(Error::classify::<T>(name))?;
        Ok(())
    }
}

#[async_trait]
impl Cluster for KubeCluster {
    async fn get_volume_group(&self, name: &str, namespace: &str) -> Result<VolumeGroup, Error> {
        self.get(name, namespace).await
    }

    async fn list_volume_groups(&self, namespace: &str) -> Result<Vec<VolumeGroup>, Error> {
        self.list(namespace).await
    }

    async fn replace_volume_group(&self, group: &VolumeGroup) -> Result<VolumeGroup, Error> {
        self.replace(group).await
    }

    async fn replace_volume_group_status(&self, group: &VolumeGroup) -> Result<VolumeGroup, Error> {
        self.replace_status(group).await
    }

    async fn get_volume_group_class(&self, name: &str) -> Result<VolumeGroupClass, Error> {
        self.get_cluster_scoped(name).await
    }

    async fn get_volume_group_content(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<VolumeGroupContent, Error> {
        self.get(name, namespace).await
    }

    async fn create_volume_group_content(
        &self,
        content: &VolumeGroupContent,
    ) -> Result<VolumeGroupContent, Error> {
        self.create(content).await
    }

    async fn replace_volume_group_content(
        &self,
        content: &VolumeGroupContent,
    ) -> Result<VolumeGroupContent, Error> {
        self.replace(content).await
    }

    async fn replace_volume_group_content_status(
        &self,
        content: &VolumeGroupContent,
    ) -> Result<VolumeGroupContent, Error> {
        self.replace_status(content).await
    }

    async fn delete_volume_group_content(&self, name: &str, namespace: &str) -> Result<(), Error> {
        self.delete::<VolumeGroupContent>(name, namespace).await
    }

    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Secret, Error> {
        self.get(name, namespace).await
    }

    async fn list_claims(&self, namespace: &str) -> Result<Vec<PersistentVolumeClaim>, Error> {
        self.list(namespace).await
    }

    async fn replace_claim(&self, claim: &PersistentVolumeClaim) -> Result<PersistentVolumeClaim, Error> {
        self.replace(claim).await
    }

    async fn get_persistent_volume(&self, name: &str) -> Result<PersistentVolume, Error> {
        self.get_cluster_scoped(name).await
    }

    async fn get_storage_class(&self, name: &str) -> Result<StorageClass, Error> {
        self.get_cluster_scoped(name).await
    }

    async fn record(
        &self,
        reference: &ObjectReference,
        event_type: EventType,
        reason: &str,
        message: &str,
    ) -> Result<(), Error> {
        self.recorder
            .publish(
                &Event {
                    type_: event_type,
                    reason: reason.to_owned(),
                    note: Some(message.into()),
                    action: "Reconcile".into(),
                    secondary: None,
                },
                reference,
            )
            .context(RecordSnafu)
            .await
    }
}

/// Shared state handed to every reconcile worker.
pub struct Context {
    pub(crate) cluster: Arc<dyn Cluster>,
    pub(crate) driver: Arc<dyn VolumeGroupRpc>,
    pub(crate) config: DriverConfig,
}

impl Context {
    pub fn new(cluster: Arc<dyn Cluster>, driver: Arc<dyn VolumeGroupRpc>, config: DriverConfig) -> Self {
        Self {
            cluster,
            driver,
            config,
        }
    }

    /// Name of the driver this operator instance serves.
    pub fn driver_name(&self) -> &str {
        &self.config.driver_name
    }
}
