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

use crate::context::{Context, KubeCluster};
use crate::health::Readiness;
use crate::reconcile::watcher::groups_for_claim;
use crate::reconcile::{error_policy, reconcile_volume_group};
use crate::rpc::GrpcDriver;
use crate::types::v1::{VolumeGroup, VolumeGroupClass, VolumeGroupContent};
use futures::StreamExt;
use k8s_openapi::api::core::v1 as corev1;
use kube::CustomResourceExt;
use kube::runtime::{Controller, controller, watcher};
use kube::{Api, Client};
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod context;
pub mod health;
pub mod reconcile;
pub mod rpc;
pub mod types;


shadow_rs::shadow!(build);

pub use config::DriverConfig;

pub async fn run(mut config: DriverConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    info!(
        "volume-group-operator {} (commit {}, built {})",
        build::PKG_VERSION,
        build::SHORT_COMMIT,
        build::BUILD_TIME
    );
    config.validate()?;

    // Errs only when a provider is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let driver = GrpcDriver::connect(&config.csi_address, config.rpc_timeout()).await?;
    driver.wait_until_ready().await?;
    if config.driver_name.is_empty() {
        config.driver_name = driver.plugin_name().await?;
    }
    info!("serving volume groups of driver {}", config.driver_name);

    let readiness = Readiness::default();
    let health = tokio::spawn(health::serve(config.health_address, readiness.clone()));

    let client = Client::try_default().await?;
    let cluster = Arc::new(KubeCluster::new(client.clone()));
    let context = Context::new(cluster, Arc::new(driver), config.clone());

    let controller = Controller::new(
        Api::<VolumeGroup>::all(client.clone()),
        watcher::Config::default(),
    )
    .with_config(controller::Config::default().concurrency(config.concurrency));
    let groups = controller.store();

    readiness.set_ready();
    controller
        .owns(
            Api::<VolumeGroupContent>::all(client.clone()),
            watcher::Config::default(),
        )
        .watches(
            Api::<corev1::PersistentVolumeClaim>::all(client.clone()),
            watcher::Config::default(),
            move |claim| groups_for_claim(&groups.state(), &claim),
        )
        .run(reconcile_volume_group, error_policy, Arc::new(context))
        .for_each(|res| async move {
            match res {
                Ok((group, _)) => info!("reconciled volumeGroup {}", group),
                Err(e) => warn!("reconcile failed: {}", e),
            }
        })
        .await;

    health.abort();
    Ok(())
}

/// Writes the CustomResourceDefinitions as one multi-document YAML stream.
pub async fn crd(file: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer: Pin<Box<dyn AsyncWrite + Send>> = if let Some(file) = file {
        Box::pin(
            tokio::fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(file)
                .await?,
        )
    } else {
        Box::pin(tokio::io::stdout())
    };

    let documents = [
        serde_yaml_ng::to_string(&VolumeGroupClass::crd())?,
        serde_yaml_ng::to_string(&VolumeGroup::crd())?,
        serde_yaml_ng::to_string(&VolumeGroupContent::crd())?,
    ];
    writer
        .write_all(documents.join("---\n").as_bytes())
        .await?;
    writer.flush().await?;

    Ok(())
}
