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

//! One reconcile pass over a VolumeGroup.
//!
//! The pass re-derives everything from the cluster: class, parameters,
//! credentials, members and content. Status is computed fresh and only
//! written when it differs from what was read. Every driver call is
//! preceded by the finalizers that record the cleanup it creates.

pub mod content;
pub mod finalizer;
pub mod membership;
pub mod parameters;
pub mod secret;
pub mod watcher;

use crate::context::{Cluster, Context};
use crate::types::v1::VolumeGroup;
use crate::types::v1::VolumeGroupClass;
use crate::types::v1::reference::Referent;
use crate::types::v1::status::{Reason, VolumeGroupError, VolumeGroupStatus};
use crate::{context, rpc, types};
use finalizer::GROUP_FINALIZER;
use kube::ResourceExt;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use parameters::ClassParameters;
use snafu::{OptionExt, ResultExt, Snafu};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("volumeGroup '{}' has no volumeGroupClassName", name))]
    MissingClassName { name: String },

    #[snafu(display("volumeGroupClass '{}' not found", name))]
    ClassNotFound { name: String },

    #[snafu(display("invalid parameters in volumeGroupClass '{}': {}", class, source))]
    Parameters {
        class: String,
        source: parameters::Error,
    },

    #[snafu(display("volumeGroupContent '{}' has no volume group handle", name))]
    MissingHandle { name: String },

    #[snafu(display("{}", message))]
    ClaimsRejected { message: String },

    #[snafu(transparent)]
    Secret { source: secret::Error },

    #[snafu(transparent)]
    Membership { source: membership::Error },

    #[snafu(transparent)]
    Content { source: content::Error },

    #[snafu(transparent)]
    Driver { source: rpc::Error },

    #[snafu(transparent)]
    Context { source: context::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },
}

impl Error {
    /// Errors that persist until a user fixes an object.
    pub fn is_configuration(&self) -> bool {
        match self {
            Error::MissingClassName { .. }
            | Error::ClassNotFound { .. }
            | Error::Parameters { .. }
            | Error::MissingHandle { .. }
            | Error::ClaimsRejected { .. }
            | Error::Types { .. } => true,
            Error::Secret { source } => !matches!(source, secret::Error::GetSecret { .. }),
            Error::Content { source } => {
                matches!(source, content::Error::ForeignContent { .. })
            }
            Error::Membership { source } => matches!(
                source,
                membership::Error::PersistentVolumeNotFound { .. }
                    | membership::Error::NotCsiVolume { .. }
            ),
            Error::Driver { .. } | Error::Context { .. } => false,
        }
    }

    /// Text for `status.error.message`.
    pub fn status_message(&self) -> String {
        match self {
            Error::Driver { source } => source.message(),
            e => e.to_string(),
        }
    }
}

pub async fn reconcile_volume_group(
    group: Arc<VolumeGroup>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let ns = group.namespace()?;
    let cluster = ctx.cluster.as_ref();

    let group = match cluster.get_volume_group(&group.name(), &ns).await {
        Ok(group) => group,
        Err(e) if e.is_not_found() => {
            debug!("volumeGroup {}/{} is gone", ns, group.name());
            return Ok(Action::await_change());
        }
        Err(e) => return Err(e.into()),
    };

    let class = match resolve_class(cluster, &group).await {
        Ok(class) => class,
        Err(e) => return Err(fail(&ctx, &group, Reason::ClassResolutionFailed, e, None).await),
    };
    if class.spec.driver != ctx.driver_name() {
        debug!(
            "volumeGroup {}/{} uses driver {}, skipping",
            ns,
            group.name(),
            class.spec.driver
        );
        return Ok(Action::await_change());
    }

    let class_name = class.name_any();
    let parameters = match ClassParameters::resolve(&class.spec.parameters).context(
        ParametersSnafu {
            class: class_name.as_str(),
        },
    ) {
        Ok(parameters) => parameters,
        Err(e) => return Err(fail(&ctx, &group, Reason::InvalidParameters, e, None).await),
    };

    let secrets = match secret::resolve(cluster, &parameters.secret).await {
        Ok(secrets) => secrets,
        Err(e) => {
            return Err(fail(&ctx, &group, Reason::SecretResolutionFailed, e.into(), None).await);
        }
    };

    if group.is_terminating() {
        return finalize(&ctx, group, &secrets).await;
    }

    let group = finalizer::ensure_on_group(cluster, group).await?;
    sync(&ctx, group, &class_name, &class.spec.driver, &parameters, &secrets).await
}

async fn resolve_class(cluster: &dyn Cluster, group: &VolumeGroup) -> Result<VolumeGroupClass, Error> {
    let name = group
        .class_name()
        .context(MissingClassNameSnafu { name: group.name() })?;

    match cluster.get_volume_group_class(name).await {
        Ok(class) => Ok(class),
        Err(e) if e.is_not_found() => ClassNotFoundSnafu { name }.fail(),
        Err(e) => Err(e.into()),
    }
}

/// Brings driver membership, content and status in line with the claims the
/// group selects.
async fn sync(
    ctx: &Context,
    mut group: VolumeGroup,
    class_name: &str,
    driver: &str,
    parameters: &ClassParameters,
    secrets: &BTreeMap<String, String>,
) -> Result<Action, Error> {
    let cluster = ctx.cluster.as_ref();
    let ns = group.namespace()?;

    let groups = cluster.list_volume_groups(&ns).await?;
    let plan = match membership::plan(cluster, &group, &groups).await {
        Ok(plan) => plan,
        Err(e) => {
            let reason = Reason::MembershipResolutionFailed;
            return Err(fail(ctx, &group, reason, e.into(), None).await);
        }
    };

    for (claim, e) in &plan.rejected {
        warn!("volumeGroup {}/{}: {}", ns, group.name(), e);
        let message = e.to_string();
        record(
            ctx,
            Referent::Claim(claim),
            EventType::Warning,
            Reason::MembershipRejected,
            &message,
        )
        .await;
    }

    for member in &plan.members {
        finalizer::ensure_on_claim(cluster, &member.claim).await?;
    }
    let volume_ids = plan.volume_ids();

    let (content, created) = match content::lookup(cluster, &group).await? {
        Some(content) => (content, false),
        None => {
            let name = group.driver_group_name()?;
            let realized = match ctx
                .driver
                .create_volume_group(&name, secrets, &parameters.driver)
                .await
            {
                Ok(realized) => realized,
                Err(e) => {
                    return Err(
                        fail(ctx, &group, Reason::CreateVolumeGroupFailed, e.into(), Some(false)).await,
                    );
                }
            };

            let desired = content::build(&group, class_name, driver, &realized, &parameters.secret)?;
            (content::create(cluster, &desired).await?, true)
        }
    };

    let content_name = content.name_any();
    let handle = content
        .handle()
        .context(MissingHandleSnafu {
            name: content_name.as_str(),
        })?
        .to_owned();

    if group.spec.source.volume_group_content_name.as_deref() != Some(content_name.as_str()) {
        let mut updated = group.clone();
        updated.spec.source.volume_group_content_name = Some(content_name.clone());
        group = cluster.replace_volume_group(&updated).await?;
    }

    // A fresh group has no members to add.
    if !created || !volume_ids.is_empty() {
        if let Err(e) = ctx
            .driver
            .modify_volume_group_membership(&handle, &volume_ids, secrets)
            .await
        {
            return Err(fail(ctx, &group, Reason::ModifyVolumeGroupFailed, e.into(), Some(false)).await);
        }
    }

    let content_status = content::ready_status(&content, plan.volume_names());
    let content = content::sync_status(cluster, content, content_status).await?;

    let status = VolumeGroupStatus {
        bound_volume_group_content_name: Some(content_name.clone()),
        group_creation_time: content
            .status
            .as_ref()
            .and_then(|status| status.group_creation_time.clone()),
        ready: Some(true),
        error: plan.rejection_message().map(|message| VolumeGroupError {
            message: Some(message),
        }),
        pvc_list: plan.claim_names(),
    };
    let members_changed = group.members() != status.pvc_list.as_slice();

    if group.status.as_ref() != Some(&status) {
        let mut updated = group.clone();
        updated.status = Some(status.clone());
        group = cluster.replace_volume_group_status(&updated).await?;
    }

    // Departed claims leave pvcList before their finalizer goes, so a group
    // woken by the claim write no longer sees them as taken.
    let others: Vec<VolumeGroup> = groups
        .into_iter()
        .filter(|other| other.name() != group.name())
        .collect();
    for claim in &plan.departed {
        finalizer::release_claim(cluster, claim, &others).await?;
    }

    if created {
        info!("volumeGroup {}/{} created as {}", ns, group.name(), handle);
        record(
            ctx,
            Referent::Group(&group),
            EventType::Normal,
            Reason::VolumeGroupCreated,
            &format!("created volume group {} with content {}", handle, content_name),
        )
        .await;
    }
    if members_changed {
        record(
            ctx,
            Referent::Group(&group),
            EventType::Normal,
            Reason::MembershipChanged,
            &format!("members: [{}]", status.pvc_list.join(", ")),
        )
        .await;
    }

    match plan.rejection_message() {
        Some(message) => ClaimsRejectedSnafu { message }.fail(),
        None => Ok(Action::await_change()),
    }
}

/// Deletes the driver group, then releases claims, content and the group,
/// in that order.
async fn finalize(
    ctx: &Context,
    group: VolumeGroup,
    secrets: &BTreeMap<String, String>,
) -> Result<Action, Error> {
    if !finalizer::has(&group.metadata, GROUP_FINALIZER) {
        return Ok(Action::await_change());
    }

    let cluster = ctx.cluster.as_ref();
    let ns = group.namespace()?;

    let content = match content::lookup(cluster, &group).await {
        Ok(content) => content,
        Err(e) => {
            return Err(fail(ctx, &group, Reason::DeleteVolumeGroupFailed, e.into(), None).await);
        }
    };

    if let Some(handle) = content.as_ref().and_then(|content| content.handle()) {
        match ctx.driver.delete_volume_group(handle, secrets).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                info!("volume group {} is already gone from the driver", handle)
            }
            Err(e) => {
                return Err(
                    fail(ctx, &group, Reason::DeleteVolumeGroupFailed, e.into(), Some(false)).await,
                );
            }
        }
    }

    // Content pvList still names the members after pvcList was cleared by an
    // interrupted pass.
    let member_volumes = content
        .as_ref()
        .and_then(|content| content.status.as_ref())
        .map(|status| status.pv_list.clone())
        .unwrap_or_default();
    let released: Vec<_> = cluster
        .list_claims(&ns)
        .await?
        .into_iter()
        .filter(|claim| {
            group.lists(claim)
                || group.selects(claim).unwrap_or(false)
                || membership::volume_name(claim)
                    .is_some_and(|pv| member_volumes.iter().any(|v| v == pv))
        })
        .collect();

    let group = forget_members(cluster, group).await?;
    let others: Vec<VolumeGroup> = cluster
        .list_volume_groups(&ns)
        .await?
        .into_iter()
        .filter(|other| other.name() != group.name())
        .collect();
    for claim in &released {
        finalizer::release_claim(cluster, claim, &others).await?;
    }

    if let Some(content) = &content {
        content::delete(cluster, content).await?;
    }

    finalizer::release_group(cluster, &group).await?;
    info!("volumeGroup {}/{} finalized", ns, group.name());
    Ok(Action::await_change())
}

/// Empties `status.pvcList` of a terminating group so other groups may take
/// its claims.
async fn forget_members(cluster: &dyn Cluster, group: VolumeGroup) -> Result<VolumeGroup, Error> {
    if group.members().is_empty() {
        return Ok(group);
    }

    let mut updated = group;
    if let Some(status) = updated.status.as_mut() {
        status.pvc_list.clear();
    }
    Ok(cluster.replace_volume_group_status(&updated).await?)
}

/// Records a failed pass on the group and hands the error back.
async fn fail(
    ctx: &Context,
    group: &VolumeGroup,
    reason: Reason,
    error: Error,
    ready: Option<bool>,
) -> Error {
    let message = error.status_message();
    warn!("volumeGroup {}: {}: {}", Referent::Group(group).key(), reason, message);

    let status = VolumeGroupStatus::failed(group.status.as_ref(), message.clone(), ready);
    if group.status.as_ref() != Some(&status) {
        let mut updated = group.clone();
        updated.status = Some(status);
        if let Err(e) = ctx.cluster.replace_volume_group_status(&updated).await {
            warn!("failed to update status of volumeGroup {}: {}", Referent::Group(group).key(), e);
        }
    }

    record(ctx, Referent::Group(group), EventType::Warning, reason, &message).await;
    error
}

async fn record(
    ctx: &Context,
    referent: Referent<'_>,
    event_type: EventType,
    reason: Reason,
    message: &str,
) {
    if let Err(e) = ctx
        .cluster
        .record(&referent.object_ref(), event_type, &reason.to_string(), message)
        .await
    {
        warn!("failed to record {} event on {}: {}", reason, referent.key(), e);
    }
}

pub fn error_policy(group: Arc<VolumeGroup>, error: &Error, _ctx: Arc<Context>) -> Action {
    match error {
        Error::ClaimsRejected { .. } => {
            info!("volumeGroup {:?} waits for a label change: {}", group.metadata.name, error);
            Action::requeue(Duration::from_secs(300))
        }
        e if e.is_configuration() => {
            error!("error_policy: {:?}", error);
            Action::requeue(Duration::from_secs(30))
        }
        _ => {
            error!("error_policy: {:?}", error);
            Action::requeue(Duration::from_secs(5))
        }
    }
}
