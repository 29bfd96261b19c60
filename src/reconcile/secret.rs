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

use super::parameters::SecretLocation;
use crate::context::{self, Cluster};
use snafu::Snafu;
use std::collections::BTreeMap;
use tracing::{error, warn};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("secret '{}/{}' not found", namespace, name))]
    SecretNotFound { name: String, namespace: String },

    #[snafu(display("error getting secret '{}/{}': {}", namespace, name, source))]
    GetSecret {
        name: String,
        namespace: String,
        source: context::Error,
    },

    #[snafu(display("secret '{}/{}' key '{}' is not valid UTF-8", namespace, name, key))]
    InvalidData {
        name: String,
        namespace: String,
        key: String,
    },
}

/// Loads the credentials the class points at as the flat map the driver
/// expects. No reference means no credentials.
pub async fn resolve(
    cluster: &dyn Cluster,
    location: &SecretLocation,
) -> Result<BTreeMap<String, String>, Error> {
    let Some((name, namespace)) = location.both() else {
        if location.is_partial() {
            warn!(
                "secret reference {:?} names only one of name/namespace, no credentials are passed to the driver",
                location
            );
        }
        return Ok(BTreeMap::new());
    };

    let secret = match cluster.get_secret(name, namespace).await {
        Ok(secret) => secret,
        Err(e) if e.is_not_found() => {
            error!("secret {}/{} not found", namespace, name);
            return SecretNotFoundSnafu { name, namespace }.fail();
        }
        Err(source) => {
            error!("error getting secret {}/{}: {}", namespace, name, source);
            return Err(Error::GetSecret {
                name: name.to_owned(),
                namespace: namespace.to_owned(),
                source,
            });
        }
    };

    secret
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| match String::from_utf8(value.0) {
            Ok(value) => Ok((key, value)),
            Err(_) => InvalidDataSnafu {
                name,
                namespace,
                key,
            }
            .fail(),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tests::{FakeCluster, secret};

    fn location(name: &str, namespace: &str) -> SecretLocation {
        SecretLocation {
            name: Some(name.to_owned()),
            namespace: Some(namespace.to_owned()),
        }
    }

    #[tokio::test]
    async fn test_secret_data_becomes_strings() {
        let cluster = FakeCluster::default();
        cluster.insert_secret(secret("creds", "storage", &[("user", "admin"), ("password", "pw")]));

        let data = resolve(&cluster, &location("creds", "storage")).await.unwrap();

        assert_eq!(data.get("user").map(String::as_str), Some("admin"));
        assert_eq!(data.get("password").map(String::as_str), Some("pw"));
    }

    #[tokio::test]
    async fn test_missing_reference_yields_empty_map() {
        let cluster = FakeCluster::default();

        assert!(resolve(&cluster, &SecretLocation::default()).await.unwrap().is_empty());

        let partial = SecretLocation {
            name: Some("creds".to_owned()),
            namespace: None,
        };
        assert!(resolve(&cluster, &partial).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_secret_is_distinguished() {
        let cluster = FakeCluster::default();

        let err = resolve(&cluster, &location("creds", "storage")).await.unwrap_err();

        assert!(matches!(err, Error::SecretNotFound { .. }));
        assert_eq!(err.to_string(), "secret 'storage/creds' not found");
    }
}
