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

//! Class parameters split into the part handed to the driver and the keys
//! the operator reserves for itself.

use crate::types::v1::GROUP_DOMAIN_PREFIX;
use snafu::{Snafu, ensure};
use std::collections::BTreeMap;

pub const SECRET_NAME_KEY: &str = const_str::concat!(GROUP_DOMAIN_PREFIX, "secret-name");
pub const SECRET_NAMESPACE_KEY: &str = const_str::concat!(GROUP_DOMAIN_PREFIX, "secret-namespace");

#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display(
        "found unknown parameter key '{}' with reserved prefix {}",
        key,
        GROUP_DOMAIN_PREFIX
    ))]
    UnknownReservedKey { key: String },

    #[snafu(display("parameter '{}' must be not empty", key))]
    EmptyValue { key: String },
}

/// Where the class says the driver credentials live.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecretLocation {
    pub name: Option<String>,
    pub namespace: Option<String>,
}

impl SecretLocation {
    /// Both halves, or nothing. A lone name or namespace references no secret.
    pub fn both(&self) -> Option<(&str, &str)> {
        match (&self.name, &self.namespace) {
            (Some(name), Some(namespace)) => Some((name, namespace)),
            _ => None,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.name.is_some() != self.namespace.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassParameters {
    /// Passed verbatim to CreateVolumeGroup.
    pub driver: BTreeMap<String, String>,
    pub secret: SecretLocation,
}

impl ClassParameters {
    pub fn resolve(parameters: &BTreeMap<String, String>) -> Result<Self, Error> {
        let mut resolved = ClassParameters::default();

        for (key, value) in parameters {
            if !key.starts_with(GROUP_DOMAIN_PREFIX) {
                resolved.driver.insert(key.clone(), value.clone());
                continue;
            }

            let slot = match key.as_str() {
                SECRET_NAME_KEY => &mut resolved.secret.name,
                SECRET_NAMESPACE_KEY => &mut resolved.secret.namespace,
                _ => return UnknownReservedKeySnafu { key }.fail(),
            };
            ensure!(!value.is_empty(), EmptyValueSnafu { key });
            *slot = Some(value.clone());
        }

        Ok(resolved)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn params(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_driver_parameters_pass_through() {
        let resolved = ClassParameters::resolve(&params(&[
            ("pool", "gold"),
            (SECRET_NAME_KEY, "creds"),
            (SECRET_NAMESPACE_KEY, "storage"),
        ]))
        .unwrap();

        assert_eq!(resolved.driver, params(&[("pool", "gold")]));
        assert_eq!(resolved.secret.both(), Some(("creds", "storage")));
    }

    #[test]
    fn test_unknown_reserved_key_fails_regardless_of_value() {
        for value in ["", "x"] {
            let err = ClassParameters::resolve(&params(&[(
                "volumegroup.storage.ibm.io/secret-typo",
                value,
            )]))
            .unwrap_err();

            assert_eq!(
                err,
                Error::UnknownReservedKey {
                    key: "volumegroup.storage.ibm.io/secret-typo".to_owned()
                }
            );
        }
    }

    #[test]
    fn test_empty_reserved_value_fails() {
        let err = ClassParameters::resolve(&params(&[(SECRET_NAMESPACE_KEY, "")])).unwrap_err();
        assert!(matches!(err, Error::EmptyValue { .. }));
        assert!(err.to_string().contains("secret-namespace"));
    }

    #[test]
    fn test_partial_secret_reference() {
        let resolved = ClassParameters::resolve(&params(&[(SECRET_NAME_KEY, "creds")])).unwrap();

        assert!(resolved.secret.is_partial());
        assert_eq!(resolved.secret.both(), None);
        assert!(!ClassParameters::default().secret.is_partial());
    }
}
