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

//! `csi.ibm.com/v1` resources handled by the operator.

pub mod reference;
pub mod status;
pub mod volume_group;
pub mod volume_group_class;
pub mod volume_group_content;

pub use volume_group::VolumeGroup;
pub use volume_group_class::VolumeGroupClass;
pub use volume_group_content::VolumeGroupContent;

/// Domain shared by finalizers and reserved class parameters.
pub const GROUP_DOMAIN: &str = "volumegroup.storage.ibm.io";

/// Prefix of every operator-reserved key, `volumegroup.storage.ibm.io/`.
pub const GROUP_DOMAIN_PREFIX: &str = const_str::concat!(GROUP_DOMAIN, "/");
