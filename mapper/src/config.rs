// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use crate::arch::ArrayConfig;
use crate::place::PlacementConfig;
use crate::taskgraph::IngestOptions;
use crate::Error;

/// Everything needed to map one description: how to ingest it, the array
/// to map onto and how to place.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapperConfig {
    pub ingest: IngestOptions,
    pub array: ArrayConfig,
    pub placement: PlacementConfig,
}

impl MapperConfig {
    pub fn from_file<P: AsRef<Path>>(file_name: P) -> anyhow::Result<Self> {
        let path = file_name.as_ref();
        let file =
            File::open(path).with_context(|| format!("can not open {}", path.display()))?;
        let config = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("can not parse {}", path.display()))?;
        log::debug!("read configuration from {}", path.display());
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, Error> {
        Ok(serde_yaml::to_string(self)?)
    }
}

impl FromStr for MapperConfig {
    type Err = Error;

    fn from_str(config: &str) -> Result<Self, Self::Err> {
        Ok(serde_yaml::from_str(config)?)
    }
}
