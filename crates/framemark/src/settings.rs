// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Collection settings.
//!
//! Settings are layered with the `config` crate: built-in defaults, then an
//! optional settings file (format picked from its extension), then
//! `FRAMEMARK_*` environment variables such as `FRAMEMARK_STOP_FRAME=120`.

use crate::Error;
use directories::ProjectDirs;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of the environment variables read by [`Settings::load`].
pub const ENV_PREFIX: &str = "FRAMEMARK";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Smallest bounding-box area accepted for rectangles and polygons.
    pub min_shape_area: f64,
    /// Smallest bounding-box side accepted for polylines.
    pub min_shape_length: f64,
    /// First frame owned by the collection.
    pub start_frame: u32,
    /// Last frame owned by the collection; open ended when absent.
    pub stop_frame: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_shape_area: 9.0,
            min_shape_length: 3.0,
            start_frame: 0,
            stop_frame: None,
        }
    }
}

impl Settings {
    /// Loads settings from defaults, `path` when given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            debug!("Loading settings from {:?}", path);
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .ignore_empty(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Default settings file under the user's config directory.
    ///
    /// Returns `None` when the platform has no home directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "Framemark", "framemark")
            .map(|dirs| dirs.config_dir().join("settings.toml"))
    }

    pub fn with_stop_frame(mut self, stop_frame: u32) -> Self {
        self.stop_frame = Some(stop_frame);
        self
    }

    fn validate(&self) -> Result<(), Error> {
        if !(self.min_shape_area >= 0.0 && self.min_shape_length >= 0.0) {
            return Err(Error::ArgumentError(
                "Minimum shape area and length must be non-negative".to_string(),
            ));
        }

        match self.stop_frame {
            Some(stop) if stop < self.start_frame => Err(Error::ArgumentError(format!(
                "Stop frame {} precedes start frame {}",
                stop, self.start_frame
            ))),
            _ => Ok(()),
        }
    }
}
