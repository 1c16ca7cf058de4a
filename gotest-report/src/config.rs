// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for gotest-junit.
//!
//! Configuration is read from `.config/gotest-junit.toml`, layered on top of the defaults in
//! [`GotestJunitConfig::DEFAULT_CONFIG`]. Settings are grouped into named profiles; a profile
//! falls back to `profile.default` for any setting it doesn't specify.

use crate::{
    builder::{SubtestMode, TimestampSource},
    errors::{ConfigParseError, ConfigParseErrorKind, ProfileNotFound},
    junit::JunitOptions,
    parser::{InputFormat, ParserConfig},
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, FixedOffset};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// Overall configuration for gotest-junit.
///
/// This is the root data structure. Use [`Self::profile`] to get settings for a profile.
#[derive(Clone, Debug)]
pub struct GotestJunitConfig {
    config_file: Utf8PathBuf,
    unknown_keys: BTreeSet<String>,
    default_profile: DefaultProfileImpl,
    other_profiles: HashMap<String, CustomProfileImpl>,
}

impl GotestJunitConfig {
    /// The default location of the config within a directory: `.config/gotest-junit.toml`.
    pub const CONFIG_PATH: &'static str = ".config/gotest-junit.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// The name of the default profile.
    pub const DEFAULT_PROFILE: &'static str = "default";

    /// Reads the config from `dir`'s [`Self::CONFIG_PATH`], or from `config_file` if specified.
    ///
    /// A missing default config file is not an error, but a missing `config_file` is.
    pub fn from_sources(
        dir: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = dir.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (config, unknown_keys) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        if !unknown_keys.is_empty() {
            let keys = unknown_keys.iter().map(String::as_str).collect::<Vec<_>>();
            warn!(
                "ignoring unknown configuration keys in {config_file}: {}",
                keys.join(", ")
            );
        }

        Ok(config.into_config(config_file, unknown_keys))
    }

    /// Returns the default configuration, without reading any files.
    pub fn default_config(dir: &Utf8Path) -> Self {
        let (config, unknown_keys) = Self::build_and_deserialize_config(&Self::make_default_config())
            .expect("default config is always valid");
        config.into_config(dir.join(Self::CONFIG_PATH), unknown_keys)
    }

    /// Returns the config file this configuration was read from. The file might not exist.
    pub fn config_file(&self) -> &Utf8Path {
        &self.config_file
    }

    /// Returns the keys that were present in the config but not understood.
    pub fn unknown_keys(&self) -> &BTreeSet<String> {
        &self.unknown_keys
    }

    /// Returns the names of all known profiles.
    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(Self::DEFAULT_PROFILE).chain(self.other_profiles.keys().map(String::as_str))
    }

    /// Returns the profile with the given name, or an error if the profile isn't defined.
    pub fn profile(&self, name: impl AsRef<str>) -> Result<GotestJunitProfile<'_>, ProfileNotFound> {
        let name = name.as_ref();
        let custom_profile = match name {
            Self::DEFAULT_PROFILE => None,
            other => Some(
                self.other_profiles
                    .get(other)
                    .ok_or_else(|| ProfileNotFound::new(other, self.profile_names()))?,
            ),
        };
        Ok(GotestJunitProfile {
            name: name.to_owned(),
            default_profile: &self.default_profile,
            custom_profile,
        })
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(ConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: ConfigDeserialize =
            serde_path_to_error::deserialize(ignored_de).map_err(|error| {
                // serde_path_to_error already reports the key, so drop it from the config error.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

macro_rules! profile_field {
    ($profile:ident.$field:ident) => {
        $profile
            .custom_profile
            .and_then(|p| p.$field)
            .unwrap_or($profile.default_profile.$field)
    };
}

macro_rules! profile_field_ref {
    ($profile:ident.$field:ident) => {
        $profile
            .custom_profile
            .and_then(|p| p.$field.as_deref())
            .unwrap_or($profile.default_profile.$field.as_str())
    };
}

/// Settings for a single profile, with fallbacks to the default profile applied.
#[derive(Clone, Debug)]
pub struct GotestJunitProfile<'cfg> {
    name: String,
    default_profile: &'cfg DefaultProfileImpl,
    custom_profile: Option<&'cfg CustomProfileImpl>,
}

impl<'cfg> GotestJunitProfile<'cfg> {
    /// Returns the name of this profile.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the package name used if the input ends without a summary line.
    pub fn package_name(&self) -> &'cfg str {
        profile_field_ref!(self.package_name)
    }

    /// Returns how tests with subtests are reported.
    pub fn subtest_mode(&self) -> SubtestMode {
        profile_field!(self.subtest_mode)
    }

    /// Returns whether `# <package>` lines start build errors.
    pub fn detect_build_output(&self) -> bool {
        profile_field!(self.detect_build_output)
    }

    /// Returns the input format.
    pub fn input_format(&self) -> InputFormat {
        profile_field!(self.input_format)
    }

    /// Returns whether a failing report should result in a failing exit code.
    pub fn set_exit_code(&self) -> bool {
        profile_field!(self.set_exit_code)
    }

    /// Returns whether the XML declaration is written.
    pub fn xml_header(&self) -> bool {
        profile_field!(self.xml_header)
    }

    /// Returns the name of the root `<testsuites>` element.
    pub fn report_name(&self) -> &'cfg str {
        profile_field_ref!(self.report_name)
    }

    /// Returns the hostname recorded on test suites, if any.
    pub fn hostname(&self) -> Option<&'cfg str> {
        self.custom_profile
            .and_then(|p| p.hostname.as_deref())
            .or(self.default_profile.hostname.as_deref())
    }

    /// Returns the fixed timestamp for test suites, if any.
    pub fn timestamp(&self) -> Option<DateTime<FixedOffset>> {
        self.custom_profile
            .and_then(|p| p.timestamp)
            .or(self.default_profile.timestamp)
    }

    /// Returns the properties added to every test suite.
    ///
    /// Properties from the default profile come first. A property set by this profile replaces
    /// the default's value.
    pub fn properties(&self) -> IndexMap<String, String> {
        let mut properties = self.default_profile.properties.clone();
        if let Some(custom) = self.custom_profile {
            for (key, value) in &custom.properties {
                properties.shift_remove(key);
                properties.insert(key.clone(), value.clone());
            }
        }
        properties
    }

    /// Returns parser settings for this profile.
    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            package_name: self.package_name().to_owned(),
            subtest_mode: self.subtest_mode(),
            timestamp: self
                .timestamp()
                .map_or(TimestampSource::Now, TimestampSource::Fixed),
            detect_build_output: self.detect_build_output(),
            input_format: self.input_format(),
            properties: self.properties(),
        }
    }

    /// Returns JUnit output settings for this profile.
    pub fn junit_options(&self) -> JunitOptions {
        JunitOptions {
            report_name: self.report_name().to_owned(),
            hostname: self.hostname().map(ToOwned::to_owned),
            xml_header: self.xml_header(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ConfigDeserialize {
    #[serde(rename = "profile")]
    profiles: HashMap<String, CustomProfileImpl>,
}

impl ConfigDeserialize {
    fn into_config(
        mut self,
        config_file: Utf8PathBuf,
        unknown_keys: BTreeSet<String>,
    ) -> GotestJunitConfig {
        let p = self
            .profiles
            .remove(GotestJunitConfig::DEFAULT_PROFILE)
            .expect("default profile should exist");
        GotestJunitConfig {
            config_file,
            unknown_keys,
            default_profile: DefaultProfileImpl::new(p),
            other_profiles: self.profiles,
        }
    }
}

#[derive(Clone, Debug)]
struct DefaultProfileImpl {
    package_name: String,
    subtest_mode: SubtestMode,
    detect_build_output: bool,
    input_format: InputFormat,
    set_exit_code: bool,
    xml_header: bool,
    report_name: String,
    hostname: Option<String>,
    timestamp: Option<DateTime<FixedOffset>>,
    properties: IndexMap<String, String>,
}

impl DefaultProfileImpl {
    fn new(p: CustomProfileImpl) -> Self {
        Self {
            package_name: p
                .package_name
                .expect("package-name present in default profile"),
            subtest_mode: p
                .subtest_mode
                .expect("subtest-mode present in default profile"),
            detect_build_output: p
                .detect_build_output
                .expect("detect-build-output present in default profile"),
            input_format: p
                .input_format
                .expect("input-format present in default profile"),
            set_exit_code: p
                .set_exit_code
                .expect("set-exit-code present in default profile"),
            xml_header: p.xml_header.expect("xml-header present in default profile"),
            report_name: p
                .report_name
                .expect("report-name present in default profile"),
            hostname: p.hostname,
            timestamp: p.timestamp,
            properties: p.properties,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CustomProfileImpl {
    #[serde(default)]
    package_name: Option<String>,
    #[serde(default)]
    subtest_mode: Option<SubtestMode>,
    #[serde(default)]
    detect_build_output: Option<bool>,
    #[serde(default)]
    input_format: Option<InputFormat>,
    #[serde(default)]
    set_exit_code: Option<bool>,
    #[serde(default)]
    xml_header: Option<bool>,
    #[serde(default)]
    report_name: Option<String>,
    #[serde(default)]
    hostname: Option<String>,
    #[serde(default)]
    timestamp: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    properties: IndexMap<String, String>,
}
