// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! [`Config`]: common load/save/validate behavior for server and client
//! configuration files, serialized as YAML.

use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};

use opcua_types::{
    service_types::{ApplicationDescription, ApplicationType},
    LocalizedText, UAString,
};

/// Error returned from saving or loading a [`Config`].
#[derive(Debug)]
pub enum ConfigError {
    /// Validation failed; each entry names one violated constraint.
    ConfigInvalid(Vec<String>),
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Yaml(value)
    }
}

/// Loading, saving and validating a server or client configuration file.
pub trait Config: serde::Serialize {
    /// Serializes `self` to YAML and writes it to `path`, after validating.
    fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Err(errors) = self.validate() {
            return Err(ConfigError::ConfigInvalid(errors));
        }
        let yaml = serde_yaml::to_string(&self)?;
        let mut file = File::create(path)?;
        file.write_all(yaml.as_bytes())?;
        Ok(())
    }

    /// Reads and deserializes a config of type `A` from `path`.
    fn load<A>(path: &Path) -> Result<A, ConfigError>
    where
        for<'de> A: Config + serde::Deserialize<'de>,
    {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Checks internal consistency, returning every violation found.
    fn validate(&self) -> Result<(), Vec<String>>;

    fn application_name(&self) -> UAString;
    fn application_uri(&self) -> UAString;
    fn product_uri(&self) -> UAString;
    fn application_type(&self) -> ApplicationType;

    /// URLs at which this application can be discovered, if any.
    fn discovery_urls(&self) -> Option<Vec<UAString>> {
        None
    }

    /// Builds the `ApplicationDescription` advertised during discovery and
    /// `OpenSecureChannel`/`CreateSession`.
    fn application_description(&self) -> ApplicationDescription {
        ApplicationDescription {
            application_uri: self.application_uri(),
            application_name: LocalizedText::new_with_locale("", self.application_name().as_ref()),
            application_type: self.application_type(),
            product_uri: self.product_uri(),
            gateway_server_uri: UAString::null(),
            discovery_profile_uri: UAString::null(),
            discovery_urls: self.discovery_urls(),
        }
    }
}
