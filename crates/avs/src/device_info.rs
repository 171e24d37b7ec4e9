//! Device identity, read from the `deviceInfo` section of the SDK config.

use crate::error::{ConfigError, ConfigResult};
use crate::tag::EndpointIdentifier;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Separator used when deriving the default endpoint id.
const ENDPOINT_ID_SEPARATOR: &str = "::";

/// Identity of the device the SDK runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub client_id: String,
    pub product_id: String,
    pub device_serial_number: String,
    #[serde(default)]
    pub manufacturer_name: Option<String>,
    #[serde(default)]
    pub device_description: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigDocument {
    device_info: DeviceInfo,
}

impl DeviceInfo {
    pub fn new(
        client_id: impl Into<String>,
        product_id: impl Into<String>,
        device_serial_number: impl Into<String>,
    ) -> ConfigResult<Self> {
        let info = Self {
            client_id: client_id.into(),
            product_id: product_id.into(),
            device_serial_number: device_serial_number.into(),
            manufacturer_name: None,
            device_description: None,
        };
        info.validate()?;
        Ok(info)
    }

    /// Parses a config document of the form `{"deviceInfo": {...}}`.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let document: ConfigDocument = serde_json::from_str(json)?;
        document.device_info.validate()?;
        Ok(document.device_info)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Endpoint id used when a capability or request names no endpoint.
    pub fn default_endpoint_id(&self) -> EndpointIdentifier {
        [
            self.client_id.as_str(),
            self.product_id.as_str(),
            self.device_serial_number.as_str(),
        ]
        .join(ENDPOINT_ID_SEPARATOR)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.client_id.is_empty() {
            return Err(ConfigError::MissingField("clientId"));
        }
        if self.product_id.is_empty() {
            return Err(ConfigError::MissingField("productId"));
        }
        if self.device_serial_number.is_empty() {
            return Err(ConfigError::MissingField("deviceSerialNumber"));
        }
        Ok(())
    }
}
