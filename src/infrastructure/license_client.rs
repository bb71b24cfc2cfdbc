use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

pub const ACTIVATE_ACTION: &str = "activate";

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseValidationRequest {
    pub license_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
}

impl LicenseValidationRequest {
    pub fn activate(license_key: impl Into<String>, instance_name: impl Into<String>) -> Self {
        let instance_name = instance_name.into();
        Self {
            license_key: license_key.into(),
            action: Some(ACTIVATE_ACTION.to_string()),
            instance_name: Some(instance_name).filter(|name| !name.trim().is_empty()),
        }
    }
}

/// Remote check of a license key. `Ok(false)` means the endpoint answered but
/// did not report an active license.
#[async_trait]
pub trait LicenseValidator: Send + Sync {
    async fn validate(&self, request: LicenseValidationRequest) -> Result<bool, InfraError>;
}

#[derive(Debug, serde::Deserialize)]
struct ValidationResponsePayload {
    #[serde(default)]
    valid: serde_json::Value,
    #[serde(default)]
    license_key: Option<LicenseKeyPayload>,
}

#[derive(Debug, serde::Deserialize)]
struct LicenseKeyPayload {
    #[serde(default)]
    status: Option<String>,
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(flag) => *flag,
        serde_json::Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        serde_json::Value::String(text) => !text.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}

/// A truthy `valid` or `license_key.status == "active"` counts as success.
pub fn parse_validation_body(body: &str) -> Result<bool, InfraError> {
    let parsed: ValidationResponsePayload = serde_json::from_str(body)
        .map_err(|error| InfraError::License(format!("invalid validation payload: {error}; body={body}")))?;
    let active = parsed
        .license_key
        .and_then(|key| key.status)
        .is_some_and(|status| status == "active");
    Ok(is_truthy(&parsed.valid) || active)
}

#[derive(Debug, Clone)]
pub struct ReqwestLicenseValidator {
    client: Client,
    endpoint: Url,
}

impl ReqwestLicenseValidator {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }

    fn http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("license endpoint error: http {}", status.as_u16())
        } else {
            format!("license endpoint error: http {}; body={body}", status.as_u16())
        };
        InfraError::License(message)
    }
}

#[async_trait]
impl LicenseValidator for ReqwestLicenseValidator {
    async fn validate(&self, request: LicenseValidationRequest) -> Result<bool, InfraError> {
        if request.license_key.trim().is_empty() {
            return Err(InfraError::License("license key must not be empty".to_string()));
        }

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|error| InfraError::License(format!("network error while validating license: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::License(format!("failed reading validation response: {error}")))?;

        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }
        parse_validation_body(&body)
    }
}
