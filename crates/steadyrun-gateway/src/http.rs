//! HTTP gateway for the provider's JSON RPC protocol
//!
//! Every operation is a `POST /` with an `X-Amz-Target` header naming the
//! operation and a JSON body. Request signing is not done here: the endpoint
//! is expected to be a signing proxy (or a local emulator).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde::de::DeserializeOwned;
use steadyrun_api::{
    AutoScalingRevision, ScalingBounds, ScalingRevisionSummary, ServiceRecord, ServiceSummary,
};
use tracing::{debug, instrument};
use url::Url;

use crate::error::GatewayError;
use crate::pagination::{Page, drain};
use crate::request::{CreateServiceRequest, ServiceUpdate};
use crate::traits::ServiceGateway;
use crate::wire::{
    AutoScalingConfigurationOutput, CreateAutoScalingConfigurationInput, CreateServiceInput,
    ErrorBody, ListAutoScalingConfigurationsInput, ListAutoScalingConfigurationsOutput,
    ListServicesInput, ListServicesOutput, ScalingArnInput, ServiceArnInput, ServiceOutput,
    TagResourceInput, UpdateServiceInput,
};

const TARGET_HEADER: &str = "X-Amz-Target";
const TARGET_PREFIX: &str = "AppRunner";
const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.0";
const PAGE_SIZE: u32 = 20;

/// Gateway talking to the provider over HTTP
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    endpoint: Url,
}

impl HttpGateway {
    /// Create a gateway for the given endpoint
    ///
    /// # Errors
    /// Returns `GatewayError::Permanent` if the endpoint is not a valid URL.
    pub fn new(endpoint: impl AsRef<str>) -> Result<Self, GatewayError> {
        Self::with_client(endpoint, Client::new())
    }

    /// Create a gateway with a per-request timeout
    ///
    /// # Errors
    /// Returns `GatewayError::Permanent` if the endpoint is invalid or the
    /// HTTP client cannot be built.
    pub fn with_timeout(endpoint: impl AsRef<str>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Permanent(format!("http client: {e}")))?;
        Self::with_client(endpoint, client)
    }

    /// Create a gateway with a custom `reqwest::Client`
    ///
    /// # Errors
    /// Returns `GatewayError::Permanent` if the endpoint is not a valid URL.
    pub fn with_client(endpoint: impl AsRef<str>, client: Client) -> Result<Self, GatewayError> {
        let endpoint = Url::parse(endpoint.as_ref())
            .map_err(|e| GatewayError::Permanent(format!("invalid endpoint: {e}")))?;
        Ok(Self { client, endpoint })
    }

    /// Invoke one operation and decode its output
    async fn call<I, O>(&self, operation: &str, input: &I) -> Result<O, GatewayError>
    where
        I: Serialize + Sync,
        O: DeserializeOwned,
    {
        let body = serde_json::to_vec(input)
            .map_err(|e| GatewayError::Permanent(format!("encode {operation}: {e}")))?;

        debug!(operation, endpoint = %self.endpoint, "provider request");

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(TARGET_HEADER, format!("{TARGET_PREFIX}.{operation}"))
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| GatewayError::Transient(format!("{operation}: {e}")))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Transient(format!("{operation}: {e}")))?;

        if !(200..300).contains(&status) {
            return Err(classify(status, &text));
        }

        // Operations without output return an empty body
        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(text)
            .map_err(|e| GatewayError::Permanent(format!("decode {operation}: {e}")))
    }

    /// Like `call`, but discards the output
    async fn send<I>(&self, operation: &str, input: &I) -> Result<(), GatewayError>
    where
        I: Serialize + Sync,
    {
        self.call::<I, serde_json::Value>(operation, input)
            .await
            .map(|_| ())
    }
}

/// Map a non-2xx response to the gateway error taxonomy
pub(crate) fn classify(status: u16, body: &str) -> GatewayError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let kind = parsed.short_kind().to_string();
    let message = parsed
        .message
        .clone()
        .unwrap_or_else(|| body.trim().to_string());

    match kind.as_str() {
        "ResourceNotFoundException" => GatewayError::NotFound(message),
        "InvalidStateException" => GatewayError::InvalidState(message),
        "ThrottlingException" | "InternalServiceErrorException" => {
            GatewayError::Transient(format!("{kind}: {message}"))
        }
        _ if status == 429 || status >= 500 => {
            GatewayError::Transient(format!("HTTP {status}: {message}"))
        }
        "" => GatewayError::Permanent(format!("HTTP {status}: {message}")),
        _ => GatewayError::Permanent(format!("{kind}: {message}")),
    }
}

fn absent_if_not_found<T>(result: Result<T, GatewayError>) -> Result<Option<T>, GatewayError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(GatewayError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl ServiceGateway for HttpGateway {
    #[instrument(skip(self))]
    async fn list_services(&self) -> Result<Vec<ServiceSummary>, GatewayError> {
        drain(|next_token| async move {
            let input = ListServicesInput {
                next_token,
                max_results: PAGE_SIZE,
            };
            let out: ListServicesOutput = self.call("ListServices", &input).await?;
            Ok(Page::new(
                out.service_summary_list.into_iter().map(Into::into).collect(),
                out.next_token,
            ))
        })
        .await
    }

    #[instrument(skip(self))]
    async fn describe_service(&self, arn: &str) -> Result<Option<ServiceRecord>, GatewayError> {
        let input = ServiceArnInput {
            service_arn: arn.to_string(),
        };
        let out = absent_if_not_found(
            self.call::<_, ServiceOutput>("DescribeService", &input)
                .await,
        )?;
        Ok(out.map(|o| o.service.into()))
    }

    #[instrument(skip(self, request), fields(service = %request.name))]
    async fn create_service(
        &self,
        request: &CreateServiceRequest,
    ) -> Result<ServiceRecord, GatewayError> {
        let input = CreateServiceInput::from(request);
        let out: ServiceOutput = self.call("CreateService", &input).await?;
        let mut record = ServiceRecord::from(out.service);
        record.tags.clone_from(&request.tags);
        Ok(record)
    }

    #[instrument(skip(self, update))]
    async fn update_service(&self, arn: &str, update: &ServiceUpdate) -> Result<(), GatewayError> {
        self.send("UpdateService", &UpdateServiceInput::new(arn, update))
            .await
    }

    #[instrument(skip(self))]
    async fn delete_service(&self, arn: &str) -> Result<(), GatewayError> {
        let input = ServiceArnInput {
            service_arn: arn.to_string(),
        };
        absent_if_not_found(self.send("DeleteService", &input).await).map(|_| ())
    }

    #[instrument(skip(self, labels))]
    async fn tag_resource(
        &self,
        arn: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<(), GatewayError> {
        self.send("TagResource", &TagResourceInput::new(arn, labels))
            .await
    }

    #[instrument(skip(self))]
    async fn list_scaling_configs(
        &self,
        name: &str,
    ) -> Result<Vec<ScalingRevisionSummary>, GatewayError> {
        drain(|next_token| async move {
            let input = ListAutoScalingConfigurationsInput {
                auto_scaling_configuration_name: name.to_string(),
                latest_only: false,
                next_token,
                max_results: PAGE_SIZE,
            };
            let out: ListAutoScalingConfigurationsOutput =
                self.call("ListAutoScalingConfigurations", &input).await?;
            Ok(Page::new(
                out.auto_scaling_configuration_summary_list
                    .into_iter()
                    .map(Into::into)
                    .collect(),
                out.next_token,
            ))
        })
        .await
    }

    #[instrument(skip(self))]
    async fn describe_scaling_config(
        &self,
        arn: &str,
    ) -> Result<Option<AutoScalingRevision>, GatewayError> {
        let input = ScalingArnInput {
            auto_scaling_configuration_arn: arn.to_string(),
        };
        let out = absent_if_not_found(
            self.call::<_, AutoScalingConfigurationOutput>(
                "DescribeAutoScalingConfiguration",
                &input,
            )
            .await,
        )?;
        Ok(out.map(|o| o.auto_scaling_configuration.into()))
    }

    #[instrument(skip(self, labels))]
    async fn create_scaling_config(
        &self,
        name: &str,
        bounds: &ScalingBounds,
        labels: &BTreeMap<String, String>,
    ) -> Result<AutoScalingRevision, GatewayError> {
        let input = CreateAutoScalingConfigurationInput::new(name, bounds, labels);
        let out: AutoScalingConfigurationOutput = self
            .call("CreateAutoScalingConfiguration", &input)
            .await?;
        Ok(out.auto_scaling_configuration.into())
    }

    #[instrument(skip(self))]
    async fn delete_scaling_config(&self, arn: &str) -> Result<(), GatewayError> {
        let input = ScalingArnInput {
            auto_scaling_configuration_arn: arn.to_string(),
        };
        absent_if_not_found(
            self.send("DeleteAutoScalingConfiguration", &input)
                .await,
        )
        .map(|_| ())
    }

    fn gateway_type(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_creation() {
        assert!(HttpGateway::new("http://127.0.0.1:4566").is_ok());
        assert!(matches!(
            HttpGateway::new("not a url"),
            Err(GatewayError::Permanent(_))
        ));
    }

    #[test]
    fn test_classify_not_found() {
        let err = classify(
            400,
            r#"{"__type":"com.amazonaws.apprunner#ResourceNotFoundException","Message":"gone"}"#,
        );
        assert_eq!(err, GatewayError::NotFound("gone".to_string()));
    }

    #[test]
    fn test_classify_invalid_state_is_verbatim() {
        let err = classify(
            400,
            r#"{"__type":"InvalidStateException","message":"Service is in OPERATION_IN_PROGRESS"}"#,
        );
        assert_eq!(err.to_string(), "Service is in OPERATION_IN_PROGRESS");
    }

    #[test]
    fn test_classify_throttling_and_5xx_are_transient() {
        assert!(classify(400, r#"{"__type":"ThrottlingException"}"#).is_retryable());
        assert!(classify(503, "Service Unavailable").is_retryable());
        assert!(classify(429, "").is_retryable());
    }

    #[test]
    fn test_classify_validation_is_permanent() {
        let err = classify(
            400,
            r#"{"__type":"InvalidRequestException","Message":"bad MinSize"}"#,
        );
        assert_eq!(
            err,
            GatewayError::Permanent("InvalidRequestException: bad MinSize".to_string())
        );
    }
}
