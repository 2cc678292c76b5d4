use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sagemakerruntime::error::DisplayErrorContext;
use aws_sdk_sagemakerruntime::primitives::Blob;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;

/// Header the SageMaker runtime uses to pick a model on a multi-model endpoint.
pub const TARGET_MODEL_HEADER: &str = "X-Amzn-SageMaker-Target-Model";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    pub endpoint_name: String,
    pub content_type: String,
    pub target_model: String,
    pub body: String,
}

/// Raw service response. The load generator never inspects it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationResponse {
    pub body: Vec<u8>,
    pub invoked_production_variant: Option<String>,
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("sagemaker runtime error: {0}")]
    SageMaker(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// The single operation the load generator needs from an inference service.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn invoke(&self, request: &InvocationRequest) -> Result<InvocationResponse, InvokeError>;
}

/// `InvokeEndpoint` through the AWS SDK.
#[derive(Clone)]
pub struct SageMakerClient {
    inner: aws_sdk_sagemakerruntime::Client,
}

impl SageMakerClient {
    /// Region and credentials come from the standard AWS environment chain.
    pub async fn from_env() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self::new(aws_sdk_sagemakerruntime::Client::new(&config))
    }

    pub fn new(inner: aws_sdk_sagemakerruntime::Client) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl InferenceClient for SageMakerClient {
    async fn invoke(&self, request: &InvocationRequest) -> Result<InvocationResponse, InvokeError> {
        let output = self
            .inner
            .invoke_endpoint()
            .endpoint_name(&request.endpoint_name)
            .content_type(&request.content_type)
            .target_model(&request.target_model)
            .body(Blob::new(request.body.as_bytes()))
            .send()
            .await
            .map_err(|e| InvokeError::SageMaker(DisplayErrorContext(&e).to_string()))?;

        Ok(InvocationResponse {
            body: output.body().map(|b| b.as_ref().to_vec()).unwrap_or_default(),
            invoked_production_variant: output.invoked_production_variant().map(str::to_string),
        })
    }
}

/// POSTs to `{base_url}/endpoints/{endpoint}/invocations`, the runtime's REST
/// route, for local servers and proxies that speak the same protocol.
#[derive(Clone)]
pub struct HttpInferenceClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Option<Duration>,
}

impl HttpInferenceClient {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, InvokeError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.into(),
            timeout,
        })
    }

    pub fn invocations_url(&self, endpoint_name: &str) -> String {
        format!(
            "{}/endpoints/{}/invocations",
            self.base_url.trim_end_matches('/'),
            endpoint_name
        )
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn invoke(&self, request: &InvocationRequest) -> Result<InvocationResponse, InvokeError> {
        let res = self
            .client
            .post(self.invocations_url(&request.endpoint_name))
            .header(CONTENT_TYPE, &request.content_type)
            .header(TARGET_MODEL_HEADER, &request.target_model)
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(InvokeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let invoked_production_variant = res
            .headers()
            .get("X-Amzn-Invoked-Production-Variant")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = res.bytes().await.map_err(|e| self.classify(e))?;

        Ok(InvocationResponse {
            body: body.to_vec(),
            invoked_production_variant,
        })
    }
}

impl HttpInferenceClient {
    fn classify(&self, err: reqwest::Error) -> InvokeError {
        match self.timeout {
            Some(timeout) if err.is_timeout() => InvokeError::Timeout(timeout),
            _ => InvokeError::Http(err),
        }
    }
}
