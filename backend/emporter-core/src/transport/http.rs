//! Scripting channel over the companion's local HTTP endpoint.

use crate::error::transport::{RemoteErrorCode, TransportError};
use crate::predicate::Predicate;
use crate::transport::{ObjectRef, PermissionStatus, RemoteScriptingChannel, RemoteValue, Target};

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;
use uuid::Uuid;

const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_secs(30);
const CLIENT_HEADER_KEY: &str = "x-emporter-client";
const INVOKE_ENDPOINT: &str = "invoke";
const PROPERTY_READ_ENDPOINT: &str = "property/read";
const PROPERTY_WRITE_ENDPOINT: &str = "property/write";
const QUERY_ENDPOINT: &str = "query";
const PERMISSION_ENDPOINT: &str = "permission";

#[derive(Serialize)]
struct InvokeRequest<'a> {
    target: &'a Target,
    operation: &'a str,
    args: Vec<RemoteValue>,
}

#[derive(Serialize)]
struct PropertyRequest<'a> {
    target: &'a Target,
    property: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<RemoteValue>,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    collection: &'a str,
    predicate: Option<&'a Predicate>,
}

#[derive(Serialize)]
struct PermissionRequest {
    prompt: bool,
}

#[derive(Deserialize)]
struct InvokeResponse {
    #[serde(default)]
    result: RemoteValue,
}

#[derive(Deserialize)]
struct PropertyResponse {
    #[serde(default)]
    value: RemoteValue,
}

#[derive(Deserialize)]
struct QueryResponse {
    objects: Vec<ObjectRef>,
}

#[derive(Deserialize)]
struct PermissionResponse {
    status: PermissionStatus,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: RemoteErrorCode,
    #[serde(default)]
    message: String,
}

/// [`RemoteScriptingChannel`] speaking JSON to `base_url`.
#[derive(Clone)]
pub struct HttpScriptingChannel {
    base_url: Url,
    client: Client,
    client_id: String,
}

impl HttpScriptingChannel {
    pub fn new(base_url_str: &str) -> Result<Self, TransportError> {
        let mut base_url = Url::parse(base_url_str)?;
        // Endpoints are joined relative to the base path
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT_DURATION)
            .build()?;

        Ok(Self {
            base_url,
            client,
            client_id: Uuid::new_v4().to_string(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R, TransportError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.base_url.join(endpoint)?;
        trace!("POST {url}");

        let response = self
            .client
            .post(url)
            .header(CLIENT_HEADER_KEY, &self.client_id)
            .json(body)
            .send()
            .await?;

        let response = check_status(response).await?;
        let bytes = response.bytes().await?;

        if bytes.is_empty() {
            Ok(serde_json::from_value(Value::Null)?)
        } else {
            Ok(serde_json::from_slice(&bytes)?)
        }
    }
}

async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    debug!("Companion rejected request: HTTP {} - {text}", status.as_u16());

    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return Err(TransportError::permission_denied(format!(
            "HTTP {} - {text}",
            status.as_u16()
        )));
    }

    if let Ok(body) = serde_json::from_str::<ErrorBody>(&text) {
        return Err(TransportError::remote(body.code, body.message));
    }

    let code = match status {
        StatusCode::NOT_FOUND => RemoteErrorCode::NotFound,
        StatusCode::CONFLICT => RemoteErrorCode::DuplicateSource,
        StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST => {
            RemoteErrorCode::InvalidArgument
        }
        StatusCode::SERVICE_UNAVAILABLE => {
            return Err(TransportError::unavailable(format!(
                "HTTP {} - {text}",
                status.as_u16()
            )));
        }
        _ => RemoteErrorCode::Failed,
    };

    Err(TransportError::remote(
        code,
        format!("HTTP {} - {text}", status.as_u16()),
    ))
}

#[async_trait]
impl RemoteScriptingChannel for HttpScriptingChannel {
    async fn invoke(
        &self,
        target: &Target,
        operation: &str,
        args: Vec<RemoteValue>,
    ) -> Result<RemoteValue, TransportError> {
        let request = InvokeRequest {
            target,
            operation,
            args,
        };
        let response: Option<InvokeResponse> = self.post(INVOKE_ENDPOINT, &request).await?;
        Ok(response.map(|r| r.result).unwrap_or(Value::Null))
    }

    async fn read_property(
        &self,
        target: &Target,
        property: &str,
    ) -> Result<RemoteValue, TransportError> {
        let request = PropertyRequest {
            target,
            property,
            value: None,
        };
        let response: Option<PropertyResponse> =
            self.post(PROPERTY_READ_ENDPOINT, &request).await?;
        Ok(response.map(|r| r.value).unwrap_or(Value::Null))
    }

    async fn write_property(
        &self,
        target: &Target,
        property: &str,
        value: RemoteValue,
    ) -> Result<(), TransportError> {
        let request = PropertyRequest {
            target,
            property,
            value: Some(value),
        };
        let _: Option<Value> = self.post(PROPERTY_WRITE_ENDPOINT, &request).await?;
        Ok(())
    }

    async fn evaluate_predicate(
        &self,
        collection: &str,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<ObjectRef>, TransportError> {
        let request = QueryRequest {
            collection,
            predicate,
        };
        let response: QueryResponse = self.post(QUERY_ENDPOINT, &request).await?;
        Ok(response.objects)
    }

    async fn determine_permission(
        &self,
        allow_prompt: bool,
    ) -> Result<PermissionStatus, TransportError> {
        let request = PermissionRequest {
            prompt: allow_prompt,
        };
        let response: PermissionResponse = self.post(PERMISSION_ENDPOINT, &request).await?;
        Ok(response.status)
    }
}
