//! Access to the remote reactor service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    domain::{ControlRods, CoolantState, Output, ReactorId, ReactorState, Temperature},
    error::ApiErrorBody,
    protocol::{
        flatten_log_entries, CoolantRequest, CoolantResponse, FuelLevelResponse, NameRequest,
        OutputResponse, ReactorListResponse, ReactorStateResponse, RodStateResponse,
        TemperatureResponse,
    },
};
use tracing::debug;
use url::Url;

use crate::{error::ClientError, types::Operation};

#[async_trait]
pub trait ReactorService: Send + Sync {
    async fn list_reactors(&self) -> Result<ReactorListResponse, ClientError>;
    async fn logs(&self) -> Result<Vec<String>, ClientError>;
    async fn temperature(&self, id: &ReactorId) -> Result<Temperature, ClientError>;
    async fn reactor_state(&self, id: &ReactorId) -> Result<ReactorState, ClientError>;
    async fn control_rods(&self, id: &ReactorId) -> Result<ControlRods, ClientError>;
    async fn coolant(&self, id: &ReactorId) -> Result<CoolantState, ClientError>;
    async fn output(&self, id: &ReactorId) -> Result<Output, ClientError>;
    async fn fuel_level(&self, id: &ReactorId) -> Result<f64, ClientError>;
    async fn perform(&self, id: &ReactorId, operation: Operation) -> Result<(), ClientError>;
    async fn set_plant_name(&self, name: &str) -> Result<(), ClientError>;
    async fn set_reactor_name(&self, id: &ReactorId, name: &str) -> Result<(), ClientError>;
    async fn reset_plant(&self) -> Result<(), ClientError>;
}

/// `reqwest`-backed [`ReactorService`]. Every request carries the API key as
/// the `apiKey` query parameter.
pub struct HttpReactorService {
    http: Client,
    base_url: String,
    api_key: String,
}

impl HttpReactorService {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        request_timeout: Option<Duration>,
    ) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url).map_err(|err| {
            ClientError::validation(format!("invalid reactor service url '{base_url}': {err}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::validation(format!(
                "reactor service url must start with http:// or https://, got '{base_url}'"
            )));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|err| ClientError::network(base_url, &err))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder, path: &str) -> Result<Response, ClientError> {
        let response = request
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|err| ClientError::network(path, &err))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = ApiErrorBody::parse_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
        debug!(endpoint = path, status = status.as_u16(), %message, "reactor service rejected request");
        Err(ClientError::Api {
            endpoint: path.to_string(),
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(self.http.get(self.url(path)), path)
            .await?
            .json::<T>()
            .await
            .map_err(|err| ClientError::network(path, &err))
    }

    async fn post_empty(&self, path: &str) -> Result<(), ClientError> {
        self.send(self.http.post(self.url(path)), path).await?;
        Ok(())
    }
}

#[async_trait]
impl ReactorService for HttpReactorService {
    async fn list_reactors(&self) -> Result<ReactorListResponse, ClientError> {
        self.get_json("/reactors").await
    }

    async fn logs(&self) -> Result<Vec<String>, ClientError> {
        let entries: Vec<Value> = self.get_json("/reactors/logs").await?;
        Ok(flatten_log_entries(&entries))
    }

    async fn temperature(&self, id: &ReactorId) -> Result<Temperature, ClientError> {
        let body: TemperatureResponse = self
            .get_json(&format!("/reactors/temperature/{id}"))
            .await?;
        Ok(body.temperature)
    }

    async fn reactor_state(&self, id: &ReactorId) -> Result<ReactorState, ClientError> {
        let body: ReactorStateResponse = self
            .get_json(&format!("/reactors/reactor-state/{id}"))
            .await?;
        Ok(body.state)
    }

    async fn control_rods(&self, id: &ReactorId) -> Result<ControlRods, ClientError> {
        let body: RodStateResponse = self.get_json(&format!("/reactors/rod-state/{id}")).await?;
        Ok(body.control_rods)
    }

    async fn coolant(&self, id: &ReactorId) -> Result<CoolantState, ClientError> {
        let body: CoolantResponse = self.get_json(&format!("/reactors/coolant/{id}")).await?;
        Ok(body.coolant)
    }

    async fn output(&self, id: &ReactorId) -> Result<Output, ClientError> {
        let body: OutputResponse = self.get_json(&format!("/reactors/output/{id}")).await?;
        Ok(body.output)
    }

    async fn fuel_level(&self, id: &ReactorId) -> Result<f64, ClientError> {
        let body: FuelLevelResponse = self.get_json(&format!("/reactors/fuel-level/{id}")).await?;
        Ok(body.fuel.percentage)
    }

    async fn perform(&self, id: &ReactorId, operation: Operation) -> Result<(), ClientError> {
        let path = format!("/reactors/{}/{id}", operation.path_segment());
        match operation {
            Operation::SetCoolant(coolant) => {
                let request = self
                    .http
                    .post(self.url(&path))
                    .json(&CoolantRequest { coolant });
                self.send(request, &path).await?;
                Ok(())
            }
            _ => self.post_empty(&path).await,
        }
    }

    async fn set_plant_name(&self, name: &str) -> Result<(), ClientError> {
        let path = "/reactors/plant-name";
        let request = self.http.put(self.url(path)).json(&NameRequest {
            name: name.to_string(),
        });
        self.send(request, path).await?;
        Ok(())
    }

    async fn set_reactor_name(&self, id: &ReactorId, name: &str) -> Result<(), ClientError> {
        let path = format!("/reactors/set-reactor-name/{id}");
        let request = self.http.put(self.url(&path)).json(&NameRequest {
            name: name.to_string(),
        });
        self.send(request, &path).await?;
        Ok(())
    }

    async fn reset_plant(&self) -> Result<(), ClientError> {
        self.post_empty("/reactors/reset").await
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
