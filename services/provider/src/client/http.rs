//! HTTP client for the Gandi v5 API.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, LOCATION};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use super::types::*;
use super::{CertificateApi, ClientError, DomainApi, LiveDnsApi, SimpleHostingApi};
use crate::config::Config;

/// Header asking the API to validate a write without applying it.
pub const DRY_RUN_HEADER: &str = "Dry-Run";

/// API client for all Gandi API families.
#[derive(Debug, Clone)]
pub struct GandiClient {
    client: reqwest::Client,
    base_url: String,
    sharing_id: Option<String>,
}

impl GandiClient {
    /// Create a new API client from config.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&config.credentials.authorization())
                .context("Invalid credentials format")?,
        );
        if config.dry_run {
            headers.insert(DRY_RUN_HEADER, HeaderValue::from_static("1"));
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            sharing_id: config.sharing_id.clone(),
        })
    }

    /// Build a URL for a v5 endpoint.
    fn url(&self, path: &str) -> String {
        format!("{}/v5{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!(method = %method, url = %url, "Gandi API request");
        let request = self.client.request(method, url);
        match &self.sharing_id {
            Some(id) => request.query(&[("sharing_id", id)]),
            None => request,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.request(Method::GET, path).send().await?;
        self.handle_response(response).await
    }

    /// Send a write and discard the body.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ClientError> {
        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            self.handle_error(response).await
        }
    }

    async fn write<B: Serialize + ?Sized>(&self, method: Method, path: &str, body: &B) -> Result<(), ClientError> {
        self.send(method, path, Some(body)).await.map(|_| ())
    }

    async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send::<()>(Method::DELETE, path, None).await.map(|_| ())
    }

    /// Send a creation and return the created object's id.
    async fn create<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<String, ClientError> {
        let response = self.send(Method::POST, path, Some(body)).await?;
        created_id(response).await
    }

    /// Handle a successful or error response.
    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T, ClientError> {
        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| ClientError::Decode(e.to_string()))
        } else {
            self.handle_error(response).await
        }
    }

    /// Handle an error response.
    async fn handle_error<T>(&self, response: Response) -> Result<T, ClientError> {
        let status = response.status();
        let url = response.url().path().to_string();

        let body: ApiErrorResponse = response.json().await.unwrap_or_default();
        let message = body.message.unwrap_or_else(|| "Unknown error".to_string());

        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(format!("{url}: {message}")));
        }

        let code = body
            .code
            .map(|c| c.to_string())
            .or(body.cause)
            .unwrap_or_else(|| "unknown".to_string());
        Err(ClientError::api(status.as_u16(), code, message))
    }
}

/// Extract an id from a creation response: the JSON `id` when present,
/// otherwise the last segment of the `Location` header.
async fn created_id(response: Response) -> Result<String, ClientError> {
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim_end_matches('/').rsplit('/').next())
        .map(str::to_string);

    let body: Option<CreatedResponse> = response.json().await.ok();
    body.and_then(|b| b.id)
        .map(|id| match id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .or(location)
        .ok_or_else(|| ClientError::Decode("creation response carries no id".to_string()))
}

/// API error response structure.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    cause: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    #[serde(default)]
    id: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct RecordUpdate<'a> {
    rrset_ttl: u32,
    rrset_values: &'a [String],
}

#[derive(Debug, Serialize, Deserialize)]
struct Nameservers {
    nameservers: Vec<String>,
}

#[derive(Debug, Serialize)]
struct GlueUpdate<'a> {
    ips: &'a [String],
}

#[derive(Debug, Serialize)]
struct SignRequest {
    flags: i32,
}

/// Key-signing key flag.
const KSK_FLAGS: i32 = 257;

#[async_trait]
impl LiveDnsApi for GandiClient {
    async fn get_record(&self, zone: &str, name: &str, rtype: &str) -> Result<DomainRecord, ClientError> {
        self.get(&format!("/livedns/domains/{zone}/records/{name}/{rtype}"))
            .await
    }

    async fn create_record(&self, zone: &str, record: &NewRecord) -> Result<(), ClientError> {
        self.write(Method::POST, &format!("/livedns/domains/{zone}/records"), record)
            .await
    }

    async fn update_record(
        &self,
        zone: &str,
        name: &str,
        rtype: &str,
        ttl: u32,
        values: &[String],
    ) -> Result<(), ClientError> {
        let body = RecordUpdate {
            rrset_ttl: ttl,
            rrset_values: values,
        };
        self.write(
            Method::PUT,
            &format!("/livedns/domains/{zone}/records/{name}/{rtype}"),
            &body,
        )
        .await
    }

    async fn delete_record(&self, zone: &str, name: &str, rtype: &str) -> Result<(), ClientError> {
        self.delete(&format!("/livedns/domains/{zone}/records/{name}/{rtype}"))
            .await
    }

    async fn list_keys(&self, fqdn: &str) -> Result<Vec<SigningKey>, ClientError> {
        self.get(&format!("/livedns/domains/{fqdn}/keys")).await
    }

    async fn get_key(&self, fqdn: &str, uuid: &str) -> Result<SigningKey, ClientError> {
        self.get(&format!("/livedns/domains/{fqdn}/keys/{uuid}")).await
    }

    async fn sign_domain(&self, fqdn: &str) -> Result<(), ClientError> {
        self.write(
            Method::POST,
            &format!("/livedns/domains/{fqdn}/keys"),
            &SignRequest { flags: KSK_FLAGS },
        )
        .await
    }

    async fn delete_key(&self, fqdn: &str, uuid: &str) -> Result<(), ClientError> {
        self.delete(&format!("/livedns/domains/{fqdn}/keys/{uuid}")).await
    }

    async fn get_livedns_domain(&self, fqdn: &str) -> Result<LiveDnsDomain, ClientError> {
        self.get(&format!("/livedns/domains/{fqdn}")).await
    }

    async fn attach_domain_to_zone(&self, zone: &str, fqdn: &str) -> Result<(), ClientError> {
        self.send::<()>(Method::POST, &format!("/livedns/zones/{zone}/domains/{fqdn}"), None)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl DomainApi for GandiClient {
    async fn create_domain(&self, request: &CreateDomainRequest) -> Result<(), ClientError> {
        self.write(Method::POST, "/domain/domains", request).await
    }

    async fn get_domain(&self, fqdn: &str) -> Result<DomainDetails, ClientError> {
        self.get(&format!("/domain/domains/{fqdn}")).await
    }

    async fn set_autorenew(&self, fqdn: &str, enabled: bool) -> Result<(), ClientError> {
        self.write(
            Method::PATCH,
            &format!("/domain/domains/{fqdn}/autorenew"),
            &AutoRenew { enabled },
        )
        .await
    }

    async fn set_contacts(&self, fqdn: &str, contacts: &Contacts) -> Result<(), ClientError> {
        self.write(Method::PATCH, &format!("/domain/domains/{fqdn}/contacts"), contacts)
            .await
    }

    async fn get_nameservers(&self, fqdn: &str) -> Result<Vec<String>, ClientError> {
        self.get(&format!("/domain/domains/{fqdn}/nameservers")).await
    }

    async fn update_nameservers(&self, fqdn: &str, nameservers: &[String]) -> Result<(), ClientError> {
        let body = Nameservers {
            nameservers: nameservers.to_vec(),
        };
        self.write(Method::PUT, &format!("/domain/domains/{fqdn}/nameservers"), &body)
            .await
    }

    async fn enable_livedns(&self, fqdn: &str) -> Result<(), ClientError> {
        self.send::<()>(Method::POST, &format!("/domain/domains/{fqdn}/livedns"), None)
            .await
            .map(|_| ())
    }

    async fn list_dnssec_keys(&self, fqdn: &str) -> Result<Vec<DnssecKey>, ClientError> {
        self.get(&format!("/domain/domains/{fqdn}/dnskeys")).await
    }

    async fn create_dnssec_key(&self, fqdn: &str, request: &DnssecKeyRequest) -> Result<(), ClientError> {
        self.write(Method::POST, &format!("/domain/domains/{fqdn}/dnskeys"), request)
            .await
    }

    async fn delete_dnssec_key(&self, fqdn: &str, id: &str) -> Result<(), ClientError> {
        self.delete(&format!("/domain/domains/{fqdn}/dnskeys/{id}")).await
    }

    async fn get_glue_record(&self, fqdn: &str, name: &str) -> Result<GlueRecord, ClientError> {
        self.get(&format!("/domain/domains/{fqdn}/hosts/{name}")).await
    }

    async fn create_glue_record(&self, fqdn: &str, request: &GlueRecordRequest) -> Result<(), ClientError> {
        self.write(Method::POST, &format!("/domain/domains/{fqdn}/hosts"), request)
            .await
    }

    async fn update_glue_record(&self, fqdn: &str, name: &str, ips: &[String]) -> Result<(), ClientError> {
        self.write(
            Method::PUT,
            &format!("/domain/domains/{fqdn}/hosts/{name}"),
            &GlueUpdate { ips },
        )
        .await
    }

    async fn delete_glue_record(&self, fqdn: &str, name: &str) -> Result<(), ClientError> {
        self.delete(&format!("/domain/domains/{fqdn}/hosts/{name}")).await
    }
}

#[async_trait]
impl SimpleHostingApi for GandiClient {
    async fn create_instance(&self, request: &CreateInstanceRequest) -> Result<String, ClientError> {
        self.create("/simplehosting/instances", request).await
    }

    async fn get_instance(&self, id: &str) -> Result<Instance, ClientError> {
        self.get(&format!("/simplehosting/instances/{id}")).await
    }

    async fn delete_instance(&self, id: &str) -> Result<(), ClientError> {
        self.delete(&format!("/simplehosting/instances/{id}")).await
    }

    async fn create_vhost(&self, instance_id: &str, request: &CreateVhostRequest) -> Result<(), ClientError> {
        self.write(
            Method::POST,
            &format!("/simplehosting/instances/{instance_id}/vhosts"),
            request,
        )
        .await
    }

    async fn get_vhost(&self, instance_id: &str, fqdn: &str) -> Result<Vhost, ClientError> {
        self.get(&format!("/simplehosting/instances/{instance_id}/vhosts/{fqdn}"))
            .await
    }

    async fn update_vhost(
        &self,
        instance_id: &str,
        fqdn: &str,
        request: &PatchVhostRequest,
    ) -> Result<(), ClientError> {
        self.write(
            Method::PATCH,
            &format!("/simplehosting/instances/{instance_id}/vhosts/{fqdn}"),
            request,
        )
        .await
    }

    async fn delete_vhost(&self, instance_id: &str, fqdn: &str) -> Result<(), ClientError> {
        self.delete(&format!("/simplehosting/instances/{instance_id}/vhosts/{fqdn}"))
            .await
    }
}

#[async_trait]
impl CertificateApi for GandiClient {
    async fn create_certificate(&self, request: &CreateCertificateRequest) -> Result<String, ClientError> {
        self.create("/certificate/issued-certs", request).await
    }

    async fn delete_certificate(&self, id: &str) -> Result<(), ClientError> {
        self.delete(&format!("/certificate/issued-certs/{id}")).await
    }
}
