//! Keystone v2 / Nova / Heat HTTP client
//!
//! Authentication happens on the first request and the resulting token and
//! endpoints are kept for the lifetime of the client.

use crate::error::{OpenStackError, Result};
use crate::models::*;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use tokio::sync::OnceCell;

const AUTH_HEADER: &str = "X-Auth-Token";

/// Keystone v2 password credentials
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub tenant_name: String,
    pub auth_url: String,
}

/// Service catalog type an endpoint is looked up by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Compute,
    Orchestration,
}

impl Service {
    pub fn catalog_type(&self) -> &'static str {
        match self {
            Service::Compute => "compute",
            Service::Orchestration => "orchestration",
        }
    }
}

/// Token and endpoints from a successful authentication
#[derive(Debug, Clone)]
struct Session {
    token: String,
    compute_url: String,
    orchestration_url: String,
}

impl Session {
    fn url(&self, service: Service) -> &str {
        match service {
            Service::Compute => &self.compute_url,
            Service::Orchestration => &self.orchestration_url,
        }
    }
}

pub struct OpenStackClient {
    http: reqwest::Client,
    credentials: Credentials,
    region: String,
    session: OnceCell<Session>,
}

impl OpenStackClient {
    pub fn new(credentials: Credentials, region: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            region: region.into(),
            session: OnceCell::new(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn tenant_name(&self) -> &str {
        &self.credentials.tenant_name
    }

    async fn session(&self) -> Result<&Session> {
        self.session.get_or_try_init(|| self.authenticate()).await
    }

    async fn authenticate(&self) -> Result<Session> {
        let url = format!("{}/tokens", self.credentials.auth_url.trim_end_matches('/'));
        let body = TokenRequest {
            auth: AuthBody {
                password_credentials: PasswordCredentials {
                    username: self.credentials.username.clone(),
                    password: self.credentials.password.clone(),
                },
                tenant_name: self.credentials.tenant_name.clone(),
            },
        };

        tracing::debug!(
            "Authenticating {} against {}",
            self.credentials.username,
            url
        );
        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(OpenStackError::AuthenticationFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                text
            )));
        }

        let token: TokenResponse = serde_json::from_str(&text)?;
        let catalog = &token.access.service_catalog;
        let endpoint = |service: Service| {
            endpoint_for(catalog, service.catalog_type(), &self.region).ok_or_else(|| {
                OpenStackError::EndpointNotFound {
                    service: service.catalog_type(),
                    region: self.region.clone(),
                }
            })
        };

        Ok(Session {
            compute_url: endpoint(Service::Compute)?,
            orchestration_url: endpoint(Service::Orchestration)?,
            token: token.access.token.id,
        })
    }

    /// Send a request and return the raw body of a successful response
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        service: Service,
        path: &str,
        body: Option<&B>,
    ) -> Result<String> {
        let session = self.session().await?;
        let url = format!("{}{}", session.url(service), path);
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method, &url)
            .header(AUTH_HEADER, &session.token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(OpenStackError::Http {
                status: status.as_u16(),
                message: text,
            });
        }
        Ok(text)
    }

    async fn get<T: DeserializeOwned>(&self, service: Service, path: &str) -> Result<T> {
        let text = self.send::<()>(Method::GET, service, path, None).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        service: Service,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let text = self.send(Method::POST, service, path, Some(body)).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn delete(&self, service: Service, path: &str) -> Result<()> {
        self.send::<()>(Method::DELETE, service, path, None).await?;
        Ok(())
    }

    // Nova servers

    pub async fn list_servers(&self) -> Result<Vec<Server>> {
        let list: ServerList = self.get(Service::Compute, "/servers/detail").await?;
        Ok(list.servers)
    }

    pub async fn get_server(&self, id: &str) -> Result<Server> {
        let envelope: ServerEnvelope = self
            .get(Service::Compute, &format!("/servers/{}", id))
            .await?;
        Ok(envelope.server)
    }

    /// Create a server; returns the new server's id
    pub async fn create_server(&self, server: NewServer) -> Result<String> {
        let created: CreatedServerEnvelope = self
            .post(Service::Compute, "/servers", &CreateServerBody { server })
            .await?;
        Ok(created.server.id)
    }

    /// Merge one entry into the server's metadata
    pub async fn set_metadata(&self, id: &str, key: &str, value: &str) -> Result<()> {
        let body = MetadataBody {
            metadata: BTreeMap::from([(key.to_string(), value.to_string())]),
        };
        self.send(
            Method::POST,
            Service::Compute,
            &format!("/servers/{}/metadata", id),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    pub async fn rename_server(&self, id: &str, name: &str) -> Result<()> {
        let body = UpdateServerBody {
            server: ServerName {
                name: name.to_string(),
            },
        };
        self.send(
            Method::PUT,
            Service::Compute,
            &format!("/servers/{}", id),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    pub async fn delete_server(&self, id: &str) -> Result<()> {
        self.delete(Service::Compute, &format!("/servers/{}", id))
            .await
    }

    // Nova flavors and images

    pub async fn list_flavors(&self) -> Result<Vec<NamedResource>> {
        let list: FlavorList = self.get(Service::Compute, "/flavors/detail").await?;
        Ok(list.flavors)
    }

    pub async fn get_flavor(&self, id: &str) -> Result<NamedResource> {
        let envelope: FlavorEnvelope = self
            .get(Service::Compute, &format!("/flavors/{}", id))
            .await?;
        Ok(envelope.flavor)
    }

    pub async fn list_images(&self) -> Result<Vec<NamedResource>> {
        let list: ImageList = self.get(Service::Compute, "/images/detail").await?;
        Ok(list.images)
    }

    // Nova security groups

    pub async fn list_security_groups(&self) -> Result<Vec<NovaSecurityGroup>> {
        let list: SecurityGroupList = self.get(Service::Compute, "/os-security-groups").await?;
        Ok(list.security_groups)
    }

    pub async fn create_security_group(
        &self,
        name: &str,
        description: &str,
    ) -> Result<NovaSecurityGroup> {
        let body = CreateSecurityGroupBody {
            security_group: NewSecurityGroup {
                name: name.to_string(),
                description: description.to_string(),
            },
        };
        let envelope: SecurityGroupEnvelope = self
            .post(Service::Compute, "/os-security-groups", &body)
            .await?;
        Ok(envelope.security_group)
    }

    pub async fn create_security_rule(&self, rule: NewSecurityRule) -> Result<()> {
        let body = CreateSecurityRuleBody {
            security_group_rule: rule,
        };
        self.send(
            Method::POST,
            Service::Compute,
            "/os-security-group-rules",
            Some(&body),
        )
        .await?;
        Ok(())
    }

    // Heat

    /// Look a stack up by name; Heat resolves the name to the stack id
    pub async fn find_stack(&self, name: &str) -> Result<HeatStackRecord> {
        let envelope: StackEnvelope = self
            .get(Service::Orchestration, &format!("/stacks/{}", name))
            .await?;
        Ok(envelope.stack)
    }

    pub async fn get_stack(&self, name: &str, id: &str) -> Result<HeatStackRecord> {
        let envelope: StackEnvelope = self
            .get(Service::Orchestration, &format!("/stacks/{}/{}", name, id))
            .await?;
        Ok(envelope.stack)
    }

    pub async fn list_stack_resources(&self, name: &str, id: &str) -> Result<Vec<HeatResource>> {
        let list: ResourceList = self
            .get(
                Service::Orchestration,
                &format!("/stacks/{}/{}/resources", name, id),
            )
            .await?;
        Ok(list.resources)
    }

    pub async fn delete_stack(&self, name: &str, id: &str) -> Result<()> {
        self.delete(Service::Orchestration, &format!("/stacks/{}/{}", name, id))
            .await
    }
}

/// Nova expects user data base64 encoded
pub fn encode_user_data(user_data: &str) -> String {
    STANDARD.encode(user_data.as_bytes())
}

/// Parent group ids are integers on nova-network and UUIDs on neutron
pub fn group_id_value(id: &str) -> serde_json::Value {
    id.parse::<u64>()
        .map(serde_json::Value::from)
        .unwrap_or_else(|_| serde_json::Value::from(id))
}
