//! Keystone, Nova and Heat wire types

use cirrus_cloud::{Flavor, Image, SecurityGroup, StackResource};
use cirrus_config::SecurityRuleSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Heat resource type of a compute server
pub const SERVER_RESOURCE_TYPE: &str = "OS::Nova::Server";

// Keystone v2

#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest {
    pub auth: AuthBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthBody {
    #[serde(rename = "passwordCredentials")]
    pub password_credentials: PasswordCredentials,
    #[serde(rename = "tenantName")]
    pub tenant_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access: Access,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Access {
    pub token: Token,
    #[serde(rename = "serviceCatalog", default)]
    pub service_catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Token {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(rename = "publicURL")]
    pub public_url: String,
}

/// Public URL of `service_type` in `region`, without a trailing slash
pub fn endpoint_for(catalog: &[CatalogEntry], service_type: &str, region: &str) -> Option<String> {
    catalog
        .iter()
        .filter(|entry| entry.service_type == service_type)
        .flat_map(|entry| entry.endpoints.iter())
        .find(|endpoint| endpoint.region.as_deref() == Some(region))
        .map(|endpoint| endpoint.public_url.trim_end_matches('/').to_string())
}

// Nova

#[derive(Debug, Clone, Deserialize)]
pub struct ServerEnvelope {
    pub server: Server,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerList {
    pub servers: Vec<Server>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub addresses: BTreeMap<String, Vec<Address>>,
    pub flavor: FlavorRef,
    pub created: String,
    #[serde(default)]
    pub security_groups: Vec<NamedRef>,
}

impl Server {
    /// First address on the `private` network
    pub fn private_address(&self) -> Option<&str> {
        self.addresses
            .get("private")
            .and_then(|addrs| addrs.first())
            .map(|a| a.addr.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Address {
    pub addr: String,
    #[serde(default)]
    pub version: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FlavorRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedRef {
    pub name: String,
}

/// Only the id comes back from a create
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedServer {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedServerEnvelope {
    pub server: CreatedServer,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateServerBody {
    pub server: NewServer,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewServer {
    pub name: String,
    #[serde(rename = "imageRef")]
    pub image_ref: String,
    #[serde(rename = "flavorRef")]
    pub flavor_ref: String,
    pub availability_zone: String,
    pub security_groups: Vec<NamedRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    /// Base64 encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedResource {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlavorList {
    pub flavors: Vec<NamedResource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlavorEnvelope {
    pub flavor: NamedResource,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageList {
    pub images: Vec<NamedResource>,
}

impl From<NamedResource> for Flavor {
    fn from(r: NamedResource) -> Self {
        Flavor { id: r.id, name: r.name }
    }
}

impl From<NamedResource> for Image {
    fn from(r: NamedResource) -> Self {
        Image { id: r.id, name: r.name }
    }
}

// Nova security groups

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityGroupList {
    pub security_groups: Vec<NovaSecurityGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityGroupEnvelope {
    pub security_group: NovaSecurityGroup,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NovaSecurityGroup {
    /// Integer on nova-network, UUID on neutron
    pub id: serde_json::Value,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: Vec<NovaSecurityRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NovaSecurityRule {
    #[serde(default)]
    pub ip_protocol: Option<String>,
    #[serde(default)]
    pub from_port: Option<i32>,
    #[serde(default)]
    pub to_port: Option<i32>,
    #[serde(default)]
    pub ip_range: IpRange,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpRange {
    #[serde(default)]
    pub cidr: Option<String>,
}

pub fn id_string(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl From<NovaSecurityGroup> for SecurityGroup {
    fn from(g: NovaSecurityGroup) -> Self {
        SecurityGroup {
            id: id_string(&g.id),
            name: g.name,
            description: g.description.unwrap_or_default(),
            rules: g
                .rules
                .into_iter()
                .map(|r| SecurityRuleSpec {
                    ip_protocol: r.ip_protocol.unwrap_or_default(),
                    from_port: r.from_port.unwrap_or(-1),
                    to_port: r.to_port.unwrap_or(-1),
                    cidr: r.ip_range.cidr.unwrap_or_default(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSecurityGroupBody {
    pub security_group: NewSecurityGroup,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSecurityGroup {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSecurityRuleBody {
    pub security_group_rule: NewSecurityRule,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSecurityRule {
    pub parent_group_id: serde_json::Value,
    pub ip_protocol: String,
    pub from_port: i32,
    pub to_port: i32,
    pub cidr: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetadataBody {
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateServerBody {
    pub server: ServerName,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerName {
    pub name: String,
}

// Heat

#[derive(Debug, Clone, Deserialize)]
pub struct StackEnvelope {
    pub stack: HeatStackRecord,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HeatStackRecord {
    pub id: String,
    pub stack_name: String,
    pub stack_status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceList {
    pub resources: Vec<HeatResource>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HeatResource {
    /// Null until the resource has been created
    #[serde(default)]
    pub physical_resource_id: Option<String>,
    pub logical_resource_id: String,
    pub resource_status: String,
    pub resource_type: String,
}

impl HeatResource {
    pub fn physical_id(&self) -> &str {
        self.physical_resource_id.as_deref().unwrap_or_default()
    }

    pub fn is_server(&self) -> bool {
        self.resource_type == SERVER_RESOURCE_TYPE && !self.physical_id().is_empty()
    }
}

impl From<&HeatResource> for StackResource {
    fn from(r: &HeatResource) -> Self {
        StackResource::new(
            r.physical_id(),
            r.logical_resource_id.clone(),
            r.resource_status.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN_RESPONSE: &str = r#"{
        "access": {
            "token": {"id": "tok-123", "expires": "2024-01-02T00:00:00Z"},
            "serviceCatalog": [
                {
                    "type": "compute",
                    "name": "nova",
                    "endpoints": [
                        {"region": "RegionOne", "publicURL": "https://nova.one:8774/v2/t1/"},
                        {"region": "RegionTwo", "publicURL": "https://nova.two:8774/v2/t1"}
                    ]
                },
                {
                    "type": "orchestration",
                    "name": "heat",
                    "endpoints": [
                        {"region": "RegionOne", "publicURL": "https://heat.one:8004/v1/t1"}
                    ]
                }
            ]
        }
    }"#;

    const SERVER: &str = r#"{
        "server": {
            "id": "6f1c",
            "name": "prod-web-001",
            "status": "BUILD",
            "metadata": {"environment": "prod", "owner": "alice"},
            "addresses": {
                "private": [{"addr": "10.0.0.5", "version": 4}],
                "public": [{"addr": "203.0.113.7", "version": 4}]
            },
            "flavor": {"id": "2", "links": []},
            "created": "2024-03-05T07:08:09Z",
            "security_groups": [{"name": "cirrus"}, {"name": "web"}],
            "OS-EXT-STS:task_state": "spawning"
        }
    }"#;

    #[test]
    fn test_parse_token_and_endpoints() {
        let response: TokenResponse = serde_json::from_str(TOKEN_RESPONSE).unwrap();
        let catalog = &response.access.service_catalog;

        assert_eq!(response.access.token.id, "tok-123");
        assert_eq!(
            endpoint_for(catalog, "compute", "RegionOne").as_deref(),
            Some("https://nova.one:8774/v2/t1")
        );
        assert_eq!(
            endpoint_for(catalog, "compute", "RegionTwo").as_deref(),
            Some("https://nova.two:8774/v2/t1")
        );
        assert_eq!(endpoint_for(catalog, "orchestration", "RegionTwo"), None);
    }

    #[test]
    fn test_parse_server() {
        let server = serde_json::from_str::<ServerEnvelope>(SERVER).unwrap().server;

        assert_eq!(server.status, "BUILD");
        assert_eq!(server.flavor.id, "2");
        assert_eq!(server.metadata.get("owner").map(String::as_str), Some("alice"));
        assert_eq!(server.private_address(), Some("10.0.0.5"));
        assert_eq!(server.security_groups.len(), 2);
    }

    #[test]
    fn test_server_without_private_network() {
        let server: Server = serde_json::from_str(
            r#"{"id": "1", "name": "x", "status": "BUILD", "flavor": {"id": "1"},
                "created": "2024-03-05T07:08:09Z", "addresses": {}}"#,
        )
        .unwrap();
        assert_eq!(server.private_address(), None);
        assert!(server.metadata.is_empty());
    }

    #[test]
    fn test_security_group_conversion() {
        let list: SecurityGroupList = serde_json::from_str(
            r#"{"security_groups": [{
                "id": 7,
                "name": "web",
                "description": "Security group for demo",
                "tenant_id": "t1",
                "rules": [
                    {"id": 1, "parent_group_id": 7, "ip_protocol": "tcp",
                     "from_port": 80, "to_port": 80, "ip_range": {"cidr": "0.0.0.0/0"}, "group": {}},
                    {"id": 2, "parent_group_id": 7, "ip_protocol": null,
                     "from_port": null, "to_port": null, "ip_range": {}, "group": {"name": "cirrus"}}
                ]
            }]}"#,
        )
        .unwrap();

        let group: SecurityGroup = list.security_groups.into_iter().next().unwrap().into();
        assert_eq!(group.id, "7");
        assert_eq!(group.rules[0], SecurityRuleSpec::new("tcp", 80, 80, "0.0.0.0/0"));
        assert_eq!(group.rules[1].from_port, -1);
        assert_eq!(group.rules[1].cidr, "");
    }

    #[test]
    fn test_create_server_body_omits_missing_fields() {
        let body = CreateServerBody {
            server: NewServer {
                name: "prod-web-001".into(),
                image_ref: "img".into(),
                flavor_ref: "2".into(),
                availability_zone: "nova".into(),
                security_groups: vec![NamedRef { name: "web".into() }],
                key_name: None,
                user_data: None,
            },
        };
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["server"]["imageRef"], "img");
        assert_eq!(json["server"]["security_groups"][0]["name"], "web");
        assert!(json["server"].get("key_name").is_none());
        assert!(json["server"].get("user_data").is_none());
    }

    #[test]
    fn test_heat_resources() {
        let list: ResourceList = serde_json::from_str(
            r#"{"resources": [
                {"physical_resource_id": "6f1c", "logical_resource_id": "Web",
                 "resource_status": "DELETE_IN_PROGRESS", "resource_type": "OS::Nova::Server"},
                {"physical_resource_id": null, "logical_resource_id": "Db",
                 "resource_status": "INIT_COMPLETE", "resource_type": "OS::Nova::Server"},
                {"physical_resource_id": "net-1", "logical_resource_id": "Net",
                 "resource_status": "DELETE_COMPLETE", "resource_type": "OS::Neutron::Net"}
            ]}"#,
        )
        .unwrap();

        let servers: Vec<&str> = list
            .resources
            .iter()
            .filter(|r| r.is_server())
            .map(|r| r.physical_id())
            .collect();
        assert_eq!(servers, vec!["6f1c"]);

        let resource = StackResource::from(&list.resources[2]);
        assert_eq!(resource.logical_id, "Net");
        assert_eq!(resource.status, "DELETE_COMPLETE");
    }
}
