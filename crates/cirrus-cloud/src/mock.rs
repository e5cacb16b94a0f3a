//! In-memory backend for tests
//!
//! `MockCloud` keeps servers, security groups, images, flavors and stacks in
//! shared state so that handles observe each other's mutations, the way they
//! would against a real provider. Status changes are scripted per server and
//! per stack; every remote-style call is appended to a call log.

use crate::dns::DnsRegistrar;
use crate::error::{CloudError, ResourceKind, Result};
use crate::instance::{Instance, parse_launch_time};
use crate::provider::{
    Cloud, CreateInstance, Flavor, Image, SecurityGroup, balanced_az, unique_by_name,
};
use crate::stack::{Stack, StackResource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cirrus_config::SecurityRuleSpec;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

pub const MOCK_TENANT: &str = "mock-tenant";
pub const MOCK_AZ: &str = "mock-az";
const RUNNING: &str = "ACTIVE";
const FAILED: &[&str] = &["ERROR"];
const CREATED_AT: &str = "2024-01-01T00:00:00Z";

/// Server as stored by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockServer {
    pub id: String,
    pub name: String,
    pub zone: String,
    pub image_id: String,
    pub flavor_id: String,
    pub status: String,
    pub tags: BTreeMap<String, String>,
    pub security_groups: Vec<String>,
    pub addresses: Vec<String>,
    pub key_name: Option<String>,
    pub user_data: Option<String>,
    pub created: String,
}

/// Scripted outcome of one stack refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackScript {
    Status(&'static str),
    /// The stack disappears; the refresh fails with `ResourceGone`
    Gone,
}

#[derive(Debug, Clone)]
struct MockStackState {
    id: String,
    name: String,
    status: String,
    members: Vec<String>,
    resources: Vec<StackResource>,
    script: VecDeque<StackScript>,
}

#[derive(Debug, Default)]
struct MockState {
    servers: BTreeMap<String, MockServer>,
    scripts: BTreeMap<String, VecDeque<String>>,
    boot_script: Vec<String>,
    groups: Vec<SecurityGroup>,
    images: Vec<Image>,
    flavors: Vec<Flavor>,
    stacks: BTreeMap<String, MockStackState>,
    rejected_cidrs: BTreeSet<String>,
    next_id: u64,
    calls: Vec<String>,
}

impl MockState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// In-memory cloud backend
#[derive(Debug, Clone)]
pub struct MockCloud {
    region: String,
    azs: Vec<String>,
    state: Arc<Mutex<MockState>>,
}

impl MockCloud {
    pub fn new(region: &str) -> Self {
        let state = MockState {
            boot_script: vec![RUNNING.to_string()],
            ..Default::default()
        };
        Self {
            region: region.to_string(),
            azs: vec![MOCK_AZ.to_string()],
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn with_azs(mut self, azs: &[&str]) -> Self {
        self.azs = azs.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_image(self, name: &str, id: &str) -> Self {
        lock(&self.state).images.push(Image {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_flavor(self, name: &str, id: &str) -> Self {
        lock(&self.state).flavors.push(Flavor {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_security_group(self, name: &str, rules: &[SecurityRuleSpec]) -> Self {
        {
            let mut state = lock(&self.state);
            let id = format!("sg-{}", state.next_id());
            state.groups.push(SecurityGroup {
                id,
                name: name.to_string(),
                description: format!("Security group for {}", MOCK_TENANT),
                rules: rules.to_vec(),
            });
        }
        self
    }

    /// Rule creation for this CIDR fails with a genuine API error
    pub fn reject_cidr(self, cidr: &str) -> Self {
        lock(&self.state).rejected_cidrs.insert(cidr.to_string());
        self
    }

    /// Statuses reported by successive refreshes of newly created servers
    pub fn with_boot_script(self, statuses: &[&str]) -> Self {
        lock(&self.state).boot_script = statuses.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Insert an existing server; returns its id
    pub fn add_server(&self, name: &str, zone: &str, tags: &[(&str, &str)], status: &str) -> String {
        let mut state = lock(&self.state);
        let n = state.next_id();
        let id = format!("srv-{}", n);
        state.servers.insert(
            id.clone(),
            MockServer {
                id: id.clone(),
                name: name.to_string(),
                zone: zone.to_string(),
                image_id: String::new(),
                flavor_id: String::new(),
                status: status.to_string(),
                tags: tags
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                security_groups: Vec::new(),
                addresses: vec![format!("10.0.0.{}", n)],
                key_name: None,
                user_data: None,
                created: CREATED_AT.to_string(),
            },
        );
        id
    }

    /// Statuses reported by the next refreshes of a server
    pub fn script_status(&self, id: &str, statuses: &[&str]) {
        lock(&self.state).scripts.insert(
            id.to_string(),
            statuses.iter().map(|s| s.to_string()).collect(),
        );
    }

    /// Insert a stack whose members are the named servers; returns its id
    pub fn add_stack(
        &self,
        name: &str,
        members: &[&str],
        resources: Vec<StackResource>,
        script: &[StackScript],
    ) -> String {
        let mut state = lock(&self.state);
        let id = format!("stack-{}", state.next_id());
        let members = state
            .servers
            .values()
            .filter(|s| members.contains(&s.name.as_str()))
            .map(|s| s.id.clone())
            .collect();
        state.stacks.insert(
            name.to_string(),
            MockStackState {
                id: id.clone(),
                name: name.to_string(),
                status: "CREATE_COMPLETE".to_string(),
                members,
                resources,
                script: script.iter().copied().collect(),
            },
        );
        id
    }

    /// Handle for an existing server
    pub fn instance(&self, id: &str) -> Option<Box<dyn Instance>> {
        let server = lock(&self.state).servers.get(id)?.clone();
        Some(Box::new(self.handle(server)))
    }

    pub fn server(&self, id: &str) -> Option<MockServer> {
        lock(&self.state).servers.get(id).cloned()
    }

    pub fn servers(&self) -> Vec<MockServer> {
        lock(&self.state).servers.values().cloned().collect()
    }

    pub fn has_stack(&self, name: &str) -> bool {
        lock(&self.state).stacks.contains_key(name)
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn handle(&self, server: MockServer) -> MockInstance {
        MockInstance {
            state: Arc::clone(&self.state),
            region: self.region.clone(),
            server,
        }
    }
}

#[async_trait]
impl Cloud for MockCloud {
    fn name(&self) -> &str {
        "mock"
    }

    fn region(&self) -> &str {
        &self.region
    }

    async fn list_instances(&self) -> Result<Vec<Box<dyn Instance>>> {
        let servers: Vec<MockServer> = {
            let mut state = lock(&self.state);
            state.calls.push("list_servers".to_string());
            state.servers.values().cloned().collect()
        };
        Ok(servers
            .into_iter()
            .map(|s| Box::new(self.handle(s)) as Box<dyn Instance>)
            .collect())
    }

    async fn list_security_groups(&self) -> Result<Vec<SecurityGroup>> {
        let mut state = lock(&self.state);
        state.calls.push("list_security_groups".to_string());
        Ok(state.groups.clone())
    }

    async fn create_security_group(&self, name: &str) -> Result<SecurityGroup> {
        let mut state = lock(&self.state);
        state.calls.push(format!("create_security_group {}", name));
        if state.groups.iter().any(|g| g.name == name) {
            return Err(CloudError::AlreadyExists(format!("security group {}", name)));
        }
        let group = SecurityGroup {
            id: format!("sg-{}", state.next_id()),
            name: name.to_string(),
            description: format!("Security group for {}", MOCK_TENANT),
            rules: Vec::new(),
        };
        state.groups.push(group.clone());
        Ok(group)
    }

    async fn create_security_rule(
        &self,
        group: &SecurityGroup,
        rule: &SecurityRuleSpec,
    ) -> Result<()> {
        let mut state = lock(&self.state);
        state
            .calls
            .push(format!("create_security_rule {} {}", group.name, rule));
        if state.rejected_cidrs.contains(&rule.cidr) {
            return Err(CloudError::Api(format!("Invalid CIDR {}", rule.cidr)));
        }
        let stored = state
            .groups
            .iter_mut()
            .find(|g| g.id == group.id)
            .ok_or_else(|| CloudError::not_found(ResourceKind::SecurityGroup, &group.name))?;
        if stored.rules.contains(rule) {
            return Err(CloudError::AlreadyExists(format!("{} in {}", rule, group.name)));
        }
        stored.rules.push(rule.clone());
        Ok(())
    }

    async fn get_image_by_name(&self, name: &str) -> Result<Image> {
        let images = {
            let mut state = lock(&self.state);
            state.calls.push("list_images".to_string());
            state.images.clone()
        };
        unique_by_name(images, ResourceKind::Image, name, |i| &i.name)
    }

    async fn get_instance_type(&self, name: &str) -> Result<Flavor> {
        let flavors = {
            let mut state = lock(&self.state);
            state.calls.push("list_flavors".to_string());
            state.flavors.clone()
        };
        unique_by_name(flavors, ResourceKind::Flavor, name, |f| &f.name)
    }

    async fn get_available_azs(&self) -> Result<Vec<String>> {
        Ok(self.azs.clone())
    }

    async fn next_az(&self, server_type: &str) -> Result<String> {
        let instances = self.list_instances().await?;
        balanced_az(&self.azs, &instances, server_type)
            .ok_or_else(|| CloudError::Configuration("No availability zones".to_string()))
    }

    async fn create_instance(&self, request: &CreateInstance) -> Result<Box<dyn Instance>> {
        let server = {
            let mut state = lock(&self.state);
            state.calls.push(format!("create_server {}", request.name));
            let n = state.next_id();
            let id = format!("srv-{}", n);
            let server = MockServer {
                id: id.clone(),
                name: request.name.clone(),
                zone: request.zone.clone(),
                image_id: request.image_id.clone(),
                flavor_id: request.flavor_id.clone(),
                status: "BUILD".to_string(),
                tags: BTreeMap::new(),
                security_groups: request.security_groups.clone(),
                addresses: vec![format!("10.0.0.{}", n)],
                key_name: request.key_name.clone(),
                user_data: request.user_data.clone(),
                created: CREATED_AT.to_string(),
            };
            let script = state.boot_script.iter().cloned().collect();
            state.scripts.insert(id.clone(), script);
            state.servers.insert(id, server.clone());
            server
        };
        Ok(Box::new(self.handle(server)))
    }

    async fn get_stack(&self, name: &str) -> Result<Box<dyn Stack>> {
        let snapshot = {
            let mut state = lock(&self.state);
            state.calls.push(format!("get_stack {}", name));
            state
                .stacks
                .get(name)
                .cloned()
                .ok_or_else(|| CloudError::not_found(ResourceKind::Stack, name))?
        };
        Ok(Box::new(MockStack {
            cloud: self.clone(),
            stack: snapshot,
        }))
    }
}

/// Handle to a mock server
pub struct MockInstance {
    state: Arc<Mutex<MockState>>,
    region: String,
    server: MockServer,
}

impl MockInstance {
    fn refresh(&mut self, advance: bool) -> Result<()> {
        let mut state = lock(&self.state);
        let id = self.server.id.clone();
        state.calls.push(format!("get_server {}", id));

        let next = if advance {
            state.scripts.get_mut(&id).and_then(|s| s.pop_front())
        } else {
            None
        };
        let server = state
            .servers
            .get_mut(&id)
            .ok_or_else(|| CloudError::ResourceGone(format!("server {}", id)))?;
        if let Some(status) = next {
            server.status = status;
        }
        self.server = server.clone();
        Ok(())
    }

    fn with_server<F>(&self, call: String, f: F) -> Result<()>
    where
        F: FnOnce(&mut MockServer),
    {
        let mut state = lock(&self.state);
        state.calls.push(call);
        let server = state
            .servers
            .get_mut(&self.server.id)
            .ok_or_else(|| CloudError::ResourceGone(format!("server {}", self.server.id)))?;
        f(server);
        Ok(())
    }
}

#[async_trait]
impl Instance for MockInstance {
    fn id(&self) -> &str {
        &self.server.id
    }

    fn name(&self) -> &str {
        &self.server.name
    }

    fn tags(&self) -> &BTreeMap<String, String> {
        &self.server.tags
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn security_groups(&self) -> Vec<String> {
        self.server.security_groups.clone()
    }

    fn availability_zone(&self) -> &str {
        &self.server.zone
    }

    async fn instance_type(&self) -> Result<String> {
        let state = lock(&self.state);
        state
            .flavors
            .iter()
            .find(|f| f.id == self.server.flavor_id)
            .map(|f| f.name.clone())
            .ok_or_else(|| CloudError::not_found(ResourceKind::Flavor, &self.server.flavor_id))
    }

    fn launch_time(&self) -> Result<DateTime<Utc>> {
        parse_launch_time(&self.server.created)
    }

    fn status(&self) -> &str {
        &self.server.status
    }

    fn running_state(&self) -> &str {
        RUNNING
    }

    fn failed_states(&self) -> &[&str] {
        FAILED
    }

    fn internal_address(&self) -> Result<String> {
        self.server
            .addresses
            .first()
            .cloned()
            .ok_or_else(|| CloudError::Api(format!("{} has no private address", self.server.name)))
    }

    async fn update(&mut self) -> Result<String> {
        self.refresh(true)?;
        Ok(self.server.status.clone())
    }

    async fn add_tag(&mut self, key: &str, value: &str) -> Result<()> {
        let call = format!("set_meta {} {}={}", self.server.id, key, value);
        self.with_server(call, |s| {
            s.tags.insert(key.to_string(), value.to_string());
        })?;
        self.refresh(false)
    }

    async fn set_name(&mut self, name: &str) -> Result<()> {
        let call = format!("update_server {} name={}", self.server.id, name);
        self.with_server(call, |s| s.name = name.to_string())?;
        self.refresh(false)
    }

    async fn terminate(&self) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push(format!("delete_server {}", self.server.id));
        state
            .servers
            .remove(&self.server.id)
            .map(|_| ())
            .ok_or_else(|| CloudError::not_found(ResourceKind::Instance, &self.server.id))
    }
}

/// Handle to a mock stack
pub struct MockStack {
    cloud: MockCloud,
    stack: MockStackState,
}

#[async_trait]
impl Stack for MockStack {
    fn id(&self) -> &str {
        &self.stack.id
    }

    fn name(&self) -> &str {
        &self.stack.name
    }

    fn status(&self) -> &str {
        &self.stack.status
    }

    fn is_complete(&self) -> bool {
        self.stack.status == "DELETE_COMPLETE"
    }

    fn is_failed(&self) -> bool {
        self.stack.status == "DELETE_FAILED"
    }

    fn resources(&self) -> &[StackResource] {
        &self.stack.resources
    }

    async fn refresh(&mut self) -> Result<()> {
        let mut state = lock(&self.cloud.state);
        let name = self.stack.name.clone();
        state.calls.push(format!("get_stack {}", name));

        let gone = || CloudError::ResourceGone(format!("stack {}", name));
        let stored = state.stacks.get_mut(&name).ok_or_else(gone)?;
        match stored.script.pop_front() {
            Some(StackScript::Status(status)) => stored.status = status.to_string(),
            Some(StackScript::Gone) => {
                state.stacks.remove(&name);
                return Err(gone());
            }
            None => {}
        }
        self.stack = stored.clone();
        Ok(())
    }

    async fn get_instances(&self) -> Result<Vec<Box<dyn Instance>>> {
        let servers: Vec<MockServer> = {
            let state = lock(&self.cloud.state);
            self.stack
                .members
                .iter()
                .filter_map(|id| state.servers.get(id).cloned())
                .collect()
        };
        Ok(servers
            .into_iter()
            .map(|s| Box::new(self.cloud.handle(s)) as Box<dyn Instance>)
            .collect())
    }

    async fn delete(&self) -> Result<()> {
        let mut state = lock(&self.cloud.state);
        state.calls.push(format!("delete_stack {}", self.stack.name));
        let stored = state
            .stacks
            .get_mut(&self.stack.name)
            .ok_or_else(|| CloudError::ResourceGone(format!("stack {}", self.stack.name)))?;
        stored.status = "DELETE_IN_PROGRESS".to_string();
        Ok(())
    }
}

/// In-memory DNS registrar
#[derive(Debug, Default)]
pub struct MemoryRegistrar {
    records: Mutex<BTreeMap<String, String>>,
    failing: BTreeSet<String>,
}

impl MemoryRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call for `name` fails
    pub fn fail_for(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn with_record(self, name: &str, ip: &str) -> Self {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), ip.to_string());
        self
    }

    pub fn records(&self) -> BTreeMap<String, String> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn check(&self, name: &str) -> Result<()> {
        if self.failing.contains(name) {
            return Err(CloudError::Api(format!("DNS update for {} failed", name)));
        }
        Ok(())
    }
}

#[async_trait]
impl DnsRegistrar for MemoryRegistrar {
    async fn replace_a_record(&self, ip: &str, name: &str) -> Result<()> {
        self.check(name)?;
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), ip.to_string());
        Ok(())
    }

    async fn delete_records_for(&self, name: &str) -> Result<()> {
        self.check(name)?;
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
        Ok(())
    }
}
