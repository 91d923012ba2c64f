//! Gateway between the orchestration engine and a tool server.
//!
//! The gateway owns connection state, caches the tool and resource catalogs
//! through a shared [`ResourceCache`], and converts tool execution failures
//! into error-flagged [`ToolCallResult`]s instead of surfacing them as `Err`.
//! That containment is what lets a conversation round keep going when a
//! single tool call blows up.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use macrochat::tool_gateway::ToolGateway;
//! use macrochat::tool_transports::HttpToolTransport;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(HttpToolTransport::new("http://localhost:8080/mcp".to_string()));
//! let gateway = ToolGateway::new(transport);
//! gateway.connect().await?;
//! let tools = gateway.list_tools(true).await?;
//! println!("{} tools available", tools.len());
//! # Ok(())
//! # }
//! ```

use crate::macrochat::resource_cache::ResourceCache;
use crate::macrochat::tool_protocol::{
    GatewayError, ResourceDescriptor, ToolCall, ToolCallResult, ToolSpec, ToolTransport,
};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Cache key for the tool catalog.
///
/// The keys are fixed strings, so two gateways sharing one cache also share
/// catalogs. Give each gateway its own cache when the servers differ.
pub const TOOLS_KEY: &str = "mcp:tools";
/// Cache key for the resource catalog.
pub const RESOURCES_KEY: &str = "mcp:resources";

/// A cached catalog snapshot.
#[derive(Debug, Clone)]
pub enum CatalogEntry {
    Tools(Vec<ToolSpec>),
    Resources(Vec<ResourceDescriptor>),
}

/// Connection manager and execution front-end for one tool server.
pub struct ToolGateway {
    transport: Arc<dyn ToolTransport>,
    cache: Arc<ResourceCache<CatalogEntry>>,
    connected: RwLock<bool>,
}

impl ToolGateway {
    /// Create a gateway with its own catalog cache (default TTL).
    pub fn new(transport: Arc<dyn ToolTransport>) -> Self {
        ToolGateway {
            transport,
            cache: Arc::new(ResourceCache::default()),
            connected: RwLock::new(false),
        }
    }

    /// Create a gateway that stores catalogs in an existing cache.
    pub fn new_with_cache(
        transport: Arc<dyn ToolTransport>,
        cache: Arc<ResourceCache<CatalogEntry>>,
    ) -> Self {
        ToolGateway {
            transport,
            cache,
            connected: RwLock::new(false),
        }
    }

    /// Perform the initialize handshake and mark the gateway connected.
    ///
    /// Returns [`GatewayError::AlreadyConnected`] if called twice without an
    /// intervening [`disconnect`](Self::disconnect).
    pub async fn connect(&self) -> Result<(), GatewayError> {
        {
            let connected = self.connected.read().await;
            if *connected {
                return Err(GatewayError::AlreadyConnected);
            }
        }

        self.transport.initialize().await?;

        let mut connected = self.connected.write().await;
        *connected = true;

        // Stale catalogs from a previous session must not leak in.
        self.cache.invalidate(TOOLS_KEY).await;
        self.cache.invalidate(RESOURCES_KEY).await;

        log::info!("connected to tool server via {}", self.transport.transport_name());
        Ok(())
    }

    /// Shut the transport down and mark the gateway disconnected.
    ///
    /// Calling this while already disconnected is a no-op. Shutdown failures
    /// are logged and swallowed; the gateway still ends up disconnected.
    pub async fn disconnect(&self) {
        {
            let connected = self.connected.read().await;
            if !*connected {
                return;
            }
        }

        if let Err(e) = self.transport.shutdown().await {
            log::warn!("tool server shutdown reported an error: {}", e);
        }

        let mut connected = self.connected.write().await;
        *connected = false;

        self.cache.invalidate(TOOLS_KEY).await;
        self.cache.invalidate(RESOURCES_KEY).await;

        log::info!("disconnected from tool server");
    }

    pub async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    /// Fetch the tool catalog, serving from cache when `use_cache` is set.
    ///
    /// Catalog failures are fatal: the engine cannot build a provider request
    /// without knowing which tools exist.
    pub async fn list_tools(&self, use_cache: bool) -> Result<Vec<ToolSpec>, GatewayError> {
        if !self.is_connected().await {
            return Err(GatewayError::NotConnected);
        }

        if use_cache {
            if let Some(CatalogEntry::Tools(tools)) = self.cache.get(TOOLS_KEY).await {
                log::debug!("tool catalog served from cache ({} tools)", tools.len());
                return Ok(tools);
            }
        }

        let tools = self.transport.list_tools().await?;
        self.cache
            .set(TOOLS_KEY.to_string(), CatalogEntry::Tools(tools.clone()))
            .await;
        log::info!("fetched tool catalog: {} tools", tools.len());
        Ok(tools)
    }

    /// Fetch the resource catalog, serving from cache when `use_cache` is set.
    ///
    /// Unlike tools, a resource listing failure degrades to an empty catalog
    /// with a warning. Resources are optional context; their absence should
    /// not kill a conversation round.
    pub async fn list_resources(
        &self,
        use_cache: bool,
    ) -> Result<Vec<ResourceDescriptor>, GatewayError> {
        if !self.is_connected().await {
            return Err(GatewayError::NotConnected);
        }

        if use_cache {
            if let Some(CatalogEntry::Resources(resources)) = self.cache.get(RESOURCES_KEY).await {
                log::debug!(
                    "resource catalog served from cache ({} resources)",
                    resources.len()
                );
                return Ok(resources);
            }
        }

        match self.transport.list_resources().await {
            Ok(resources) => {
                self.cache
                    .set(
                        RESOURCES_KEY.to_string(),
                        CatalogEntry::Resources(resources.clone()),
                    )
                    .await;
                log::info!("fetched resource catalog: {} resources", resources.len());
                Ok(resources)
            }
            Err(e) => {
                log::warn!("resource listing failed, continuing without resources: {}", e);
                Ok(Vec::new())
            }
        }
    }

    /// Execute one tool call. Never returns `Err`.
    ///
    /// Every failure mode (disconnected gateway, transport error, server-side
    /// execution error) is folded into a [`ToolCallResult`] with `is_error`
    /// set, so the caller can hand the outcome back to the model verbatim.
    pub async fn call_tool(&self, call: &ToolCall) -> ToolCallResult {
        if !self.is_connected().await {
            log::error!(
                "tool '{}' invoked while disconnected (call {})",
                call.name,
                call.id
            );
            return ToolCallResult::failure(call, GatewayError::NotConnected.to_string());
        }

        log::debug!("executing tool '{}' (call {})", call.name, call.id);

        match self.transport.call_tool(&call.name, &call.arguments).await {
            Ok(text) => ToolCallResult::success(call, serde_json::Value::String(text)),
            Err(e) => {
                log::error!("tool '{}' failed: {}", call.name, e);
                ToolCallResult::failure(call, e.to_string())
            }
        }
    }

    /// Read a resource's textual content by URI.
    pub async fn read_resource(&self, uri: &str) -> Result<String, GatewayError> {
        if !self.is_connected().await {
            return Err(GatewayError::NotConnected);
        }
        self.transport.read_resource(uri).await
    }

    /// Number of tools in the cached catalog, if a snapshot is live.
    pub async fn tools_count(&self) -> Option<usize> {
        match self.cache.get(TOOLS_KEY).await {
            Some(CatalogEntry::Tools(tools)) => Some(tools.len()),
            _ => None,
        }
    }

    /// Number of resources in the cached catalog, if a snapshot is live.
    pub async fn resources_count(&self) -> Option<usize> {
        match self.cache.get(RESOURCES_KEY).await {
            Some(CatalogEntry::Resources(resources)) => Some(resources.len()),
            _ => None,
        }
    }

    /// The catalog cache, exposed for TTL tuning and diagnostics.
    pub fn cache(&self) -> &Arc<ResourceCache<CatalogEntry>> {
        &self.cache
    }

    pub fn transport_name(&self) -> &str {
        self.transport.transport_name()
    }
}
