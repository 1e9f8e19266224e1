//! Named sink prototypes resolved from declarative configuration.
//!
//! A [`SinkRegistry`] maps the `name` of a `writes` entry to a
//! [`SinkPrototype`]. Resolving a name either builds a fresh, independent
//! sink with the entry's settings overlaid on the prototype's base
//! configuration, or hands back a shared instance when the sink cannot be
//! copied.

use std::{collections::BTreeMap, fmt, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    builders::{SinkBuildError, SinkBuilderTrait, WebSocketSinkBuilder},
    config::ConfigError,
    rotating::{RollingFileConfig, RollingFileSink},
    sink::TetherSinkTrait,
    stream_sink::{ConsoleConfig, ConsoleSink},
    websocket_sink::WebSocketSinkConfig,
};

/// Source of sinks for one registry name.
pub trait SinkPrototype: Send + Sync {
    /// Produce the sink for a `writes` entry called `name`.
    fn instantiate(
        &self,
        name: &str,
        settings: Option<&Value>,
    ) -> Result<Arc<dyn TetherSinkTrait>, ConfigError>;
}

type BuildFn<C> = dyn Fn(C) -> Result<Arc<dyn TetherSinkTrait>, SinkBuildError> + Send + Sync;

/// Prototype that builds a new sink from a serde configuration.
///
/// Entry settings are merged key by key over the base configuration, so an
/// entry only needs to name the fields it changes.
pub struct ConfigPrototype<C> {
    base: C,
    build: Box<BuildFn<C>>,
}

impl<C> ConfigPrototype<C>
where
    C: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new<F>(base: C, build: F) -> Self
    where
        F: Fn(C) -> Result<Arc<dyn TetherSinkTrait>, SinkBuildError> + Send + Sync + 'static,
    {
        Self {
            base,
            build: Box::new(build),
        }
    }

    pub fn base(&self) -> &C {
        &self.base
    }

    /// Base configuration with `settings` applied.
    pub fn overlay(&self, settings: Option<&Value>) -> Result<C, serde_json::Error> {
        let settings = match settings {
            None | Some(Value::Null) => return Ok(self.base.clone()),
            Some(settings) => settings,
        };
        let Value::Object(overrides) = settings else {
            return serde_json::from_value(settings.clone());
        };
        let mut merged = serde_json::to_value(&self.base)?;
        if let Value::Object(fields) = &mut merged {
            fields.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        serde_json::from_value(merged)
    }
}

impl<C> SinkPrototype for ConfigPrototype<C>
where
    C: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn instantiate(
        &self,
        name: &str,
        settings: Option<&Value>,
    ) -> Result<Arc<dyn TetherSinkTrait>, ConfigError> {
        let config = self
            .overlay(settings)
            .map_err(|source| ConfigError::InvalidSinkSettings {
                name: name.to_owned(),
                source,
            })?;
        (self.build)(config).map_err(|source| ConfigError::SinkBuild {
            name: name.to_owned(),
            source,
        })
    }
}

/// Prototype wrapping a live sink.
///
/// Each resolution yields the sink's [`duplicate`](TetherSinkTrait::duplicate)
/// when it has one and the instance itself otherwise. Settings cannot be
/// applied to a live sink and are rejected.
pub struct InstancePrototype {
    sink: Arc<dyn TetherSinkTrait>,
}

impl InstancePrototype {
    pub fn new(sink: Arc<dyn TetherSinkTrait>) -> Self {
        Self { sink }
    }
}

impl SinkPrototype for InstancePrototype {
    fn instantiate(
        &self,
        name: &str,
        settings: Option<&Value>,
    ) -> Result<Arc<dyn TetherSinkTrait>, ConfigError> {
        if settings.is_some_and(|value| !value.is_null()) {
            return Err(ConfigError::SharedSinkSettings(name.to_owned()));
        }
        Ok(self
            .sink
            .duplicate()
            .unwrap_or_else(|| Arc::clone(&self.sink)))
    }
}

/// Name-to-prototype table owned by the application.
#[derive(Clone, Default)]
pub struct SinkRegistry {
    prototypes: BTreeMap<String, Arc<dyn SinkPrototype>>,
}

impl SinkRegistry {
    /// Registry with no entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry providing `websocket`, `rolling_file` and `console`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_config(
            "websocket",
            WebSocketSinkConfig::default(),
            |config: WebSocketSinkConfig| WebSocketSinkBuilder::from_config(config).build_sink(),
        );
        registry.register_config(
            "rolling_file",
            RollingFileConfig::default(),
            |config: RollingFileConfig| {
                Ok(Arc::new(RollingFileSink::open(config)?) as Arc<dyn TetherSinkTrait>)
            },
        );
        registry.register_config(
            "console",
            ConsoleConfig::default(),
            |config: ConsoleConfig| {
                Ok(Arc::new(ConsoleSink::from_config(config)) as Arc<dyn TetherSinkTrait>)
            },
        );
        registry
    }

    /// Store `prototype` under `name`, returning any previous entry.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        prototype: Arc<dyn SinkPrototype>,
    ) -> Option<Arc<dyn SinkPrototype>> {
        self.prototypes.insert(name.into(), prototype)
    }

    /// Register a live sink; see [`InstancePrototype`].
    pub fn register_sink(
        &mut self,
        name: impl Into<String>,
        sink: Arc<dyn TetherSinkTrait>,
    ) -> Option<Arc<dyn SinkPrototype>> {
        self.register(name, Arc::new(InstancePrototype::new(sink)))
    }

    /// Register a configuration-driven prototype; see [`ConfigPrototype`].
    pub fn register_config<C, F>(
        &mut self,
        name: impl Into<String>,
        base: C,
        build: F,
    ) -> Option<Arc<dyn SinkPrototype>>
    where
        C: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: Fn(C) -> Result<Arc<dyn TetherSinkTrait>, SinkBuildError> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(ConfigPrototype::new(base, build)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.prototypes.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.prototypes.keys().map(String::as_str)
    }

    /// Produce the sink registered under `name`.
    pub fn resolve(
        &self,
        name: &str,
        settings: Option<&Value>,
    ) -> Result<Arc<dyn TetherSinkTrait>, ConfigError> {
        let prototype = self
            .prototypes
            .get(name)
            .ok_or_else(|| ConfigError::UnknownSink(name.to_owned()))?;
        prototype.instantiate(name, settings)
    }
}

impl fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}
