//! Loading, resolving and publishing configuration snapshots.
//!
//! A [`ConfigResolver`] owns the current [`BuildConfig`] behind an
//! `RwLock<Arc<_>>`. Every [`ConfigResolver::load`] builds a complete new
//! snapshot from disk before swapping it in, so readers holding an earlier
//! [`Arc`] keep a consistent view while a reload is in progress. Subscribers
//! are notified after each load, including loads that degraded to an empty
//! configuration.

use super::merge::{INHERIT_KEY, merge_configuration};
use super::model::{BuildConfig, DEFAULT_PRODUCT_NAME, is_private};
use crate::substitute::{Params, substitute, substitute_str};
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, warn};

/// Parameter holding the workspace root.
pub const WORKSPACE_ROOT_PARAM: &str = "workspaceRoot";
/// Parameter holding the substituted toolchain root.
pub const TOOLCHAIN_ROOT_PARAM: &str = "toolchainRoot";
/// Parameter holding the substituted target source root.
pub const SOURCE_ROOT_PARAM: &str = "sourceRoot";
/// Parameter holding the configuration's product file.
pub const PRODUCT_FILE_PARAM: &str = "productFile";

/// Whether a load applies inheritance and substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Processing {
    /// Merge inherited configurations and substitute placeholders.
    #[default]
    Resolve,
    /// Publish the document exactly as parsed.
    Raw,
}

/// Handle returned by [`ConfigResolver::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&Arc<BuildConfig>) + Send + Sync>;

/// Loads a configuration file and publishes resolved snapshots.
pub struct ConfigResolver {
    workspace_root: Utf8PathBuf,
    config_path: Utf8PathBuf,
    processing: Processing,
    environment: Params,
    current: RwLock<Arc<BuildConfig>>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
}

impl fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("workspace_root", &self.workspace_root)
            .field("config_path", &self.config_path)
            .field("processing", &self.processing)
            .finish_non_exhaustive()
    }
}

impl ConfigResolver {
    /// Create a resolver for `config_path` inside `workspace_root`.
    ///
    /// Relative config paths are taken relative to the workspace root. The
    /// substitution environment is the process environment plus
    /// `workspaceRoot`. Nothing is read until [`ConfigResolver::load`].
    #[must_use]
    pub fn new(workspace_root: impl Into<Utf8PathBuf>, config_path: impl AsRef<Utf8Path>) -> Self {
        let workspace_root = workspace_root.into();
        let config_path = workspace_root.join(config_path.as_ref());
        Self {
            environment: Params::from_process_env()
                .with(WORKSPACE_ROOT_PARAM, workspace_root.as_str()),
            workspace_root,
            config_path,
            processing: Processing::default(),
            current: RwLock::new(Arc::new(BuildConfig::default())),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Replace the substitution environment. `workspaceRoot` is always set.
    #[must_use]
    pub fn with_environment(mut self, environment: Params) -> Self {
        self.environment = environment.with(WORKSPACE_ROOT_PARAM, self.workspace_root.as_str());
        self
    }

    /// Choose whether loads resolve inheritance and placeholders.
    #[must_use]
    pub fn with_processing(mut self, processing: Processing) -> Self {
        self.processing = processing;
        self
    }

    /// Workspace root used for `${workspaceRoot}`.
    #[must_use]
    pub fn workspace_root(&self) -> &Utf8Path {
        &self.workspace_root
    }

    /// Absolute path of the configuration file.
    #[must_use]
    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }

    /// Read, parse and resolve the configuration file, then publish it.
    ///
    /// Unreadable files, parse failures and non-object roots publish an empty
    /// configuration and log a warning.
    pub fn load(&self) -> Arc<BuildConfig> {
        let document = match fs::read_to_string(&self.config_path) {
            Ok(text) => parse_document(&text, &self.config_path),
            Err(err) => {
                warn!(path = %self.config_path, error = %err, "configuration file is unreadable");
                Map::new()
            }
        };
        self.publish(self.build(document))
    }

    /// Parse and resolve `text` as if it had been read from the config file.
    pub fn load_str(&self, text: &str) -> Arc<BuildConfig> {
        self.publish(self.build(parse_document(text, &self.config_path)))
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<BuildConfig> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Register `listener` to run after every load.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Arc<BuildConfig>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    fn build(&self, document: Map<String, Value>) -> BuildConfig {
        let document = match self.processing {
            Processing::Resolve => {
                resolve_document(document, &self.environment, &self.workspace_root)
            }
            Processing::Raw => document,
        };
        BuildConfig::from_value(Value::Object(document))
    }

    fn publish(&self, config: BuildConfig) -> Arc<BuildConfig> {
        let next = Arc::new(config);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&next);
        debug!(
            targets = next.targets.len(),
            toolchains = next.toolchains.len(),
            "published configuration"
        );
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&next);
        }
        next
    }
}

fn parse_document(text: &str, path: &Utf8Path) -> Map<String, Value> {
    match json5::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(%path, kind = value_kind(&other), "configuration root is not an object");
            Map::new()
        }
        Err(err) => {
            warn!(%path, error = %err, "configuration file is malformed");
            Map::new()
        }
    }
}

const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Apply inheritance and substitution to a parsed document.
///
/// Toolchains are substituted against `environment` plus their own
/// `${toolchainRoot}`. Each public target then has its configurations merged
/// with their `inherit` chains, its post-build tasks substituted with
/// `${productFile}`, and finally the whole target substituted against the
/// environment extended with `${toolchainRoot}` and `${sourceRoot}`. Private
/// targets are left untouched.
#[must_use]
pub fn resolve_document(
    mut document: Map<String, Value>,
    environment: &Params,
    workspace_root: &Utf8Path,
) -> Map<String, Value> {
    if let Some(Value::Object(toolchains)) = document.get_mut("toolchains") {
        for toolchain in toolchains.values_mut() {
            let root = string_field(toolchain, "root")
                .map(|root| substitute_str(root, environment))
                .unwrap_or_default();
            let params = environment.clone().with(TOOLCHAIN_ROOT_PARAM, root);
            *toolchain = substitute(toolchain, &params);
        }
    }

    let toolchain_roots: HashMap<String, String> = match document.get("toolchains") {
        Some(Value::Object(toolchains)) => toolchains
            .iter()
            .filter_map(|(name, tc)| Some((name.clone(), string_field(tc, "root")?.to_owned())))
            .collect(),
        _ => HashMap::new(),
    };

    if let Some(Value::Object(targets)) = document.get_mut("targets") {
        for (name, target) in targets.iter_mut() {
            if is_private(name) || !target.is_object() {
                continue;
            }
            *target = resolve_target(target, environment, &toolchain_roots, workspace_root);
        }
    }
    document
}

fn resolve_target(
    target: &Value,
    environment: &Params,
    toolchain_roots: &HashMap<String, String>,
    workspace_root: &Utf8Path,
) -> Value {
    let toolchain_root = string_field(target, "toolchain")
        .and_then(|name| toolchain_roots.get(name))
        .cloned()
        .unwrap_or_default();
    let mut params = environment.clone().with(TOOLCHAIN_ROOT_PARAM, toolchain_root);
    let source_root = string_field(target, "sourceRoot")
        .map(|root| substitute_str(root, &params))
        .unwrap_or_default();
    params.insert(SOURCE_ROOT_PARAM, source_root);

    let product_name = string_field(target, "productName")
        .map_or_else(|| DEFAULT_PRODUCT_NAME.to_owned(), |n| substitute_str(n, &params));

    let mut target = target.clone();
    if let Some(Value::Object(configurations)) = target.get_mut("configurations") {
        let merged = resolve_inheritance(configurations);
        for (name, mut configuration) in merged {
            if !is_private(&name) {
                substitute_tasks(&mut configuration, &params, &product_name, workspace_root);
            }
            configurations.insert(name, configuration);
        }
    }
    substitute(&target, &params)
}

fn substitute_tasks(
    configuration: &mut Value,
    params: &Params,
    product_name: &str,
    workspace_root: &Utf8Path,
) {
    let product_dir = string_field(configuration, "productDir")
        .map(|dir| substitute_str(dir, params))
        .unwrap_or_default();
    let product_file = product_file(&product_dir, product_name, workspace_root);
    if let Some(tasks) = configuration.get_mut("postBuildTasks") {
        let task_params = params.clone().with(PRODUCT_FILE_PARAM, product_file.as_str());
        *tasks = substitute(tasks, &task_params);
    }
}

/// Join `product_name` onto `product_dir`, made relative to the workspace
/// root when it lies inside it.
///
/// ```
/// use camino::Utf8Path;
/// use crossbuild::config::product_file;
///
/// let root = Utf8Path::new("/work");
/// assert_eq!(product_file("/work/build/debug", "app", root).as_str(), "build/debug/app");
/// assert_eq!(product_file("/elsewhere", "app", root).as_str(), "/elsewhere/app");
/// assert_eq!(product_file("", "app", root).as_str(), "app");
/// ```
#[must_use]
pub fn product_file(product_dir: &str, product_name: &str, workspace_root: &Utf8Path) -> Utf8PathBuf {
    let prefix = format!("{workspace_root}{}", std::path::MAIN_SEPARATOR);
    let dir = product_dir.strip_prefix(&prefix).unwrap_or(product_dir);
    Utf8Path::new(dir).join(product_name)
}

/// Merge every configuration with its `inherit` chain.
///
/// Entries are returned in declaration order. A configuration whose chain
/// loops or names an unknown sibling keeps its `inherit` key and is left
/// unmerged.
fn resolve_inheritance(configurations: &Map<String, Value>) -> Vec<(String, Value)> {
    let mut resolved = HashMap::new();
    configurations
        .keys()
        .map(|name| {
            let mut chain = Vec::new();
            let value = resolve_configuration(name, configurations, &mut resolved, &mut chain)
                .unwrap_or(Value::Null);
            (name.clone(), value)
        })
        .collect()
}

fn resolve_configuration<'a>(
    name: &'a str,
    configurations: &'a Map<String, Value>,
    resolved: &mut HashMap<String, Value>,
    chain: &mut Vec<&'a str>,
) -> Option<Value> {
    if let Some(done) = resolved.get(name) {
        return Some(done.clone());
    }
    let raw = configurations.get(name)?;
    let value = match string_field(raw, INHERIT_KEY) {
        None => raw.clone(),
        Some(parent) if parent == name || chain.contains(&parent) => {
            warn!(configuration = name, parent, "configuration inheritance forms a cycle");
            raw.clone()
        }
        Some(parent) => {
            chain.push(name);
            let base = resolve_configuration(parent, configurations, resolved, chain);
            chain.pop();
            match base {
                Some(base) if base.get(INHERIT_KEY).is_none() => merge_configuration(&base, raw),
                Some(_) => raw.clone(),
                None => {
                    warn!(configuration = name, parent, "inherited configuration does not exist");
                    raw.clone()
                }
            }
        }
    };
    resolved.insert(name.to_owned(), value.clone());
    Some(value)
}

fn string_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}
