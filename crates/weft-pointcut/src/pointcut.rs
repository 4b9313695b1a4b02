//! Pointcut declarations.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use weft_core::{InterceptorHandle, Operation, ScopeKey, Target, TypeInfo};

use crate::error::{PointcutError, PointcutResult};
use crate::selector::{Selector, SelectorDimension};

/// How many interceptor instances a pointcut creates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharingMode {
    /// A fresh interceptor per matched target. The target is attached even
    /// when no operation matched, so its role operations stay reachable.
    #[default]
    OnePerTarget,
    /// One interceptor shared by every matched target.
    Shared,
}

type BuildFn = dyn Fn(&Target) -> Result<InterceptorHandle, String> + Send + Sync;

/// Builds interceptors of one type.
#[derive(Clone)]
pub struct InterceptorFactory {
    interceptor_type: String,
    build: Arc<BuildFn>,
}

impl InterceptorFactory {
    /// Create a factory from a fallible constructor.
    #[must_use]
    pub fn new<F>(interceptor_type: impl Into<String>, build: F) -> Self
    where
        F: Fn(&Target) -> Result<InterceptorHandle, String> + Send + Sync + 'static,
    {
        Self {
            interceptor_type: interceptor_type.into(),
            build: Arc::new(build),
        }
    }

    /// A factory always handing out the same, pre-built interceptor.
    #[must_use]
    pub fn instance(interceptor: InterceptorHandle) -> Self {
        let interceptor_type = interceptor.type_name().to_string();
        Self::new(interceptor_type, move |_| Ok(interceptor.clone()))
    }

    /// Type name of the interceptors built.
    #[must_use]
    pub fn interceptor_type(&self) -> &str {
        &self.interceptor_type
    }

    /// Build an interceptor for `target`.
    ///
    /// # Errors
    ///
    /// Returns [`PointcutError::Factory`] when the constructor fails.
    pub fn create(&self, target: &Target) -> PointcutResult<InterceptorHandle> {
        (self.build)(target).map_err(|message| PointcutError::Factory {
            interceptor_type: self.interceptor_type.clone(),
            target: target.to_string(),
            message,
        })
    }
}

impl fmt::Debug for InterceptorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorFactory")
            .field("interceptor_type", &self.interceptor_type)
            .finish_non_exhaustive()
    }
}

/// Factories by interceptor type name.
#[derive(Debug, Default)]
pub struct FactoryRegistry {
    factories: DashMap<String, InterceptorFactory>,
}

impl FactoryRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any previous one for its type.
    pub fn register(&self, factory: InterceptorFactory) -> Option<InterceptorFactory> {
        self.factories
            .insert(factory.interceptor_type().to_string(), factory)
    }

    /// Remove a factory.
    pub fn unregister(&self, interceptor_type: &str) -> Option<InterceptorFactory> {
        self.factories.remove(interceptor_type).map(|(_, f)| f)
    }

    /// Find the factory for an interceptor type.
    ///
    /// # Errors
    ///
    /// Returns [`PointcutError::UnknownFactory`] if none is registered.
    pub fn resolve(&self, interceptor_type: &str) -> PointcutResult<InterceptorFactory> {
        self.factories
            .get(interceptor_type)
            .map(|f| f.value().clone())
            .ok_or_else(|| PointcutError::UnknownFactory(interceptor_type.to_string()))
    }

    /// Start declaring a pointcut for a registered interceptor type.
    ///
    /// # Errors
    ///
    /// Returns [`PointcutError::UnknownFactory`] if the type is unknown.
    pub fn pointcut(&self, interceptor_type: &str) -> PointcutResult<PointcutBuilder> {
        self.resolve(interceptor_type).map(Pointcut::builder)
    }

    /// Number of registered factories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether no factory is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// A declarative rule selecting which operations of which targets an
/// interceptor applies to.
pub struct Pointcut {
    names: Selector,
    types: Selector,
    operations: Selector,
    hosts: Selector,
    factory: InterceptorFactory,
    sharing: SharingMode,
    catch_handler: Option<String>,
    type_cache: DashMap<String, bool>,
    operation_cache: DashMap<(String, bool), Arc<[Arc<Operation>]>>,
    shared: Mutex<Option<InterceptorHandle>>,
    per_target: DashMap<ScopeKey, InterceptorHandle>,
}

impl Pointcut {
    /// Start declaring a pointcut for interceptors built by `factory`.
    #[must_use]
    pub fn builder(factory: InterceptorFactory) -> PointcutBuilder {
        PointcutBuilder {
            names: None,
            types: None,
            operations: None,
            hosts: None,
            factory,
            sharing: SharingMode::default(),
            catch_handler: None,
        }
    }

    /// Target-name selector.
    #[must_use]
    pub fn names(&self) -> &Selector {
        &self.names
    }

    /// Target-type selector.
    #[must_use]
    pub fn types(&self) -> &Selector {
        &self.types
    }

    /// Operation selector.
    #[must_use]
    pub fn operations(&self) -> &Selector {
        &self.operations
    }

    /// Host selector.
    #[must_use]
    pub fn hosts(&self) -> &Selector {
        &self.hosts
    }

    /// Sharing mode.
    #[must_use]
    pub fn sharing(&self) -> SharingMode {
        self.sharing
    }

    /// Catch handler bound to every matched operation, if any.
    #[must_use]
    pub fn catch_handler(&self) -> Option<&str> {
        self.catch_handler.as_deref()
    }

    /// Interceptor type this pointcut installs.
    #[must_use]
    pub fn interceptor_type(&self) -> &str {
        self.factory.interceptor_type()
    }

    /// Whether the type (or a supertype) matches. Cached per type name.
    #[must_use]
    pub fn matches_type(&self, ty: &TypeInfo) -> bool {
        if self.types.is_universal() {
            return true;
        }
        if let Some(hit) = self.type_cache.get(ty.name()) {
            return *hit;
        }
        let matched = self.types.matches_type(ty);
        self.type_cache.insert(ty.name().to_string(), matched);
        matched
    }

    /// Whether the host identity matches.
    #[must_use]
    pub fn matches_host(&self, host: &str) -> bool {
        self.hosts.is_universal() || self.hosts.matches_text(host)
    }

    /// Whether the target's logical name matches.
    ///
    /// Type targets always match: name selectors pick objects, and a type's
    /// shared operations are selected by the type and operation selectors
    /// alone. Unnamed objects only match the universal sentinel.
    #[must_use]
    pub fn matches_name(&self, target: &Target) -> bool {
        if self.names.is_universal() || target.is_type() {
            return true;
        }
        target
            .logical_name()
            .is_some_and(|name| self.names.matches_text(&name))
    }

    /// Operations of the target selected by this pointcut.
    ///
    /// Object targets are matched against instance operations and
    /// constructors, type targets against static operations. The result is
    /// cached per (type name, scope kind), since a type's structure never
    /// changes after preparation.
    #[must_use]
    pub fn matching_operations(&self, target: &Target) -> Arc<[Arc<Operation>]> {
        let ty = target.type_info();
        let key = (ty.name().to_string(), target.is_type());
        if let Some(hit) = self.operation_cache.get(&key) {
            return Arc::clone(hit.value());
        }

        let matched: Arc<[Arc<Operation>]> = ty
            .operations()
            .iter()
            .filter(|op| {
                if target.is_type() {
                    op.is_static()
                } else {
                    !op.is_static()
                }
            })
            .filter(|op| self.operations.matches_operation(ty, op))
            .cloned()
            .collect();

        debug!(
            target: "weft::pointcut",
            type_name = %ty.name(),
            selector = %self.operations,
            matched = matched.len(),
            "computed matching operations"
        );
        self.operation_cache
            .entry(key)
            .or_insert_with(|| Arc::clone(&matched));
        matched
    }

    /// The interceptor to install on `target`, built on first need.
    ///
    /// # Errors
    ///
    /// Propagates factory failures.
    pub fn interceptor_for(&self, target: &Target) -> PointcutResult<InterceptorHandle> {
        match self.sharing {
            SharingMode::Shared => {
                let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(existing) = shared.as_ref() {
                    return Ok(existing.clone());
                }
                let created = self.factory.create(target)?;
                *shared = Some(created.clone());
                Ok(created)
            },
            SharingMode::OnePerTarget => {
                let key = target.scope_key();
                if let Some(existing) = self.per_target.get(&key) {
                    return Ok(existing.value().clone());
                }
                let created = self.factory.create(target)?;
                Ok(self
                    .per_target
                    .entry(key)
                    .or_insert(created)
                    .value()
                    .clone())
            },
        }
    }

    /// Forget the per-target interceptor built for a scope.
    pub fn forget(&self, scope: &ScopeKey) -> Option<InterceptorHandle> {
        self.per_target.remove(scope).map(|(_, h)| h)
    }

    /// Forget every per-target interceptor whose scope fails `keep`.
    /// Returns the interceptors released.
    pub fn release_scopes<F>(&self, keep: F) -> Vec<InterceptorHandle>
    where
        F: Fn(&ScopeKey) -> bool,
    {
        let mut released = Vec::new();
        self.per_target.retain(|scope, handle| {
            if keep(scope) {
                true
            } else {
                released.push(handle.clone());
                false
            }
        });
        released
    }

    /// Number of per-target interceptors currently held.
    #[must_use]
    pub fn per_target_count(&self) -> usize {
        self.per_target.len()
    }
}

impl fmt::Debug for Pointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pointcut")
            .field("interceptor_type", &self.interceptor_type())
            .field("names", &self.names.as_str())
            .field("types", &self.types.as_str())
            .field("operations", &self.operations.as_str())
            .field("hosts", &self.hosts.as_str())
            .field("sharing", &self.sharing)
            .field("catch_handler", &self.catch_handler)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Pointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pointcut {} -> {{{}, {}, {}, {}}}",
            self.interceptor_type(),
            self.names,
            self.types,
            self.operations,
            self.hosts
        )
    }
}

/// Builder for [`Pointcut`]. Every selector defaults to `ALL`.
#[derive(Debug)]
pub struct PointcutBuilder {
    names: Option<String>,
    types: Option<String>,
    operations: Option<String>,
    hosts: Option<String>,
    factory: InterceptorFactory,
    sharing: SharingMode,
    catch_handler: Option<String>,
}

impl PointcutBuilder {
    /// Target-name selector.
    #[must_use]
    pub fn names(mut self, selector: impl Into<String>) -> Self {
        self.names = Some(selector.into());
        self
    }

    /// Target-type selector.
    #[must_use]
    pub fn types(mut self, selector: impl Into<String>) -> Self {
        self.types = Some(selector.into());
        self
    }

    /// Operation selector.
    #[must_use]
    pub fn operations(mut self, selector: impl Into<String>) -> Self {
        self.operations = Some(selector.into());
        self
    }

    /// Host selector.
    #[must_use]
    pub fn hosts(mut self, selector: impl Into<String>) -> Self {
        self.hosts = Some(selector.into());
        self
    }

    /// Sharing mode.
    #[must_use]
    pub fn sharing(mut self, sharing: SharingMode) -> Self {
        self.sharing = sharing;
        self
    }

    /// Bind a catch handler of the interceptor to every matched operation.
    #[must_use]
    pub fn catch_handler(mut self, handler: impl Into<String>) -> Self {
        self.catch_handler = Some(handler.into());
        self
    }

    /// Parse every selector and freeze the pointcut.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found in any selector.
    pub fn build(self) -> PointcutResult<Pointcut> {
        let parse = |text: Option<String>, dimension| match text {
            Some(text) => Selector::parse(&text, dimension),
            None => Ok(Selector::all(dimension)),
        };

        let pointcut = Pointcut {
            names: parse(self.names, SelectorDimension::Name)?,
            types: parse(self.types, SelectorDimension::Type)?,
            operations: parse(self.operations, SelectorDimension::Operation)?,
            hosts: parse(self.hosts, SelectorDimension::Host)?,
            factory: self.factory,
            sharing: self.sharing,
            catch_handler: self.catch_handler,
            type_cache: DashMap::new(),
            operation_cache: DashMap::new(),
            shared: Mutex::new(None),
            per_target: DashMap::new(),
        };
        debug!(target: "weft::pointcut", %pointcut, "new pointcut");
        Ok(pointcut)
    }
}
