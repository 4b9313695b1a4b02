//! The weaver facade.

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use weft_chain::{ChainStore, CompositionOrder};
use weft_config::WeaverConfig;
use weft_core::{
    CallError, CallResult, Instance, LifecycleListener, ModuleId, ObjectId, Operation, Target,
    TypeInfo, Wrappee,
};
use weft_dispatch::Dispatcher;
use weft_pointcut::{
    ActivationSummary, FactoryRegistry, InterceptorFactory, Matcher, Pointcut, PointcutBuilder,
    PointcutRegistry,
};

use crate::config_bridge;
use crate::error::{RuntimeError, RuntimeResult};

/// One interception engine: a composition order, a chain store, the
/// pointcut registry feeding it and the dispatcher reading it.
///
/// Everything a weaver needs is injected at construction; two weavers in
/// one process share nothing.
pub struct Weaver {
    order: Arc<CompositionOrder>,
    store: Arc<ChainStore>,
    registry: Arc<PointcutRegistry>,
    dispatcher: Dispatcher,
    factories: FactoryRegistry,
}

impl Weaver {
    /// Build a weaver from an explicit order and host name.
    #[must_use]
    pub fn new(order: CompositionOrder, host: impl Into<String>) -> Self {
        let order = Arc::new(order);
        let store = Arc::new(ChainStore::new());
        let matcher = Matcher::new(Arc::clone(&store), Arc::clone(&order), host);
        let registry = Arc::new(PointcutRegistry::new(matcher));
        let listener: Arc<dyn LifecycleListener> = Arc::clone(&registry) as _;
        let dispatcher = Dispatcher::new(Arc::clone(&store)).with_listener(listener);

        Self {
            order,
            store,
            registry,
            dispatcher,
            factories: FactoryRegistry::new(),
        }
    }

    /// Build a weaver from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &WeaverConfig) -> Self {
        let weaver = Self::new(
            config_bridge::to_composition_order(config),
            config.host.name.clone(),
        );
        info!(
            target: "weft::lifecycle",
            host = %config.host.name,
            order = ?weaver.order.types(),
            placement = ?weaver.order.placement(),
            "weaver created"
        );
        weaver
    }

    /// Load configuration with full precedence and build a weaver from it.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or is invalid.
    pub fn load(file: Option<&Path>) -> RuntimeResult<Self> {
        let resolved = WeaverConfig::load(file)?;
        Ok(Self::from_config(&resolved.config))
    }

    /// The composition order used for every insertion.
    #[must_use]
    pub fn order(&self) -> &Arc<CompositionOrder> {
        &self.order
    }

    /// The chain store.
    #[must_use]
    pub fn store(&self) -> &Arc<ChainStore> {
        &self.store
    }

    /// The matcher pointcuts are applied with.
    #[must_use]
    pub fn matcher(&self) -> &Matcher {
        self.registry.matcher()
    }

    /// The dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The pointcut registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<PointcutRegistry> {
        &self.registry
    }

    /// Interceptor factories known by type name.
    #[must_use]
    pub fn factories(&self) -> &FactoryRegistry {
        &self.factories
    }

    /// Register an interceptor factory, replacing any previous one of the
    /// same type.
    pub fn register_factory(&self, factory: InterceptorFactory) {
        let interceptor_type = factory.interceptor_type().to_string();
        if self.factories.register(factory).is_some() {
            debug!(target: "weft::pointcut", %interceptor_type, "replaced interceptor factory");
        }
    }

    /// Start a pointcut for a registered interceptor type.
    ///
    /// # Errors
    ///
    /// Returns an error if no factory is registered under `interceptor_type`.
    pub fn pointcut(&self, interceptor_type: &str) -> RuntimeResult<PointcutBuilder> {
        Ok(self.factories.pointcut(interceptor_type)?)
    }

    /// Activate `pointcuts` on behalf of `module`.
    pub fn activate(&self, module: ModuleId, pointcuts: Vec<Pointcut>) -> ActivationSummary {
        self.registry.activate(module, pointcuts)
    }

    /// Deactivate `module`, removing every interceptor it installed.
    /// Returns the number of chain entries removed.
    ///
    /// # Errors
    ///
    /// Returns an error if `module` is not active.
    pub fn deactivate(&self, module: ModuleId) -> RuntimeResult<usize> {
        if !self.registry.is_active(module) {
            return Err(RuntimeError::ModuleNotActive {
                module_id: module.to_string(),
            });
        }
        Ok(self.registry.deactivate(module))
    }

    /// Announce an object created outside [`Weaver::construct`], so active
    /// pointcuts apply to it.
    pub fn adopt(&self, object: &Arc<dyn Wrappee>) {
        self.registry.when_using_new_instance(object);
    }

    /// Forget a destroyed object and release the interceptors built for it.
    pub fn evict(&self, object: ObjectId) -> bool {
        self.registry.evict(object)
    }

    /// Forget every object that is gone. Returns how many were forgotten.
    pub fn sweep(&self) -> usize {
        self.registry.sweep()
    }

    /// Dispatch a call through the target's chain.
    ///
    /// # Errors
    ///
    /// Returns the call's failure if no catch handler handled it.
    pub fn invoke(&self, target: &Target, operation: &Arc<Operation>, args: Vec<Value>) -> CallResult {
        self.dispatcher.invoke(target, operation, args)
    }

    /// Dispatch an operation by signature.
    ///
    /// # Errors
    ///
    /// Fails with `no_such_operation` if the target's type declares no such
    /// operation, or with the call's own failure.
    pub fn invoke_named(&self, target: &Target, signature: &str, args: Vec<Value>) -> CallResult {
        let operation = target
            .type_info()
            .operation(signature)
            .cloned()
            .ok_or_else(|| {
                CallError::raised(
                    "no_such_operation",
                    format!("{} has no operation {signature}", target.type_info().name()),
                )
            })?;
        self.invoke(target, &operation, args)
    }

    /// Invoke a role operation exposed by an attached interceptor.
    ///
    /// Returns `None` when no attached interceptor exposes the role.
    pub fn invoke_role(
        &self,
        target: &Target,
        name: &str,
        args: Vec<Value>,
        required_type: Option<&str>,
    ) -> Option<CallResult> {
        self.dispatcher.invoke_role(target, name, args, required_type)
    }

    /// Create an object of `class` through its constructor chain.
    ///
    /// # Errors
    ///
    /// Fails if `class` has no such constructor or the constructor fails.
    pub fn construct(
        &self,
        class: &Arc<TypeInfo>,
        signature: &str,
        args: Vec<Value>,
    ) -> Result<Arc<Instance>, CallError> {
        self.dispatcher.construct(class, signature, args)
    }
}

impl std::fmt::Debug for Weaver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Weaver")
            .field("order", &self.order)
            .field("host", &self.matcher().host())
            .field("registry", &self.registry)
            .field("factories", &self.factories.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use weft_chain::UnlistedPlacement;
    use weft_core::InterceptorHandle;
    use weft_test::{CallLog, RecordingInterceptor, test_account_type, test_named_account};

    fn weaver(order: &[&str]) -> Weaver {
        Weaver::new(
            CompositionOrder::new(order.iter().copied(), UnlistedPlacement::Last),
            "node1",
        )
    }

    fn recording(log: &CallLog, name: &str) -> InterceptorFactory {
        let log = log.clone();
        let name = name.to_string();
        InterceptorFactory::new(name.clone(), move |_| {
            Ok(InterceptorHandle::new(RecordingInterceptor::new(name.clone(), &log)))
        })
    }

    #[test]
    fn test_constructed_objects_are_woven_in_order() {
        let w = weaver(&["Auth", "Audit"]);
        let log = CallLog::new();
        w.register_factory(recording(&log, "Audit"));
        w.register_factory(recording(&log, "Auth"));

        let module = ModuleId::new();
        let pointcuts = vec![
            w.pointcut("Audit").unwrap().operations("deposit(.*)").build().unwrap(),
            w.pointcut("Auth").unwrap().operations("deposit(.*)").build().unwrap(),
        ];
        assert!(w.activate(module, pointcuts).is_clean());

        let account = w.construct(&test_account_type(), "<init>()", vec![]).unwrap();
        let target = Target::from(account);
        log.clear();

        assert_eq!(w.invoke_named(&target, "deposit(i64)", vec![json!(3)]).unwrap(), json!(3));
        assert_eq!(log.entries(), vec!["Auth", "Audit"]);
    }

    #[test]
    fn test_adopted_objects_receive_pointcuts() {
        let w = weaver(&[]);
        let log = CallLog::new();
        w.register_factory(recording(&log, "Audit"));
        let module = ModuleId::new();
        w.activate(
            module,
            vec![w.pointcut("Audit").unwrap().names("savings").build().unwrap()],
        );

        let object: Arc<dyn Wrappee> = test_named_account("savings");
        w.adopt(&object);
        let target = Target::from(object);
        assert!(w.store().is_attached_type(&target, "Audit"));

        w.invoke_named(&target, "deposit(i64)", vec![json!(1)]).unwrap();
        assert_eq!(log.entries(), vec!["Audit"]);
    }

    #[test]
    fn test_deactivate_unknown_module() {
        let w = weaver(&[]);
        assert!(matches!(
            w.deactivate(ModuleId::new()),
            Err(RuntimeError::ModuleNotActive { .. })
        ));
    }

    #[test]
    fn test_unknown_factory() {
        let w = weaver(&[]);
        assert!(matches!(
            w.pointcut("Missing"),
            Err(RuntimeError::PointcutError(_))
        ));
    }

    #[test]
    fn test_invoke_named_unknown_operation() {
        let w = weaver(&[]);
        let target = Target::from(test_account_type());
        let err = w.invoke_named(&target, "close()", vec![]).unwrap_err();
        assert_eq!(err.fault().kind, "no_such_operation");
    }

    #[test]
    fn test_from_config_injects_host_and_order() {
        let cfg = WeaverConfig::from_toml_str(
            "[composition]\norder = [\"Auth\"]\n[host]\nname = \"gateway\"",
        )
        .unwrap();
        let w = Weaver::from_config(&cfg);
        assert_eq!(w.matcher().host(), "gateway");
        assert_eq!(w.order().index_of("Auth"), Some(0));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weft.toml");
        std::fs::write(&path, "[host]\nname = \"edge\"\n").unwrap();
        let w = Weaver::load(Some(&path)).unwrap();
        assert_eq!(w.matcher().host(), "edge");
    }
}
