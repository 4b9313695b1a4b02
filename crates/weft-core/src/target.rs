//! Interception targets.
//!
//! A target is either an object (instance scope) or a type (shared scope
//! for static operations). Objects are never owned by the engine: the chain
//! store only keeps weak references to them.

use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::rtti::TypeInfo;
use crate::types::ObjectId;

/// An object that interceptors can be attached to.
pub trait Wrappee: Send + Sync + 'static {
    /// Process-unique identity.
    fn object_id(&self) -> ObjectId;

    /// Actual runtime type.
    fn class(&self) -> &Arc<TypeInfo>;

    /// Logical name assigned by a naming collaborator, if any.
    fn logical_name(&self) -> Option<String> {
        None
    }

    /// Upcast for downcasting to the concrete object type.
    fn as_any(&self) -> &dyn Any;
}

/// The stock [`Wrappee`]: a typed bag of JSON field values.
pub struct Instance {
    id: ObjectId,
    class: Arc<TypeInfo>,
    name: RwLock<Option<String>>,
    state: RwLock<Map<String, Value>>,
}

impl Instance {
    /// Create an unnamed instance of `class` with empty state.
    #[must_use]
    pub fn new(class: Arc<TypeInfo>) -> Arc<Self> {
        Arc::new(Self {
            id: ObjectId::next(),
            class,
            name: RwLock::new(None),
            state: RwLock::new(Map::new()),
        })
    }

    /// Create an instance registered under a logical name.
    #[must_use]
    pub fn named(class: Arc<TypeInfo>, name: impl Into<String>) -> Arc<Self> {
        let instance = Self::new(class);
        instance.set_logical_name(Some(name.into()));
        instance
    }

    /// Assign or clear the logical name.
    pub fn set_logical_name(&self, name: Option<String>) {
        *self.name.write().unwrap_or_else(PoisonError::into_inner) = name;
    }

    /// Read a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<Value> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(field)
            .cloned()
    }

    /// Write a field value, returning the previous one.
    pub fn set(&self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(field.into(), value)
    }

    /// Apply `f` to the field's current value under the write lock.
    pub fn update<F>(&self, field: &str, f: F) -> Value
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let next = f(state.get(field));
        state.insert(field.to_string(), next.clone());
        next
    }

    /// Copy of the whole state.
    #[must_use]
    pub fn snapshot(&self) -> Map<String, Value> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Wrappee for Instance {
    fn object_id(&self) -> ObjectId {
        self.id
    }

    fn class(&self) -> &Arc<TypeInfo> {
        &self.class
    }

    fn logical_name(&self) -> Option<String> {
        self.name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("class", &self.class.name())
            .finish_non_exhaustive()
    }
}

/// Key of an interception scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeKey {
    /// Instance scope of one object.
    Object(ObjectId),
    /// Shared scope of a type.
    Type(String),
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(id) => write!(f, "object {id}"),
            Self::Type(name) => write!(f, "type {name}"),
        }
    }
}

/// Something interceptors attach to.
#[derive(Clone)]
pub enum Target {
    /// An object (instance scope).
    Object(Arc<dyn Wrappee>),
    /// A type (shared scope).
    Type(Arc<TypeInfo>),
}

impl Target {
    /// The scope this target addresses.
    #[must_use]
    pub fn scope_key(&self) -> ScopeKey {
        match self {
            Self::Object(object) => ScopeKey::Object(object.object_id()),
            Self::Type(ty) => ScopeKey::Type(ty.name().to_string()),
        }
    }

    /// The target's type: the object's class, or the type itself.
    #[must_use]
    pub fn type_info(&self) -> &Arc<TypeInfo> {
        match self {
            Self::Object(object) => object.class(),
            Self::Type(ty) => ty,
        }
    }

    /// The object, for object targets.
    #[must_use]
    pub fn as_object(&self) -> Option<&Arc<dyn Wrappee>> {
        match self {
            Self::Object(object) => Some(object),
            Self::Type(_) => None,
        }
    }

    /// The object downcast to [`Instance`], if it is one.
    #[must_use]
    pub fn instance(&self) -> Option<&Instance> {
        self.as_object()
            .and_then(|object| object.as_any().downcast_ref::<Instance>())
    }

    /// Whether this is a shared (type) scope.
    #[must_use]
    pub fn is_type(&self) -> bool {
        matches!(self, Self::Type(_))
    }

    /// Logical name of an object target. Types have none.
    #[must_use]
    pub fn logical_name(&self) -> Option<String> {
        self.as_object().and_then(|object| object.logical_name())
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(object) => f
                .debug_tuple("Object")
                .field(&object.object_id())
                .field(&object.class().name())
                .finish(),
            Self::Type(ty) => f.debug_tuple("Type").field(&ty.name()).finish(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(object) => write!(f, "{}{}", object.class().name(), object.object_id()),
            Self::Type(ty) => write!(f, "{}", ty.name()),
        }
    }
}

impl From<Arc<Instance>> for Target {
    fn from(instance: Arc<Instance>) -> Self {
        Self::Object(instance)
    }
}

impl From<Arc<dyn Wrappee>> for Target {
    fn from(object: Arc<dyn Wrappee>) -> Self {
        Self::Object(object)
    }
}

impl From<Arc<TypeInfo>> for Target {
    fn from(ty: Arc<TypeInfo>) -> Self {
        Self::Type(ty)
    }
}
