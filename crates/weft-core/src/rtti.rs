//! Structural type metadata.
//!
//! Everything in here is produced once by the preparation pass and never
//! changes afterwards, which is what lets the pointcut layer cache matches
//! per type name.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{CallResult, CoreError, CoreResult};
use crate::target::Target;

/// The preserved original implementation of an operation.
///
/// Callable independently of any chain.
pub type OriginalFn = Arc<dyn Fn(&Target, &[Value]) -> CallResult + Send + Sync>;

/// Storage shape of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// A primitive value (number, string, flag).
    Primitive,
    /// A reference to another object.
    Reference,
    /// A collection of values.
    Collection,
}

/// A declared field of a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Field name.
    pub name: String,
    /// Storage shape.
    pub kind: FieldKind,
    /// Declared modifiers (`transient`, `private`, ...).
    #[serde(default)]
    pub modifiers: BTreeSet<String>,
    /// Attribute metadata keyed by tag name.
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl FieldInfo {
    /// Declare a field.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            modifiers: BTreeSet::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Declare a primitive field.
    #[must_use]
    pub fn primitive(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Primitive)
    }

    /// Declare a reference field.
    #[must_use]
    pub fn reference(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Reference)
    }

    /// Declare a collection field.
    #[must_use]
    pub fn collection(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Collection)
    }

    /// Add a modifier.
    #[must_use]
    pub fn with_modifier(mut self, modifier: impl Into<String>) -> Self {
        self.modifiers.insert(modifier.into());
        self
    }

    /// Tag the field with an attribute.
    #[must_use]
    pub fn with_attribute(mut self, tag: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(tag.into(), value);
        self
    }

    /// Whether the field carries the attribute `tag`.
    #[must_use]
    pub fn has_attribute(&self, tag: &str) -> bool {
        self.attributes.contains_key(tag)
    }

    /// Whether the field carries the modifier.
    #[must_use]
    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.contains(modifier)
    }

    /// Whether this is a collection field.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.kind == FieldKind::Collection
    }

    /// Whether this is a reference field.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.kind == FieldKind::Reference
    }
}

/// What an operation touches, as recorded by the preparation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessInfo {
    /// Field this operation is the setter of.
    pub set_field: Option<String>,
    /// Field this operation is the getter of.
    pub returned_field: Option<String>,
    /// Fields read anywhere in the body.
    #[serde(default)]
    pub accessed_fields: BTreeSet<String>,
    /// Fields written anywhere in the body.
    #[serde(default)]
    pub written_fields: BTreeSet<String>,
    /// Collections elements are added to.
    #[serde(default)]
    pub added_collections: BTreeSet<String>,
    /// Collections elements are removed from.
    #[serde(default)]
    pub removed_collections: BTreeSet<String>,
    /// Collections modified in any way.
    #[serde(default)]
    pub modified_collections: BTreeSet<String>,
}

impl AccessInfo {
    /// Mark the operation as the setter of `field` (also records the write).
    #[must_use]
    pub fn setter_of(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.written_fields.insert(field.clone());
        self.set_field = Some(field);
        self
    }

    /// Mark the operation as the getter of `field` (also records the read).
    #[must_use]
    pub fn getter_of(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.accessed_fields.insert(field.clone());
        self.returned_field = Some(field);
        self
    }

    /// Record a field read.
    #[must_use]
    pub fn reads(mut self, field: impl Into<String>) -> Self {
        self.accessed_fields.insert(field.into());
        self
    }

    /// Record a field write.
    #[must_use]
    pub fn writes(mut self, field: impl Into<String>) -> Self {
        self.written_fields.insert(field.into());
        self
    }

    /// Record an element insertion into `collection`.
    #[must_use]
    pub fn adds_to(mut self, collection: impl Into<String>) -> Self {
        let collection = collection.into();
        self.modified_collections.insert(collection.clone());
        self.added_collections.insert(collection);
        self
    }

    /// Record an element removal from `collection`.
    #[must_use]
    pub fn removes_from(mut self, collection: impl Into<String>) -> Self {
        let collection = collection.into();
        self.modified_collections.insert(collection.clone());
        self.removed_collections.insert(collection);
        self
    }

    /// Record any other in-place modification of `collection`.
    #[must_use]
    pub fn modifies(mut self, collection: impl Into<String>) -> Self {
        self.modified_collections.insert(collection.into());
        self
    }

    fn referenced_fields(&self) -> impl Iterator<Item = &String> {
        self.set_field
            .iter()
            .chain(self.returned_field.iter())
            .chain(self.accessed_fields.iter())
            .chain(self.written_fields.iter())
            .chain(self.added_collections.iter())
            .chain(self.removed_collections.iter())
            .chain(self.modified_collections.iter())
    }
}

/// Key identifying an operation: owning type plus canonical signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationKey {
    /// Owning type name.
    pub owner: String,
    /// Canonical signature, `name(p1,p2)`.
    pub signature: String,
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.signature)
    }
}

/// A method or constructor, the unit of interception.
pub struct Operation {
    owner: String,
    name: String,
    params: Vec<String>,
    signature: String,
    is_static: bool,
    is_constructor: bool,
    interceptable: bool,
    access: AccessInfo,
    original: OriginalFn,
}

impl Operation {
    /// Start declaring an operation.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> OperationBuilder {
        OperationBuilder::new(name)
    }

    /// Owning type name.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Bare operation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter type names.
    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Canonical text form, `name(p1,p2)`.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Key of this operation.
    #[must_use]
    pub fn key(&self) -> OperationKey {
        OperationKey {
            owner: self.owner.clone(),
            signature: self.signature.clone(),
        }
    }

    /// Whether the operation is static (shared scope).
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Whether the operation is a constructor.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.is_constructor
    }

    /// Whether the preparation pass made this operation interceptable.
    #[must_use]
    pub fn is_interceptable(&self) -> bool {
        self.interceptable
    }

    /// Structural access metadata.
    #[must_use]
    pub fn access(&self) -> &AccessInfo {
        &self.access
    }

    /// Run the preserved original implementation, bypassing every chain.
    ///
    /// # Errors
    ///
    /// Returns whatever failure the original raises.
    pub fn call_original(&self, target: &Target, args: &[Value]) -> CallResult {
        (self.original)(target, args)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("owner", &self.owner)
            .field("signature", &self.signature)
            .field("is_static", &self.is_static)
            .field("is_constructor", &self.is_constructor)
            .field("interceptable", &self.interceptable)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Operation`]. The owner is filled in by [`TypeBuilder`].
pub struct OperationBuilder {
    name: String,
    params: Vec<String>,
    is_static: bool,
    is_constructor: bool,
    interceptable: bool,
    access: AccessInfo,
    original: Option<OriginalFn>,
}

impl OperationBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            is_static: false,
            is_constructor: false,
            interceptable: true,
            access: AccessInfo::default(),
            original: None,
        }
    }

    /// Append a parameter type.
    #[must_use]
    pub fn param(mut self, param: impl Into<String>) -> Self {
        self.params.push(param.into());
        self
    }

    /// Mark as static.
    #[must_use]
    pub fn with_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Mark as constructor.
    #[must_use]
    pub fn with_constructor(mut self) -> Self {
        self.is_constructor = true;
        self
    }

    /// Mark as not interceptable: chains for it never accept entries.
    #[must_use]
    pub fn not_interceptable(mut self) -> Self {
        self.interceptable = false;
        self
    }

    /// Attach structural access metadata.
    #[must_use]
    pub fn with_access(mut self, access: AccessInfo) -> Self {
        self.access = access;
        self
    }

    /// Provide the original implementation. Defaults to returning `null`.
    #[must_use]
    pub fn original<F>(mut self, original: F) -> Self
    where
        F: Fn(&Target, &[Value]) -> CallResult + Send + Sync + 'static,
    {
        self.original = Some(Arc::new(original));
        self
    }

    fn signature(&self) -> String {
        format!("{}({})", self.name, self.params.join(","))
    }

    fn build(self, owner: &str) -> Operation {
        let signature = self.signature();
        Operation {
            owner: owner.to_string(),
            name: self.name,
            params: self.params,
            signature,
            is_static: self.is_static,
            is_constructor: self.is_constructor,
            interceptable: self.interceptable,
            access: self.access,
            original: self
                .original
                .unwrap_or_else(|| Arc::new(|_: &Target, _: &[Value]| Ok(Value::Null))),
        }
    }
}

/// Structural description of a type.
#[derive(Debug)]
pub struct TypeInfo {
    name: String,
    supertypes: Vec<String>,
    fields: Vec<FieldInfo>,
    operations: Vec<Arc<Operation>>,
}

impl TypeInfo {
    /// Start declaring a type.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder {
            name: name.into(),
            supertypes: Vec::new(),
            fields: Vec::new(),
            operations: Vec::new(),
        }
    }

    /// Fully-qualified type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of every supertype, nearest first.
    #[must_use]
    pub fn supertypes(&self) -> &[String] {
        &self.supertypes
    }

    /// The type's own name followed by its supertypes.
    pub fn lineage(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.supertypes.iter().map(String::as_str))
    }

    /// Whether this type is `name` or a subtype of it.
    #[must_use]
    pub fn is_a(&self, name: &str) -> bool {
        self.lineage().any(|n| n == name)
    }

    /// Declared fields (inherited ones included).
    #[must_use]
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    /// Look up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Every operation, in declaration order.
    #[must_use]
    pub fn operations(&self) -> &[Arc<Operation>] {
        &self.operations
    }

    /// Look up an operation by canonical signature.
    #[must_use]
    pub fn operation(&self, signature: &str) -> Option<&Arc<Operation>> {
        self.operations.iter().find(|op| op.signature() == signature)
    }

    /// Non-static, non-constructor operations.
    pub fn instance_operations(&self) -> impl Iterator<Item = &Arc<Operation>> {
        self.operations
            .iter()
            .filter(|op| !op.is_static() && !op.is_constructor())
    }

    /// Static operations.
    pub fn static_operations(&self) -> impl Iterator<Item = &Arc<Operation>> {
        self.operations.iter().filter(|op| op.is_static())
    }

    /// Constructors.
    pub fn constructors(&self) -> impl Iterator<Item = &Arc<Operation>> {
        self.operations.iter().filter(|op| op.is_constructor())
    }
}

/// Builder for [`TypeInfo`].
pub struct TypeBuilder {
    name: String,
    supertypes: Vec<String>,
    fields: Vec<FieldInfo>,
    operations: Vec<OperationBuilder>,
}

impl TypeBuilder {
    /// Add a supertype name.
    #[must_use]
    pub fn supertype(mut self, name: impl Into<String>) -> Self {
        self.supertypes.push(name.into());
        self
    }

    /// Declare a field.
    #[must_use]
    pub fn field(mut self, field: FieldInfo) -> Self {
        self.fields.push(field);
        self
    }

    /// Declare an operation.
    #[must_use]
    pub fn operation(mut self, operation: OperationBuilder) -> Self {
        self.operations.push(operation);
        self
    }

    /// Validate and freeze the type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] on an empty name, duplicate field names,
    /// duplicate signatures, or access metadata naming undeclared fields.
    pub fn build(self) -> CoreResult<Arc<TypeInfo>> {
        if self.name.trim().is_empty() {
            return Err(CoreError::EmptyTypeName);
        }

        let mut field_names = HashSet::new();
        for field in &self.fields {
            if !field_names.insert(field.name.as_str()) {
                return Err(CoreError::DuplicateField {
                    owner: self.name.clone(),
                    field: field.name.clone(),
                });
            }
        }

        let mut operations = Vec::with_capacity(self.operations.len());
        let mut signatures = HashSet::new();
        for builder in self.operations {
            let op = builder.build(&self.name);
            if !signatures.insert(op.signature.clone()) {
                return Err(CoreError::DuplicateOperation {
                    owner: self.name.clone(),
                    signature: op.signature,
                });
            }
            if let Some(missing) = op
                .access
                .referenced_fields()
                .find(|f| !field_names.contains(f.as_str()))
            {
                return Err(CoreError::UnknownField {
                    owner: self.name.clone(),
                    signature: op.signature.clone(),
                    field: missing.clone(),
                });
            }
            operations.push(Arc::new(op));
        }

        Ok(Arc::new(TypeInfo {
            name: self.name,
            supertypes: self.supertypes,
            fields: self.fields,
            operations,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn account() -> Arc<TypeInfo> {
        TypeInfo::builder("bank.Account")
            .supertype("bank.Entity")
            .field(FieldInfo::primitive("balance").with_attribute("persistent", json!(true)))
            .field(FieldInfo::collection("history").with_modifier("transient"))
            .operation(
                Operation::builder("deposit")
                    .param("f64")
                    .with_access(AccessInfo::default().writes("balance").adds_to("history")),
            )
            .operation(
                Operation::builder("getBalance")
                    .with_access(AccessInfo::default().getter_of("balance"))
                    .original(|_, _| Ok(json!(42))),
            )
            .operation(Operation::builder("open").with_static())
            .operation(Operation::builder("<init>").with_constructor())
            .build()
            .unwrap()
    }

    #[test]
    fn test_signature_form() {
        let op = Operation::builder("transfer")
            .param("bank.Account")
            .param("f64")
            .build("bank.Account");
        assert_eq!(op.signature(), "transfer(bank.Account,f64)");
        assert_eq!(op.key().to_string(), "bank.Account.transfer(bank.Account,f64)");
    }

    #[test]
    fn test_operation_partitions() {
        let ty = account();
        let instance: Vec<_> = ty.instance_operations().map(|o| o.signature()).collect();
        assert_eq!(instance, vec!["deposit(f64)", "getBalance()"]);
        assert_eq!(ty.static_operations().count(), 1);
        assert_eq!(ty.constructors().count(), 1);
        assert!(ty.operations().iter().all(|op| op.owner() == "bank.Account"));
    }

    #[test]
    fn test_lineage() {
        let ty = account();
        assert!(ty.is_a("bank.Account"));
        assert!(ty.is_a("bank.Entity"));
        assert!(!ty.is_a("bank.Ledger"));
    }

    #[test]
    fn test_field_metadata() {
        let ty = account();
        assert!(ty.field("balance").unwrap().has_attribute("persistent"));
        assert!(ty.field("history").unwrap().is_collection());
        assert!(ty.field("history").unwrap().has_modifier("transient"));
        assert!(ty.field("missing").is_none());
    }

    #[test]
    fn test_default_original_returns_null() {
        let ty = account();
        let target = Target::Type(ty.clone());
        let op = ty.operation("open()").unwrap();
        assert_eq!(op.call_original(&target, &[]).unwrap(), Value::Null);
        let getter = ty.operation("getBalance()").unwrap();
        assert_eq!(getter.call_original(&target, &[]).unwrap(), json!(42));
    }

    #[test]
    fn test_duplicate_signature_rejected() {
        let err = TypeInfo::builder("T")
            .operation(Operation::builder("f").param("i32"))
            .operation(Operation::builder("f").param("i32"))
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateOperation { .. }));
    }

    #[test]
    fn test_overloads_allowed() {
        let ty = TypeInfo::builder("T")
            .operation(Operation::builder("f").param("i32"))
            .operation(Operation::builder("f").param("f64"))
            .build()
            .unwrap();
        assert_eq!(ty.operations().len(), 2);
    }

    #[test]
    fn test_unknown_access_field_rejected() {
        let err = TypeInfo::builder("T")
            .operation(
                Operation::builder("setX").with_access(AccessInfo::default().setter_of("x")),
            )
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::UnknownField {
                owner: "T".into(),
                signature: "setX()".into(),
                field: "x".into(),
            }
        );
    }

    #[test]
    fn test_empty_name_rejected() {
        assert_eq!(
            TypeInfo::builder("  ").build().unwrap_err(),
            CoreError::EmptyTypeName
        );
    }
}
