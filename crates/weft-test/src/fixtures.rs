//! Test fixtures for common types.
//!
//! `bank.Account` and `bank.Ledger` cover every structural shape the
//! keyword matchers care about: getters, setters, reference and collection
//! fields, adders, removers, statics, constructors, tagged and modified
//! fields, and one non-interceptable operation.

use serde_json::{Value, json};
use std::sync::Arc;

use weft_core::{
    AccessInfo, CallError, CallResult, FieldInfo, Instance, Operation, Target, TypeInfo,
};

fn amount(args: &[Value]) -> Result<i64, CallError> {
    args.first()
        .and_then(Value::as_i64)
        .ok_or_else(|| CallError::raised("bad_argument", "expected an integer amount"))
}

fn instance(target: &Target) -> Result<&Instance, CallError> {
    target
        .instance()
        .ok_or_else(|| CallError::raised("bad_target", "expected an object target"))
}

fn balance_of(object: &Instance) -> i64 {
    object
        .get("balance")
        .and_then(|v| v.as_i64())
        .unwrap_or_default()
}

fn push(object: &Instance, collection: &str, value: Value) {
    object.update(collection, |current| {
        let mut items = current
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        items.push(value);
        Value::Array(items)
    });
}

fn deposit(target: &Target, args: &[Value]) -> CallResult {
    let object = instance(target)?;
    let amount = amount(args)?;
    let next = balance_of(object)
        .checked_add(amount)
        .ok_or_else(|| CallError::raised("overflow", "balance overflow"))?;
    object.set("balance", json!(next));
    push(object, "history", json!(amount));
    Ok(json!(next))
}

fn withdraw(target: &Target, args: &[Value]) -> CallResult {
    let object = instance(target)?;
    let amount = amount(args)?;
    let balance = balance_of(object);
    if balance < amount {
        return Err(CallError::raised(
            "insufficient_funds",
            format!("balance {balance} is below {amount}"),
        ));
    }
    let next = balance.saturating_sub(amount);
    object.set("balance", json!(next));
    push(object, "history", json!(amount.saturating_neg()));
    Ok(json!(next))
}

/// The `bank.Account` fixture type.
///
/// # Panics
///
/// Never in practice; the declaration is statically valid.
#[must_use]
pub fn test_account_type() -> Arc<TypeInfo> {
    TypeInfo::builder("bank.Account")
        .supertype("bank.Entity")
        .field(FieldInfo::primitive("balance").with_attribute("persistent", json!(true)))
        .field(
            FieldInfo::reference("owner")
                .with_attribute("persistent", json!(true))
                .with_modifier("final"),
        )
        .field(FieldInfo::collection("history").with_modifier("transient"))
        .field(FieldInfo::primitive("cache").with_modifier("transient"))
        .operation(
            Operation::builder("<init>")
                .with_constructor()
                .with_access(AccessInfo::default().writes("balance").modifies("history"))
                .original(|target, _| {
                    let object = instance(target)?;
                    object.set("balance", json!(0));
                    object.set("history", json!([]));
                    Ok(Value::Null)
                }),
        )
        .operation(
            Operation::builder("deposit")
                .param("i64")
                .with_access(
                    AccessInfo::default()
                        .reads("balance")
                        .writes("balance")
                        .adds_to("history"),
                )
                .original(deposit),
        )
        .operation(
            Operation::builder("withdraw")
                .param("i64")
                .with_access(
                    AccessInfo::default()
                        .reads("balance")
                        .writes("balance")
                        .adds_to("history"),
                )
                .original(withdraw),
        )
        .operation(
            Operation::builder("getBalance")
                .with_access(AccessInfo::default().getter_of("balance"))
                .original(|target, _| Ok(json!(balance_of(instance(target)?)))),
        )
        .operation(
            Operation::builder("setBalance")
                .param("i64")
                .with_access(AccessInfo::default().setter_of("balance"))
                .original(|target, args| {
                    let previous = instance(target)?.set("balance", json!(amount(args)?));
                    Ok(previous.unwrap_or(Value::Null))
                }),
        )
        .operation(
            Operation::builder("getOwner")
                .with_access(AccessInfo::default().getter_of("owner"))
                .original(|target, _| {
                    Ok(instance(target)?.get("owner").unwrap_or(Value::Null))
                }),
        )
        .operation(
            Operation::builder("setOwner")
                .param("bank.Person")
                .with_access(AccessInfo::default().setter_of("owner"))
                .original(|target, args| {
                    let owner = args.first().cloned().unwrap_or(Value::Null);
                    instance(target)?.set("owner", owner);
                    Ok(Value::Null)
                }),
        )
        .operation(
            Operation::builder("getHistory")
                .with_access(AccessInfo::default().getter_of("history"))
                .original(|target, _| {
                    Ok(instance(target)?.get("history").unwrap_or(json!([])))
                }),
        )
        .operation(
            Operation::builder("clearHistory")
                .with_access(AccessInfo::default().removes_from("history"))
                .original(|target, _| {
                    instance(target)?.set("history", json!([]));
                    Ok(Value::Null)
                }),
        )
        .operation(
            Operation::builder("audit")
                .not_interceptable()
                .with_access(AccessInfo::default().reads("balance"))
                .original(|target, _| Ok(json!(balance_of(instance(target)?) >= 0))),
        )
        .operation(
            Operation::builder("create")
                .with_static()
                .original(|_, _| Ok(json!("bank.Account"))),
        )
        .operation(Operation::builder("count").with_static())
        .build()
        .expect("account fixture is valid")
}

/// The `bank.Ledger` fixture type.
///
/// # Panics
///
/// Never in practice; the declaration is statically valid.
#[must_use]
pub fn test_ledger_type() -> Arc<TypeInfo> {
    TypeInfo::builder("bank.Ledger")
        .field(FieldInfo::collection("entries").with_attribute("indexed", json!("by-date")))
        .field(FieldInfo::primitive("total").with_modifier("transient"))
        .operation(
            Operation::builder("addEntry")
                .param("String")
                .with_access(
                    AccessInfo::default()
                        .adds_to("entries")
                        .writes("total"),
                )
                .original(|target, args| {
                    let object = instance(target)?;
                    push(object, "entries", args.first().cloned().unwrap_or(Value::Null));
                    Ok(Value::Null)
                }),
        )
        .operation(
            Operation::builder("removeEntry")
                .param("String")
                .with_access(AccessInfo::default().removes_from("entries"))
                .original(|target, args| {
                    let object = instance(target)?;
                    let needle = args.first().cloned().unwrap_or(Value::Null);
                    object.update("entries", |current| {
                        let items = current
                            .and_then(Value::as_array)
                            .cloned()
                            .unwrap_or_default();
                        Value::Array(items.into_iter().filter(|v| *v != needle).collect())
                    });
                    Ok(Value::Null)
                }),
        )
        .operation(
            Operation::builder("size")
                .with_access(AccessInfo::default().reads("entries"))
                .original(|target, _| {
                    let len = instance(target)?
                        .get("entries")
                        .and_then(|v| v.as_array().map(Vec::len))
                        .unwrap_or_default();
                    Ok(json!(len))
                }),
        )
        .operation(
            Operation::builder("getTotal")
                .with_access(AccessInfo::default().getter_of("total")),
        )
        .operation(
            Operation::builder("open")
                .with_static()
                .original(|_, _| Ok(json!("opened"))),
        )
        .build()
        .expect("ledger fixture is valid")
}

/// A fresh, unnamed account.
#[must_use]
pub fn test_account() -> Arc<Instance> {
    Instance::new(test_account_type())
}

/// A fresh account registered under `name`.
#[must_use]
pub fn test_named_account(name: &str) -> Arc<Instance> {
    Instance::named(test_account_type(), name)
}

/// A fresh ledger.
#[must_use]
pub fn test_ledger() -> Arc<Instance> {
    Instance::new(test_ledger_type())
}

/// Look up an operation on a fixture type.
///
/// # Panics
///
/// Panics if the type has no operation with that signature.
#[must_use]
pub fn test_operation(ty: &Arc<TypeInfo>, signature: &str) -> Arc<Operation> {
    ty.operation(signature)
        .cloned()
        .unwrap_or_else(|| panic!("{} has no operation {signature}", ty.name()))
}
