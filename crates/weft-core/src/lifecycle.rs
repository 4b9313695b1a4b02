//! Hook consumed from the lifecycle layer.

use std::sync::Arc;

use crate::rtti::TypeInfo;
use crate::target::Wrappee;

/// Notified when a target is used for the first time, so pointcuts can be
/// applied lazily before its chains are read.
///
/// Implementations must tolerate repeated notifications for the same
/// target and concurrent notifications from different threads.
pub trait LifecycleListener: Send + Sync {
    /// An object was just constructed.
    fn when_using_new_instance(&self, object: &Arc<dyn Wrappee>);

    /// A type's shared scope is about to be used.
    fn when_using_new_type(&self, type_info: &Arc<TypeInfo>);
}
