//! Prelude module - commonly used types for convenient import.
//!
//! Use `use weft_test::prelude::*;` to import all essential types.

pub use crate::fixtures::{
    test_account, test_account_type, test_ledger, test_ledger_type, test_named_account,
    test_operation,
};
pub use crate::harness::{setup_test_logging, setup_test_logging_default};
pub use crate::mocks::{
    CallLog, CatchingInterceptor, FailingInterceptor, FnInterceptor, RecordingInterceptor,
    RecordingListener, RoleInterceptor,
};
