//! Storage failures surface as `ContextStorage`.

use std::sync::Arc;

use scopekeeper_registry::{
    DEFAULT_STACK_SLOT, ExecutionContext, Registry, RegistryError, RequestContext,
    RequestScopedAdapter, ThreadLocalAdapter,
};

use crate::common::bare_unit;

#[test]
fn occupied_request_slot_is_a_storage_error() {
    let registry = Registry::new("web", RequestScopedAdapter::new());
    let request = RequestContext::begin();
    request
        .items()
        .insert(DEFAULT_STACK_SLOT, "not a stack".to_string())
        .unwrap();
    let cx = ExecutionContext::for_request(Arc::clone(&request));

    let err = registry.push(&cx, bare_unit()).unwrap_err();
    match &err {
        RegistryError::ContextStorage { adapter, reason } => {
            assert_eq!(adapter, "request");
            assert!(reason.contains(DEFAULT_STACK_SLOT), "{reason}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(registry.current(&cx).is_err());
}

#[test]
fn storage_error_does_not_fall_back() {
    let thread = Arc::new(Registry::new("background", ThreadLocalAdapter::new()));
    let registry = Registry::builder("web", RequestScopedAdapter::with_slot("uow"))
        .alternate(thread)
        .build()
        .unwrap();
    let request = RequestContext::begin();
    request.items().insert("uow", 42_u32).unwrap();
    let cx = ExecutionContext::for_request(request);

    assert!(matches!(
        registry.push(&cx, bare_unit()),
        Err(RegistryError::ContextStorage { .. })
    ));
    // The thread stack did not receive the unit of work.
    assert_eq!(
        registry.current(&ExecutionContext::current_thread()).unwrap(),
        None
    );
}

#[test]
fn custom_slot_leaves_default_slot_alone() {
    let registry = Registry::new("web", RequestScopedAdapter::with_slot("orders.uow"));
    let request = RequestContext::begin();
    request
        .items()
        .insert(DEFAULT_STACK_SLOT, "unrelated".to_string())
        .unwrap();
    let cx = ExecutionContext::for_request(request);

    registry.push(&cx, bare_unit()).unwrap();
    assert_eq!(registry.depth(&cx).unwrap(), 1);
    registry.pop(&cx).unwrap();
}
