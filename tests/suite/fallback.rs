//! Alternate registries and chain construction.

use std::sync::Arc;

use scopekeeper_registry::{
    AmbientAdapter, ExecutionContext, Registry, RegistryError, RequestContext,
    RequestScopedAdapter, ThreadLocalAdapter,
};

use crate::common::{bare_unit, web_chain};

#[test]
fn push_without_request_lands_on_the_thread() {
    let thread = Arc::new(Registry::new("background", ThreadLocalAdapter::new()));
    let web = Registry::builder("web", RequestScopedAdapter::new())
        .alternate(Arc::clone(&thread))
        .build()
        .unwrap();
    let cx = ExecutionContext::current_thread();

    let unit = bare_unit();
    web.push(&cx, unit.clone()).unwrap();
    // Visible through the alternate directly, on the same thread.
    assert_eq!(thread.current(&cx).unwrap(), Some(unit.clone()));
    assert_eq!(web.current(&cx).unwrap(), Some(unit.clone()));
    assert_eq!(web.resolve(&cx).unwrap().unwrap().registry(), "background");
    assert_eq!(web.pop(&cx).unwrap(), unit);
    assert_eq!(thread.current(&cx).unwrap(), None);
}

#[test]
fn request_binding_takes_priority_over_thread() {
    let registry = web_chain();
    let request = RequestContext::begin();
    let cx = ExecutionContext::for_request(request);

    let unit = bare_unit();
    registry.push(&cx, unit.clone()).unwrap();
    let resolved = registry.resolve(&cx).unwrap().unwrap();
    assert_eq!(resolved.registry(), "web");
    assert_eq!(resolved.adapter(), RequestScopedAdapter::NAME);
    assert_eq!(registry.stack(&cx).unwrap().unwrap().len(), 1);

    // The thread stack was untouched.
    let thread_only = ExecutionContext::current_thread();
    assert_eq!(registry.current(&thread_only).unwrap(), None);
    registry.pop(&cx).unwrap();
}

#[test]
fn empty_request_stack_falls_through_to_thread_for_current() {
    let registry = web_chain();
    let background = ExecutionContext::current_thread();
    let outer = bare_unit();
    registry.push(&background, outer.clone()).unwrap();

    let cx = ExecutionContext::for_request(RequestContext::begin());
    assert_eq!(registry.current(&cx).unwrap(), Some(outer.clone()));

    registry.pop(&background).unwrap();
}

#[test]
fn three_link_chain_ends_at_ambient() {
    let ambient = Arc::new(Registry::new("global", AmbientAdapter::new()));
    let thread = Arc::new(
        Registry::builder("background", ThreadLocalAdapter::new())
            .alternate(ambient)
            .build()
            .unwrap(),
    );
    let web = Registry::builder("web", RequestScopedAdapter::new())
        .alternate(thread)
        .build()
        .unwrap();

    assert_eq!(
        web.chain(),
        vec![
            ("web", "request"),
            ("background", "thread"),
            ("global", "ambient"),
        ]
    );
    let detached = ExecutionContext::detached();
    web.push(&detached, bare_unit()).unwrap();
    assert_eq!(web.resolve(&detached).unwrap().unwrap().registry(), "global");
    web.pop(&detached).unwrap();
}

#[test]
fn repeated_adapter_is_rejected() {
    let inner = Arc::new(
        Registry::builder("inner-thread", ThreadLocalAdapter::new())
            .alternate(Arc::new(Registry::new("web-2", RequestScopedAdapter::new())))
            .build()
            .unwrap(),
    );
    let err = Registry::builder("web", RequestScopedAdapter::new())
        .alternate(inner)
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::FallbackCycle {
            adapter: "request".to_string()
        }
    );
}

#[test]
fn pop_without_binding_anywhere_is_empty_stack() {
    let registry = web_chain();
    assert_eq!(
        registry.pop(&ExecutionContext::detached()),
        Err(RegistryError::EmptyStackPop)
    );
}
