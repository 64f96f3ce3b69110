//! `enter`/`begin` scopes and their commit ordering.

use scopekeeper_registry::{
    ExecutionContext, Registry, RegistryError, RequestContext, RequestScopedAdapter, ScopeRole,
    UnitOfWorkHandle,
};

use crate::common::{Journal, web_chain};

#[test]
fn nested_enter_joins_the_outer_unit_of_work() {
    let registry = web_chain();
    let cx = ExecutionContext::for_request(RequestContext::begin());
    let journal = Journal::default();

    let outer = registry.enter(&cx, || journal.unit("order")).unwrap();
    assert_eq!(outer.role(), ScopeRole::Owner);
    {
        let inner = registry
            .enter(&cx, || -> UnitOfWorkHandle { panic!("must join the outer scope") })
            .unwrap();
        assert_eq!(inner.role(), ScopeRole::Joined);
        assert_eq!(inner.handle(), outer.handle());
        assert_eq!(registry.depth(&cx).unwrap(), 1);
        inner.complete().unwrap();
    }
    // Completing a joined scope commits nothing.
    assert!(journal.entries().is_empty());

    outer.complete().unwrap();
    assert_eq!(journal.entries(), vec!["commit order"]);
    assert_eq!(registry.depth(&cx).unwrap(), 0);
}

#[test]
fn nested_owners_commit_innermost_first() {
    let registry = web_chain();
    let cx = ExecutionContext::for_request(RequestContext::begin());
    let journal = Journal::default();

    let outer = registry.begin(&cx, journal.unit("outer")).unwrap();
    let middle = registry.begin(&cx, journal.unit("middle")).unwrap();
    let inner = registry.begin(&cx, journal.unit("inner")).unwrap();
    assert_eq!(registry.depth(&cx).unwrap(), 3);

    inner.complete().unwrap();
    middle.complete().unwrap();
    outer.complete().unwrap();
    assert_eq!(
        journal.entries(),
        vec!["commit inner", "commit middle", "commit outer"]
    );
}

#[test]
fn dropping_an_owner_disposes_without_commit() {
    let registry = web_chain();
    let cx = ExecutionContext::for_request(RequestContext::begin());
    let journal = Journal::default();

    {
        let _scope = registry.enter(&cx, || journal.unit("abandoned")).unwrap();
        assert_eq!(registry.depth(&cx).unwrap(), 1);
    }
    assert_eq!(journal.entries(), vec!["dispose abandoned"]);
    assert_eq!(registry.depth(&cx).unwrap(), 0);
}

#[test]
fn failed_commit_surfaces_and_leaves_stack_clean() {
    let registry = web_chain();
    let cx = ExecutionContext::for_request(RequestContext::begin());
    let journal = Journal::default();

    let scope = registry.enter(&cx, || journal.failing_unit("payment")).unwrap();
    let id = scope.handle().id();
    let err = scope.complete().unwrap_err();
    match err {
        RegistryError::Commit { id: failed, source } => {
            assert_eq!(failed, id);
            assert_eq!(source.message(), "constraint violation");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        journal.entries(),
        vec!["commit-failed payment", "dispose payment"]
    );
    assert_eq!(registry.depth(&cx).unwrap(), 0);
}

#[test]
fn completing_out_of_order_is_rejected() {
    let registry = web_chain();
    let cx = ExecutionContext::for_request(RequestContext::begin());
    let journal = Journal::default();

    let outer = registry.begin(&cx, journal.unit("outer")).unwrap();
    let inner = registry.begin(&cx, journal.unit("inner")).unwrap();
    let outer_id = outer.handle().id();
    let inner_id = inner.handle().id();

    let err = outer.complete().unwrap_err();
    assert_eq!(
        err,
        RegistryError::UnbalancedScope {
            expected: outer_id,
            found: inner_id,
        }
    );
    assert!(err.is_scope_violation());
    // Nothing was released; `inner` is still the innermost scope.
    assert!(journal.entries().is_empty());
    assert_eq!(registry.current(&cx).unwrap().map(|h| h.id()), Some(inner_id));

    inner.complete().unwrap();
    assert_eq!(journal.entries(), vec!["commit inner"]);

    // The rejected outer unit of work is still live and is joined, not replaced.
    let joined = registry
        .enter(&cx, || -> UnitOfWorkHandle { panic!("outer is still active") })
        .unwrap();
    assert_eq!(joined.role(), ScopeRole::Joined);
    assert_eq!(joined.handle().id(), outer_id);
    assert_eq!(registry.depth(&cx).unwrap(), 1);
    joined.complete().unwrap();

    let outer = registry.pop(&cx).unwrap();
    assert_eq!(outer.id(), outer_id);
    outer.commit().unwrap();
    assert_eq!(journal.entries(), vec!["commit inner", "commit outer"]);
}

#[test]
fn abandon_pops_and_disposes() {
    let registry = web_chain();
    let cx = ExecutionContext::for_request(RequestContext::begin());
    let journal = Journal::default();

    let scope = registry.enter(&cx, || journal.unit("draft")).unwrap();
    scope.abandon().unwrap();
    assert_eq!(journal.entries(), vec!["dispose draft"]);
    assert_eq!(registry.depth(&cx).unwrap(), 0);
}

#[test]
fn enter_without_context_fails_before_building() {
    let registry = Registry::new("web", RequestScopedAdapter::new());
    let cx = ExecutionContext::detached();
    let journal = Journal::default();
    let err = registry.enter(&cx, || journal.unit("lost")).unwrap_err();
    assert_eq!(err, RegistryError::NoContextAvailable);
    // The factory ran but the unit was never pushed, so nothing committed.
    assert!(journal.entries().is_empty());
}
