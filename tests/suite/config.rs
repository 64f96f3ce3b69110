//! Registries and loggers built from configuration files.

use std::env;
use std::io::Write;

use scopekeeper_config::{AdapterKind, ScopekeeperConfig};
use scopekeeper_registry::{ExecutionContext, RegistryError, RequestContext, SharedStack};
use scopekeeper_types::Severity;

use crate::common::bare_unit;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn configured_chain_drives_the_registry() {
    let file = write_config(
        r#"
        [registry]
        chain = ["request", "thread", "ambient"]
        slot = "orders.uow"
        "#,
    );
    let config = ScopekeeperConfig::load_from(file.path()).unwrap().unwrap();
    let registry = config.registry().build().unwrap();
    assert_eq!(
        registry.chain(),
        vec![
            ("request", "request"),
            ("thread", "thread"),
            ("ambient", "ambient"),
        ]
    );

    let request = RequestContext::begin();
    let cx = ExecutionContext::for_request(request.clone());
    registry.push(&cx, bare_unit()).unwrap();
    // The stack lives under the configured slot.
    assert!(
        request
            .items()
            .get::<SharedStack>("orders.uow")
            .unwrap()
            .is_some()
    );
    registry.pop(&cx).unwrap();

    // With nothing bound, work lands on the ambient stack.
    let detached = ExecutionContext::detached();
    registry.push(&detached, bare_unit()).unwrap();
    assert_eq!(registry.resolve(&detached).unwrap().unwrap().registry(), "ambient");
    registry.pop(&detached).unwrap();
}

#[test]
fn duplicate_adapter_in_config_fails_to_build() {
    let config = ScopekeeperConfig::parse(
        r#"
        [registry]
        chain = ["thread", "request", "thread"]
        "#,
    )
    .unwrap();
    assert_eq!(
        config.registry().chain(),
        vec![AdapterKind::Thread, AdapterKind::Request, AdapterKind::Thread]
    );
    assert_eq!(
        config.registry().build().unwrap_err(),
        RegistryError::FallbackCycle {
            adapter: "thread".to_string()
        }
    );
}

#[test]
fn mail_section_is_validated_when_enabled() {
    let err = ScopekeeperConfig::parse(
        r#"
        [mail]
        enabled = true
        to = ["ops@example.com"]
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("mail.from"), "{err}");

    let disabled = ScopekeeperConfig::parse(
        r#"
        [mail]
        enabled = false
        "#,
    )
    .unwrap();
    assert!(!disabled.mail.unwrap().enabled());
}

#[test]
fn mail_recipients_expand_environment() {
    // SAFETY: the variable name is unique to this test.
    unsafe {
        env::set_var("SCOPEKEEPER_SUITE_ONCALL", "pager@example.com");
    }
    let config = ScopekeeperConfig::parse(
        r#"
        [mail]
        enabled = true
        from = "app@example.com"
        to = ["${SCOPEKEEPER_SUITE_ONCALL}"]
        min_severity = "critical"
        "#,
    )
    .unwrap();
    let mail = config.mail.unwrap();
    assert_eq!(mail.settings().to, vec!["pager@example.com".to_string()]);
    assert_eq!(mail.settings().min_severity, Severity::Critical);
}
