//! Logger sinks driven by registry outcomes.

use std::sync::{Arc, Mutex};

use scopekeeper_config::ScopekeeperConfig;
use scopekeeper_log::{
    FanoutLogger, Logger, MailFut, MailLogger, MailMessage, MailSettings, MailTransport,
    Metadata,
};
use scopekeeper_registry::{ExecutionContext, RequestContext};
use scopekeeper_types::Severity;

use crate::common::{Journal, web_chain};

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<MailMessage>>,
}

impl Outbox {
    fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl MailTransport for Outbox {
    fn send<'a>(&'a self, message: &'a MailMessage) -> MailFut<'a> {
        Box::pin(async move {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        })
    }
}

#[tokio::test]
async fn failed_commit_is_mailed_with_its_cause() {
    let config = ScopekeeperConfig::parse(
        r#"
        [mail]
        enabled = true
        from = "orders@example.com"
        to = ["oncall@example.com"]
        subject_prefix = "[orders]"
        min_severity = "error"
        "#,
    )
    .unwrap();
    let outbox = Arc::new(Outbox::default());
    let (logger, worker) = config.loggers(outbox.clone());

    let registry = web_chain();
    let cx = ExecutionContext::for_request(RequestContext::begin());
    let journal = Journal::default();
    let scope = registry.enter(&cx, || journal.failing_unit("checkout")).unwrap();
    let err = scope.complete().unwrap_err();

    let mut metadata = Metadata::new();
    metadata.insert("request".to_string(), cx.to_string());
    logger.log_exception(&err, Severity::Error, Some(&metadata));
    logger.info("request finished");
    drop(logger);

    assert_eq!(worker.unwrap().finish().await, 1);
    let sent = outbox.sent();
    assert_eq!(sent.len(), 1);
    let mail = &sent[0];
    assert_eq!(mail.from, "orders@example.com");
    assert_eq!(mail.to, vec!["oncall@example.com".to_string()]);
    assert!(mail.subject.starts_with("[orders] [ERROR] unit of work"), "{}", mail.subject);
    assert!(mail.body.contains("caused by: constraint violation"), "{}", mail.body);
    assert!(mail.body.contains("request: req-"), "{}", mail.body);
}

#[tokio::test]
async fn full_queue_drops_instead_of_blocking() {
    let outbox = Arc::new(Outbox::default());
    let settings = MailSettings {
        from: "app@example.com".to_string(),
        to: vec!["ops@example.com".to_string()],
        min_severity: Severity::Warning,
        queue_capacity: 1,
        ..MailSettings::default()
    };
    let (logger, worker) = MailLogger::start(settings, outbox.clone());

    // The worker cannot run until this task yields, so only one fits.
    for i in 0..5 {
        logger.critical(&format!("disk {i} failing"));
    }
    logger.verbose("below threshold");
    assert_eq!(logger.dropped(), 4);

    drop(logger);
    assert_eq!(worker.finish().await, 1);
    assert!(outbox.sent()[0].subject.contains("disk 0 failing"));
}

#[test]
fn fanout_forwards_to_every_sink() {
    #[derive(Default)]
    struct Capture(Mutex<Vec<(Severity, String)>>);

    impl Logger for Capture {
        fn log_message(&self, message: &str, severity: Severity, _metadata: Option<&Metadata>) {
            self.0.lock().unwrap().push((severity, message.to_string()));
        }
    }

    let first = Arc::new(Capture::default());
    let second = Arc::new(Capture::default());
    let fanout = FanoutLogger::new().with(first.clone()).with(second.clone());

    fanout.warning("slow commit");
    fanout.critical("store offline");

    let expected = vec![
        (Severity::Warning, "slow commit".to_string()),
        (Severity::Critical, "store offline".to_string()),
    ];
    assert_eq!(*first.0.lock().unwrap(), expected);
    assert_eq!(*second.0.lock().unwrap(), expected);
}
