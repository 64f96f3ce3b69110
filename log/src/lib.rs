//! Leveled logger sinks.
//!
//! - **`sink`**: the [`Logger`] contract and error-chain rendering
//! - **`tracing_sink`**: [`TracingLogger`], forwarding to `tracing`
//! - **`mail`**: [`MailLogger`], filtered, queued, rendered off the call path
//! - **`fanout`**: [`FanoutLogger`], one call to many sinks

pub mod fanout;
pub mod mail;
pub mod sink;
pub mod tracing_sink;

pub use fanout::FanoutLogger;
pub use mail::{
    MailError, MailFut, MailLogger, MailMessage, MailSettings, MailTransport, MailWorker,
    TracingTransport,
};
pub use sink::{Logger, Metadata, describe_error};
pub use tracing_sink::TracingLogger;
