use tracing::info;

/// Fire-and-forget advisory messages for the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Sends notices to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        info!(notice = message, "user notice");
    }
}
