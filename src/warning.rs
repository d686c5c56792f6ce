//! Per-document warnings.
//!
//! Degraded content (placeholders, failed downloads) is not an error. The
//! code producing it records a warning through [`warn_entry!`]; the leaf
//! pipeline collects everything recorded while it ran and logs it once,
//! attributed to the document.

use std::cell::RefCell;

use tracing::warn;

tokio::task_local! {
    static WARNINGS: RefCell<Vec<String>>;
}

/// Record a warning for the document being processed by the current task.
/// Outside of [`collect_warnings`] the warning is dropped.
pub fn collect(message: impl Into<String>) {
    let _ = WARNINGS.try_with(|warnings| {
        warnings.borrow_mut().push(message.into());
    });
}

/// Run `f` with a fresh collector, returning its output and every warning it recorded.
pub async fn collect_warnings<F, T>(f: F) -> (T, Vec<String>)
where
    F: Future<Output = T>,
{
    WARNINGS
        .scope(RefCell::new(Vec::new()), async {
            let result = f.await;
            let warnings = WARNINGS.with(|w| std::mem::take(&mut *w.borrow_mut()));
            (result, warnings)
        })
        .await
}

pub fn log_warnings(document: &str, warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    warn!(document, count = warnings.len(), warnings = ?warnings, "document rendered with warnings");
}

#[macro_export]
macro_rules! warn_entry {
    ($($arg:tt)*) => {
        $crate::warning::collect(format!($($arg)*))
    };
}
