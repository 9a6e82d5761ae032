//! Two-phase shutdown contract shared by cluster definitions, the registry
//! and namespace views.

use crate::CloseError;

/// A resource that is shut down in two steps.
///
/// `notify_closing` runs first, while the component is still fully
/// operational, so it can flush or deregister. `close` then releases
/// resources. Callers run `notify_closing` to completion before `close` on the
/// same component; `close` must be safe to call more than once.
pub trait Closeable: Send + Sync {
    fn notify_closing(&self) {}

    fn close(&self) -> Result<(), CloseError>;
}

/// Run `close` on every `(name, component)` pair, continuing past failures.
pub(crate) fn close_all<'a, I, T>(components: I) -> Result<(), CloseError>
where
    I: IntoIterator<Item = (&'a str, &'a T)>,
    T: Closeable + ?Sized + 'a,
{
    let mut failures = Vec::new();
    for (name, component) in components {
        if let Err(e) = component.close() {
            tracing::warn!(component = name, error = %e, "close failed, continuing cascade");
            failures.push((name.to_string(), e));
        }
    }
    CloseError::from_failures(failures)
}
