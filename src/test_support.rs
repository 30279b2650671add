use std::sync::{Mutex, OnceLock, PoisonError};

/// Runs `f` with `CONTRACTMIND_*`-style environment overrides applied, holding
/// a process-wide lock so env-mutating tests never interleave. Previous values
/// are restored even when `f` panics.
pub(crate) fn with_locked_host_env<T>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> T) -> T {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    let previous = vars
        .iter()
        .map(|(name, _)| ((*name).to_string(), std::env::var(name).ok()))
        .collect::<Vec<_>>();
    for (name, value) in vars {
        set_or_remove(name, *value);
    }

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

    for (name, value) in &previous {
        set_or_remove(name, value.as_deref());
    }
    match result {
        Ok(output) => output,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

fn set_or_remove(name: &str, value: Option<&str>) {
    #[allow(unused_unsafe)]
    unsafe {
        match value {
            Some(value) => std::env::set_var(name, value),
            None => std::env::remove_var(name),
        }
    }
}
