use tracing::error;

/// Records panics in the log file before the default report is printed.
pub fn set_panic_hook() {
    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        error!("{panic_info}");
        hook(panic_info);
    }));
}
