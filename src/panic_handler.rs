use std::panic;

use log::error;

/// Install panic reporting for the replay binary.
///
/// Debug builds get `better_panic` backtraces; release builds get the
/// `human_panic` crash report. Either way the panic is logged first so it
/// ends up in the log file next to the last render cycle.
pub fn initialize_panic_handler() {
    if cfg!(debug_assertions) {
        better_panic::install();
    } else {
        human_panic::setup_panic!();
    }

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        error!("panic: {panic_info}");
        log::logger().flush();

        default_hook(panic_info);
    }));
}
