// src/utils/log.rs

//! Run-report formatting on top of the `log` facade.
//!
//! Stage banners and summaries go through `log::info!` so they honour the
//! same filter and sink as every other record.

/// Log a header
pub fn header(title: &str) {
    let border = "═".repeat(60);
    log::info!("{border}");
    log::info!("  {title}");
    log::info!("{border}");
}

/// Log a step in a process
pub fn step(step_num: usize, total: usize, message: &str) {
    log::info!("[STEP {step_num}/{total}] {message}");
}

/// Log a sub-item (indented)
pub fn sub_item(message: &str) {
    log::info!("    {message}");
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    log::info!("[SUMMARY] {title}");
    let width = items.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    for (key, value) in items {
        log::info!("    {key:<width$} : {value}");
    }
}
