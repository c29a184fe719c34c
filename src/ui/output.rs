use crate::output::is_quiet;
use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

/// Title line with the database or version underneath
pub fn banner(title: &str, subtitle: &str) {
    if is_quiet() {
        return;
    }
    println!();
    println!("{}", title.style(theme().title.clone()));
    println!("{}", subtitle.style(theme().label.clone()));
    println!();
}

pub fn status(icon: &str, label: &str, value: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}: {}", icon, label.style(theme().label.clone()), value);
}

pub fn success(label: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", Icons::CHECK, label.style(theme().saved.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().removed.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().caution.clone()));
}

pub fn info(label: &str, value: &str) {
    if is_quiet() {
        return;
    }
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().accent.clone()),
        label.style(theme().label.clone()),
        value
    );
}

/// Heading above a store listing
pub fn section(store: &str) {
    if is_quiet() {
        return;
    }
    println!();
    println!("━{}━", store.style(theme().store.clone()));
}

/// `store/id` with each half in its own style
pub fn record_path(store: &str, id: &str) -> String {
    format!(
        "{}/{}",
        store.style(theme().store.clone()),
        id.style(theme().record_id.clone())
    )
}

pub fn record_saved(store: &str, id: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", Icons::RECORD.style(theme().saved.clone()), record_path(store, id));
}

pub fn record_deleted(store: &str, id: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", Icons::DEL.style(theme().removed.clone()), record_path(store, id));
}

pub fn summary_row(label: &str, value: &str) {
    if is_quiet() {
        return;
    }
    println!("  {} {}", label.style(theme().label.clone()), value);
}

pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
