use log::LevelFilter;
use std::io::Write;

/// Installs the stdout logger once; later calls only change the level.
///
/// The logger itself accepts everything and `log::set_max_level` does the
/// gating, so the level can be raised after the first call.
pub fn init_logger(level: LevelFilter) {
    let mut builder = env_logger::Builder::new();
    builder
        .format(move |buf, record| {
            writeln!(
                buf,
                "{}: {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stdout)
        .filter_level(LevelFilter::Trace);

    let _ = builder.try_init();

    log::set_max_level(level);
}

pub fn parse_level(level: &str) -> Option<LevelFilter> {
    match level.trim().to_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// Returns `false` for an unknown level name.
pub fn set_log_level(level: &str) -> bool {
    match parse_level(level) {
        Some(lvl) => {
            init_logger(lvl);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_parse_case_insensitively() {
        assert_eq!(parse_level("WARNING"), Some(LevelFilter::Warn));
        assert_eq!(parse_level(" debug "), Some(LevelFilter::Debug));
        assert_eq!(parse_level("loud"), None);
        assert!(!set_log_level("loud"));
    }

    #[test]
    fn level_can_be_raised_after_init() {
        assert!(set_log_level("warn"));
        assert!(!log::log_enabled!(log::Level::Debug));
        assert!(set_log_level("debug"));
        assert_eq!(log::max_level(), LevelFilter::Debug);
        assert!(log::log_enabled!(log::Level::Debug));
        assert!(!log::log_enabled!(log::Level::Trace));
    }
}
