use std::sync::OnceLock;

static QUIET: OnceLock<bool> = OnceLock::new();

/// Turn on quiet mode for the rest of the process, e.g. from `--quiet`.
/// `STASHDB_QUIET` still applies when `quiet` is false. Returns false if the
/// mode was already fixed by an earlier call or read.
pub fn set_quiet(quiet: bool) -> bool {
    QUIET.set(quiet || quiet_from_env()).is_ok()
}

/// Quiet mode silences human-readable output; errors and warnings still print
pub fn is_quiet() -> bool {
    *QUIET.get_or_init(quiet_from_env)
}

fn quiet_from_env() -> bool {
    std::env::var("STASHDB_QUIET")
        .map(|v| parse_switch(&v))
        .unwrap_or(false)
}

fn parse_switch(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_switch() {
        assert!(parse_switch("1"));
        assert!(parse_switch(" TRUE "));
        assert!(parse_switch("yes"));
        assert!(!parse_switch("0"));
        assert!(!parse_switch(""));
    }
}
