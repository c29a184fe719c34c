use owo_colors::Style;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

/// When to color terminal output, from `STASHDB_COLOR`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    /// Unknown values fall back to `Auto`
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "always" | "1" | "true" => ColorChoice::Always,
            "never" | "0" | "false" => ColorChoice::Never,
            _ => ColorChoice::Auto,
        }
    }

    fn from_env() -> Self {
        // NO_COLOR wins over everything
        if std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty()) {
            return ColorChoice::Never;
        }
        std::env::var("STASHDB_COLOR")
            .map(|v| Self::parse(&v))
            .unwrap_or(ColorChoice::Auto)
    }
}

/// Styles keyed by what they mark in stashdb output
#[derive(Debug, Clone)]
pub struct Theme {
    /// Banners and section headings
    pub title: Style,
    pub store: Style,
    pub record_id: Style,
    /// Labels in status, info and summary lines
    pub label: Style,
    pub saved: Style,
    pub removed: Style,
    pub caution: Style,
    pub accent: Style,
}

impl Theme {
    pub fn detect() -> Self {
        Self::for_choice(ColorChoice::from_env(), console::Term::stdout().is_term())
    }

    pub fn for_choice(choice: ColorChoice, is_term: bool) -> Self {
        match choice {
            ColorChoice::Always => Self::colored(),
            ColorChoice::Auto if is_term => Self::colored(),
            _ => Self::plain(),
        }
    }

    pub fn colored() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            store: Style::new().blue().bold(),
            record_id: Style::new().bold(),
            label: Style::new().white().dimmed(),
            saved: Style::new().green().bold(),
            removed: Style::new().red().bold(),
            caution: Style::new().yellow().bold(),
            accent: Style::new().magenta(),
        }
    }

    pub fn plain() -> Self {
        let none = Style::new();
        Self {
            title: none,
            store: none,
            record_id: none,
            label: none,
            saved: none,
            removed: none,
            caution: none,
            accent: none,
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_choice_parsing() {
        assert_eq!(ColorChoice::parse("always"), ColorChoice::Always);
        assert_eq!(ColorChoice::parse(" NEVER "), ColorChoice::Never);
        assert_eq!(ColorChoice::parse("0"), ColorChoice::Never);
        assert_eq!(ColorChoice::parse("sometimes"), ColorChoice::Auto);
    }

    #[test]
    fn test_store_names_stand_out_only_when_colored() {
        let styled = |theme: Theme| {
            use owo_colors::OwoColorize;
            format!("{}", "posts".style(theme.store))
        };

        assert_eq!(styled(Theme::for_choice(ColorChoice::Auto, false)), "posts");
        assert_eq!(styled(Theme::for_choice(ColorChoice::Never, true)), "posts");
        assert_ne!(styled(Theme::for_choice(ColorChoice::Always, false)), "posts");
        assert_ne!(styled(Theme::for_choice(ColorChoice::Auto, true)), "posts");
    }
}
