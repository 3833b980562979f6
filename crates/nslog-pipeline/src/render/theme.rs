use crossterm::style::{Attribute, Attributes, Color, ContentStyle};

use nslog_types::Level;

/// Console palette
pub struct Theme;

impl Theme {
    // Log level colors
    pub const LOG_FATAL: Color = Color::Red;
    pub const LOG_ERROR: Color = Color::DarkRed;
    pub const LOG_WARN: Color = Color::DarkYellow;
    pub const LOG_INFO: Color = Color::DarkBlue;
    pub const LOG_DEBUG: Color = Color::DarkGreen;
    pub const LOG_TRACE: Color = Color::White;
    pub const LOG_SILLY: Color = Color::Grey;

    // Accents
    pub const FG: Color = Color::White;
    pub const NAMESPACE: Color = Color::DarkMagenta;
    pub const DURATION: Color = Color::DarkMagenta;
    pub const ERROR_BG: Color = Color::DarkRed;

    pub fn level_color(level: Level) -> Color {
        match level {
            Level::Fatal => Self::LOG_FATAL,
            Level::Error => Self::LOG_ERROR,
            Level::Warn => Self::LOG_WARN,
            Level::Info => Self::LOG_INFO,
            Level::Debug => Self::LOG_DEBUG,
            Level::Trace => Self::LOG_TRACE,
            Level::Silly => Self::LOG_SILLY,
        }
    }

    pub fn level(level: Level) -> ContentStyle {
        style(Some(Self::level_color(level)), None, Attribute::Bold.into())
    }

    pub fn time() -> ContentStyle {
        style(None, None, Attribute::Dim.into())
    }

    pub fn namespace() -> ContentStyle {
        style(Some(Self::NAMESPACE), None, Attribute::Dim.into())
    }

    pub fn message() -> ContentStyle {
        style(Some(Self::FG), None, Attributes::default())
    }

    pub fn error_badge() -> ContentStyle {
        style(Some(Self::FG), Some(Self::ERROR_BG), Attributes::default())
    }

    pub fn stack() -> ContentStyle {
        style(None, None, Attribute::Dim.into())
    }

    pub fn duration() -> ContentStyle {
        style(Some(Self::DURATION), None, Attributes::default())
    }
}

fn style(fg: Option<Color>, bg: Option<Color>, attributes: Attributes) -> ContentStyle {
    ContentStyle {
        foreground_color: fg,
        background_color: bg,
        attributes,
        ..ContentStyle::default()
    }
}
