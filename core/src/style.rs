use colored::{Color, ColoredString, Colorize};

use crate::testing::JudgeCode;

pub fn is_truecolor_supported() -> bool {
    let Ok(v) = std::env::var("COLORTERM") else {
        return false
    };
    matches!(v.as_str(), "truecolor" | "24bit")
}

pub trait ColorTheme {
    fn color(&self) -> Color;
}

impl ColorTheme for log::Level {
    fn color(&self) -> Color {
        use log::Level::*;
        match self {
            Error => Color::BrightRed,
            Warn => Color::BrightYellow,
            Info => Color::Cyan,
            Debug => Color::Magenta,
            Trace => Color::Blue,
        }
    }
}

impl ColorTheme for JudgeCode {
    fn color(&self) -> Color {
        use JudgeCode::*;
        if !self::is_truecolor_supported() {
            return match self {
                AC => Color::Green,
                WA => Color::Yellow,
                TLE => Color::Red,
                RE => Color::Magenta,
                MA | MO => Color::Blue,
                TE => Color::BrightBlack,
            };
        }

        let (r, g, b) = match self {
            AC => (30, 180, 40),
            WA => (210, 138, 4),
            TLE => (220, 42, 42),
            RE => (171, 40, 200),
            MA | MO => (40, 110, 210),
            TE => (110, 110, 110),
        };
        Color::TrueColor { r, g, b }
    }
}

/// Fixed-width badge such as ` AC ` or ` TLE `.
pub fn judge_icon(judge: JudgeCode) -> ColoredString {
    let fg = if is_truecolor_supported() {
        Color::TrueColor {
            r: 255,
            g: 255,
            b: 255,
        }
    } else {
        Color::BrightBlack
    };
    format!(" {:<3} ", judge.to_string())
        .on_color(judge.color())
        .bold()
        .color(fg)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn judge_icon_has_fixed_width() {
        colored::control::set_override(false);
        assert_eq!(judge_icon(JudgeCode::AC).to_string(), " AC  ");
        assert_eq!(judge_icon(JudgeCode::TLE).to_string(), " TLE ");
    }
}
