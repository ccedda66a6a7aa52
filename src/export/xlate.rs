//! Filename translation for archive entry names.
//!
//! ZIP entry names are URL strings, and some filesystems cannot round-trip
//! every URL character. Translation substitutes the offending characters,
//! never removes them, so output length always equals input length and
//! re-applying a translation is a no-op.

use serde::{Deserialize, Serialize};

/// Selectable entry-name translation convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslateMode {
    /// Leave names untouched.
    #[default]
    None,
    /// Substitute characters Windows filesystems reject.
    Windows,
    /// Substitute the colon, which macOS historically reserved.
    MacOs,
}

const WINDOWS_UNSAFE: [char; 7] = ['?', '<', '>', ':', '*', '|', '\\'];

impl TranslateMode {
    /// Translate a URL into a filesystem-safe entry name.
    pub fn translate(&self, url: &str) -> String {
        match self {
            TranslateMode::None => url.to_string(),
            TranslateMode::Windows => url
                .chars()
                .map(|c| if WINDOWS_UNSAFE.contains(&c) { '_' } else { c })
                .collect(),
            TranslateMode::MacOs => url.replace(':', "_"),
        }
    }
}

impl std::str::FromStr for TranslateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(TranslateMode::None),
            "windows" => Ok(TranslateMode::Windows),
            "macos" | "mac_os" => Ok(TranslateMode::MacOs),
            other => Err(format!("unknown translate mode '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_substitutes_each_unsafe_char() {
        let mode = TranslateMode::Windows;
        assert_eq!(
            mode.translate("https://example.com/a?b=c|d"),
            "https_//example.com/a_b=c_d"
        );
        assert_eq!(mode.translate(r"a\b<c>d*e"), "a_b_c_d_e");
    }

    #[test]
    fn macos_substitutes_only_colons() {
        let mode = TranslateMode::MacOs;
        assert_eq!(
            mode.translate("https://example.com/a?b"),
            "https_//example.com/a?b"
        );
    }

    #[test]
    fn all_modes_are_idempotent_and_length_preserving() {
        let inputs = [
            "https://example.com/a?b=c",
            "plain",
            r"odd:\mix*of|chars<>?",
            "",
        ];
        for mode in [TranslateMode::None, TranslateMode::Windows, TranslateMode::MacOs] {
            for input in inputs {
                let once = mode.translate(input);
                assert_eq!(mode.translate(&once), once);
                assert_eq!(once.chars().count(), input.chars().count());
            }
        }
    }
}
