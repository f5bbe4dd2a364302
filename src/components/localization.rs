// Client-side translation tables for localized push payloads
// Templates are looked up by locale priority and filled positionally

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Matches `{0}`, `%1$s`, `%s` and the `%%` escape
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(\d+)\}|%(\d+)\$s|%s|%%").expect("placeholder pattern is valid")
});

/// What a localization key resolves to when no preferred locale defines it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MissingTranslation {
    /// Show the key itself
    #[default]
    RawKey,
    /// Show nothing
    Empty,
}

type RawTable = HashMap<String, HashMap<String, String>>;

/// Locale -> key -> template, with locale tags stored in normalized form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTable", into = "RawTable")]
pub struct LocalizationTable {
    locales: HashMap<String, HashMap<String, String>>,
}

impl LocalizationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single template
    pub fn insert(
        &mut self,
        locale: impl AsRef<str>,
        key: impl Into<String>,
        template: impl Into<String>,
    ) {
        self.locales
            .entry(normalize_tag(locale.as_ref()))
            .or_default()
            .insert(key.into(), template.into());
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(
        mut self,
        locale: impl AsRef<str>,
        key: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        self.insert(locale, key, template);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.locales.values().all(HashMap::is_empty)
    }

    /// Find the template for `key`, walking `locales` in priority order.
    ///
    /// Each preferred locale is tried as given and then by its primary
    /// language subtag, so `fr-CA` also matches a `fr` table.
    pub fn lookup<S: AsRef<str>>(&self, locales: &[S], key: &str) -> Option<&str> {
        locales.iter().find_map(|locale| {
            let tag = normalize_tag(locale.as_ref());
            self.template_for(&tag, key).or_else(|| {
                tag.split_once('-')
                    .and_then(|(language, _)| self.template_for(language, key))
            })
        })
    }

    /// Resolve `key` and substitute `args`, applying `missing` when no locale matches
    pub fn localize<S: AsRef<str>>(
        &self,
        locales: &[S],
        key: &str,
        args: &[String],
        missing: MissingTranslation,
    ) -> String {
        match self.lookup(locales, key) {
            Some(template) => format_template(template, args),
            None => {
                tracing::debug!(key, ?missing, "No translation for localization key");
                match missing {
                    MissingTranslation::RawKey => key.to_string(),
                    MissingTranslation::Empty => String::new(),
                }
            },
        }
    }

    fn template_for(&self, tag: &str, key: &str) -> Option<&str> {
        self.locales
            .get(tag)
            .and_then(|table| table.get(key))
            .map(String::as_str)
    }
}

impl From<RawTable> for LocalizationTable {
    fn from(raw: RawTable) -> Self {
        let mut table = Self::new();
        for (locale, entries) in raw {
            for (key, template) in entries {
                table.insert(&locale, key, template);
            }
        }
        table
    }
}

impl From<LocalizationTable> for RawTable {
    fn from(table: LocalizationTable) -> Self {
        table.locales
    }
}

/// Substitute positional arguments into a template.
///
/// `{n}` and `%n$s` are zero- and one-based respectively; bare `%s` consumes
/// arguments in order. Placeholders without a matching argument stay verbatim.
/// `%%` becomes `%` only in templates that use the printf forms.
pub fn format_template(template: &str, args: &[String]) -> String {
    let printf_style = PLACEHOLDER
        .captures_iter(template)
        .any(|caps| caps.get(2).is_some() || &caps[0] == "%s");
    let mut sequential = 0usize;
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let whole = &caps[0];
            let index = if let Some(braced) = caps.get(1) {
                braced.as_str().parse::<usize>().ok()
            } else if let Some(numbered) = caps.get(2) {
                numbered
                    .as_str()
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
            } else if whole == "%%" {
                return if printf_style { "%" } else { whole }.to_string();
            } else {
                sequential += 1;
                Some(sequential - 1)
            };

            index
                .and_then(|i| args.get(i))
                .cloned()
                .unwrap_or_else(|| whole.to_string())
        })
        .into_owned()
}

/// `en_US` and `EN-us` both become `en-us`
fn normalize_tag(tag: &str) -> String {
    tag.trim().replace('_', "-").to_ascii_lowercase()
}
