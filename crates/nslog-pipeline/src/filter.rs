use regex::Regex;
use serde::Deserialize;
use std::fmt;

use nslog_types::{DEFAULT_NAMESPACE_DELIMITER, Level, LogRecord};

use crate::pipeline::Stage;

/// Environment variable holding the filter string by default
pub const DEFAULT_FILTER_ENV_KEY: &str = "DEBUG";

/// Filter string used when the environment variable is unset
pub const DEFAULT_FILTER: &str = "-*";

/// Errors raised while compiling a filter string
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("empty pattern in filter token '{token}'")]
    EmptyPattern { token: String },

    #[error("invalid filter token '{token}': {source}")]
    InvalidPattern {
        token: String,
        #[source]
        source: regex::Error,
    },
}

/// Characters that structure a filter string
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterSyntax {
    /// Separates tokens; whitespace always separates too
    pub delimiter: char,

    /// Marks an exclude token
    pub except: char,

    /// Separates namespace segments
    pub namespace_delimiter: String,
}

impl Default for FilterSyntax {
    fn default() -> Self {
        Self {
            delimiter: ',',
            except: '-',
            namespace_delimiter: DEFAULT_NAMESPACE_DELIMITER.to_string(),
        }
    }
}

/// One compiled filter token
#[derive(Clone)]
pub struct Pattern {
    /// Token text as written
    pub raw: String,
    pub is_exclude: bool,
    regex: Regex,
}

impl Pattern {
    fn compile(token: &str, syntax: &FilterSyntax) -> Result<Self, FilterError> {
        let (is_exclude, body) = match token.strip_prefix(syntax.except) {
            Some(rest) => (true, rest),
            None => (false, token),
        };

        if body.is_empty() {
            return Err(FilterError::EmptyPattern {
                token: token.to_string(),
            });
        }

        // `ns:*` means the namespace itself and everything below it, which the
        // optional child suffix already covers
        let descendants = format!("{}*", syntax.namespace_delimiter);
        let body = body.strip_suffix(descendants.as_str()).unwrap_or(body);

        let glob = body
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*?");
        let source = format!(
            "^{}(?:{}.*)?$",
            glob,
            regex::escape(&syntax.namespace_delimiter)
        );

        let regex = Regex::new(&source).map_err(|source| FilterError::InvalidPattern {
            token: token.to_string(),
            source,
        })?;

        Ok(Self {
            raw: token.to_string(),
            is_exclude,
            regex,
        })
    }

    pub fn is_match(&self, namespace: &str) -> bool {
        self.regex.is_match(namespace)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("raw", &self.raw)
            .field("is_exclude", &self.is_exclude)
            .field("regex", &self.regex.as_str())
            .finish()
    }
}

/// Compiled include/exclude namespace filter
#[derive(Clone, Debug)]
pub struct NamespaceMatcher {
    filter: String,
    syntax: FilterSyntax,
    patterns: Vec<Pattern>,
    has_positive: bool,
}

impl NamespaceMatcher {
    /// Compile a filter string
    pub fn new(filter: &str, syntax: FilterSyntax) -> Result<Self, FilterError> {
        let delimiter = syntax.delimiter;
        let patterns = filter
            .split(|c: char| c == delimiter || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(|token| Pattern::compile(token, &syntax))
            .collect::<Result<Vec<_>, _>>()?;

        let has_positive = patterns.iter().any(|p| !p.is_exclude);

        Ok(Self {
            filter: filter.to_string(),
            syntax,
            patterns,
            has_positive,
        })
    }

    /// Decide whether `namespace` passes.
    ///
    /// A matching exclude always wins. Without any include token the default
    /// is to pass; otherwise some include must match.
    pub fn matches(&self, namespace: &str) -> bool {
        let mut included = false;

        for pattern in &self.patterns {
            if pattern.is_match(namespace) {
                if pattern.is_exclude {
                    return false;
                }
                included = true;
            }
        }

        !self.has_positive || included
    }

    /// The filter string this matcher was compiled from
    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn syntax(&self) -> &FilterSyntax {
        &self.syntax
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }
}

/// Where the filter string comes from
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    /// When false every namespace passes
    pub enable: bool,

    /// Records more severe than this skip namespace filtering
    pub level: Level,

    /// Used when the environment variable is unset
    pub default_filter: String,

    /// Environment variable to read the filter from
    pub env_key: String,

    /// Explicit filter string; wins over the environment
    pub filter: Option<String>,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            enable: true,
            level: Level::Debug,
            default_filter: DEFAULT_FILTER.to_string(),
            env_key: DEFAULT_FILTER_ENV_KEY.to_string(),
            filter: None,
        }
    }
}

impl FilterOptions {
    /// Resolve the effective filter string from the environment
    pub fn resolve(&self) -> String {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve using a custom lookup in place of the environment
    pub fn resolve_with<F>(&self, lookup: F) -> String
    where
        F: FnOnce(&str) -> Option<String>,
    {
        if !self.enable {
            return "*".to_string();
        }
        if let Some(filter) = &self.filter {
            return filter.clone();
        }
        lookup(&self.env_key).unwrap_or_else(|| self.default_filter.clone())
    }
}

/// Pipeline stage applying the namespace filter
#[derive(Clone, Debug)]
pub struct FilterStage {
    level: Level,
    matcher: NamespaceMatcher,
}

impl FilterStage {
    pub fn new(filter: &str, level: Level, namespace_delimiter: &str) -> Result<Self, FilterError> {
        let syntax = FilterSyntax {
            namespace_delimiter: namespace_delimiter.to_string(),
            ..FilterSyntax::default()
        };
        Ok(Self {
            level,
            matcher: NamespaceMatcher::new(filter, syntax)?,
        })
    }

    pub fn from_options(options: &FilterOptions, namespace_delimiter: &str) -> Result<Self, FilterError> {
        Self::new(&options.resolve(), options.level, namespace_delimiter)
    }

    pub fn filter(&self) -> &str {
        self.matcher.filter()
    }

    /// Whole-filter decision for a namespace
    pub fn is_enabled(&self, namespace: Option<&str>) -> bool {
        let filter = self.matcher.filter().trim();
        if filter == "*" {
            return true;
        }

        match namespace {
            _ if filter == "-*" => false,
            Some(ns) if !ns.is_empty() => self.matcher.matches(ns),
            _ => false,
        }
    }
}

impl Stage for FilterStage {
    fn name(&self) -> &str {
        "filter"
    }

    fn apply(&self, record: LogRecord) -> Option<LogRecord> {
        if record.level.ordinal() < self.level.ordinal() {
            return Some(record);
        }

        self.is_enabled(record.namespace.as_deref()).then_some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(filter: &str, namespace: &str) -> bool {
        NamespaceMatcher::new(filter, FilterSyntax::default())
            .unwrap()
            .matches(namespace)
    }

    #[test]
    fn test_star_matches_everything() {
        for ns in ["", "a", "a:b", "service:worker:7"] {
            assert!(matches("*", ns));
        }
    }

    #[test]
    fn test_exclude_all() {
        for ns in ["a", "a:b", "x"] {
            assert!(!matches("-*", ns));
        }
    }

    #[test]
    fn test_exclude_has_priority() {
        assert!(!matches("a:*,-a:b", "a:b"));
        assert!(!matches("-a:b,a:*", "a:b"));
        assert!(matches("a:*,-a:b", "a:c"));
        assert!(!matches("a:*,-a:b", "a:b:c"));
    }

    #[test]
    fn test_all_exclude_defaults_to_pass() {
        assert!(matches("-a", "b"));
        assert!(!matches("-a", "a"));
    }

    #[test]
    fn test_children_match_parent_pattern() {
        assert!(matches("svc", "svc"));
        assert!(matches("svc", "svc:db"));
        assert!(!matches("svc", "svc2"));
        assert!(matches("svc:*", "svc"));
        assert!(matches("svc:*", "svc:db:pool"));
    }

    #[test]
    fn test_inner_wildcard() {
        assert!(matches("api:*:auth", "api:v1:auth"));
        assert!(matches("api*", "api-gateway"));
        assert!(!matches("api:*:auth", "api:v1:billing"));
    }

    #[test]
    fn test_positive_without_match_fails() {
        assert!(!matches("a,b", "c"));
    }

    #[test]
    fn test_whitespace_and_empty_tokens() {
        assert!(matches(" a ,, b ", "b"));
        assert!(matches("a b", "a"));
        assert!(matches("", "anything"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        assert!(matches("a.b", "a.b"));
        assert!(!matches("a.b", "axb"));
        assert!(matches("(x)", "(x)"));
    }

    #[test]
    fn test_bare_except_is_config_error() {
        let result = NamespaceMatcher::new("a,-", FilterSyntax::default());
        assert!(matches!(result, Err(FilterError::EmptyPattern { .. })));
    }

    #[test]
    fn test_custom_syntax() {
        let syntax = FilterSyntax {
            delimiter: ';',
            except: '!',
            namespace_delimiter: ".".to_string(),
        };
        let matcher = NamespaceMatcher::new("app.*;!app.noisy", syntax).unwrap();
        assert!(matcher.matches("app.db"));
        assert!(!matcher.matches("app.noisy.poll"));
        assert!(!matcher.matches("other"));
    }

    #[test]
    fn test_stage_specials() {
        let all = FilterStage::new("*", Level::Debug, ":").unwrap();
        assert!(all.is_enabled(None));

        let none = FilterStage::new("-*", Level::Debug, ":").unwrap();
        assert!(!none.is_enabled(Some("a")));

        let some = FilterStage::new("-a", Level::Debug, ":").unwrap();
        assert!(!some.is_enabled(None));
        assert!(some.is_enabled(Some("b")));
    }

    #[test]
    fn test_stage_level_bypass() {
        let stage = FilterStage::new("-*", Level::Debug, ":").unwrap();

        let mut info = LogRecord::new(Level::Info, "x", vec![]);
        info.namespace = Some("a".into());
        assert!(stage.apply(info).is_some());

        let mut debug = LogRecord::new(Level::Debug, "x", vec![]);
        debug.namespace = Some("a".into());
        assert!(stage.apply(debug).is_none());
    }

    #[test]
    fn test_resolve_filter() {
        let options = FilterOptions::default();
        assert_eq!(options.resolve_with(|_| None), "-*");
        assert_eq!(options.resolve_with(|k| Some(format!("{k}:*"))), "DEBUG:*");

        let disabled = FilterOptions {
            enable: false,
            ..FilterOptions::default()
        };
        assert_eq!(disabled.resolve_with(|_| Some("-*".into())), "*");

        let explicit = FilterOptions {
            filter: Some("api:*".into()),
            ..FilterOptions::default()
        };
        assert_eq!(explicit.resolve_with(|_| Some("other".into())), "api:*");
    }
}
