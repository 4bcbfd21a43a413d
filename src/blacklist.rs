//! Tag blacklist
//!
//! A blacklist is a list of rules. Each rule is one line of whitespace-separated
//! patterns, all of which must match for the rule to match:
//!
//! - `tag` matches an item carrying `tag`
//! - `*` inside a pattern matches any run of characters (`pre*` matches `prefix`)
//! - a leading `-` negates the pattern (`-safe` matches items *without* `safe`)
//!
//! An item is blacklisted when any rule matches. Evaluation is pure.

use crate::config::BlacklistConfig;
use regex::Regex;
use tracing::warn;

/// Compiled tag blacklist
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    rules: Vec<Rule>,
    case_sensitive: bool,
}

#[derive(Debug, Clone)]
struct Rule {
    source: String,
    patterns: Vec<Pattern>,
}

#[derive(Debug, Clone)]
struct Pattern {
    negated: bool,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Wildcard(Regex),
}

impl Blacklist {
    /// Build a case-insensitive blacklist from rule lines
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_case_sensitivity(lines, false)
    }

    /// Build a blacklist with explicit case sensitivity
    pub fn with_case_sensitivity<I, S>(lines: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = lines
            .into_iter()
            .filter_map(|line| Rule::parse(line.as_ref(), case_sensitive))
            .collect();
        Self {
            rules,
            case_sensitive,
        }
    }

    /// Build a blacklist from the configured rule lines
    pub fn from_config(config: &BlacklistConfig) -> Self {
        Self::with_case_sensitivity(&config.tags, config.case_sensitive)
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True if there are no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Return the source lines of every rule matching `tags`
    pub fn matches<S: AsRef<str>>(&self, tags: &[S]) -> Vec<&str> {
        let normalized: Vec<String> = tags
            .iter()
            .map(|t| normalize(t.as_ref(), self.case_sensitive))
            .collect();
        self.rules
            .iter()
            .filter(|rule| rule.matches(&normalized))
            .map(|rule| rule.source.as_str())
            .collect()
    }

    /// True if any rule matches `tags`
    pub fn is_blacklisted<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        !self.matches(tags).is_empty()
    }
}

impl Rule {
    fn parse(line: &str, case_sensitive: bool) -> Option<Self> {
        let patterns: Vec<Pattern> = line
            .split_whitespace()
            .filter_map(|token| Pattern::parse(token, case_sensitive))
            .collect();
        if patterns.is_empty() {
            return None;
        }
        Some(Self {
            source: line.trim().to_string(),
            patterns,
        })
    }

    fn matches(&self, tags: &[String]) -> bool {
        self.patterns.iter().all(|pattern| {
            let present = tags.iter().any(|tag| pattern.matcher.matches(tag));
            present != pattern.negated
        })
    }
}

impl Pattern {
    fn parse(token: &str, case_sensitive: bool) -> Option<Self> {
        let (negated, body) = match token.strip_prefix('-') {
            Some(rest) if !rest.is_empty() => (true, rest),
            _ => (false, token),
        };
        let body = normalize(body, case_sensitive);
        if body.is_empty() {
            return None;
        }

        let matcher = if body.contains('*') {
            compile_wildcard(&body).map_or(Matcher::Exact(body), Matcher::Wildcard)
        } else {
            Matcher::Exact(body)
        };
        Some(Self { negated, matcher })
    }
}

impl Matcher {
    fn matches(&self, tag: &str) -> bool {
        match self {
            Matcher::Exact(expected) => expected == tag,
            Matcher::Wildcard(re) => re.is_match(tag),
        }
    }
}

fn normalize(tag: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        tag.to_string()
    } else {
        tag.to_lowercase()
    }
}

fn compile_wildcard(pattern: &str) -> Option<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    // Size limit keeps pathological rule files from blowing up the compiled DFA
    match regex::RegexBuilder::new(&format!("^{body}$"))
        .size_limit(1 << 20)
        .build()
    {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(pattern, error = %e, "invalid blacklist wildcard, matching literally");
            None
        }
    }
}
