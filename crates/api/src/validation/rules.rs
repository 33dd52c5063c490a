//! Typed field rules and their token syntax.
//!
//! Endpoints declare rules with short tokens (`"required"`, `"min:3"`,
//! `"in:asc,desc"`, `"regex:^[a-z]+$"`). Tokens are parsed once, when the
//! [`RuleSet`] is built, so a bad token is a startup error rather than a
//! per-request one.

use regex::Regex;
use thiserror::Error;

/// Tokens accepted by a `boolean_like` field.
pub const BOOLEAN_LIKE_TOKENS: [&str; 6] = ["true", "false", "1", "0", "on", "off"];

/// Tokens that normalise to `true`.
pub const TRUTHY_TOKENS: [&str; 3] = ["true", "1", "on"];

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

/// Errors produced while parsing rule tokens.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("unknown rule `{0}`")]
    Unknown(String),

    #[error("rule `{rule}` needs a numeric argument, got `{arg}`")]
    BadBound { rule: String, arg: String },

    #[error("rule `in` needs at least one value")]
    EmptyEnumeration,

    #[error("invalid regex `{pattern}`: {source}")]
    BadPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A single field rule.
#[derive(Debug, Clone)]
pub enum Rule {
    Required,
    Nullable,
    String,
    Integer,
    Numeric,
    Email(Regex),
    BooleanLike,
    Min(f64),
    Max(f64),
    In(Vec<String>),
    Regex(Regex),
}

impl Rule {
    /// Parse one rule token.
    ///
    /// # Errors
    ///
    /// Returns a [`RuleError`] for unknown rules, bad bounds, empty
    /// enumerations and invalid patterns.
    pub fn parse(token: &str) -> Result<Self, RuleError> {
        let (name, arg) = match token.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (token, None),
        };

        let rule = match (name, arg) {
            ("required", None) => Rule::Required,
            ("nullable", None) => Rule::Nullable,
            ("string", None) => Rule::String,
            ("integer", None) => Rule::Integer,
            ("numeric", None) => Rule::Numeric,
            ("email", None) => Rule::Email(compile(EMAIL_PATTERN)?),
            ("boolean_like", None) => Rule::BooleanLike,
            ("min", Some(arg)) => Rule::Min(parse_bound(name, arg)?),
            ("max", Some(arg)) => Rule::Max(parse_bound(name, arg)?),
            ("in", Some(arg)) => {
                let values: Vec<String> = arg
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_owned)
                    .collect();
                if values.is_empty() {
                    return Err(RuleError::EmptyEnumeration);
                }
                Rule::In(values)
            }
            ("regex", Some(pattern)) => Rule::Regex(compile(pattern)?),
            _ => return Err(RuleError::Unknown(token.to_owned())),
        };
        Ok(rule)
    }
}

fn parse_bound(rule: &str, arg: &str) -> Result<f64, RuleError> {
    arg.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| RuleError::BadBound {
            rule: rule.to_owned(),
            arg: arg.to_owned(),
        })
}

fn compile(pattern: &str) -> Result<Regex, RuleError> {
    Regex::new(pattern).map_err(|source| RuleError::BadPattern {
        pattern: pattern.to_owned(),
        source,
    })
}

/// Ordered rules declared for one field.
#[derive(Debug, Clone)]
pub struct FieldRules {
    name: String,
    rules: Vec<Rule>,
}

impl FieldRules {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_required(&self) -> bool {
        self.rules.iter().any(|r| matches!(r, Rule::Required))
    }

    pub fn is_nullable(&self) -> bool {
        self.rules.iter().any(|r| matches!(r, Rule::Nullable))
    }

    /// Sizes are compared by value rather than by length.
    pub fn is_numeric(&self) -> bool {
        self.rules
            .iter()
            .any(|r| matches!(r, Rule::Integer | Rule::Numeric))
    }

    pub fn is_integer(&self) -> bool {
        self.rules.iter().any(|r| matches!(r, Rule::Integer))
    }

    pub fn is_boolean_like(&self) -> bool {
        self.rules.iter().any(|r| matches!(r, Rule::BooleanLike))
    }
}

/// Field name → ordered rules, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    fields: Vec<FieldRules>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field with its rule tokens.
    ///
    /// # Errors
    ///
    /// Returns the first [`RuleError`] among `tokens`.
    pub fn field(mut self, name: &str, tokens: &[&str]) -> Result<Self, RuleError> {
        let rules = tokens
            .iter()
            .map(|t| Rule::parse(t))
            .collect::<Result<Vec<_>, _>>()?;
        self.fields.push(FieldRules {
            name: name.to_owned(),
            rules,
        });
        Ok(self)
    }

    pub fn fields(&self) -> &[FieldRules] {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_argument_rules() {
        assert!(matches!(Rule::parse("required").unwrap(), Rule::Required));
        assert!(matches!(Rule::parse("min:3").unwrap(), Rule::Min(n) if n == 3.0));
        assert!(matches!(Rule::parse("max:0.5").unwrap(), Rule::Max(n) if n == 0.5));
        match Rule::parse("in:asc, desc").unwrap() {
            Rule::In(v) => assert_eq!(v, ["asc", "desc"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn regex_keeps_colons_and_commas() {
        match Rule::parse("regex:^a:b,{1,3}$").unwrap() {
            Rule::Regex(re) => assert!(re.is_match("a:b,,")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_tokens() {
        assert!(matches!(Rule::parse("sometimes"), Err(RuleError::Unknown(_))));
        assert!(matches!(Rule::parse("min:abc"), Err(RuleError::BadBound { .. })));
        assert!(matches!(Rule::parse("in:"), Err(RuleError::EmptyEnumeration)));
        assert!(matches!(Rule::parse("regex:("), Err(RuleError::BadPattern { .. })));
        assert!(matches!(Rule::parse("required:1"), Err(RuleError::Unknown(_))));
    }

    #[test]
    fn rule_set_keeps_declaration_order() {
        let set = RuleSet::new()
            .field("b", &["required"])
            .unwrap()
            .field("a", &["nullable", "integer", "min:0"])
            .unwrap();
        let names: Vec<_> = set.fields().iter().map(FieldRules::name).collect();
        assert_eq!(names, ["b", "a"]);
        assert!(set.fields()[1].is_nullable());
        assert!(set.fields()[1].is_numeric());
        assert!(!set.fields()[1].is_required());
    }

    #[test]
    fn email_rule_matches_addresses() {
        match Rule::parse("email").unwrap() {
            Rule::Email(re) => {
                assert!(re.is_match("user@example.com"));
                assert!(!re.is_match("user@example"));
                assert!(!re.is_match("not an email"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
