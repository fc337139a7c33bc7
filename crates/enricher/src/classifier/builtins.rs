//! Builtin functions available to classifier rules.

use std::fmt;

use regex::Regex;

use super::RuleScope;
use super::eval::{EvalError, Value};
use super::result::Tag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    /// `ClassifyRegion("x")` and friends
    Classify(Tag),
    /// `ClassifyRegionRegex(input, pattern, template)` and friends
    ClassifyRegex(Tag),
    ClassifyExternal,
    ClassifyInternal,
    SetName,
    SetDescription,
    Reject,
    Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(n) => write!(f, "{n}"),
            Self::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

impl Builtin {
    /// Resolve a function name for `scope`.
    pub(crate) fn resolve(name: &str, scope: RuleScope) -> Option<Self> {
        let builtin = match name {
            "Reject" => Self::Reject,
            "Format" => Self::Format,
            "ClassifyExternal" => Self::ClassifyExternal,
            "ClassifyInternal" => Self::ClassifyInternal,
            "SetName" => Self::SetName,
            "SetDescription" => Self::SetDescription,
            _ => {
                let rest = name.strip_prefix("Classify")?;
                match rest.strip_suffix("Regex") {
                    Some(tag) => Self::ClassifyRegex(Tag::from_name(tag)?),
                    None => Self::Classify(Tag::from_name(rest)?),
                }
            }
        };
        builtin.allowed_in(scope).then_some(builtin)
    }

    fn allowed_in(self, scope: RuleScope) -> bool {
        match self {
            Self::Reject | Self::Format => true,
            Self::Classify(tag) | Self::ClassifyRegex(tag) => tag.scope() == scope,
            Self::ClassifyExternal | Self::ClassifyInternal | Self::SetName | Self::SetDescription => {
                scope == RuleScope::Interface
            }
        }
    }

    pub(crate) fn arity(self) -> Arity {
        match self {
            Self::Classify(_) | Self::SetName | Self::SetDescription => Arity::Exact(1),
            Self::ClassifyRegex(_) => Arity::Exact(3),
            Self::ClassifyExternal | Self::ClassifyInternal | Self::Reject => Arity::Exact(0),
            Self::Format => Arity::AtLeast(1),
        }
    }
}

/// Expand `template` for every match of `regex` in `input`.
///
/// Returns an empty string when nothing matches.
pub(crate) fn expand_regex(regex: &Regex, input: &str, template: &str) -> String {
    let mut out = String::new();
    for caps in regex.captures_iter(input) {
        caps.expand(template, &mut out);
    }
    out
}

/// printf-style formatting with `%s`, `%v`, `%d` and `%%`.
pub(crate) fn format(template: &str, args: &[Value<'_>]) -> Result<String, EvalError> {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let verb = chars
            .next()
            .ok_or_else(|| EvalError::Format("trailing % in format string".to_owned()))?;
        if verb == '%' {
            out.push('%');
            continue;
        }
        let arg = args
            .next()
            .ok_or_else(|| EvalError::Format(format!("missing argument for %{verb}")))?;
        match (verb, arg) {
            ('s' | 'v', value) => out.push_str(&value.to_string()),
            ('d', Value::Int(i)) => out.push_str(&i.to_string()),
            ('d', other) => {
                return Err(EvalError::Format(format!(
                    "%d expects an integer, got {}",
                    other.type_name()
                )));
            }
            (other, _) => {
                return Err(EvalError::Format(format!("unsupported verb %{other}")));
            }
        }
    }
    if args.next().is_some() {
        return Err(EvalError::Format("too many arguments".to_owned()));
    }
    Ok(out)
}
