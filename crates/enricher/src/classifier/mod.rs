//! Classifier rule engine.
//!
//! Rules are short boolean expressions compiled once at startup. Evaluating
//! a [`RuleSet`] runs each rule in order against a [`ClassifierContext`];
//! builtins such as `ClassifyRegion("europe")` write into a shared
//! [`ClassifierResult`] as a side effect.
//!
//! ```text
//! Exporter.Name startsWith "th2-" && ClassifySite("th2")
//! Interface.VLAN > 200 && SetName(Format("%s.%d", Interface.Name, Interface.VLAN))
//! ClassifyProviderRegex(Interface.Description, "^Transit: ([^ ]+)", "$1")
//! ```
//!
//! A rule that fails at runtime (type mismatch, bad dynamic regex) counts as
//! false: the error is logged through a burst sampler and the next rule
//! runs. A `Reject()` stops the list.

mod ast;
mod builtins;
mod eval;
mod lexer;
mod result;

use std::fmt;
use std::net::IpAddr;

use ironflow_core::metrics as m;
use ironflow_core::sampler::LogSampler;
use tracing::warn;

pub use eval::EvalError;
pub use result::{ClassifierResult, Tag};

/// Which rule list a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleScope {
    /// `Exporter.*` fields; region/site/tenant/role/group tags
    Exporter,
    /// `Exporter.*` and `Interface.*` fields; provider/connectivity tags,
    /// boundary and interface renaming
    Interface,
}

impl fmt::Display for RuleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exporter => write!(f, "exporter"),
            Self::Interface => write!(f, "interface"),
        }
    }
}

/// Lexer/parser failure inside one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyntaxError {
    pub offset: usize,
    pub reason: String,
}

impl SyntaxError {
    pub(crate) fn new(offset: usize, reason: impl Into<String>) -> Self {
        Self {
            offset,
            reason: reason.into(),
        }
    }
}

/// A rule failed to compile. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot compile {scope} classifier rule #{rule} at offset {offset}: {reason}")]
pub struct ClassifierError {
    pub scope: RuleScope,
    /// 1-based position in the rule list
    pub rule: usize,
    pub offset: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ExporterContext<'a> {
    pub ip: IpAddr,
    pub name: &'a str,
}

#[derive(Debug, Clone, Copy)]
pub struct InterfaceContext<'a> {
    pub index: u32,
    pub name: &'a str,
    pub description: &'a str,
    /// Mbps
    pub speed: u64,
    pub vlan: u16,
}

/// Read-only view a rule is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierContext<'a> {
    pub exporter: ExporterContext<'a>,
    /// `None` for exporter rules
    pub interface: Option<InterfaceContext<'a>>,
}

impl<'a> ClassifierContext<'a> {
    pub fn exporter(exporter: ExporterContext<'a>) -> Self {
        Self {
            exporter,
            interface: None,
        }
    }

    pub fn interface(exporter: ExporterContext<'a>, interface: InterfaceContext<'a>) -> Self {
        Self {
            exporter,
            interface: Some(interface),
        }
    }
}

#[derive(Debug)]
struct Rule {
    source: String,
    expr: ast::Expr,
}

/// Ordered, compiled rule list for one scope.
#[derive(Debug)]
pub struct RuleSet {
    scope: RuleScope,
    rules: Vec<Rule>,
    error_log: LogSampler,
}

impl RuleSet {
    /// Compile `sources` in order; the first invalid rule aborts.
    pub fn compile<S: AsRef<str>>(scope: RuleScope, sources: &[S]) -> Result<Self, ClassifierError> {
        let rules = sources
            .iter()
            .enumerate()
            .map(|(i, source)| {
                let source = source.as_ref();
                compile_rule(scope, source).map_err(|e| ClassifierError {
                    scope,
                    rule: i + 1,
                    offset: e.offset,
                    reason: e.reason,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            scope,
            rules,
            error_log: LogSampler::default(),
        })
    }

    pub fn scope(&self) -> RuleScope {
        self.scope
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule in order, stopping early once a rule rejects.
    pub fn evaluate(&self, ctx: &ClassifierContext<'_>, result: &mut ClassifierResult) {
        for rule in &self.rules {
            if let Err(e) = eval::eval_rule(&rule.expr, ctx, result) {
                metrics::counter!(m::ENRICHER_CLASSIFIER_ERRORS_TOTAL, m::LABEL_SCOPE => self.scope.to_string())
                    .increment(1);
                if self.error_log.allow() {
                    warn!(
                        scope = %self.scope,
                        rule = rule.source.as_str(),
                        exporter = %ctx.exporter.ip,
                        error = %e,
                        "classifier rule failed"
                    );
                }
            }
            if result.rejected {
                break;
            }
        }
    }
}

fn compile_rule(scope: RuleScope, source: &str) -> Result<Rule, SyntaxError> {
    let tokens = lexer::tokenize(source)?;
    let expr = ast::parse(&tokens, scope, source.len())?;
    Ok(Rule {
        source: source.to_owned(),
        expr,
    })
}
