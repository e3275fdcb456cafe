use crate::error::Result;
use crate::logs::color::TargetColor;
use regex::{Captures, Regex};

/// Group separator printed when trailing context runs out, as `grep -A` does
pub const SEPARATOR: &str = "--";

/// Line selection settings shared read-only by every worker
///
/// A missing or blank pattern puts the filter in pass-through mode.
/// `context` mirrors `grep -A`: after a match, the next `context` lines are
/// emitted whether or not they match.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    pattern: Option<Regex>,
    context: usize,
}

/// Outcome of running one line through the filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Decorated line to print, `None` when the line is suppressed
    pub line: Option<String>,
    /// Trailing context ran out on this line; print a separator after it
    pub separator: bool,
    /// Trailing-context lines still owed after this one
    pub remaining: usize,
}

impl FilterSpec {
    /// Build a filter. Blank patterns are treated as no pattern; any other
    /// pattern is compiled exactly as given, surrounding spaces included.
    pub fn new(pattern: Option<&str>, context: usize) -> Result<Self> {
        let pattern = match pattern {
            Some(p) if !p.trim().is_empty() => Some(Regex::new(p)?),
            _ => None,
        };

        Ok(Self { pattern, context })
    }

    /// Filter that emits every line unchanged
    pub fn pass_through() -> Self {
        Self {
            pattern: None,
            context: 0,
        }
    }

    pub fn is_pass_through(&self) -> bool {
        self.pattern.is_none()
    }

    pub fn context(&self) -> usize {
        self.context
    }

    /// Decide whether `line` is printed and how its matches are highlighted.
    ///
    /// `remaining` is the caller's trailing-context counter; the updated value
    /// comes back in [`Verdict::remaining`].
    pub fn apply(&self, line: &str, remaining: usize, highlight: TargetColor) -> Verdict {
        let Some(ref re) = self.pattern else {
            return Verdict {
                line: Some(line.to_string()),
                separator: false,
                remaining,
            };
        };

        if re.is_match(line) {
            let decorated = re.replace_all(line, |caps: &Captures| {
                let m = &caps[0];
                if m.is_empty() {
                    String::new()
                } else {
                    highlight.paint(m)
                }
            });

            return Verdict {
                line: Some(decorated.into_owned()),
                separator: false,
                remaining: if self.context > 0 {
                    self.context
                } else {
                    remaining
                },
            };
        }

        if remaining == 0 {
            return Verdict {
                line: None,
                separator: false,
                remaining: 0,
            };
        }

        let remaining = remaining - 1;
        Verdict {
            line: Some(line.to_string()),
            separator: remaining == 0,
            remaining,
        }
    }
}
