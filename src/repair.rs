//! Heuristic closing of truncated JSON text.
//!
//! Two passes run in order: quote balancing, then brace/bracket balancing. Both are
//! idempotent. The result is not guaranteed to be valid JSON; callers must still attempt
//! a decode and treat failure as "not enough data yet".

use crate::classify::is_escaped;
use crate::options::{BalanceStrategy, Options};
use memchr::{memchr_iter, memchr2_iter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairLogEntry {
    pub position: usize,
    pub message: &'static str,
    pub context: String,
}

#[derive(Default)]
struct Logger {
    enable: bool,
    window: usize,
    entries: Vec<RepairLogEntry>,
}

impl Logger {
    fn new(opts: &Options) -> Self {
        Self { enable: opts.logging, window: opts.log_context_window, entries: Vec::new() }
    }

    #[inline]
    fn log(&mut self, text: &str, position: usize, message: &'static str) {
        if self.enable {
            self.entries.push(RepairLogEntry {
                position,
                message,
                context: context_snippet(text, position, self.window),
            });
        }
    }
}

fn context_snippet(text: &str, position: usize, window: usize) -> String {
    let mut start = position.saturating_sub(window);
    while start > 0 && !text.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (position + window).min(text.len());
    while end < text.len() && !text.is_char_boundary(end) {
        end += 1;
    }
    text[start..end].to_string()
}

/// Number of `"` not preceded by an odd run of backslashes.
pub fn unescaped_quote_count(text: &str) -> usize {
    let bytes = text.as_bytes();
    memchr_iter(b'"', bytes).filter(|&i| !is_escaped(bytes, i)).count()
}

/// Repair `text` with the passes selected by `opts`.
pub fn repair(text: &str, opts: &Options) -> String {
    let mut logger = Logger::default();
    run(text, opts.bracket_balance, &mut logger)
}

/// Like [`repair`], also returning what was changed.
pub fn repair_with_log(text: &str, opts: &Options) -> (String, Vec<RepairLogEntry>) {
    let mut logger = Logger::new(opts);
    let out = run(text, opts.bracket_balance, &mut logger);
    (out, logger.entries)
}

fn run(text: &str, strategy: BalanceStrategy, logger: &mut Logger) -> String {
    let quoted = close_quotes(text, logger);
    match strategy {
        BalanceStrategy::CountBased => close_by_count(&quoted, logger),
        BalanceStrategy::StackBased => close_by_stack(&quoted, logger),
    }
}

/// Append a `"` when the unescaped quote count is odd.
pub fn balance_quotes(text: &str) -> String {
    close_quotes(text, &mut Logger::default())
}

/// Close braces and brackets with the given strategy.
pub fn balance_brackets(text: &str, strategy: BalanceStrategy) -> String {
    let mut logger = Logger::default();
    match strategy {
        BalanceStrategy::CountBased => close_by_count(text, &mut logger),
        BalanceStrategy::StackBased => close_by_stack(text, &mut logger),
    }
}

fn close_quotes(text: &str, logger: &mut Logger) -> String {
    if unescaped_quote_count(text) % 2 == 0 {
        return text.to_string();
    }
    let mut out = text.to_string();
    // a trailing lone backslash would escape the quote we append
    if is_escaped(out.as_bytes(), out.len()) {
        out.pop();
        logger.log(text, out.len(), "dropped dangling escape");
    }
    logger.log(text, out.len(), "closed unterminated string");
    out.push('"');
    out
}

fn close_by_count(text: &str, logger: &mut Logger) -> String {
    let bytes = text.as_bytes();
    let (mut open_brace, mut close_brace) = (0i64, 0i64);
    let (mut open_bracket, mut close_bracket) = (0i64, 0i64);
    for i in memchr2_iter(b'{', b'}', bytes) {
        if bytes[i] == b'{' { open_brace += 1 } else { close_brace += 1 }
    }
    for i in memchr2_iter(b'[', b']', bytes) {
        if bytes[i] == b'[' { open_bracket += 1 } else { close_bracket += 1 }
    }

    let mut out = text.to_string();
    if close_brace > open_brace {
        out = drop_last(&out, '}', (close_brace - open_brace) as usize);
        logger.log(text, text.len(), "removed surplus closing brace");
    }
    if close_bracket > open_bracket {
        out = drop_last(&out, ']', (close_bracket - open_bracket) as usize);
        logger.log(text, text.len(), "removed surplus closing bracket");
    }
    for _ in close_brace..open_brace {
        logger.log(text, text.len(), "appended closing brace");
        out.push('}');
    }
    for _ in close_bracket..open_bracket {
        logger.log(text, text.len(), "appended closing bracket");
        out.push(']');
    }
    out
}

/// Remove the last `n` occurrences of `ch`.
fn drop_last(text: &str, ch: char, n: usize) -> String {
    let mut left = n;
    let mut kept: Vec<char> = Vec::with_capacity(text.len());
    for c in text.chars().rev() {
        if c == ch && left > 0 {
            left -= 1;
            continue;
        }
        kept.push(c);
    }
    kept.into_iter().rev().collect()
}

fn close_by_stack(text: &str, logger: &mut Logger) -> String {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape = false;
    let mut out = String::with_capacity(text.len() + 8);
    for (i, c) in text.char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            out.push(c);
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                } else {
                    logger.log(text, i, "removed mismatched closer");
                    continue;
                }
            }
            _ => {}
        }
        out.push(c);
    }
    if in_string {
        logger.log(text, text.len(), "closed unterminated string");
        out.push('"');
    }
    while let Some(closer) = stack.pop() {
        logger.log(
            text,
            text.len(),
            if closer == '}' { "appended closing brace" } else { "appended closing bracket" },
        );
        out.push(closer);
    }
    out
}
