//! Removal of the compiler-emitted preamble before minification.

use std::sync::LazyLock;

use regex::Regex;

/// Lines dropped after the first line by the fixed-offset strategy.
pub const DEFAULT_PREAMBLE_LINES: usize = 21;

/// How the preamble of a compiled script is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreambleStrategy {
    /// Keep line 0, drop lines `1..=lines`, keep the rest.
    FixedOffset { lines: usize },

    /// Keep line 0, then drop blank, comment and directive lines up to the
    /// first real statement.
    Detect,
}

impl Default for PreambleStrategy {
    fn default() -> Self {
        Self::FixedOffset {
            lines: DEFAULT_PREAMBLE_LINES,
        }
    }
}

static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    // "use strict";  Object.defineProperty(exports, "__esModule", ...);  exports.x = void 0;
    Regex::new(
        r#"^\s*(?:['"]use strict['"]\s*;?|Object\.defineProperty\(\s*exports\s*,\s*['"]__esModule['"].*|(?:exports\.[\w$]+\s*=\s*)+void 0\s*;?)\s*$"#,
    )
    .expect("Invalid directive regex")
});

/// Strip the preamble from compiled script text.
///
/// Lines are split on `\n` and joined back with `\n`.
pub fn strip_preamble(source: &str, strategy: PreambleStrategy) -> String {
    let lines: Vec<&str> = source.split('\n').collect();

    let kept: Vec<&str> = match strategy {
        PreambleStrategy::FixedOffset { lines: count } => lines
            .iter()
            .enumerate()
            .filter(|(index, _)| *index == 0 || *index > count)
            .map(|(_, line)| *line)
            .collect(),
        PreambleStrategy::Detect => {
            let (body, offset) = first_statement(&lines);
            let mut kept: Vec<&str> = lines.iter().take(1).copied().collect();
            if let Some(first) = lines.get(body) {
                kept.push(&first[offset..]);
                kept.extend(lines.iter().skip(body + 1));
            }
            kept
        }
    };

    kept.join("\n")
}

/// Index of the first line after line 0 that is not preamble, and the byte
/// offset its code starts at (past a block comment closing on that line).
fn first_statement(lines: &[&str]) -> (usize, usize) {
    let mut in_block_comment = false;

    for (index, line) in lines.iter().enumerate().skip(1) {
        let offset = if in_block_comment {
            line.find("*/").map_or(0, |end| end + 2)
        } else {
            0
        };

        let (code, still_open) = strip_line_comments(line, in_block_comment);
        in_block_comment = still_open;

        let code = code.trim();
        if code.is_empty() || DIRECTIVE_RE.is_match(code) {
            continue;
        }

        return (index, offset);
    }

    (lines.len(), 0)
}

/// Code left on a line once comments are removed, and whether a block
/// comment is still open at the end of it.
fn strip_line_comments(line: &str, mut in_block: bool) -> (String, bool) {
    let mut code = String::new();
    let mut rest = line;

    loop {
        if in_block {
            match rest.find("*/") {
                Some(end) => {
                    rest = &rest[end + 2..];
                    in_block = false;
                }
                None => return (code, true),
            }
        }

        match (rest.find("/*"), rest.find("//")) {
            (Some(block), Some(line)) if line < block => {
                code.push_str(&rest[..line]);
                return (code, false);
            }
            (Some(block), _) => {
                code.push_str(&rest[..block]);
                code.push(' ');
                rest = &rest[block + 2..];
                in_block = true;
            }
            (None, Some(line)) => {
                code.push_str(&rest[..line]);
                return (code, false);
            }
            (None, None) => {
                code.push_str(rest);
                return (code, false);
            }
        }
    }
}
