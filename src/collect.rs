use std::io::Read;
use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;

use anyhow::{Context, Result, anyhow};
use regex::bytes::Regex;
use walkdir::WalkDir;

use crate::line_reader::LineReader;
use crate::names::{NameEntry, NameList, has_line_break, is_pseudo_entry, os_bytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    /// POSIX basic syntax (`-e`): `\(`, `\{`, `\|`, `\+`, `\?` are operators.
    Basic,
    /// POSIX extended syntax (`-E`).
    Extended,
}

#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(expr: &str, syntax: Syntax) -> Result<Self> {
        let translated = match syntax {
            Syntax::Basic => translate_basic(expr),
            Syntax::Extended => expr.to_string(),
        };
        let regex = Regex::new(&translated)
            .map_err(|err| anyhow!("invalid regular expression '{expr}': {err}"))?;
        Ok(Self {
            source: expr.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, name: &[u8]) -> bool {
        self.regex.is_match(name)
    }
}

#[derive(Debug, Clone)]
pub enum Source {
    Directory(Pattern),
    Stream,
}

/// Gathers the names to edit. `Ok(None)` means nothing matched, which is
/// a normal outcome rather than an error.
pub fn collect<R: Read>(source: &Source, dir: &Path, stdin: R) -> Result<Option<NameList>> {
    let names = match source {
        Source::Directory(pattern) => scan_directory(dir, pattern)?,
        Source::Stream => read_names(stdin)?,
    };
    Ok((!names.is_empty()).then_some(names))
}

/// Entries of `dir` whose base name matches, in descending name order.
pub fn scan_directory(dir: &Path, pattern: &Pattern) -> Result<NameList> {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by(|a, b| b.file_name().cmp(a.file_name()));

    let mut names = NameList::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("reading directory {}", dir.display()))?;
        let name = os_bytes(entry.file_name());
        if is_pseudo_entry(&name) || !pattern.is_match(&name) {
            continue;
        }
        // The manifest is line based; such a name could never come back intact.
        if has_line_break(&name) {
            eprintln!(
                "warning: skipping {:?}: name contains a line break",
                entry.path()
            );
            continue;
        }
        names.push(NameEntry::new(name.into_owned()));
    }
    Ok(names)
}

/// One name per line; blank lines and pseudo-entries are skipped. Names are
/// kept in reverse order of arrival.
pub fn read_names<R: Read>(source: R) -> Result<NameList> {
    let mut reader = LineReader::new(source);
    let mut entries = Vec::new();
    while let Some(line) = reader
        .next_line()
        .context("reading names from standard input")?
    {
        if line.is_empty() || is_pseudo_entry(line) {
            continue;
        }
        entries.push(NameEntry::new(line));
    }
    entries.reverse();
    Ok(NameList::from(entries))
}

/// Rewrites a POSIX basic expression into `regex` syntax.
fn translate_basic(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len() + 8);
    let mut chars = expr.chars().peekable();
    // A `*` here is a literal, as at the start of the expression.
    let mut atom_start = true;

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(op @ ('(' | ')' | '{' | '}' | '|' | '+' | '?')) => {
                    out.push(op);
                    atom_start = op == '(' || op == '|';
                    continue;
                }
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push_str("\\\\"),
            },
            '(' | ')' | '{' | '}' | '|' | '+' | '?' => {
                out.push('\\');
                out.push(ch);
            }
            '*' if atom_start => out.push_str("\\*"),
            '^' if atom_start => {
                out.push('^');
                continue;
            }
            '^' => out.push_str("\\^"),
            '$' if ends_subexpression(&chars) => out.push('$'),
            '$' => out.push_str("\\$"),
            '[' => copy_bracket(&mut chars, &mut out),
            _ => out.push(ch),
        }
        atom_start = false;
    }
    out
}

/// `$` anchors only at the end of the expression or right before `\)` or
/// `\|`; anywhere else it is literal.
fn ends_subexpression(chars: &Peekable<Chars<'_>>) -> bool {
    let mut ahead = chars.clone();
    match (ahead.next(), ahead.next()) {
        (None, _) => true,
        (Some('\\'), Some(')' | '|')) => true,
        _ => false,
    }
}

/// Copies a bracket expression whose opening `[` was already consumed.
/// Backslashes and stray `[` are literal inside POSIX brackets.
fn copy_bracket(chars: &mut Peekable<Chars<'_>>, out: &mut String) {
    out.push('[');
    if chars.peek() == Some(&'^') {
        chars.next();
        out.push('^');
    }
    if chars.peek() == Some(&']') {
        chars.next();
        out.push_str("\\]");
    }
    while let Some(ch) = chars.next() {
        match ch {
            ']' => {
                out.push(']');
                return;
            }
            '[' if chars.peek() == Some(&':') => {
                out.push('[');
                for class_ch in chars.by_ref() {
                    out.push(class_ch);
                    if class_ch == ']' {
                        break;
                    }
                }
            }
            '[' | '\\' | '&' | '~' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
}
