//! Structural extraction from JavaScript and TypeScript sources
//!
//! A lexical pass over `js`/`jsx`/`ts`/`tsx` files: line-anchored regexes
//! find declarations, imports, exports, hook calls, and navigation targets,
//! and a small brace scanner locates function body ends. No syntax tree is
//! built, so a file that would not even parse still yields facts.
//!
//! Extraction never returns an error to the caller. Unreadable or oversized
//! files produce a fact with the `error` field set, which the index store
//! treats as "keep whatever was indexed before".

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::EngineSettings;
use crate::schema::{ExportFacts, FunctionFact, FunctionKind, ImportFact, StructuralFact};

fn compile_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid regex literal {pattern}: {err}"))
}

/// Names that can follow `export default` without being the exported symbol
const NON_SYMBOL_KEYWORDS: &[&str] = &["new", "await", "typeof", "void", "function", "class", "async"];

// ============================================================================
// Extractor trait
// ============================================================================

/// Produces structural facts for one source file
pub trait Extractor: Send + Sync {
    /// Extract facts from the file at `path`
    ///
    /// Never fails outright: problems come back as an error-carrying fact so
    /// the caller can decide to keep previously indexed data.
    fn parse(&self, path: &Path) -> StructuralFact;
}

/// Regex-driven extractor for React Native style codebases
pub struct LexicalExtractor {
    /// Files larger than this are recorded but not parsed
    max_file_size: u64,
}

impl LexicalExtractor {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    /// Extract facts from source text already in memory
    pub fn parse_source(&self, source: &str) -> StructuralFact {
        let index = LineIndex::new(source);
        let functions = collect_functions(source, &index);
        let exports = collect_exports(source);
        let imports = collect_imports(source);
        let hooks = collect_hooks(source);
        let state_variables = collect_state_variables(source);
        let navigation_targets = collect_navigation_targets(source);
        let collection_references = collect_collection_references(source);
        let (is_component, component_name) =
            detect_component(source, &imports, &exports, &functions);

        StructuralFact {
            is_component,
            component_name,
            functions,
            exports,
            imports,
            hooks,
            state_variables,
            navigation_targets,
            collection_references,
            error: None,
        }
    }
}

impl Default for LexicalExtractor {
    fn default() -> Self {
        Self::new(EngineSettings::default().max_file_size_bytes)
    }
}

impl Extractor for LexicalExtractor {
    fn parse(&self, path: &Path) -> StructuralFact {
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                return StructuralFact::unavailable(format!(
                    "cannot stat {}: {}",
                    path.display(),
                    e
                ))
            }
        };
        if metadata.len() > self.max_file_size {
            return StructuralFact::unavailable(format!(
                "file is {} bytes, over the {} byte parse ceiling",
                metadata.len(),
                self.max_file_size
            ));
        }
        let source = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                return StructuralFact::unavailable(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                ))
            }
        };
        self.parse_source(&source)
    }
}

// ============================================================================
// Line mapping
// ============================================================================

/// Byte offset to 1-based line number mapping
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        Self { starts }
    }

    fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

fn collect_functions(source: &str, index: &LineIndex) -> Vec<FunctionFact> {
    static DECL_RE: Lazy<Regex> = Lazy::new(|| {
        compile_regex(
            r"(?m)^[ \t]*(?:export\s+)?(?:default\s+)?(async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)\s*\(",
        )
    });
    static ARROW_RE: Lazy<Regex> = Lazy::new(|| {
        compile_regex(
            r"(?m)^[ \t]*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(async\s+)?(?:\([^)\n]*\)|[A-Za-z_$][\w$]*)(?:[ \t]*:[ \t]*[\w$<>\[\],.|& \t]+)?[ \t]*\n?[ \t]*=>",
        )
    });

    let bytes = source.as_bytes();
    let mut functions: Vec<FunctionFact> = Vec::new();

    for cap in DECL_RE.captures_iter(source) {
        let whole = match cap.get(0) {
            Some(m) => m,
            None => continue,
        };
        let name = cap[2].to_string();
        let line = index.line_of(whole.start());
        // the pattern ends at the parameter list's opening paren
        let open_paren = whole.end() - 1;
        let end_line = matching_paren(bytes, open_paren)
            .map(|close| body_end_line(bytes, close + 1, line, index))
            .unwrap_or(line);

        functions.push(FunctionFact {
            name,
            kind: FunctionKind::Declaration,
            line,
            end_line,
            is_async: cap.get(1).is_some(),
        });
    }

    for cap in ARROW_RE.captures_iter(source) {
        let whole = match cap.get(0) {
            Some(m) => m,
            None => continue,
        };
        let name = cap[1].to_string();
        let line = index.line_of(whole.start());
        // expression-bodied arrows keep end == start, only brace bodies scan
        let end_line = match first_significant(bytes, whole.end()) {
            Some((open, b'{')) => balance_braces(bytes, open)
                .map(|close| index.line_of(close))
                .unwrap_or(line),
            _ => line,
        };

        functions.push(FunctionFact {
            name,
            kind: FunctionKind::Arrow,
            line,
            end_line,
            is_async: cap.get(2).is_some(),
        });
    }

    functions.sort_by(|a, b| a.line.cmp(&b.line).then_with(|| a.name.cmp(&b.name)));

    // first declaration wins when a name repeats in the same file
    let mut seen: Vec<&str> = Vec::new();
    let mut deduped = Vec::with_capacity(functions.len());
    for fact in &functions {
        if seen.contains(&fact.name.as_str()) {
            continue;
        }
        seen.push(fact.name.as_str());
        deduped.push(fact.clone());
    }
    deduped
}

// ============================================================================
// Exports and imports
// ============================================================================

fn collect_exports(source: &str) -> ExportFacts {
    static DEFAULT_RE: Lazy<Regex> = Lazy::new(|| {
        compile_regex(
            r"(?m)^[ \t]*export\s+default\s+(?:async\s+)?(?:function\s*\*?\s*|class\s+)?([A-Za-z_$][\w$]*)?",
        )
    });
    static DECL_RE: Lazy<Regex> = Lazy::new(|| {
        compile_regex(
            r"(?m)^[ \t]*export\s+(?:declare\s+)?(?:async\s+)?(?:function\s*\*?\s*|class\s+|const\s+|let\s+|var\s+|type\s+|interface\s+|enum\s+)([A-Za-z_$][\w$]*)",
        )
    });
    static BRACE_RE: Lazy<Regex> = Lazy::new(|| compile_regex(r"(?m)^[ \t]*export\s*\{([^}]*)\}"));

    let mut exports = ExportFacts::default();

    if let Some(cap) = DEFAULT_RE.captures(source) {
        exports.default = cap
            .get(1)
            .map(|m| m.as_str().to_string())
            .filter(|name| !NON_SYMBOL_KEYWORDS.contains(&name.as_str()));
    }

    for cap in DECL_RE.captures_iter(source) {
        push_unique(&mut exports.named, cap[1].to_string());
    }

    for cap in BRACE_RE.captures_iter(source) {
        for piece in cap[1].split(',') {
            let piece = piece.trim();
            let piece = piece.strip_prefix("type ").unwrap_or(piece).trim();
            if piece.is_empty() {
                continue;
            }
            let name = match piece.split_once(" as ") {
                Some((_, exported)) => exported.trim(),
                None => piece,
            };
            if !name.is_empty() && name != "default" {
                push_unique(&mut exports.named, name.to_string());
            }
        }
    }

    exports
}

fn collect_imports(source: &str) -> Vec<ImportFact> {
    static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
        compile_regex(r#"(?m)^[ \t]*import\s+(?:([^'";]+?)\s+from\s+)?['"]([^'"\n]+)['"]"#)
    });

    IMPORT_RE
        .captures_iter(source)
        .map(|cap| {
            let (default, named) = match cap.get(1) {
                Some(clause) => parse_import_clause(clause.as_str()),
                None => (None, Vec::new()), // side-effect import
            };
            ImportFact {
                source: cap[2].to_string(),
                default,
                named,
            }
        })
        .collect()
}

fn parse_import_clause(clause: &str) -> (Option<String>, Vec<String>) {
    let clause = clause.trim();
    let clause = clause.strip_prefix("type ").unwrap_or(clause);

    let mut default = None;
    let mut named = Vec::new();

    let (head, braces) = match clause.find('{') {
        Some(open) => {
            let close = clause.rfind('}').unwrap_or(clause.len());
            (&clause[..open], Some(&clause[open + 1..close]))
        }
        None => (clause, None),
    };

    for piece in head.split(',') {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        // a namespace import binds a single name, record it like a default
        let name = piece.strip_prefix("* as ").unwrap_or(piece).trim();
        if default.is_none() && !name.is_empty() {
            default = Some(name.to_string());
        }
    }

    if let Some(inner) = braces {
        for piece in inner.split(',') {
            let piece = piece.trim();
            let piece = piece.strip_prefix("type ").unwrap_or(piece).trim();
            if piece.is_empty() {
                continue;
            }
            // the local binding, `x as y` binds y
            let name = match piece.split_once(" as ") {
                Some((_, local)) => local.trim(),
                None => piece,
            };
            if !name.is_empty() {
                named.push(name.to_string());
            }
        }
    }

    (default, named)
}

// ============================================================================
// Hooks, state, navigation, collections
// ============================================================================

fn collect_hooks(source: &str) -> Vec<String> {
    static HOOK_RE: Lazy<Regex> = Lazy::new(|| compile_regex(r"\b(use[A-Z][A-Za-z0-9_$]*)\s*\("));

    let mut hooks = Vec::new();
    for cap in HOOK_RE.captures_iter(source) {
        push_unique(&mut hooks, cap[1].to_string());
    }
    hooks
}

fn collect_state_variables(source: &str) -> Vec<String> {
    static STATE_RE: Lazy<Regex> = Lazy::new(|| {
        compile_regex(
            r"(?:const|let|var)\s*\[\s*([A-Za-z_$][\w$]*)\s*,\s*[A-Za-z_$][\w$]*\s*\]\s*=\s*(?:React\s*\.\s*)?useState",
        )
    });

    let mut names = Vec::new();
    for cap in STATE_RE.captures_iter(source) {
        push_unique(&mut names, cap[1].to_string());
    }
    names
}

fn collect_navigation_targets(source: &str) -> Vec<String> {
    static NAVIGATION_RE: Lazy<Regex> = Lazy::new(|| {
        compile_regex(
            r#"(?:\bnavigation\s*\.\s*(?:navigate|push|replace)|\bnavigate)\s*\(\s*['"]([^'"\n]+)['"]"#,
        )
    });

    let mut targets = Vec::new();
    for cap in NAVIGATION_RE.captures_iter(source) {
        push_unique(&mut targets, cap[1].to_string());
    }
    targets
}

fn collect_collection_references(source: &str) -> Vec<String> {
    static COLLECTION_RE: Lazy<Regex> = Lazy::new(|| {
        compile_regex(r#"\bcollection\s*\(\s*(?:[A-Za-z_$][\w$]*\s*,\s*)?['"]([^'"\n]+)['"]"#)
    });

    let mut references = Vec::new();
    for cap in COLLECTION_RE.captures_iter(source) {
        push_unique(&mut references, cap[1].to_string());
    }
    references
}

// ============================================================================
// Component detection
// ============================================================================

/// A file counts as a component when it contains JSX and pulls in React.
///
/// The component name is the first uppercase candidate among the default
/// export, named exports, and declared functions, in that order.
fn detect_component(
    source: &str,
    imports: &[ImportFact],
    exports: &ExportFacts,
    functions: &[FunctionFact],
) -> (bool, Option<String>) {
    static JSX_RE: Lazy<Regex> = Lazy::new(|| compile_regex(r"<[A-Z][A-Za-z0-9]*[\s/>]"));

    let references_react = imports.iter().any(|i| {
        i.source == "react"
            || i.source == "react-native"
            || i.source.starts_with("react-native-")
            || i.source.starts_with("react/")
    });
    if !references_react || !JSX_RE.is_match(source) {
        return (false, None);
    }

    let name = exports
        .default
        .clone()
        .filter(|n| starts_uppercase(n))
        .or_else(|| exports.named.iter().find(|n| starts_uppercase(n)).cloned())
        .or_else(|| {
            functions
                .iter()
                .map(|f| &f.name)
                .find(|n| starts_uppercase(n))
                .cloned()
        });

    (true, name)
}

fn starts_uppercase(name: &str) -> bool {
    name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

// ============================================================================
// Brace scanning
// ============================================================================

/// Find the end line of a body that starts somewhere at or after `from`.
///
/// `from` sits after the parameter list. The scan tolerates a return type
/// annotation before the opening brace but gives up at a semicolon, a
/// closing brace, or after two newlines, which keeps bodiless declarations
/// from swallowing whatever block comes next.
fn body_end_line(bytes: &[u8], from: usize, decl_line: usize, index: &LineIndex) -> usize {
    find_body_open(bytes, from)
        .and_then(|open| balance_braces(bytes, open))
        .map(|close| index.line_of(close))
        .unwrap_or(decl_line)
}

fn find_body_open(bytes: &[u8], mut i: usize) -> Option<usize> {
    let mut newlines = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => return Some(i),
            b';' | b'}' => return None,
            b'\n' => {
                newlines += 1;
                if newlines > 1 {
                    return None;
                }
                i += 1;
            }
            b'"' | b'\'' | b'`' => i = skip_string(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_line_comment(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block_comment(bytes, i),
            _ => i += 1,
        }
    }
    None
}

/// Byte offset of the brace closing the one at `open`
fn balance_braces(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' | b'`' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = skip_line_comment(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = skip_block_comment(bytes, i);
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Byte offset of the paren closing the one at `open`
fn matching_paren(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' | b'`' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// First non-whitespace, non-comment byte at or after `i`
fn first_significant(bytes: &[u8], mut i: usize) -> Option<(usize, u8)> {
    while i < bytes.len() {
        match bytes[i] {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_line_comment(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block_comment(bytes, i),
            b => return Some((i, b)),
        }
    }
    None
}

/// Index just past the string literal starting at `start`
///
/// Template literal interpolations are skipped wholesale, so braces inside
/// them never reach the balancer.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' if quote != b'`' => return i + 1, // unterminated single-line literal
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn skip_line_comment(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 2;
    while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
    }
    i
}

fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}
