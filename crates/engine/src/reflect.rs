//! Best-effort metadata extraction from a function's source text.
//!
//! Used for functions that arrive as source (user scripts) rather than with
//! declared metadata. No type information is recovered; destructured, rest
//! and vararg parameters come back as their literal text.

use std::sync::OnceLock;

use regex::Regex;

/// Returned when a source has no documentation block.
pub const NO_DOCUMENTATION: &str = "No documentation found.";

fn doc_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `/** ... */` or a Lua long comment `--[[ ... ]]`
    RE.get_or_init(|| Regex::new(r"/\*\*([\s\S]*?)\*/|--\[\[([\s\S]*?)\]\]").unwrap())
}

fn comment_res() -> &'static [Regex; 4] {
    static RES: OnceLock<[Regex; 4]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            Regex::new(r"--\[\[[\s\S]*?\]\]").unwrap(),
            Regex::new(r"(?m)(//|--).*$").unwrap(),
            Regex::new(r"/\*[\s\S]*?\*/").unwrap(),
            Regex::new(r"\s+").unwrap(),
        ]
    })
}

fn param_list_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^(]*\(([^)]*)\)").unwrap())
}

/// First documentation block in the source, trimmed.
pub fn extract_doc_comment(source: &str) -> String {
    doc_block_re()
        .captures(source)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| NO_DOCUMENTATION.to_string())
}

/// Source with comments removed and whitespace collapsed to single spaces.
pub fn strip_comments(source: &str) -> String {
    let [lua_block, line, c_block, ws] = comment_res();
    let s = lua_block.replace_all(source, "");
    let s = line.replace_all(&s, "");
    let s = c_block.replace_all(&s, "");
    ws.replace_all(&s, " ").into_owned()
}

/// Parameter names from the first parenthesised list in the source.
///
/// Default expressions (`b = 1`) are dropped and empty entries discarded.
pub fn extract_param_names(source: &str) -> Vec<String> {
    let stripped = strip_comments(source);
    let Some(caps) = param_list_re().captures(&stripped) else {
        return Vec::new();
    };

    caps[1]
        .split(',')
        .map(|p| p.trim().split('=').next().unwrap_or("").trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}
