//! Resource keys: filesystem- and citation-safe identifiers.

/// Fallback key when sanitizing leaves nothing behind.
const EMPTY_KEY: &str = "resource";

/// Prefix on citation names of anonymous registry packages.
pub const REGISTRY_PREFIX: &str = "registry:";

/// Sanitize a configured resource name into a key.
///
/// Keeps ASCII alphanumerics and `. _ - @`; every other run of characters
/// collapses to one `-`.
pub fn sanitize_key(name: &str) -> String {
    let collapsed = collapse_unsafe(name);
    let trimmed = collapsed.trim_matches(|c| c == '-' || c == '.');
    if trimmed.is_empty() {
        EMPTY_KEY.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Sanitize an explicit directory-key override.
///
/// A leading `registry:` prefix survives so overrides carrying an anonymous
/// package key keep their citation form; the rest goes through
/// [`sanitize_key`], so `""`, `"."` and `".."` never name the resources
/// root or anything above it.
pub fn sanitize_override(key: &str) -> String {
    match key.strip_prefix(REGISTRY_PREFIX) {
        Some(rest) => format!("{REGISTRY_PREFIX}{}", sanitize_key(rest)),
        None => sanitize_key(key),
    }
}

/// Citation name for a registry package referenced inline in a question.
///
/// `@scope/example` at `2.10.1` becomes `registry:@scope__example@2.10.1`.
/// Path separators become `__` so the scope stays legible; nothing is
/// percent-encoded.
pub fn anonymous_npm_key(package: &str, version: Option<&str>) -> String {
    let version = version.unwrap_or("latest");
    let joined = format!("{package}@{version}")
        .replace(['/', '\\'], "__");
    format!("{REGISTRY_PREFIX}{}", sanitize_key(&joined))
}

/// Key for a repository referenced inline: repo name plus a short hash of
/// the full URL, so two forks of the same name never collide.
pub fn anonymous_git_key(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    let repo = trimmed.rsplit('/').next().unwrap_or(trimmed);
    let hash = blake3::hash(url.as_bytes()).to_hex();
    format!("{}-{}", sanitize_key(repo), &hash.as_str()[..8])
}

/// On-disk folder name for a key.
///
/// Maps characters that are illegal on common filesystems to `-`.
pub fn directory_name(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            ':' | '<' | '>' | '"' | '|' | '?' | '*' | '\\' | '/' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect()
}

fn collapse_unsafe(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@') {
            if pending_dash {
                out.push('-');
                pending_dash = false;
            }
            out.push(c);
        } else {
            pending_dash = true;
        }
    }
    if pending_dash {
        out.push('-');
    }
    out
}
