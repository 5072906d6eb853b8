use crate::error::SqlGuardError;

/// Count the `{}` slots in a template, honouring `{{` / `}}` escapes.
///
/// Used by `sql!` / `raw!` inside a `const` item, so a template whose slot count does not
/// match its values fails to compile. Panics (a compile error in const context) on an
/// unbalanced brace.
#[must_use]
pub const fn slot_count(template: &str) -> usize {
    let bytes = template.as_bytes();
    let mut idx = 0;
    let mut count = 0;
    while idx < bytes.len() {
        let b = bytes[idx];
        if b == b'{' {
            if idx + 1 < bytes.len() && bytes[idx + 1] == b'{' {
                idx += 2;
                continue;
            }
            if idx + 1 < bytes.len() && bytes[idx + 1] == b'}' {
                count += 1;
                idx += 2;
                continue;
            }
            panic!("unbalanced brace in sql template; double it to write a literal brace");
        } else if b == b'}' {
            if idx + 1 < bytes.len() && bytes[idx + 1] == b'}' {
                idx += 2;
                continue;
            }
            panic!("unbalanced brace in sql template; double it to write a literal brace");
        }
        idx += 1;
    }
    count
}

/// Split a template on its `{}` slots into the literal chunks between them.
///
/// Always yields `slots + 1` chunks; an empty template yields one empty chunk.
/// Escaped braces are unescaped in the returned chunks.
///
/// # Errors
/// Returns `SqlGuardError::MalformedTemplate` on an unbalanced `{` or `}`.
pub fn split(template: &str) -> Result<Vec<String>, SqlGuardError> {
    split_inner(template, true)
}

/// Same as [`split`] for templates already validated by [`slot_count`].
///
/// Never fails: a stray brace is kept as literal text.
pub(crate) fn split_checked(template: &str) -> Vec<String> {
    split_inner(template, false).unwrap_or_else(|_| vec![template.to_string()])
}

fn split_inner(template: &str, strict: bool) -> Result<Vec<String>, SqlGuardError> {
    let mut chunks = Vec::new();
    let mut current = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => match chars.peek() {
                Some((_, '{')) => {
                    chars.next();
                    current.push('{');
                }
                Some((_, '}')) => {
                    chars.next();
                    chunks.push(std::mem::take(&mut current));
                }
                _ if strict => {
                    return Err(SqlGuardError::MalformedTemplate(format!(
                        "unbalanced '{{' at byte {pos}"
                    )));
                }
                _ => current.push('{'),
            },
            '}' => match chars.peek() {
                Some((_, '}')) => {
                    chars.next();
                    current.push('}');
                }
                _ if strict => {
                    return Err(SqlGuardError::MalformedTemplate(format!(
                        "unbalanced '}}' at byte {pos}"
                    )));
                }
                _ => current.push('}'),
            },
            _ => current.push(c),
        }
    }

    chunks.push(current);
    Ok(chunks)
}
