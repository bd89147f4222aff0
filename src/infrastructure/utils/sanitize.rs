/// Entities produced by [`sanitize`]. An `&` that already starts one of these
/// is left alone so that sanitizing twice changes nothing.
const KNOWN_ENTITIES: [&str; 5] = ["&amp;", "&lt;", "&gt;", "&quot;", "&#39;"];

/// Cleans free text before it is validated or placed in an HTML email.
///
/// Control characters are stripped (newline and tab survive), HTML
/// metacharacters are escaped, and surrounding whitespace is trimmed.
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());

    for (idx, ch) in input.char_indices() {
        match ch {
            '\n' | '\t' => out.push(ch),
            c if c.is_control() => {}
            '&' if KNOWN_ENTITIES.iter().any(|e| input[idx..].starts_with(e)) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }

    out.trim().to_string()
}
