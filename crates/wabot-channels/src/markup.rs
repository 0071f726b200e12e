//! Markdown to WhatsApp markup, for generated answers. Caller-supplied
//! texts are sent untouched.

/// Rewrite common Markdown into WhatsApp's native markup.
///
/// Headings become bold upper-case lines, `**x**` becomes `*x*`,
/// `[label](url)` becomes `label (url)` and horizontal rules are dropped.
/// WhatsApp's own `*bold*`, `_italic_`, `~strike~` and code spans pass through.
pub fn to_whatsapp_markup(text: &str) -> String {
    let mut lines = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if is_rule(trimmed) {
            continue;
        }
        let hashes = trimmed.chars().take_while(|c| *c == '#').count();
        if (1..=6).contains(&hashes) && trimmed[hashes..].starts_with(' ') {
            lines.push(format!("*{}*", trimmed[hashes..].trim().to_uppercase()));
            continue;
        }
        lines.push(rewrite_links(&line.replace("**", "*")));
    }

    let mut out = lines.join("\n");
    if text.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn is_rule(line: &str) -> bool {
    line.len() >= 3 && (line.chars().all(|c| c == '-') || line.chars().all(|c| c == '*'))
}

/// `[label](url)` → `label (url)`; anything not shaped like a link is kept.
fn rewrite_links(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(open) = rest.find('[') {
        let after_open = &rest[open + 1..];
        let Some(mid) = after_open.find("](") else {
            break;
        };
        let after_mid = &after_open[mid + 2..];
        let Some(close) = after_mid.find(')') else {
            break;
        };
        out.push_str(&rest[..open]);
        out.push_str(&after_open[..mid]);
        out.push_str(" (");
        out.push_str(&after_mid[..close]);
        out.push(')');
        rest = &after_mid[close + 1..];
    }

    out.push_str(rest);
    out
}
