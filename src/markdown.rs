//! HTML→Markdown conversion used when a wiki tool's schema demands `contentFormat =
//! markdown` (spec §4.4 step 4: "convert the HTML body to Markdown (heading/link/list/
//! emphasis/paragraph substitutions, then strip residual tags, collapse blank runs)").
//!
//! A fixed substitution ladder, not a general HTML parser — matches the scope of the
//! original system's converter (ambient collaborator code per spec §1, not one of the five
//! core components).

use regex::Regex;

/// Convert storage-format HTML to Markdown via ordered regex substitutions.
pub fn html_to_markdown(html: &str) -> String {
    let mut text = html.to_string();

    for level in (1..=6).rev() {
        let pattern = Regex::new(&format!(r"(?is)<h{level}[^>]*>(.*?)</h{level}>")).expect("valid heading pattern");
        let prefix = "#".repeat(level);
        text = pattern.replace_all(&text, |caps: &regex::Captures| format!("\n{} {}\n", prefix, caps[1].trim())).to_string();
    }

    let link = Regex::new(r#"(?is)<a[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#).expect("valid link pattern");
    text = link.replace_all(&text, |caps: &regex::Captures| format!("[{}]({})", caps[2].trim(), caps[1].trim())).to_string();

    let strong = Regex::new(r"(?is)<(strong|b)>(.*?)</(strong|b)>").expect("valid strong pattern");
    text = strong.replace_all(&text, |caps: &regex::Captures| format!("**{}**", caps[2].trim())).to_string();

    let em = Regex::new(r"(?is)<(em|i)>(.*?)</(em|i)>").expect("valid em pattern");
    text = em.replace_all(&text, |caps: &regex::Captures| format!("*{}*", caps[2].trim())).to_string();

    let list_item = Regex::new(r"(?is)<li[^>]*>(.*?)</li>").expect("valid list item pattern");
    text = list_item.replace_all(&text, |caps: &regex::Captures| format!("- {}\n", caps[1].trim())).to_string();

    let list_wrapper = Regex::new(r"(?is)</?(ul|ol)[^>]*>").expect("valid list wrapper pattern");
    text = list_wrapper.replace_all(&text, "\n").to_string();

    let paragraph = Regex::new(r"(?is)<p[^>]*>(.*?)</p>").expect("valid paragraph pattern");
    text = paragraph.replace_all(&text, |caps: &regex::Captures| format!("\n{}\n", caps[1].trim())).to_string();

    let br = Regex::new(r"(?is)<br\s*/?>").expect("valid br pattern");
    text = br.replace_all(&text, "\n").to_string();

    // Strip any residual tags.
    let residual = Regex::new(r"(?is)<[^>]+>").expect("valid residual tag pattern");
    text = residual.replace_all(&text, "").to_string();

    // Collapse runs of 3+ blank lines down to one blank line.
    let blank_runs = Regex::new(r"\n{3,}").expect("valid blank run pattern");
    text = blank_runs.replace_all(&text, "\n\n").to_string();

    html_unescape(text.trim())
}

fn html_unescape(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}
