use std::sync::LazyLock;

use regex::Regex;

static CODE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<code[^>]*>(.*?)</code>").expect("code tag pattern"));

static PIPED_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^|\]]+)\|([^\]]+)\]\]").expect("piped link pattern"));

static BARE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]]+)\]\]").expect("bare link pattern"));

/// Templates whose first argument is the visible payload.
static PAYLOAD_TEMPLATE_RES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)\{\{\s*Metadata\s+type\|([^}]+)\}\}").expect("metadata type pattern"),
        Regex::new(r"(?i)\{\{\s*Metadata\s+id\|([^}]*)\}\}").expect("metadata id pattern"),
        Regex::new(r"(?i)\{\{\s*Type\|([^}]+)\}\}").expect("type pattern"),
    ]
});

static ANY_TEMPLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{[^}]*\}\}").expect("template pattern"));

static SPAN_ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:rowspan|colspan)="?\d+"?\|\s*"#).expect("span attribute pattern")
});

static STYLE_ATTRIBUTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)^style="[^"]*"\|\s*"#).expect("style attribute pattern"));

static HTML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("html tag pattern"));

/// `<code>X</code>` becomes `X`.
pub fn strip_code_tags(text: &str) -> String {
    CODE_TAG_RE.replace_all(text, "$1").into_owned()
}

/// `[[target|label]]` becomes `label`, then `[[target]]` becomes `target`.
pub fn strip_wikilinks(text: &str) -> String {
    let text = PIPED_LINK_RE.replace_all(text, "$2");
    BARE_LINK_RE.replace_all(&text, "$1").into_owned()
}

/// Unwraps payload templates and deletes every other `{{...}}` span.
pub fn strip_templates(text: &str) -> String {
    let mut output = text.to_string();
    for pattern in PAYLOAD_TEMPLATE_RES.iter() {
        output = pattern.replace_all(&output, "$1").into_owned();
    }
    ANY_TEMPLATE_RE.replace_all(&output, "").into_owned()
}

/// Removes leading `rowspan=`/`colspan=`/`style=` cell attributes.
pub fn strip_cell_attributes(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = SPAN_ATTRIBUTE_RE.replace(&current, "");
        let next = STYLE_ATTRIBUTE_RE.replace(&next, "").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

pub fn strip_html_tags(text: &str) -> String {
    HTML_TAG_RE.replace_all(text, "").into_owned()
}

/// Collapses every whitespace run (newlines included) to one space and trims.
pub fn normalize_whitespace(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut previous_was_space = false;

    for ch in value.chars() {
        if ch.is_whitespace() {
            if !previous_was_space {
                output.push(' ');
                previous_was_space = true;
            }
        } else {
            output.push(ch);
            previous_was_space = false;
        }
    }

    output.trim().to_string()
}

/// Applies the cleanup rules in order (code tags, links, templates, cell
/// attributes, HTML tags, whitespace) until the text stops changing.
///
/// One pass can expose new markup, e.g. `<b>rowspan=2|</b> x` or `[[[[x]]]]`,
/// so a single pass is not enough to keep the result stable.
pub fn cleanup_cell_text(text: &str) -> String {
    let mut current = clean_once(text);
    loop {
        let next = clean_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_once(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = strip_code_tags(text);
    let text = strip_wikilinks(&text);
    let text = strip_templates(&text);
    let text = strip_cell_attributes(&text);
    let text = strip_html_tags(&text);
    normalize_whitespace(&text)
}

#[cfg(test)]
mod tests {
    use super::{
        cleanup_cell_text, normalize_whitespace, strip_cell_attributes, strip_code_tags,
        strip_templates, strip_wikilinks,
    };

    #[test]
    fn code_tags_are_unwrapped_per_occurrence() {
        assert_eq!(
            strip_code_tags("<code>minecraft:zombie</code> and <code class=\"x\">b</code>"),
            "minecraft:zombie and b"
        );
    }

    #[test]
    fn piped_links_resolve_before_bare_links() {
        assert_eq!(
            strip_wikilinks("[[Zombie|Zombies]] near [[Villager]]"),
            "Zombies near Villager"
        );
    }

    #[test]
    fn payload_templates_keep_first_argument_and_others_vanish() {
        assert_eq!(strip_templates("{{Metadata type|Byte}}"), "Byte");
        assert_eq!(strip_templates("{{metadata id|7}}"), "7");
        assert_eq!(strip_templates("{{Type|VarInt}}"), "VarInt");
        assert_eq!(strip_templates("a{{Anchor|x}}b{{clear}}"), "ab");
    }

    #[test]
    fn stacked_attributes_are_all_removed() {
        assert_eq!(strip_cell_attributes("rowspan=\"2\"| Byte"), "Byte");
        assert_eq!(
            strip_cell_attributes("style=\"text-align:left\"|colspan=2|Value"),
            "Value"
        );
        assert_eq!(strip_cell_attributes("plain"), "plain");
    }

    #[test]
    fn whitespace_runs_collapse() {
        assert_eq!(normalize_whitespace("  a \n\t b  "), "a b");
        assert_eq!(normalize_whitespace(""), "");
    }

    #[test]
    fn cleanup_runs_attribute_strip_after_templates() {
        assert_eq!(
            cleanup_cell_text("rowspan=\"3\"| {{Metadata type|Byte}}"),
            "Byte"
        );
        assert_eq!(
            cleanup_cell_text("style=\"x\"| [[Entity#Flags|Entity flags]] <br/>bits"),
            "Entity flags bits"
        );
    }

    #[test]
    fn markup_exposed_by_one_pass_is_cleaned_too() {
        assert_eq!(cleanup_cell_text("<b>rowspan=2|</b> x"), "x");
        assert_eq!(cleanup_cell_text("[[[[x]]]]"), "x");
    }

    #[test]
    fn cleanup_is_idempotent_on_wiki_samples() {
        let samples = [
            "<code>minecraft:armor_stand</code>",
            "rowspan=\"2\"| {{Metadata type|Optional Chat}}",
            "Is [[Creeper|creeper]] ignited{{Note|1}}",
            "colspan=2 | <span style=\"color:red\">Air ticks</span>  ",
            "0x01",
            "{{Type|Boolean}}  {{Anchor|false}}",
            "",
            "<b>rowspan=2|</b> x",
            "[[[[x]]]]",
        ];
        for sample in samples {
            let once = cleanup_cell_text(sample);
            assert_eq!(cleanup_cell_text(&once), once, "sample: {sample}");
        }
    }
}
