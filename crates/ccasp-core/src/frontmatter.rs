//! Leading `---` delimited YAML blocks on Markdown templates.

/// A document split into its front matter (without the `---` fences) and
/// body. `front_matter` is `None` when the document has no leading block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split<'a> {
    pub front_matter: Option<&'a str>,
    pub body: &'a str,
}

pub fn split(content: &str) -> Split<'_> {
    let no_fm = Split {
        front_matter: None,
        body: content,
    };

    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return no_fm;
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let fm = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Split {
                front_matter: Some(fm),
                body,
            };
        }
        offset += line.len();
    }
    no_fm
}

/// Read a scalar key from the front matter, e.g. `version` or `description`.
pub fn field(content: &str, key: &str) -> Option<String> {
    let fm = split(content).front_matter?;
    let value: serde_yaml::Value = serde_yaml::from_str(fm).ok()?;
    match value.get(key)? {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
