//! Minimal YAML emitter for Clash configs.
//!
//! Output is block style only. Scalars are written verbatim without quoting,
//! empty sequences as `[]` on their own line, and mapping entries inside a
//! sequence start on the `- ` line.

/// A YAML document node.
#[derive(Debug, Clone, PartialEq)]
pub enum Yaml {
    Scalar(String),
    Seq(Vec<Yaml>),
    Map(Vec<(String, Yaml)>),
}

impl From<&str> for Yaml {
    fn from(s: &str) -> Self {
        Yaml::Scalar(s.to_string())
    }
}

impl From<String> for Yaml {
    fn from(s: String) -> Self {
        Yaml::Scalar(s)
    }
}

impl From<bool> for Yaml {
    fn from(b: bool) -> Self {
        Yaml::Scalar(b.to_string())
    }
}

impl From<u64> for Yaml {
    fn from(n: u64) -> Self {
        Yaml::Scalar(n.to_string())
    }
}

impl From<u16> for Yaml {
    fn from(n: u16) -> Self {
        Yaml::Scalar(n.to_string())
    }
}

/// Ordered mapping builder that drops unset optional keys.
#[derive(Debug, Default)]
pub struct MapBuilder(Vec<(String, Yaml)>);

impl MapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(mut self, key: &str, value: impl Into<Yaml>) -> Self {
        self.0.push((key.to_string(), value.into()));
        self
    }

    pub fn put_opt<V: Into<Yaml>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.put(key, v),
            None => self,
        }
    }

    pub fn build(self) -> Yaml {
        Yaml::Map(self.0)
    }
}

/// Render a top-level mapping.
pub fn to_string(doc: &Yaml) -> String {
    let mut out = String::new();
    match doc {
        Yaml::Map(entries) => emit_map(entries, 0, &mut out),
        Yaml::Seq(items) => emit_seq(items, "", &mut out),
        Yaml::Scalar(s) => {
            out.push_str(s);
            out.push('\n');
        }
    }
    out
}

fn emit_map(entries: &[(String, Yaml)], indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    for (key, value) in entries {
        match value {
            Yaml::Seq(items) => {
                out.push_str(&format!("{pad}{key}:\n"));
                if items.is_empty() {
                    out.push_str(&format!("{pad}  []\n"));
                } else {
                    emit_seq(items, &pad, out);
                }
            }
            Yaml::Map(inner) => {
                out.push_str(&format!("{pad}{key}:\n"));
                emit_map(inner, indent + 1, out);
            }
            Yaml::Scalar(s) => out.push_str(&format!("{pad}{key}: {s}\n")),
        }
    }
}

fn emit_seq(items: &[Yaml], pad: &str, out: &mut String) {
    for item in items {
        let block = match item {
            Yaml::Scalar(s) => {
                out.push_str(&format!("{pad}- {s}\n"));
                continue;
            }
            Yaml::Map(entries) => {
                let mut block = String::new();
                emit_map(entries, 0, &mut block);
                block
            }
            // Nested sequences render as index-keyed mappings.
            Yaml::Seq(inner) => {
                let entries: Vec<(String, Yaml)> = inner
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), v.clone()))
                    .collect();
                let mut block = String::new();
                emit_map(&entries, 0, &mut block);
                block
            }
        };

        let mut lines = block.trim().split('\n');
        out.push_str(&format!("{pad}- {}\n", lines.next().unwrap_or_default()));
        for line in lines {
            out.push_str(&format!("{pad}  {line}\n"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_document() {
        let proxy = MapBuilder::new()
            .put("name", "tokyo-1")
            .put("port", 443u16)
            .put("tls", true)
            .put_opt::<&str>("flow", None)
            .put(
                "ws-opts",
                MapBuilder::new()
                    .put("path", "/ws")
                    .put("headers", MapBuilder::new().put("Host", "cdn.example.com").build())
                    .build(),
            )
            .build();
        let doc = MapBuilder::new()
            .put("proxies", Yaml::Seq(vec![proxy]))
            .put("rules", Yaml::Seq(vec!["MATCH,NodeHub".into()]))
            .build();

        let expected = "\
proxies:
- name: tokyo-1
  port: 443
  tls: true
  ws-opts:
    path: /ws
    headers:
      Host: cdn.example.com
rules:
- MATCH,NodeHub
";
        assert_eq!(to_string(&doc), expected);
    }

    #[test]
    fn test_empty_sequence_and_nested_indent() {
        let doc = MapBuilder::new()
            .put(
                "outer",
                MapBuilder::new()
                    .put("items", Yaml::Seq(vec![]))
                    .put("names", Yaml::Seq(vec!["a".into(), "b".into()]))
                    .build(),
            )
            .build();
        assert_eq!(to_string(&doc), "outer:\n  items:\n    []\n  names:\n  - a\n  - b\n");
    }

    #[test]
    fn test_trailing_blank_scalar_trimmed_in_sequence_item() {
        let item = MapBuilder::new().put("name", "x").put("sni", "").build();
        let doc = MapBuilder::new().put("proxies", Yaml::Seq(vec![item])).build();
        assert_eq!(to_string(&doc), "proxies:\n- name: x\n  sni:\n");
    }
}
