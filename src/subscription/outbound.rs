//! Flattening node desired configs into client outbounds.

use serde_json::Value;

use crate::model::{Defaults, Node};

/// One client-side proxy endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub protocol: String,
    pub transport: String,
    pub tls_mode: String,
    /// Template defaults overridden by release params.
    pub settings: Defaults,
}

fn parse_port(value: Option<&Value>) -> Option<u16> {
    let port = match value? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u16::try_from(port).ok().filter(|p| *p > 0)
}

impl Outbound {
    /// A setting as text. Empty strings, null, and non-scalars read as unset.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.settings.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// First set value among `keys`.
    pub fn first_text(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.text(k))
    }

    pub fn text_or(&self, key: &str, fallback: &str) -> String {
        self.text(key).unwrap_or_else(|| fallback.to_string())
    }

    /// A boolean setting; `true` or the string `"true"`.
    pub fn flag(&self, key: &str) -> bool {
        match self.settings.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        }
    }

    /// A non-negative integer setting. Zero reads as unset.
    pub fn number(&self, key: &str) -> Option<u64> {
        let n = match self.settings.get(key)? {
            Value::Number(n) => n.as_u64()?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        (n > 0).then_some(n)
    }

    /// `alpn` as a list, accepting an array or a single string.
    pub fn list(&self, key: &str) -> Option<Vec<String>> {
        match self.settings.get(key)? {
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
            Value::String(s) if !s.is_empty() => Some(vec![s.clone()]),
            _ => None,
        }
    }

    /// Protocol with a trailing `2022` removed, so `shadowsocks2022` reads as
    /// `shadowsocks`.
    pub fn base_protocol(&self) -> &str {
        let p = if self.protocol.is_empty() { "vless" } else { self.protocol.as_str() };
        p.strip_suffix("2022").unwrap_or(p)
    }

    /// The client identity secret: `uuid` for vless and vmess, `password`
    /// for the rest. `None` also for protocols no renderer supports.
    pub fn credential(&self) -> Option<String> {
        match self.base_protocol() {
            "vless" | "vmess" => self.text("uuid"),
            "trojan" | "shadowsocks" | "hysteria2" => self.text("password"),
            _ => None,
        }
    }

    pub fn has_tls(&self) -> bool {
        self.tls_mode != "none"
    }

    /// Value for `servername`-like fields: sni, then server_name, then host.
    pub fn server_name(&self) -> String {
        self.first_text(&["sni", "server_name", "host"]).unwrap_or_default()
    }

    pub fn fingerprint(&self) -> String {
        self.text_or("fingerprint", "chrome")
    }

    pub fn reality_public_key(&self) -> String {
        self.first_text(&["public_key", "reality_public_key"]).unwrap_or_default()
    }

    pub fn reality_short_id(&self) -> String {
        self.first_text(&["short_id", "reality_short_id"]).unwrap_or_default()
    }

    /// Hysteria2 obfuscation type, if enabled.
    pub fn obfs(&self) -> Option<String> {
        self.text("obfs_type")
            .or_else(|| self.text("obfs").filter(|o| o != "none"))
    }
}

/// Outbounds for one node, in template order.
///
/// Nodes without an address or a desired config contribute nothing, and so
/// does any template whose port is missing or invalid.
pub fn node_outbounds(node: &Node) -> Vec<Outbound> {
    let (Some(address), Some(config)) = (node.entry_address(), node.desired_config.as_ref()) else {
        return Vec::new();
    };

    let single = config.templates.len() == 1;
    config
        .templates
        .iter()
        .filter_map(|template| {
            let mut settings = template.defaults.clone();
            for (k, v) in &config.params {
                settings.insert(k.clone(), v.clone());
            }
            let Some(port) = parse_port(settings.get("port")) else {
                tracing::debug!(node_id = %node.id, template_id = %template.id, "Skipping outbound without a valid port");
                return None;
            };
            let name = if single {
                node.name.clone()
            } else {
                format!("{}-{}", node.name, template.name)
            };
            Some(Outbound {
                name,
                address: address.to_string(),
                port,
                protocol: template.protocol.clone(),
                transport: template.transport.clone(),
                tls_mode: template.tls_mode.clone(),
                settings,
            })
        })
        .collect()
}
