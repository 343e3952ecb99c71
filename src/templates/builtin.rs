//! Code-defined templates and the static option registry.

use serde::Serialize;
use serde_json::Value;

use crate::model::{Defaults, NodeType, Template, TemplateKind};

/// A scalar default value in a builtin template.
#[derive(Debug, Clone, Copy)]
pub enum DefaultValue {
    Str(&'static str),
    Int(u64),
}

impl DefaultValue {
    fn to_json(self) -> Value {
        match self {
            DefaultValue::Str(s) => Value::from(s),
            DefaultValue::Int(n) => Value::from(n),
        }
    }
}

/// An immutable template shipped with the control plane.
#[derive(Debug)]
pub struct BuiltinTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub protocol: &'static str,
    pub transport: &'static str,
    pub tls_mode: &'static str,
    pub node_types: &'static [NodeType],
    pub description: &'static str,
    pub defaults: &'static [(&'static str, DefaultValue)],
}

impl BuiltinTemplate {
    /// Materialize as a resolved template without any override applied.
    pub fn to_template(&self) -> Template {
        let defaults: Defaults = self
            .defaults
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_json()))
            .collect();
        Template {
            id: self.id.to_string(),
            kind: TemplateKind::Builtin,
            name: self.name.to_string(),
            protocol: self.protocol.to_string(),
            transport: self.transport.to_string(),
            tls_mode: self.tls_mode.to_string(),
            node_types: self.node_types.to_vec(),
            description: self.description.to_string(),
            defaults,
            created_at: None,
            updated_at: None,
        }
    }
}

use DefaultValue::{Int, Str};

pub static BUILTIN_TEMPLATES: &[BuiltinTemplate] = &[
    BuiltinTemplate {
        id: "tpl_builtin_vless_reality_tcp",
        name: "VLESS + Reality + TCP",
        protocol: "vless",
        transport: "tcp",
        tls_mode: "reality",
        node_types: &[NodeType::Vps],
        description: "Reality direct-connect template",
        defaults: &[
            ("port", Int(49443)),
            ("flow", Str("xtls-rprx-vision")),
            ("server_name", Str("")),
            ("reality_private_key", Str("")),
            ("reality_short_id", Str("")),
        ],
    },
    BuiltinTemplate {
        id: "tpl_builtin_hysteria2_udp_tls",
        name: "Hysteria2",
        protocol: "hysteria2",
        transport: "udp",
        tls_mode: "tls",
        node_types: &[NodeType::Vps],
        description: "Hysteria2 UDP template",
        defaults: &[
            ("port", Int(49444)),
            ("password", Str("")),
            ("obfs", Str("none")),
            ("sni", Str("")),
        ],
    },
    BuiltinTemplate {
        id: "tpl_builtin_ss2022_tcp",
        name: "Shadowsocks 2022",
        protocol: "shadowsocks2022",
        transport: "tcp",
        tls_mode: "none",
        node_types: &[NodeType::Vps],
        description: "Shadowsocks 2022 template",
        defaults: &[
            ("port", Int(49445)),
            ("method", Str("2022-blake3-aes-128-gcm")),
            ("password", Str("")),
        ],
    },
    BuiltinTemplate {
        id: "tpl_builtin_vless_ws_tls",
        name: "VLESS + WS + TLS",
        protocol: "vless",
        transport: "ws",
        tls_mode: "tls",
        node_types: &[NodeType::Vps, NodeType::Edge],
        description: "Default WebSocket TLS template",
        defaults: &[("port", Int(2053)), ("path", Str("/ws")), ("host", Str(""))],
    },
    BuiltinTemplate {
        id: "tpl_builtin_trojan_tcp_tls",
        name: "Trojan + TCP + TLS",
        protocol: "trojan",
        transport: "tcp",
        tls_mode: "tls",
        node_types: &[NodeType::Vps],
        description: "Classic Trojan TLS template",
        defaults: &[("port", Int(2087)), ("password", Str("")), ("sni", Str(""))],
    },
];

pub fn find_builtin(id: &str) -> Option<&'static BuiltinTemplate> {
    BUILTIN_TEMPLATES.iter().find(|t| t.id == id)
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RegistryOption {
    pub key: &'static str,
    pub label: &'static str,
}

/// Known protocol / transport / TLS-mode keys.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TemplateOptions {
    pub protocols: &'static [RegistryOption],
    pub transports: &'static [RegistryOption],
    pub tls_modes: &'static [RegistryOption],
}

impl TemplateOptions {
    pub fn knows(&self, protocol: &str, transport: &str, tls_mode: &str) -> bool {
        self.protocols.iter().any(|o| o.key == protocol)
            && self.transports.iter().any(|o| o.key == transport)
            && self.tls_modes.iter().any(|o| o.key == tls_mode)
    }
}

pub static TEMPLATE_OPTIONS: TemplateOptions = TemplateOptions {
    protocols: &[
        RegistryOption { key: "vless", label: "VLESS" },
        RegistryOption { key: "trojan", label: "Trojan" },
        RegistryOption { key: "hysteria2", label: "Hysteria2" },
        RegistryOption { key: "shadowsocks2022", label: "Shadowsocks 2022" },
        RegistryOption { key: "vmess", label: "VMess" },
    ],
    transports: &[
        RegistryOption { key: "ws", label: "WebSocket" },
        RegistryOption { key: "grpc", label: "gRPC" },
        RegistryOption { key: "tcp", label: "TCP" },
        RegistryOption { key: "udp", label: "UDP" },
    ],
    tls_modes: &[
        RegistryOption { key: "tls", label: "TLS" },
        RegistryOption { key: "reality", label: "Reality" },
        RegistryOption { key: "none", label: "None" },
    ],
};
