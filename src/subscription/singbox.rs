//! sing-box JSON rendering.

use serde_json::{json, Map, Value};

use super::outbound::Outbound;

const SELECTOR_TAG: &str = "NodeHub";

fn utls(ob: &Outbound) -> Value {
    json!({"enabled": true, "fingerprint": ob.fingerprint()})
}

fn tls_base(ob: &Outbound, server_name: String) -> Map<String, Value> {
    let mut tls = Map::new();
    tls.insert("enabled".into(), Value::Bool(true));
    tls.insert("server_name".into(), Value::String(server_name));
    tls.insert("insecure".into(), Value::Bool(ob.flag("allow_insecure")));
    tls
}

fn transport(ob: &Outbound) -> Option<Value> {
    let host = ob.text("host").unwrap_or_default();
    let path = ob.text_or("path", "/");
    match ob.transport.as_str() {
        "ws" => Some(json!({
            "type": "ws",
            "path": path,
            "headers": {"Host": host},
            "max_early_data": ob.number("max_early_data").unwrap_or(0),
            "early_data_header_name": ob.text_or("early_data_header", "Sec-WebSocket-Protocol"),
        })),
        "grpc" => Some(json!({"type": "grpc", "service_name": ob.text_or("service_name", "grpc")})),
        "h2" => Some(json!({"type": "http", "host": [host], "path": path})),
        "httpupgrade" => Some(json!({"type": "httpupgrade", "host": host, "path": path})),
        _ => None,
    }
}

fn put_opt(map: &mut Map<String, Value>, key: &str, value: Option<impl Into<Value>>) {
    if let Some(v) = value {
        map.insert(key.to_string(), v.into());
    }
}

/// Outbound object for one node, or `None` for unsupported protocols and
/// outbounds without a credential.
pub fn outbound(ob: &Outbound) -> Option<Value> {
    let protocol = ob.base_protocol();
    if !matches!(protocol, "vless" | "trojan" | "vmess" | "shadowsocks" | "hysteria2") {
        return None;
    }
    ob.credential()?;

    let mut out = Map::new();
    out.insert("tag".into(), json!(ob.name));
    out.insert("type".into(), json!(protocol));
    out.insert("server".into(), json!(ob.address));
    out.insert("server_port".into(), json!(ob.port));

    match protocol {
        "vless" => {
            put_opt(&mut out, "uuid", ob.text("uuid"));
            put_opt(&mut out, "flow", ob.text("flow"));
            if ob.has_tls() {
                let mut tls = tls_base(ob, ob.server_name());
                if ob.tls_mode == "reality" {
                    tls.insert(
                        "reality".into(),
                        json!({
                            "enabled": true,
                            "public_key": ob.reality_public_key(),
                            "short_id": ob.reality_short_id(),
                        }),
                    );
                    tls.insert("utls".into(), utls(ob));
                } else {
                    tls.insert("utls".into(), utls(ob));
                    put_opt(&mut tls, "alpn", ob.list("alpn"));
                }
                out.insert("tls".into(), Value::Object(tls));
            }
            put_opt(&mut out, "transport", transport(ob));
        }
        "trojan" => {
            put_opt(&mut out, "password", ob.text("password"));
            if ob.has_tls() {
                let mut tls = tls_base(ob, ob.server_name());
                tls.insert("utls".into(), utls(ob));
                put_opt(&mut tls, "alpn", ob.list("alpn"));
                out.insert("tls".into(), Value::Object(tls));
            }
            put_opt(&mut out, "transport", transport(ob));
        }
        "vmess" => {
            put_opt(&mut out, "uuid", ob.text("uuid"));
            out.insert("alter_id".into(), json!(ob.number("alter_id").unwrap_or(0)));
            out.insert("security".into(), json!(ob.text_or("encryption", "auto")));
            if ob.has_tls() {
                out.insert("tls".into(), Value::Object(tls_base(ob, ob.server_name())));
            }
            put_opt(&mut out, "transport", transport(ob));
        }
        "shadowsocks" => {
            put_opt(&mut out, "method", ob.text("method"));
            put_opt(&mut out, "password", ob.text("password"));
        }
        _ => {
            put_opt(&mut out, "password", ob.text("password"));
            out.insert("up_mbps".into(), json!(ob.number("up_mbps").unwrap_or(100)));
            out.insert("down_mbps".into(), json!(ob.number("down_mbps").unwrap_or(100)));
            let server_name = ob.text("sni").unwrap_or_default();
            out.insert("tls".into(), Value::Object(tls_base(ob, server_name)));
            if let Some(kind) = ob.obfs() {
                out.insert(
                    "obfs".into(),
                    json!({"type": kind, "password": ob.text("obfs_password").unwrap_or_default()}),
                );
            }
        }
    }
    Some(Value::Object(out))
}

/// Pretty-printed config: selector, node outbounds, then `direct`.
pub fn render(outbounds: &[Outbound]) -> String {
    let nodes: Vec<Value> = outbounds.iter().filter_map(outbound).collect();
    let members: Vec<Value> = if nodes.is_empty() {
        vec![json!("direct")]
    } else {
        nodes.iter().map(|o| o["tag"].clone()).collect()
    };

    let mut all = Vec::with_capacity(nodes.len() + 2);
    all.push(json!({"tag": SELECTOR_TAG, "type": "selector", "outbounds": members}));
    all.extend(nodes);
    all.push(json!({"tag": "direct", "type": "direct"}));

    let doc = json!({ "outbounds": all });
    serde_json::to_string_pretty(&doc).unwrap_or_default()
}
