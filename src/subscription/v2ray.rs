//! Share-link (v2ray) rendering.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;
use url::form_urlencoded;

use super::outbound::Outbound;

fn fragment(name: &str) -> String {
    urlencoding::encode(name).into_owned()
}

fn query(pairs: &[(&str, String)]) -> String {
    let mut ser = form_urlencoded::Serializer::new(String::new());
    for (k, v) in pairs {
        ser.append_pair(k, v);
    }
    ser.finish()
}

/// `host`/`path` pair shared by the HTTP-like transports.
fn push_host_path(params: &mut Vec<(&'static str, String)>, ob: &Outbound, default_path: &str) {
    params.push(("host", ob.text("host").unwrap_or_default()));
    params.push(("path", ob.text_or("path", default_path)));
}

fn vless(ob: &Outbound, secret: &str) -> String {
    let mut params: Vec<(&str, String)> = vec![
        ("type", if ob.transport.is_empty() { "tcp".into() } else { ob.transport.clone() }),
        ("security", if ob.tls_mode.is_empty() { "none".into() } else { ob.tls_mode.clone() }),
        ("encryption", "none".into()),
    ];
    match ob.transport.as_str() {
        "ws" | "h2" | "httpupgrade" => push_host_path(&mut params, ob, "/"),
        "grpc" => {
            params.push(("serviceName", ob.text_or("service_name", "grpc")));
            let mode = if ob.flag("multi_mode") { "multi" } else { "gun" };
            params.push(("mode", mode.into()));
        }
        _ => {}
    }
    if ob.has_tls() {
        params.push(("sni", ob.server_name()));
        params.push(("fp", ob.fingerprint()));
    }
    if ob.tls_mode == "reality" {
        params.push(("pbk", ob.reality_public_key()));
        params.push(("sid", ob.reality_short_id()));
        if let Some(spx) = ob.text("spider_x") {
            params.push(("spx", spx));
        }
        if let Some(flow) = ob.text("flow") {
            params.push(("flow", flow));
        }
    }
    format!(
        "vless://{}@{}:{}?{}#{}",
        secret,
        ob.address,
        ob.port,
        query(&params),
        fragment(&ob.name)
    )
}

fn trojan(ob: &Outbound, secret: &str) -> String {
    let mut params: Vec<(&str, String)> = vec![
        ("type", if ob.transport.is_empty() { "tcp".into() } else { ob.transport.clone() }),
        ("security", if ob.has_tls() { "tls".into() } else { "none".into() }),
    ];
    match ob.transport.as_str() {
        "ws" => push_host_path(&mut params, ob, "/trojan-ws"),
        "grpc" => params.push(("serviceName", ob.text_or("service_name", "grpc"))),
        _ => {}
    }
    if ob.has_tls() {
        params.push(("sni", ob.server_name()));
        params.push(("fp", ob.fingerprint()));
    }
    format!(
        "trojan://{}@{}:{}?{}#{}",
        secret,
        ob.address,
        ob.port,
        query(&params),
        fragment(&ob.name)
    )
}

fn vmess(ob: &Outbound, secret: &str) -> String {
    let grpc = ob.transport == "grpc";
    let path = if grpc { ob.text_or("service_name", "grpc") } else { ob.text_or("path", "/") };
    let config = json!({
        "v": "2",
        "ps": ob.name,
        "add": ob.address,
        "port": ob.port,
        "id": secret,
        "aid": ob.number("alter_id").unwrap_or(0),
        "scy": ob.text_or("encryption", "auto"),
        "net": if ob.transport.is_empty() { "ws" } else { ob.transport.as_str() },
        "type": if grpc { "gun" } else { "none" },
        "host": ob.text("host").unwrap_or_default(),
        "path": path,
        "tls": if ob.has_tls() { "tls" } else { "" },
        "sni": ob.first_text(&["sni", "host"]).unwrap_or_default(),
        "fp": ob.text("fingerprint").unwrap_or_default(),
        "alpn": ob.list("alpn").map(|a| a.join(",")).unwrap_or_default(),
    });
    format!("vmess://{}", STANDARD.encode(config.to_string()))
}

fn shadowsocks(ob: &Outbound, secret: &str) -> String {
    let userinfo = format!("{}:{}", ob.text("method").unwrap_or_default(), secret);
    format!(
        "ss://{}@{}:{}#{}",
        STANDARD.encode(userinfo),
        ob.address,
        ob.port,
        fragment(&ob.name)
    )
}

fn hysteria2(ob: &Outbound, secret: &str) -> String {
    let mut params: Vec<(&str, String)> = Vec::new();
    if let Some(sni) = ob.text("sni") {
        params.push(("sni", sni));
    }
    if let Some(obfs) = ob.obfs() {
        params.push(("obfs", obfs));
        params.push(("obfs-password", ob.text("obfs_password").unwrap_or_default()));
    }
    format!(
        "hysteria2://{}@{}:{}?{}#{}",
        secret,
        ob.address,
        ob.port,
        query(&params),
        fragment(&ob.name)
    )
}

/// Share link for one outbound, or `None` for unsupported protocols and
/// outbounds without a credential.
pub fn link(ob: &Outbound) -> Option<String> {
    let secret = ob.credential()?;
    match ob.base_protocol() {
        "vless" => Some(vless(ob, &secret)),
        "trojan" => Some(trojan(ob, &secret)),
        "vmess" => Some(vmess(ob, &secret)),
        "shadowsocks" => Some(shadowsocks(ob, &secret)),
        "hysteria2" => Some(hysteria2(ob, &secret)),
        _ => None,
    }
}

/// Newline-joined links, base64-encoded.
pub fn render(outbounds: &[Outbound]) -> String {
    let links: Vec<String> = outbounds.iter().filter_map(link).collect();
    STANDARD.encode(links.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn outbound(protocol: &str, transport: &str, tls_mode: &str, settings: Value) -> Outbound {
        Outbound {
            name: "tokyo 1".into(),
            address: "203.0.113.7".into(),
            port: 443,
            protocol: protocol.into(),
            transport: transport.into(),
            tls_mode: tls_mode.into(),
            settings: settings.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_trojan_link() {
        let ob = outbound("trojan", "tcp", "tls", serde_json::json!({"password": "p", "sni": "a.example.com"}));
        assert_eq!(
            link(&ob).unwrap(),
            "trojan://p@203.0.113.7:443?type=tcp&security=tls&sni=a.example.com&fp=chrome#tokyo%201"
        );
        let decoded = STANDARD.decode(render(&[ob])).unwrap();
        assert!(String::from_utf8(decoded).unwrap().starts_with("trojan://p@203.0.113.7:443?"));
    }

    #[test]
    fn test_vless_reality_link() {
        let ob = outbound(
            "vless",
            "tcp",
            "reality",
            serde_json::json!({
                "uuid": "u-1",
                "server_name": "www.example.com",
                "reality_public_key": "pk",
                "reality_short_id": "abcd",
                "flow": "xtls-rprx-vision"
            }),
        );
        assert_eq!(
            link(&ob).unwrap(),
            "vless://u-1@203.0.113.7:443?type=tcp&security=reality&encryption=none\
             &sni=www.example.com&fp=chrome&pbk=pk&sid=abcd&flow=xtls-rprx-vision#tokyo%201"
        );
    }

    #[test]
    fn test_vless_ws_query_is_form_encoded() {
        let ob = outbound("vless", "ws", "tls", serde_json::json!({"uuid": "u", "path": "/ws", "host": "cdn.example.com"}));
        let l = link(&ob).unwrap();
        assert!(l.contains("type=ws&security=tls&encryption=none&host=cdn.example.com&path=%2Fws&sni=cdn.example.com"));
    }

    #[test]
    fn test_vmess_json_shape() {
        let ob = outbound("vmess", "grpc", "tls", serde_json::json!({"uuid": "u", "service_name": "svc"}));
        let l = link(&ob).unwrap();
        let payload = STANDARD.decode(l.trim_start_matches("vmess://")).unwrap();
        let text = String::from_utf8(payload).unwrap();
        assert!(text.starts_with(r#"{"v":"2","ps":"tokyo 1","add":"203.0.113.7","port":443,"id":"u""#));
        let cfg: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(cfg["path"], "svc");
        assert_eq!(cfg["type"], "gun");
        assert_eq!(cfg["tls"], "tls");
    }

    #[test]
    fn test_ss2022_and_hysteria2() {
        let ss = outbound(
            "shadowsocks2022",
            "tcp",
            "none",
            serde_json::json!({"method": "2022-blake3-aes-128-gcm", "password": "k"}),
        );
        let expected_user = STANDARD.encode("2022-blake3-aes-128-gcm:k");
        assert_eq!(link(&ss).unwrap(), format!("ss://{expected_user}@203.0.113.7:443#tokyo%201"));

        let hy = outbound("hysteria2", "udp", "tls", serde_json::json!({"password": "p", "obfs": "none"}));
        assert_eq!(link(&hy).unwrap(), "hysteria2://p@203.0.113.7:443?#tokyo%201");

        let hy = outbound(
            "hysteria2",
            "udp",
            "tls",
            serde_json::json!({"password": "p", "sni": "h.example.com", "obfs": "salamander", "obfs_password": "o"}),
        );
        assert_eq!(
            link(&hy).unwrap(),
            "hysteria2://p@203.0.113.7:443?sni=h.example.com&obfs=salamander&obfs-password=o#tokyo%201"
        );
    }

    #[test]
    fn test_unsupported_protocol_dropped() {
        let socks = outbound("socks", "tcp", "none", serde_json::json!({}));
        assert!(link(&socks).is_none());
        let trojan = outbound("trojan", "tcp", "tls", serde_json::json!({"password": "p"}));
        let decoded = STANDARD.decode(render(&[socks, trojan])).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap().lines().count(), 1);
        assert_eq!(render(&[]), "");
    }

    #[test]
    fn test_missing_credential_dropped() {
        let vless = outbound("vless", "ws", "tls", serde_json::json!({"uuid": "", "path": "/ws"}));
        assert!(link(&vless).is_none());
        let vmess = outbound("vmess", "ws", "tls", serde_json::json!({}));
        assert!(link(&vmess).is_none());
        let trojan = outbound("trojan", "tcp", "tls", serde_json::json!({"password": null}));
        assert!(link(&trojan).is_none());
        let ss = outbound("shadowsocks2022", "tcp", "none", serde_json::json!({"method": "m"}));
        assert!(link(&ss).is_none());
    }
}
