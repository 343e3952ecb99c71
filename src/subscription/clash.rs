//! Clash (mihomo) YAML rendering.

use super::outbound::Outbound;
use super::yaml::{self, MapBuilder, Yaml};

const GROUP_NAME: &str = "NodeHub";

fn ws_opts(ob: &Outbound, default_path: &str) -> Option<Yaml> {
    (ob.transport == "ws").then(|| {
        MapBuilder::new()
            .put("path", ob.text_or("path", default_path))
            .put("headers", MapBuilder::new().put("Host", ob.text("host").unwrap_or_default()).build())
            .build()
    })
}

fn grpc_opts(ob: &Outbound) -> Option<Yaml> {
    (ob.transport == "grpc").then(|| {
        MapBuilder::new()
            .put("grpc-service-name", ob.text_or("service_name", "grpc"))
            .build()
    })
}

fn network(ob: &Outbound, fallback: &str) -> String {
    if ob.transport.is_empty() {
        fallback.to_string()
    } else {
        ob.transport.clone()
    }
}

/// Proxy entry for one outbound, or `None` for unsupported protocols and
/// outbounds without a credential.
pub fn proxy(ob: &Outbound) -> Option<Yaml> {
    ob.credential()?;
    let base = MapBuilder::new()
        .put("name", ob.name.as_str())
        .put("server", ob.address.as_str())
        .put("port", ob.port);

    let entry = match ob.base_protocol() {
        "vless" => base
            .put("type", "vless")
            .put_opt("uuid", ob.text("uuid"))
            .put("tls", ob.has_tls())
            .put("skip-cert-verify", ob.flag("allow_insecure"))
            .put("servername", ob.server_name())
            .put("network", network(ob, "ws"))
            .put_opt("flow", ob.text("flow"))
            .put("client-fingerprint", ob.fingerprint())
            .put_opt("ws-opts", ws_opts(ob, "/"))
            .put_opt("grpc-opts", grpc_opts(ob))
            .put_opt(
                "reality-opts",
                (ob.tls_mode == "reality").then(|| {
                    MapBuilder::new()
                        .put("public-key", ob.reality_public_key())
                        .put("short-id", ob.reality_short_id())
                        .build()
                }),
            ),
        "trojan" => base
            .put("type", "trojan")
            .put_opt("password", ob.text("password"))
            .put("sni", ob.text("sni").unwrap_or_default())
            .put("skip-cert-verify", ob.flag("allow_insecure"))
            .put("network", network(ob, "tcp"))
            .put("client-fingerprint", ob.fingerprint())
            .put_opt("ws-opts", ws_opts(ob, "/trojan-ws"))
            .put_opt("grpc-opts", grpc_opts(ob)),
        "vmess" => base
            .put("type", "vmess")
            .put_opt("uuid", ob.text("uuid"))
            .put("alterId", ob.number("alter_id").unwrap_or(0))
            .put("cipher", ob.text_or("encryption", "auto"))
            .put("tls", ob.has_tls())
            .put("skip-cert-verify", ob.flag("allow_insecure"))
            .put("servername", ob.server_name())
            .put("network", network(ob, "ws"))
            .put_opt("ws-opts", ws_opts(ob, "/"))
            .put_opt("grpc-opts", grpc_opts(ob)),
        "shadowsocks" => base
            .put("type", "ss")
            .put_opt("cipher", ob.text("method"))
            .put_opt("password", ob.text("password")),
        "hysteria2" => base
            .put("type", "hysteria2")
            .put_opt("password", ob.text("password"))
            .put("sni", ob.text("sni").unwrap_or_default())
            .put("up", format!("{} Mbps", ob.number("up_mbps").unwrap_or(100)))
            .put("down", format!("{} Mbps", ob.number("down_mbps").unwrap_or(100)))
            .put_opt("obfs", ob.text("obfs_type").or_else(|| ob.text("obfs")))
            .put_opt("obfs-password", ob.text("obfs_password")),
        _ => return None,
    };
    Some(entry.build())
}

/// Full Clash document with a single selector group.
pub fn render(sub_name: &str, outbounds: &[Outbound]) -> String {
    let names: Vec<Yaml> = outbounds
        .iter()
        .filter(|ob| proxy(ob).is_some())
        .map(|ob| Yaml::from(ob.name.as_str()))
        .collect();
    let proxies: Vec<Yaml> = outbounds.iter().filter_map(proxy).collect();

    let group_members = if names.is_empty() {
        vec![Yaml::from("DIRECT")]
    } else {
        names
    };
    let group = MapBuilder::new()
        .put("name", GROUP_NAME)
        .put("type", "select")
        .put("proxies", Yaml::Seq(group_members))
        .build();

    let doc = MapBuilder::new()
        .put("proxies", Yaml::Seq(proxies))
        .put("proxy-groups", Yaml::Seq(vec![group]))
        .put("rules", Yaml::Seq(vec![Yaml::from(format!("MATCH,{GROUP_NAME}"))]))
        .build();

    format!(
        "# NodeHub subscription (clash)\n# name={}\n{}",
        sub_name,
        yaml::to_string(&doc)
    )
}
