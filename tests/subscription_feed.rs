//! Public subscription feed over released nodes.

use axum::http::{Method, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

use nodehub::model::{DesiredConfig, Node, TemplateSnapshot};
use nodehub::store::{MemoryStore, SharedStore};
use nodehub::subscription::{clash, node_outbounds, singbox, v2ray};
use nodehub::templates::builtin::BUILTIN_TEMPLATES;
use nodehub::templates::TemplateRegistry;

mod common;
use common::{admin, create_node, release, request, test_app};

async fn create_subscription(app: &axum::Router, body: Value) -> String {
    let res = admin(app, Method::POST, "/api/subscriptions", Some(body)).await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.text());
    res.data()["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_unknown_and_disabled_feeds_look_the_same() {
    let (app, _) = test_app();

    let res = request(&app, Method::GET, "/sub/does-not-exist", &[], None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.text(), "# subscription disabled");
    assert_eq!(res.headers["cache-control"], "no-store");

    let token = create_subscription(&app, json!({"name": "off", "enabled": false})).await;
    let res = request(&app, Method::GET, &format!("/sub/{token}"), &[], None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.text(), "# subscription disabled");
}

#[tokio::test]
async fn test_feed_formats() {
    let (app, _) = test_app();
    let (alpha, _) = create_node(&app, "alpha", "alpha.example.com").await;
    let (beta, _) = create_node(&app, "beta", "beta.example.com").await;
    release(&app, &[&alpha, &beta], &["tpl_builtin_trojan_tcp_tls"], json!({"password": "p"})).await;

    let token = create_subscription(&app, json!({"name": "team", "visible_node_ids": [alpha]})).await;

    let res = request(&app, Method::GET, &format!("/sub/{token}"), &[], None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers["content-type"], "text/plain; charset=utf-8");
    assert_eq!(res.headers["cache-control"], "no-store");
    let decoded = String::from_utf8(STANDARD.decode(res.text()).unwrap()).unwrap();
    assert_eq!(
        decoded,
        "trojan://p@alpha.example.com:2087?type=tcp&security=tls&sni=&fp=chrome#alpha"
    );

    let res = request(&app, Method::GET, &format!("/sub/{token}?format=clash"), &[], None).await;
    assert_eq!(res.headers["content-type"], "text/yaml; charset=utf-8");
    let yaml = res.text();
    assert!(yaml.contains("- name: alpha\n"));
    assert!(yaml.contains("type: trojan"));
    assert!(!yaml.contains("beta"));

    let res = request(&app, Method::GET, &format!("/sub/{token}?format=sing-box"), &[], None).await;
    assert_eq!(res.headers["content-type"], "application/json; charset=utf-8");
    let doc: Value = serde_json::from_str(&res.text()).unwrap();
    let tags: Vec<&str> = doc["outbounds"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["tag"].as_str().unwrap())
        .collect();
    assert!(tags.contains(&"alpha"));
    assert_eq!(tags.last(), Some(&"direct"));

    // Disabling takes effect on the next fetch.
    let res = admin(&app, Method::PATCH, &format!("/api/subscriptions/{token}"), Some(json!({"enabled": false}))).await;
    assert_eq!(res.status, StatusCode::OK);
    let res = request(&app, Method::GET, &format!("/sub/{token}"), &[], None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_subscription_crud() {
    let (app, _) = test_app();
    let token = create_subscription(&app, json!({"name": "ops", "remark": "internal"})).await;

    let listed = admin(&app, Method::GET, "/api/subscriptions", None).await.data();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["enabled"], true);

    let res = admin(&app, Method::DELETE, &format!("/api/subscriptions/{token}"), None).await;
    assert_eq!(res.data()["deleted"], token);
    let res = admin(&app, Method::GET, &format!("/api/subscriptions/{token}"), None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

fn expected_scheme(protocol: &str) -> &'static str {
    match protocol {
        "vless" => "vless://",
        "trojan" => "trojan://",
        "vmess" => "vmess://",
        "hysteria2" => "hysteria2://",
        "shadowsocks2022" => "ss://",
        other => panic!("no scheme for {other}"),
    }
}

async fn builtin_node(params: Value) -> Node {
    let store: SharedStore = std::sync::Arc::new(MemoryStore::new(None));
    let registry = TemplateRegistry::new(store);
    let mut templates = Vec::new();
    for builtin in BUILTIN_TEMPLATES {
        let t = registry.get(builtin.id).await.unwrap();
        templates.push(TemplateSnapshot {
            id: t.id,
            name: t.name,
            protocol: t.protocol,
            transport: t.transport,
            tls_mode: t.tls_mode,
            defaults: t.defaults,
        });
    }
    Node {
        id: "node_rt".into(),
        name: "rt".into(),
        entry_ip: "198.51.100.4".into(),
        desired_config: Some(DesiredConfig {
            rev: 1,
            templates,
            params: params.as_object().cloned().unwrap_or_default(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_every_builtin_renders_a_link() {
    let node = builtin_node(json!({"uuid": "0f6c0a4e-6d0e-4d4b-9a51-2f7b8c3e1d00"})).await;
    let outbounds = node_outbounds(&node);
    assert_eq!(outbounds.len(), BUILTIN_TEMPLATES.len());

    for ob in &outbounds {
        let link = v2ray::link(ob).unwrap_or_else(|| panic!("no link for {}", ob.name));
        assert!(link.starts_with(expected_scheme(&ob.protocol)), "{link}");
        assert!(link.contains("198.51.100.4"), "{link}");
        assert!(clash::proxy(ob).is_some(), "{}", ob.name);
        assert!(singbox::outbound(ob).is_some(), "{}", ob.name);
    }
}

#[tokio::test]
async fn test_builtins_without_uuid_drop_vless_only() {
    let node = builtin_node(json!({})).await;
    let outbounds = node_outbounds(&node);
    let rendered: Vec<&str> = outbounds
        .iter()
        .filter(|ob| v2ray::link(ob).is_some())
        .map(|ob| ob.protocol.as_str())
        .collect();
    assert!(!rendered.contains(&"vless"));
    assert_eq!(rendered.len(), BUILTIN_TEMPLATES.iter().filter(|t| t.protocol != "vless").count());
}
