//! Profile-driven default filling for template settings.
//!
//! A profile is the `(protocol, transport, tls_mode)` triple. Filling only
//! ever touches empty fields, so the function is idempotent.

use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::Value;

use crate::model::Defaults;

/// Default listen port per profile.
const PROFILE_PORTS: &[(&str, &str, &str, u16)] = &[
    ("vless", "tcp", "reality", 49443),
    ("hysteria2", "udp", "tls", 49444),
    ("shadowsocks2022", "tcp", "none", 49445),
    ("vless", "ws", "tls", 2053),
    ("trojan", "tcp", "tls", 2087),
];

const REALITY_PRIVATE_KEY_BYTES: usize = 32;
const REALITY_SHORT_ID_BYTES: usize = 8;
const PASSWORD_BYTES: usize = 16;
const SS2022_PASSWORD_BYTES: usize = 32;

/// Absent, null, or a string that is blank after trimming.
///
/// `0` and `false` are values, not holes.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Lowercase hex of `bytes` bytes from the OS CSPRNG.
pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Default port for a profile, if the profile is known.
pub fn profile_port(protocol: &str, transport: &str, tls_mode: &str) -> Option<u16> {
    PROFILE_PORTS
        .iter()
        .find(|(p, t, tls, _)| *p == protocol && *t == transport && *tls == tls_mode)
        .map(|(_, _, _, port)| *port)
}

fn ensure(target: &mut Defaults, key: &str, make: impl FnOnce() -> Value) {
    if is_empty_value(target.get(key)) {
        target.insert(key.to_string(), make());
    }
}

/// Fill the empty fields of `existing` for the given profile.
pub fn apply_defaults(protocol: &str, transport: &str, tls_mode: &str, existing: &Defaults) -> Defaults {
    let mut next = existing.clone();
    let p = protocol.trim();
    let t = transport.trim();
    let tls = tls_mode.trim();

    if let Some(port) = profile_port(p, t, tls) {
        ensure(&mut next, "port", || Value::from(port));
    }

    if p == "vless" && t == "ws" && tls == "tls" {
        ensure(&mut next, "path", || Value::from("/ws"));
        ensure(&mut next, "host", || Value::from(""));
    }

    if p == "vless" && tls == "reality" {
        ensure(&mut next, "flow", || Value::from("xtls-rprx-vision"));
        ensure(&mut next, "server_name", || Value::from(""));
        ensure(&mut next, "reality_private_key", || {
            Value::from(random_hex(REALITY_PRIVATE_KEY_BYTES))
        });
        ensure(&mut next, "reality_short_id", || {
            Value::from(random_hex(REALITY_SHORT_ID_BYTES))
        });
    }

    match p {
        "trojan" => {
            ensure(&mut next, "password", || Value::from(random_hex(PASSWORD_BYTES)));
            ensure(&mut next, "sni", || Value::from(""));
        }
        "hysteria2" => {
            ensure(&mut next, "password", || Value::from(random_hex(PASSWORD_BYTES)));
            ensure(&mut next, "obfs", || Value::from("none"));
            ensure(&mut next, "sni", || Value::from(""));
        }
        "shadowsocks2022" => {
            ensure(&mut next, "method", || Value::from("2022-blake3-aes-128-gcm"));
            ensure(&mut next, "password", || Value::from(random_hex(SS2022_PASSWORD_BYTES)));
        }
        _ => {}
    }

    next
}
