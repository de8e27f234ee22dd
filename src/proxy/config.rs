//! 3proxy configuration generation.
//!
//! Pure text rendering from modem and port-assignment snapshots. Output is
//! byte-identical for identical inputs; the daemon is only reloaded when
//! the supervisor decides to, never because of spurious config churn.

use super::ProxyPaths;
use crate::db::{Modem, ProxyConfig};

/// Render the complete 3proxy configuration for the current fleet state.
///
/// Entries that are inactive or reference a missing modem are skipped
/// entirely. Entry order in the output follows input order.
pub fn generate(modems: &[Modem], configs: &[ProxyConfig], paths: &ProxyPaths) -> String {
    let mut out = String::new();

    out.push_str("# 3proxy configuration for the 4G proxy farm\n\n");
    out.push_str("# Logging\n");
    out.push_str(&format!("log {} D\n", paths.log_file.display()));
    out.push_str("logformat \"- +_L%t.%. %N.%p %E %U %C:%c %R:%r %O %I %h %T\"\n\n");
    out.push_str("# System settings\n");
    out.push_str("daemon\n");
    out.push_str(&format!("pidfile {}\n", paths.pid_file.display()));
    out.push_str("nserver 8.8.8.8\n");
    out.push_str("nserver 8.8.4.4\n");
    out.push_str("nscache 65536\n");
    out.push_str("timeouts 1 5 30 60 180 1800 15 60\n\n");
    out.push_str("# Users and authentication\n");
    out.push_str("users admin:CL:password\n\n");
    out.push_str("# Access control\n");
    out.push_str("allow admin\n");

    for config in configs {
        if !config.is_active {
            continue;
        }
        let Some(modem) = config
            .modem_id
            .and_then(|id| modems.iter().find(|m| m.id == id))
        else {
            continue;
        };

        if protocol_allows(config.protocol.as_deref(), "http") {
            push_listener_block(&mut out, "proxy", "HTTP", config.http_port, modem, config);
        }
        if protocol_allows(config.protocol.as_deref(), "socks5") {
            push_listener_block(&mut out, "socks", "SOCKS5", config.socks_port, modem, config);
        }
    }

    out
}

/// Protocol gate: unset or empty protocol means both listeners.
fn protocol_allows(protocol: Option<&str>, kind: &str) -> bool {
    match protocol {
        None | Some("") | Some("both") => true,
        Some(p) => p == kind,
    }
}

fn push_listener_block(
    out: &mut String,
    directive: &str,
    label: &str,
    port: u16,
    modem: &Modem,
    config: &ProxyConfig,
) {
    let egress = modem.public_ip.as_deref();

    out.push('\n');
    out.push_str(&format!(
        "# {} proxy for {} ({})\n",
        label,
        modem.name,
        egress.unwrap_or("no public ip")
    ));

    // Listeners bind loopback for local clients and egress via the modem's
    // current public IP. A modem without one egresses via the default route.
    match egress {
        Some(ip) => out.push_str(&format!("{directive} -p{port} -i127.0.0.1 -e{ip}\n")),
        None => out.push_str(&format!("{directive} -p{port} -i127.0.0.1\n")),
    }

    out.push_str(&format!("maxconn {}\n", config.max_connections.unwrap_or(100)));

    match (config.username.as_deref(), config.password.as_deref()) {
        (Some(user), Some(pass)) if config.authentication && !user.is_empty() && !pass.is_empty() => {
            out.push_str("auth strong\n");
            out.push_str(&format!("users {user}:CL:{pass}\n"));
            out.push_str(&format!("allow {user}\n"));
        }
        _ => {
            out.push_str("auth none\n");
            out.push_str("allow *\n");
        }
    }

    // Allow rules always precede deny rules within an entry.
    for ip in &config.allowed_ips {
        out.push_str(&format!("allow {ip}\n"));
    }
    for ip in &config.blocked_ips {
        out.push_str(&format!("deny {ip}\n"));
    }

    if let Some(limit) = config.bandwidth_limit {
        out.push_str(&format!("bandlim {limit}\n"));
    }

    out.push_str("flush\n");
}
