//! OpenVPN client profile templating.
//!
//! Static text generation; the profile references the modem's current
//! public IP as the remote endpoint and embeds the modem name in the
//! certificate and key file names.

use crate::db::Modem;

/// File name under which a modem's profile is published.
pub fn profile_filename(modem: &Modem) -> String {
    format!("{}-{}.ovpn", modem.name, modem.imei)
}

/// Render the client profile for a modem.
pub fn client_profile(modem: &Modem) -> String {
    let remote = modem.public_ip.as_deref().unwrap_or("your-server-ip");

    format!(
        "client\n\
         dev tun\n\
         proto udp\n\
         remote {remote} 1194\n\
         resolv-retry infinite\n\
         nobind\n\
         persist-key\n\
         persist-tun\n\
         ca ca.crt\n\
         cert {name}.crt\n\
         key {name}.key\n\
         cipher AES-256-CBC\n\
         auth SHA256\n\
         comp-lzo\n\
         verb 3\n\
         \n\
         # Client configuration for {name}\n\
         # IMEI: {imei}\n\
         \n\
         # Route all traffic through VPN\n\
         redirect-gateway def1 bypass-dhcp\n\
         \n\
         # DNS servers\n\
         dhcp-option DNS 8.8.8.8\n\
         dhcp-option DNS 8.8.4.4\n\
         \n\
         # Keep alive\n\
         keepalive 10 120\n",
        remote = remote,
        name = modem.name,
        imei = modem.imei,
    )
}
