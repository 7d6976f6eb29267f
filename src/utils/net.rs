use std::net::UdpSocket;

/// Best-effort detection of the address this host uses to reach the
/// network, reported to the server for grey-release rules. Connecting the
/// socket only selects a route; no packet is ever sent.
pub fn local_ip() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:53").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip().to_string())
}
