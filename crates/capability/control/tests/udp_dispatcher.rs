use alarm_control::{CommandDispatcher, UdpDispatcher};
use alarm_protocol::{Frame, UdpClientConfig};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::net::UdpSocket;

#[tokio::test]
async fn modify_id_reaches_the_device_port() {
    let device = UdpSocket::bind("127.0.0.1:0").await.expect("bind device");
    let port = device.local_addr().expect("addr").port();
    let dispatcher = UdpDispatcher::bind(UdpClientConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        command_port: port,
        send_timeout_ms: 500,
    })
    .await
    .expect("bind dispatcher");

    dispatcher
        .send(&Frame::modify_id(7, 8), IpAddr::V4(Ipv4Addr::LOCALHOST))
        .await
        .expect("sent");

    let mut buf = [0u8; 16];
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), device.recv_from(&mut buf))
        .await
        .expect("received in time")
        .expect("recv");
    assert_eq!(&buf[..len], &[0xAA, 0x04, 0x07, 0x08, 0x00, 0x55]);
}
