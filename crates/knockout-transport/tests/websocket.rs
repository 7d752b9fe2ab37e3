//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on an OS-assigned port and talk to it with
//! a `tokio-tungstenite` client.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use knockout_transport::{Connection, Transport, WebSocketTransport};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn connect_client(addr: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        ws
    }

    async fn bound() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();
        (transport, addr)
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (mut transport, addr) = bound().await;
        let server = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let mut client = connect_client(&addr).await;
        let conn = server.await.expect("task should complete");
        assert!(conn.id().into_inner() >= 1);

        client
            .send(Message::Binary(br#"{"type":"DISCONNECT"}"#.to_vec().into()))
            .await
            .unwrap();
        let received = conn.recv().await.unwrap().expect("one frame");
        assert_eq!(received, br#"{"type":"DISCONNECT"}"#.to_vec());

        conn.send(br#"{"type":"TURN_CONFIRMED"}"#).await.unwrap();
        let reply = client.next().await.unwrap().unwrap();
        assert!(reply.is_text(), "JSON goes out as a text frame");
        assert_eq!(&reply.into_data()[..], br#"{"type":"TURN_CONFIRMED"}"#);
    }

    #[tokio::test]
    async fn test_websocket_send_while_recv_is_pending() {
        // The reader parks on recv(); a concurrent writer must still get
        // through, otherwise room notifications stall until the client speaks.
        let (mut transport, addr) = bound().await;
        let server = tokio::spawn(async move { transport.accept().await.unwrap() });
        let mut client = connect_client(&addr).await;
        let conn = Arc::new(server.await.unwrap());

        let reader = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        tokio::time::timeout(Duration::from_secs(1), conn.send(b"tick"))
            .await
            .expect("send must not wait for recv")
            .unwrap();
        let frame = client.next().await.unwrap().unwrap();
        assert_eq!(&frame.into_data()[..], b"tick");

        client.close(None).await.unwrap();
        let closed = reader.await.unwrap().unwrap();
        assert!(closed.is_none());
    }

    #[tokio::test]
    async fn test_websocket_connection_ids_are_unique() {
        let (mut transport, addr) = bound().await;
        let server = tokio::spawn(async move {
            let a = transport.accept().await.unwrap();
            let b = transport.accept().await.unwrap();
            (a.id(), b.id())
        });
        let _c1 = connect_client(&addr).await;
        let _c2 = connect_client(&addr).await;
        let (a, b) = server.await.unwrap();
        assert_ne!(a, b);
    }
}
