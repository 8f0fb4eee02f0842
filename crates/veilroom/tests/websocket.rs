//! The same relay served over WebSocket, one record per frame.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;
    use veilroom::prelude::*;
    use veilroom_protocol::{Envelope, Kind};

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn start_server() -> String {
        let server = VeilroomServer::builder()
            .bind("127.0.0.1:0")
            .build_websocket()
            .await
            .expect("server should build");
        let addr = server.local_addr().expect("local addr").to_string();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        addr
    }

    async fn connect(addr: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("should connect");
        ws
    }

    async fn send(ws: &mut ClientWs, value: serde_json::Value) {
        ws.send(Message::Text(value.to_string().into()))
            .await
            .expect("send should succeed");
    }

    async fn recv(ws: &mut ClientWs) -> Envelope {
        loop {
            let msg = tokio::time::timeout(
                std::time::Duration::from_secs(2),
                ws.next(),
            )
            .await
            .expect("timed out")
            .expect("stream ended")
            .expect("frame should decode");
            if let Message::Text(text) = msg {
                return serde_json::from_str(text.as_str())
                    .expect("invalid envelope");
            }
        }
    }

    #[tokio::test]
    async fn test_websocket_chat_between_two_clients() {
        let addr = start_server().await;
        let mut alice = connect(&addr).await;
        let mut bob = connect(&addr).await;

        send(&mut alice, serde_json::json!({"type":"username","body":{"content":"alice"}})).await;
        assert_eq!(recv(&mut alice).await.kind, Kind::Welcome);
        send(&mut alice, serde_json::json!({"type":"create","body":{"content":"lobby"}})).await;
        assert_eq!(recv(&mut alice).await.kind, Kind::Welcome);
        assert_eq!(recv(&mut alice).await.kind, Kind::System);

        send(&mut bob, serde_json::json!({"type":"username","body":{"content":"bob"}})).await;
        assert_eq!(recv(&mut bob).await.kind, Kind::Welcome);
        send(&mut bob, serde_json::json!({"type":"join","body":{"content":"lobby"}})).await;
        assert_eq!(recv(&mut bob).await.kind, Kind::Welcome);
        assert_eq!(
            recv(&mut alice).await.text_content(),
            Some("bob joined the room")
        );

        send(&mut bob, serde_json::json!({"type":"message","body":{"content":"hi"}})).await;
        assert_eq!(
            recv(&mut alice).await,
            Envelope::chat("bob", "hi", false, None)
        );
    }
}
