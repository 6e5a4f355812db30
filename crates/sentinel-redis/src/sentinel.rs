//! Command client for liveness and discovery calls.

use async_trait::async_trait;
use sentinel_monitor::{ClusterName, ConnectOptions, Sentinel, SentinelClient, TransportError};
use tracing::debug;

use crate::connection::RespConnection;
use crate::resp::RespValue;

/// Request/response connection to one sentinel.
pub struct RedisSentinelClient {
    location: String,
    conn: Option<RespConnection>,
}

impl RedisSentinelClient {
    pub async fn open(sentinel: &Sentinel, options: ConnectOptions) -> Result<Self, TransportError> {
        let location = sentinel.location();
        let conn = RespConnection::open(&location, options).await?;
        Ok(Self {
            location,
            conn: Some(conn),
        })
    }

    async fn request(&mut self, args: &[&str]) -> Result<RespValue, TransportError> {
        let conn = self.conn.as_mut().ok_or(TransportError::Closed)?;
        conn.request(args).await
    }
}

#[async_trait]
impl SentinelClient for RedisSentinelClient {
    async fn ping(&mut self) -> Result<(), TransportError> {
        match self.request(&["PING"]).await? {
            RespValue::Simple(ref s) if s == "PONG" => Ok(()),
            other => Err(TransportError::Protocol(format!(
                "unexpected PING reply {other:?}"
            ))),
        }
    }

    async fn find_known_clusters(&mut self) -> Result<Vec<ClusterName>, TransportError> {
        let reply = self.request(&["SENTINEL", "MASTERS"]).await?;
        entries(reply)?
            .iter()
            .map(|entry| {
                field(entry, "name")
                    .ok_or_else(|| TransportError::Protocol("master entry without name".to_string()))
            })
            .collect()
    }

    async fn find_connected_sentinels(
        &mut self,
        cluster: &str,
    ) -> Result<Vec<Sentinel>, TransportError> {
        let reply = self.request(&["SENTINEL", "SENTINELS", cluster]).await?;
        let peers = entries(reply)?
            .iter()
            .map(parse_peer)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(location = %self.location, %cluster, peers = peers.len(), "connected sentinels");
        Ok(peers)
    }

    async fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.shutdown().await;
            debug!(location = %self.location, "sentinel client closed");
        }
    }
}

/// Top-level array of entries; each entry is a flat key/value array.
fn entries(reply: RespValue) -> Result<Vec<RespValue>, TransportError> {
    match reply {
        RespValue::Array(items) => Ok(items),
        RespValue::Null => Ok(Vec::new()),
        other => Err(TransportError::Protocol(format!(
            "expected array reply, got {other:?}"
        ))),
    }
}

fn field(entry: &RespValue, key: &str) -> Option<String> {
    let RespValue::Array(items) = entry else {
        return None;
    };
    items
        .chunks_exact(2)
        .find(|pair| pair[0].as_text().as_deref() == Some(key))
        .and_then(|pair| pair[1].as_text())
}

fn parse_peer(entry: &RespValue) -> Result<Sentinel, TransportError> {
    let ip = field(entry, "ip")
        .ok_or_else(|| TransportError::Protocol("sentinel entry without ip".to_string()))?;
    let port = field(entry, "port")
        .and_then(|p| p.parse::<u16>().ok())
        .ok_or_else(|| TransportError::Protocol(format!("sentinel entry {ip} without valid port")))?;
    Ok(Sentinel::new(ip, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    use crate::connection::read_value;

    fn kv(pairs: &[(&'static str, &'static str)]) -> RespValue {
        RespValue::Array(
            pairs
                .iter()
                .flat_map(|&(k, v)| {
                    [
                        RespValue::Bulk(Bytes::from_static(k.as_bytes())),
                        RespValue::Bulk(Bytes::from_static(v.as_bytes())),
                    ]
                })
                .collect(),
        )
    }

    #[test]
    fn parses_peer_entries() {
        let entry = kv(&[("name", "abc"), ("ip", "10.0.0.3"), ("port", "26379")]);
        assert_eq!(parse_peer(&entry).unwrap(), Sentinel::new("10.0.0.3", 26379));

        let bad = kv(&[("ip", "10.0.0.3"), ("port", "nope")]);
        assert!(parse_peer(&bad).is_err());
    }

    #[test]
    fn field_lookup_ignores_values_matching_key() {
        let entry = kv(&[("flags", "name"), ("name", "cluster-a")]);
        assert_eq!(field(&entry, "name").as_deref(), Some("cluster-a"));
    }

    #[test]
    fn non_array_reply_is_protocol_error() {
        assert!(entries(RespValue::Simple("OK".into())).is_err());
        assert!(entries(RespValue::Null).unwrap().is_empty());
    }

    /// Answers each command in order with a canned reply.
    async fn scripted_server(replies: Vec<&'static [u8]>) -> (String, tokio::task::JoinHandle<Vec<RespValue>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = BytesMut::new();
            let mut seen = Vec::new();
            for reply in replies {
                seen.push(read_value(&mut socket, &mut buf).await.unwrap());
                socket.write_all(reply).await.unwrap();
            }
            seen
        });
        (addr, handle)
    }

    fn sentinel_at(addr: &str) -> Sentinel {
        let (host, port) = addr.rsplit_once(':').unwrap();
        Sentinel::new(host, port.parse().unwrap())
    }

    #[tokio::test]
    async fn discovery_round_trip() {
        let (addr, server) = scripted_server(vec![
            &b"+PONG\r\n"[..],
            &b"*2\r\n*4\r\n$4\r\nname\r\n$7\r\ncluster\r\n$2\r\nip\r\n$8\r\n10.0.0.1\r\n*2\r\n$4\r\nname\r\n$5\r\nother\r\n"[..],
            &b"*1\r\n*4\r\n$2\r\nip\r\n$8\r\n10.0.0.7\r\n$4\r\nport\r\n$5\r\n26380\r\n"[..],
        ])
        .await;

        let mut client = RedisSentinelClient::open(&sentinel_at(&addr), ConnectOptions::default())
            .await
            .unwrap();
        client.ping().await.unwrap();
        assert_eq!(
            client.find_known_clusters().await.unwrap(),
            vec!["cluster".to_string(), "other".to_string()]
        );
        assert_eq!(
            client.find_connected_sentinels("cluster").await.unwrap(),
            vec![Sentinel::new("10.0.0.7", 26380)]
        );
        client.close().await;

        let seen = server.await.unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(
            seen[2],
            RespValue::Array(vec![
                RespValue::Bulk(Bytes::from_static(b"SENTINEL")),
                RespValue::Bulk(Bytes::from_static(b"SENTINELS")),
                RespValue::Bulk(Bytes::from_static(b"cluster")),
            ])
        );
    }

    #[tokio::test]
    async fn server_error_surfaces() {
        let (addr, _server) = scripted_server(vec![&b"-ERR No such master with that name\r\n"[..]]).await;
        let mut client = RedisSentinelClient::open(&sentinel_at(&addr), ConnectOptions::default())
            .await
            .unwrap();
        match client.find_connected_sentinels("missing").await {
            Err(TransportError::Server(message)) => assert!(message.contains("No such master")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_client_rejects_calls() {
        let (addr, _server) = scripted_server(vec![]).await;
        let mut client = RedisSentinelClient::open(&sentinel_at(&addr), ConnectOptions::default())
            .await
            .unwrap();
        client.close().await;
        client.close().await;
        assert!(matches!(client.ping().await, Err(TransportError::Closed)));
    }
}
