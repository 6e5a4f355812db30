//! Subscription message interpretation.
//!
//! `interpret` maps one `PubSubReply` to what the event loop should do
//! with it. It never touches the channels itself; the loop owns delivery.

use tracing::{error, info, trace};

use crate::connection::{PubSubReply, ReplyKind};
use crate::error::{MonitorError, ParseError};
use crate::types::MasterSwitchedEvent;

/// Topic the sentinel publishes failovers on.
pub const SWITCH_MASTER_TOPIC: &str = "+switch-master";

/// Body of a confirmation for a single active subscription.
pub const SUBSCRIBE_CONFIRMED: &str = "1";

/// Outcome of interpreting one subscription message.
#[derive(Debug)]
pub enum Interpretation {
    /// Nothing to do; keep running.
    Ignore,
    /// The subscription is live.
    Confirmed,
    /// A parsed master switch to forward.
    Event(MasterSwitchedEvent),
    /// The monitor can no longer trust its feed and must shut down.
    Fatal(MonitorError),
}

impl Interpretation {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// Decide what a raw subscription message means for the monitor.
pub fn interpret(reply: &PubSubReply) -> Interpretation {
    if let Some(ref err) = reply.error {
        info!(channel = %reply.channel, error = %err, "subscription error");
        return Interpretation::Fatal(MonitorError::Subscription {
            channel: reply.channel.clone(),
            message: err.clone(),
        });
    }

    info!(channel = %reply.channel, body = %reply.body, "subscription message");

    match reply.kind {
        ReplyKind::Message => match parse_switch_master(&reply.body) {
            Ok(event) => Interpretation::Event(event),
            Err(e) => {
                error!(
                    channel = %reply.channel,
                    body = %reply.body,
                    error = %e,
                    "failed to parse switch-master message"
                );
                Interpretation::Fatal(MonitorError::Parse {
                    body: reply.body.clone(),
                    source: e,
                })
            }
        },
        ReplyKind::Confirmation => {
            if reply.body == SUBSCRIBE_CONFIRMED {
                trace!(channel = %reply.channel, "subscription confirmed, firing connection event");
                Interpretation::Confirmed
            } else {
                // Any other count means we cannot be sure we are subscribed.
                Interpretation::Fatal(MonitorError::Confirmation(reply.body.clone()))
            }
        }
        ReplyKind::Error | ReplyKind::Other => Interpretation::Ignore,
    }
}

/// Parse `<name> <old-ip> <old-port> <new-ip> <new-port>`.
///
/// Fields are split on single spaces and used verbatim.
pub fn parse_switch_master(body: &str) -> Result<MasterSwitchedEvent, ParseError> {
    let fields: Vec<&str> = body.split(' ').collect();
    if fields.len() != 5 {
        return Err(ParseError::FieldCount(fields.len()));
    }

    let old_master_port = parse_port(fields[2])?;
    let new_master_port = parse_port(fields[4])?;

    Ok(MasterSwitchedEvent {
        name: fields[0].to_string(),
        old_master_ip: fields[1].to_string(),
        old_master_port,
        new_master_ip: fields[3].to_string(),
        new_master_port,
    })
}

fn parse_port(field: &str) -> Result<u16, ParseError> {
    field
        .parse::<u16>()
        .map_err(|_| ParseError::Port(field.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_switch_master() {
        let event = parse_switch_master("mycluster 10.0.0.1 6379 10.0.0.2 6380").unwrap();
        assert_eq!(
            event,
            MasterSwitchedEvent {
                name: "mycluster".to_string(),
                old_master_ip: "10.0.0.1".to_string(),
                old_master_port: 6379,
                new_master_ip: "10.0.0.2".to_string(),
                new_master_port: 6380,
            }
        );
    }

    #[test]
    fn keeps_fields_verbatim() {
        let event = parse_switch_master("MyCluster Host-A 1 host-b 65535").unwrap();
        assert_eq!(event.name, "MyCluster");
        assert_eq!(event.old_master_ip, "Host-A");
        assert_eq!(event.new_master_ip, "host-b");
        assert_eq!(event.new_master_port, 65535);
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert_eq!(
            parse_switch_master("mycluster 10.0.0.1 6379 10.0.0.2"),
            Err(ParseError::FieldCount(4))
        );
        assert_eq!(
            parse_switch_master("mycluster 10.0.0.1 6379 10.0.0.2 6380 extra"),
            Err(ParseError::FieldCount(6))
        );
        assert_eq!(parse_switch_master(""), Err(ParseError::FieldCount(1)));
    }

    #[test]
    fn double_space_changes_field_count() {
        assert!(parse_switch_master("mycluster  10.0.0.1 6379 10.0.0.2 6380").is_err());
        assert!(parse_switch_master("mycluster 10.0.0.1 6379 10.0.0.2 6380 ").is_err());
    }

    #[test]
    fn rejects_non_numeric_ports() {
        assert_eq!(
            parse_switch_master("mycluster 10.0.0.1 abc 10.0.0.2 6380"),
            Err(ParseError::Port("abc".to_string()))
        );
        assert_eq!(
            parse_switch_master("mycluster 10.0.0.1 6379 10.0.0.2 x1"),
            Err(ParseError::Port("x1".to_string()))
        );
    }

    #[test]
    fn transport_error_is_fatal_whatever_the_body() {
        let mut reply = PubSubReply::error(SWITCH_MASTER_TOPIC, "connection reset");
        reply.kind = ReplyKind::Message;
        reply.body = "mycluster 10.0.0.1 6379 10.0.0.2 6380".to_string();
        assert!(interpret(&reply).is_fatal());
    }

    #[test]
    fn message_becomes_event() {
        let reply = PubSubReply::message(SWITCH_MASTER_TOPIC, "c 1.1.1.1 1 2.2.2.2 2");
        match interpret(&reply) {
            Interpretation::Event(e) => assert_eq!(e.name, "c"),
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn malformed_message_is_fatal() {
        let reply = PubSubReply::message(SWITCH_MASTER_TOPIC, "mycluster 10.0.0.1 abc 10.0.0.2 6380");
        assert!(matches!(
            interpret(&reply),
            Interpretation::Fatal(MonitorError::Parse { .. })
        ));
    }

    #[test]
    fn confirmation_one_is_confirmed() {
        let reply = PubSubReply::confirmation(SWITCH_MASTER_TOPIC, "1");
        assert!(matches!(interpret(&reply), Interpretation::Confirmed));
    }

    #[test]
    fn other_confirmation_is_fatal() {
        for body in ["0", "2", ""] {
            let reply = PubSubReply::confirmation(SWITCH_MASTER_TOPIC, body);
            assert!(matches!(
                interpret(&reply),
                Interpretation::Fatal(MonitorError::Confirmation(_))
            ));
        }
    }

    #[test]
    fn other_kinds_are_ignored() {
        let reply = PubSubReply {
            channel: SWITCH_MASTER_TOPIC.to_string(),
            kind: ReplyKind::Other,
            body: "garbage".to_string(),
            error: None,
        };
        assert!(matches!(interpret(&reply), Interpretation::Ignore));
    }
}
