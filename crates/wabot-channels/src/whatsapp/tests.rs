use super::events::message_contents;
use super::qr::generate_qr_terminal;
use super::WhatsAppTransport;
use wabot_core::message::{extract_text, MessageContent};
use wabot_core::target::TargetResolver;
use wabot_core::traits::Transport;
use wacore_binary::jid::{Jid, JidExt};
use waproto::whatsapp::{message, Message};

#[test]
fn test_contents_plain_conversation() {
    let msg = Message {
        conversation: Some("!ping".into()),
        ..Default::default()
    };
    assert_eq!(
        message_contents(&msg),
        vec![MessageContent::Text("!ping".into())]
    );
}

#[test]
fn test_contents_caption_and_extended_text() {
    let msg = Message {
        extended_text_message: Some(Box::new(message::ExtendedTextMessage {
            text: Some("!echo hi".into()),
            ..Default::default()
        })),
        image_message: Some(Box::new(message::ImageMessage {
            caption: Some("holiday".into()),
            ..Default::default()
        })),
        ..Default::default()
    };
    assert_eq!(extract_text(&message_contents(&msg)), "!echo hi");
}

#[test]
fn test_contents_unwrap_ephemeral() {
    let inner = Message {
        conversation: Some("/help".into()),
        ..Default::default()
    };
    let msg = Message {
        ephemeral_message: Some(Box::new(message::FutureProofMessage {
            message: Some(Box::new(inner)),
            ..Default::default()
        })),
        ..Default::default()
    };
    let contents = message_contents(&msg);
    assert!(matches!(contents[0], MessageContent::Ephemeral(_)));
    assert_eq!(extract_text(&contents), "/help");
}

#[test]
fn test_empty_message_has_no_text() {
    assert_eq!(extract_text(&message_contents(&Message::default())), "");
}

#[test]
fn test_jid_group_detection() {
    let group: Jid = "120363001234567890@g.us".parse().unwrap();
    assert!(group.is_group());
    let personal: Jid = "6281234567890@s.whatsapp.net".parse().unwrap();
    assert!(!personal.is_group());
}

#[test]
fn test_resolved_targets_parse_as_jids() {
    let resolver = TargetResolver::default();
    for raw in ["081234567890", "120363001234567890@g.us"] {
        let target = resolver.resolve(raw).unwrap();
        let jid: Jid = target.address().parse().unwrap();
        assert_eq!(jid.is_group(), target.is_group());
    }
}

#[test]
fn test_generate_qr_terminal() {
    let qr = generate_qr_terminal("2@abc,def,ghi").unwrap();
    assert!(qr.lines().count() > 5);
}

#[tokio::test]
async fn test_send_before_connect_fails() {
    let transport = WhatsAppTransport::new("wabot", "/tmp/wabot-test");
    assert!(!transport.is_connected());
    let target = TargetResolver::default().resolve("0812").unwrap();
    let err = transport.send_text(&target, "hi").await.unwrap_err();
    assert!(err.to_string().contains("not connected"));
}
