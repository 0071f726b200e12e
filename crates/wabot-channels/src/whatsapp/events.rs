//! Inbound message conversion: protobuf message → [`MessageContent`] candidates.

use tokio::sync::mpsc;
use tracing::{debug, info};
use wabot_core::message::{InboundMessage, MessageContent};
use wacore::types::message::MessageInfo;
use waproto::whatsapp::message::{buttons_response_message, interactive_response_message};
use waproto::whatsapp::Message;

/// Wrappers nest at most a couple of levels in practice.
const MAX_WRAPPER_DEPTH: usize = 4;

/// Every text-bearing field present on `msg`, wrappers included.
pub(super) fn message_contents(msg: &Message) -> Vec<MessageContent> {
    contents_at(msg, 0)
}

fn contents_at(msg: &Message, depth: usize) -> Vec<MessageContent> {
    let mut out = Vec::new();

    if let Some(text) = &msg.conversation {
        out.push(MessageContent::Text(text.clone()));
    }
    if let Some(text) = msg.extended_text_message.as_ref().and_then(|m| m.text.clone()) {
        out.push(MessageContent::ExtendedText(text));
    }
    if let Some(caption) = msg.image_message.as_ref().and_then(|m| m.caption.clone()) {
        out.push(MessageContent::ImageCaption(caption));
    }
    if let Some(caption) = msg.video_message.as_ref().and_then(|m| m.caption.clone()) {
        out.push(MessageContent::VideoCaption(caption));
    }
    if let Some(caption) = msg.document_message.as_ref().and_then(|m| m.caption.clone()) {
        out.push(MessageContent::DocumentCaption(caption));
    }

    if let Some(br) = &msg.buttons_response_message {
        let display_text = match &br.response {
            Some(buttons_response_message::Response::SelectedDisplayText(t)) => Some(t.clone()),
            _ => None,
        };
        out.push(MessageContent::ButtonsResponse {
            display_text,
            button_id: br.selected_button_id.clone(),
        });
    }
    if let Some(lr) = &msg.list_response_message {
        out.push(MessageContent::ListResponse {
            row_id: lr
                .single_select_reply
                .as_ref()
                .and_then(|r| r.selected_row_id.clone()),
            title: lr.title.clone(),
        });
    }
    if let Some(tr) = &msg.template_button_reply_message {
        out.push(MessageContent::TemplateButtonReply {
            display_text: tr.selected_display_text.clone(),
            id: tr.selected_id.clone(),
        });
    }
    if let Some(ir) = &msg.interactive_response_message {
        let params_json = match &ir.interactive_response_message {
            Some(
                interactive_response_message::InteractiveResponseMessage::NativeFlowResponseMessage(
                    nf,
                ),
            ) => nf.params_json.clone(),
            _ => None,
        };
        out.push(MessageContent::InteractiveResponse {
            body: ir.body.as_ref().and_then(|b| b.text.clone()),
            params_json,
        });
    }

    if depth < MAX_WRAPPER_DEPTH {
        let ephemeral = msg
            .ephemeral_message
            .as_ref()
            .and_then(|e| e.message.as_deref())
            .or_else(|| {
                msg.view_once_message
                    .as_ref()
                    .and_then(|v| v.message.as_deref())
            });
        if let Some(inner) = ephemeral {
            out.push(MessageContent::Ephemeral(contents_at(inner, depth + 1)));
        }
        if let Some(inner) = msg
            .device_sent_message
            .as_ref()
            .and_then(|d| d.message.as_deref())
        {
            out.push(MessageContent::DeviceSent(contents_at(inner, depth + 1)));
        }
    }

    out
}

/// Convert and forward one inbound event. Messages sent by this account are dropped.
pub(super) async fn handle_message(
    msg: &Message,
    info: &MessageInfo,
    tx: &mpsc::Sender<InboundMessage>,
) {
    if info.source.is_from_me {
        debug!("WA filtered: own message {}", info.id);
        return;
    }

    let sender_name = (!info.push_name.is_empty()).then(|| info.push_name.clone());
    let inbound = InboundMessage {
        id: info.id.clone(),
        chat_id: info.source.chat.to_string(),
        sender_id: info.source.sender.user.clone(),
        sender_name,
        is_group: info.source.is_group,
        timestamp: chrono::Utc::now(),
        contents: message_contents(msg),
    };

    debug!(
        "WA msg: chat={}, sender={}, is_group={}",
        inbound.chat_id, inbound.sender_id, inbound.is_group
    );

    if tx.send(inbound).await.is_err() {
        info!("whatsapp inbound receiver dropped");
    }
}
