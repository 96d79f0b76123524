mod answer;
mod decide;
mod gates;
mod grade;
mod rewrite;
mod tools;

pub use answer::AnswerNode;
pub use decide::DecideNode;
pub use gates::{DocReviewNode, HumanGateNode};
pub use grade::GradeNode;
pub use rewrite::RewriteNode;
pub use tools::ToolExecNode;

use anyhow::Result;
use futures::StreamExt;
use tandem_llm::{ChatClient, ChatRequest, ToolCall, ToolCallAccumulator};
use tandem_types::StreamEvent as PublicEvent;

use crate::node::EventSender;

/// Runs a streaming model call, forwarding text deltas as token events and
/// accumulating the full content plus any tool calls.
pub(crate) async fn stream_model(
    client: &dyn ChatClient,
    request: ChatRequest,
    thread_id: &str,
    event_tx: &EventSender,
) -> Result<(String, Vec<ToolCall>)> {
    let mut stream = client.chat_stream(request).await?;
    let mut content = String::new();
    let mut acc = ToolCallAccumulator::new();

    while let Some(event) = stream.next().await {
        match event? {
            tandem_llm::StreamEvent::Message { content: delta } => {
                content.push_str(&delta);
                event_tx
                    .send(PublicEvent::Token {
                        content: delta,
                        thread_id: thread_id.to_string(),
                    })
                    .await?;
            }
            tandem_llm::StreamEvent::ToolCall {
                index,
                id,
                name,
                arguments,
            } => {
                acc.push(index, id, name, arguments);
            }
            tandem_llm::StreamEvent::Done { .. } => {}
        }
    }

    Ok((content, acc.finish()))
}
