use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use serde_json::{json, Value};
use tandem_graph::{Graph, TurnRequest};
use tandem_llm::{
    ChatClient, ChatRequest, ChatResponse, Message, StreamEvent as LlmEvent, ToolCall,
};
use tandem_persist::{Checkpoint, CheckpointStore, MemoryCheckpointStore};
use tandem_tools::{ToolHandler, ToolRegistry, ToolSpec};
use tandem_types::{
    ActorContext, GraphConfig, InterruptKind, NodeKind, ResumeDecision, StreamEvent,
};

/// One scripted model turn: text content plus optional tool calls.
#[derive(Clone, Default)]
struct Scripted {
    content: String,
    tool_calls: Vec<ToolCall>,
}

impl Scripted {
    fn text(content: &str) -> Self {
        Self {
            content: content.to_string(),
            tool_calls: Vec::new(),
        }
    }

    fn call(name: &str, id: &str, args: Value) -> Self {
        Self {
            content: String::new(),
            tool_calls: vec![ToolCall::new(id, name, args.to_string())],
        }
    }
}

/// Chat client that replays a fixed script and records every request.
struct FakeChat {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl FakeChat {
    fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn next(&self) -> Scripted {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .expect("model called more times than scripted")
    }

    fn recorded_requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for FakeChat {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().unwrap().push(request);
        let step = self.next();
        Ok(ChatResponse {
            content: Some(step.content),
            tool_calls: (!step.tool_calls.is_empty()).then_some(step.tool_calls),
            usage: None,
            finish_reason: None,
        })
    }

    async fn chat_stream(
        &self,
        request: ChatRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<LlmEvent>> + Send>>> {
        self.requests.lock().unwrap().push(request);
        let step = self.next();

        let mut events = Vec::new();
        if !step.content.is_empty() {
            events.push(Ok(LlmEvent::Message {
                content: step.content,
            }));
        }
        for (index, call) in step.tool_calls.into_iter().enumerate() {
            events.push(Ok(LlmEvent::ToolCall {
                index: index as u32,
                id: Some(call.id),
                name: Some(call.function.name),
                arguments: Some(call.function.arguments),
            }));
        }
        events.push(Ok(LlmEvent::Done {
            finish_reason: None,
        }));
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

/// Tool that records its invocations and returns a fixed reply.
struct RecordingTool {
    name: String,
    reply: String,
    calls: Arc<Mutex<Vec<Value>>>,
}

impl RecordingTool {
    fn new(name: &str, reply: &str) -> (Arc<Self>, Arc<Mutex<Vec<Value>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let tool = Arc::new(Self {
            name: name.to_string(),
            reply: reply.to_string(),
            calls: Arc::clone(&calls),
        });
        (tool, calls)
    }
}

#[async_trait]
impl ToolHandler for RecordingTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            self.name.as_str(),
            "test tool",
            json!({"type": "object", "properties": {}}),
        )
    }

    async fn call(&self, args: Value, _actor: Option<&ActorContext>) -> Result<String> {
        self.calls.lock().unwrap().push(args);
        Ok(self.reply.clone())
    }
}

async fn collect(mut rx: tokio::sync::mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn done_content(events: &[StreamEvent]) -> Option<&str> {
    events.iter().find_map(|e| match e {
        StreamEvent::Done { content, .. } => Some(content.as_str()),
        _ => None,
    })
}

struct Harness {
    graph: Graph,
    chat: Arc<FakeChat>,
    checkpoints: Arc<MemoryCheckpointStore>,
}

async fn harness(
    script: Vec<Scripted>,
    tools: Vec<Arc<dyn ToolHandler>>,
    config: GraphConfig,
) -> Harness {
    let chat = FakeChat::new(script);
    let registry = Arc::new(ToolRegistry::new());
    for tool in tools {
        registry.register(tool).await;
    }
    let checkpoints = Arc::new(MemoryCheckpointStore::new());
    let graph = Graph::new(
        chat.clone(),
        registry,
        checkpoints.clone(),
        config,
    );
    Harness {
        graph,
        chat,
        checkpoints,
    }
}

fn turn(message: &str) -> TurnRequest {
    TurnRequest {
        message: message.to_string(),
        thread_id: None,
        actor: Some(ActorContext::new(42, "Eve")),
    }
}

fn turn_on(message: &str, thread_id: &str) -> TurnRequest {
    TurnRequest {
        message: message.to_string(),
        thread_id: Some(thread_id.to_string()),
        actor: Some(ActorContext::new(42, "Eve")),
    }
}

// A plain greeting resolves to a direct answer and an auto-generated
// thread id.
#[tokio::test]
async fn direct_answer_turn_completes_with_done() {
    let h = harness(
        vec![Scripted::text("Hello! How can I help?")],
        vec![],
        GraphConfig::default(),
    )
    .await;

    let (thread_id, rx) = h.graph.spawn_turn(turn("hi"));
    assert!(!thread_id.is_empty());

    let events = collect(rx).await;
    assert_eq!(done_content(&events), Some("Hello! How can I help?"));
    // Tokens precede the terminal event and nothing follows it.
    assert!(matches!(events.last(), Some(StreamEvent::Done { .. })));
    assert!(events
        .iter()
        .take(events.len() - 1)
        .all(|e| matches!(e, StreamEvent::Token { .. })));
}

// A sensitive action suspends for approval before execution.
#[tokio::test]
async fn sensitive_tool_suspends_for_approval() {
    let (tool, calls) = RecordingTool::new("apply_for_leave", "submitted");
    let h = harness(
        vec![Scripted::call(
            "apply_for_leave",
            "call_1",
            json!({"start_date": "2026-09-01", "total_days": 2, "reason": "trip"}),
        )],
        vec![tool],
        GraphConfig::default(),
    )
    .await;

    let (_, rx) = h.graph.spawn_turn(turn("apply for 2 days of leave"));
    let events = collect(rx).await;

    let interrupts: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Interrupt { interrupt_data, .. } => Some(interrupt_data),
            _ => None,
        })
        .collect();
    assert_eq!(interrupts.len(), 1);
    let interrupt = interrupts[0];
    assert_eq!(interrupt.kind, InterruptKind::ToolApproval);
    assert!(interrupt.options.contains(&"approve".to_string()));
    assert!(interrupt.options.contains(&"reject".to_string()));
    assert_eq!(
        interrupt.pending_actions.as_ref().unwrap()[0].tool,
        "apply_for_leave"
    );

    // The interrupt is terminal for the turn.
    assert!(matches!(events.last(), Some(StreamEvent::Interrupt { .. })));
    // And the tool has not run.
    assert!(calls.lock().unwrap().is_empty());
}

// Rejecting the pending action steers the model toward alternatives and
// the tool never executes.
#[tokio::test]
async fn rejection_resumes_with_alternatives_and_no_side_effect() {
    let (tool, calls) = RecordingTool::new("apply_for_leave", "submitted");
    let h = harness(
        vec![
            Scripted::call("apply_for_leave", "call_1", json!({"total_days": 1})),
            Scripted::text("I won't do that. You could instead check your balance first."),
        ],
        vec![tool],
        GraphConfig::default(),
    )
    .await;

    let (thread_id, rx) = h.graph.spawn_turn(turn("apply for leave"));
    collect(rx).await;

    let rx = h
        .graph
        .spawn_resume(thread_id, ResumeDecision::new("reject"), None);
    let events = collect(rx).await;

    let content = done_content(&events).unwrap();
    assert!(content.contains("instead"));
    assert!(calls.lock().unwrap().is_empty());
}

// Approving at the gate produces the same outcome as a run where the
// gate policy is disabled.
#[tokio::test]
async fn approval_resume_matches_auto_approved_run() {
    let script = vec![
        Scripted::call("apply_for_leave", "call_1", json!({"total_days": 1})),
        Scripted::text("Your leave request was submitted."),
    ];
    let (tool_a, calls_a) = RecordingTool::new("apply_for_leave", "submitted ok");

    // Gated run: suspend, then approve.
    let h = harness(script.clone(), vec![tool_a], GraphConfig::default()).await;
    let (thread_id, rx) = h.graph.spawn_turn(turn("apply for leave"));
    let events = collect(rx).await;
    assert!(matches!(events.last(), Some(StreamEvent::Interrupt { .. })));

    let rx = h
        .graph
        .spawn_resume(thread_id, ResumeDecision::new("approve"), None);
    let gated = collect(rx).await;
    assert_eq!(calls_a.lock().unwrap().len(), 1);

    // Ungated run with the same script.
    let (tool_b, calls_b) = RecordingTool::new("apply_for_leave", "submitted ok");
    let mut config = GraphConfig::default();
    config.gates.approval_enabled = false;
    let h2 = harness(script, vec![tool_b], config).await;
    let (_, rx) = h2.graph.spawn_turn(turn("apply for leave"));
    let ungated = collect(rx).await;
    assert_eq!(calls_b.lock().unwrap().len(), 1);

    assert_eq!(done_content(&gated), done_content(&ungated));
}

// A second retrieval cycle is forced to answer regardless of grading.
#[tokio::test]
async fn grading_rewrites_at_most_once() {
    let (retriever, retrievals) = RecordingTool::new(
        "retrieve_documents",
        "chunk about office hours and parking rules, long enough to matter",
    );
    let mut config = GraphConfig::default();
    config.gates.document_review_enabled = false;

    let h = harness(
        vec![
            // decide: retrieve
            Scripted::call("retrieve_documents", "call_1", json!({"query": "leave policy"})),
            // grade: not relevant
            Scripted::text("no"),
            // rewrite
            Scripted::text("what is the annual leave policy?"),
            // decide again: retrieve again
            Scripted::call("retrieve_documents", "call_2", json!({"query": "annual leave policy"})),
            // grade is skipped by the loop bound; answer synthesis follows
            Scripted::text("The policy grants 20 days."),
        ],
        vec![retriever],
        config,
    )
    .await;

    let (_, rx) = h.graph.spawn_turn(turn("how much leave do I get?"));
    let events = collect(rx).await;

    assert_eq!(done_content(&events), Some("The policy grants 20 days."));
    assert_eq!(retrievals.lock().unwrap().len(), 2);
    // Every scripted step was consumed and no extra grading call happened.
    assert!(h.chat.script.lock().unwrap().is_empty());
}

// An assistant message with unanswered tool calls never reaches the model.
#[tokio::test]
async fn corrupted_checkpoint_is_repaired_before_the_model_call() {
    let h = harness(
        vec![Scripted::text("Recovered fine.")],
        vec![],
        GraphConfig::default(),
    )
    .await;

    // Checkpoint truncated mid-tool-cycle: two declared calls, one response.
    let corrupted = vec![
        Message::human("original question"),
        Message::ai_with_tools(vec![
            ToolCall::new("call_1", "retrieve_documents", "{}"),
            ToolCall::new("call_2", "get_leave_balance", "{}"),
        ]),
        Message::tool_result("call_1", "retrieve_documents", "partial docs"),
    ];
    h.checkpoints
        .save(Checkpoint::new("t-corrupt", 0, NodeKind::End, corrupted, None))
        .await
        .unwrap();

    let (_, rx) = h.graph.spawn_turn(turn_on("try again", "t-corrupt"));
    let events = collect(rx).await;
    assert_eq!(done_content(&events), Some("Recovered fine."));

    let requests = h.chat.recorded_requests();
    assert_eq!(requests.len(), 1);
    assert!(
        requests[0]
            .messages
            .iter()
            .all(|m| m.tool_calls().is_none()),
        "incomplete assistant message leaked into the model call"
    );
}

// Document review gate: retrieval suspends for review, and added context is
// visible to answer synthesis.
#[tokio::test]
async fn document_review_suspends_and_add_context_enriches() {
    let (retriever, _) = RecordingTool::new(
        "retrieve_documents",
        "relocation policy: employees may request a transfer after one year",
    );
    let mut config = GraphConfig::default();
    config.gates.document_review_enabled = true;

    let h = harness(
        vec![
            Scripted::call("retrieve_documents", "call_1", json!({"query": "transfers"})),
            Scripted::text("Transfers are allowed after one year."),
        ],
        vec![retriever],
        config,
    )
    .await;

    let (thread_id, rx) = h.graph.spawn_turn(turn("can I transfer offices?"));
    let events = collect(rx).await;
    let interrupt = match events.last() {
        Some(StreamEvent::Interrupt { interrupt_data, .. }) => interrupt_data.clone(),
        other => panic!("expected interrupt, got {other:?}"),
    };
    assert_eq!(interrupt.kind, InterruptKind::DocumentReview);
    assert!(interrupt.documents.unwrap().contains("relocation policy"));

    let decision =
        ResumeDecision::new("add_context").with_additional_context("HR confirmed exceptions exist");
    let rx = h.graph.spawn_resume(thread_id, decision, None);
    let events = collect(rx).await;
    assert!(done_content(&events).is_some());

    // The answer-synthesis prompt saw the user-provided context.
    let requests = h.chat.recorded_requests();
    let answer_prompt = requests.last().unwrap().messages[0].content_text();
    assert!(answer_prompt.contains("HR confirmed exceptions exist"));
}

// Resuming a thread with nothing pending is an error, not a silent no-op.
#[tokio::test]
async fn resume_without_pending_interrupt_errors() {
    let h = harness(
        vec![Scripted::text("done answer")],
        vec![],
        GraphConfig::default(),
    )
    .await;

    let (thread_id, rx) = h.graph.spawn_turn(turn("hi"));
    collect(rx).await;

    let rx = h
        .graph
        .spawn_resume(thread_id, ResumeDecision::new("approve"), None);
    let events = collect(rx).await;
    match events.last() {
        Some(StreamEvent::Error { content, .. }) => {
            assert!(content.contains("No pending interrupt"));
        }
        other => panic!("expected error event, got {other:?}"),
    }
}

// A non-retrieval tool result becomes the context for answer synthesis.
#[tokio::test]
async fn action_tool_result_routes_to_answer() {
    let (tool, _) = RecordingTool::new("get_leave_balance", "{\"annual\": 12}");
    let h = harness(
        vec![
            Scripted::call("get_leave_balance", "call_1", json!({})),
            Scripted::text("You have 12 annual leave days left."),
        ],
        vec![tool],
        GraphConfig::default(),
    )
    .await;

    let (_, rx) = h.graph.spawn_turn(turn("how many days do I have?"));
    let events = collect(rx).await;
    assert_eq!(
        done_content(&events),
        Some("You have 12 annual leave days left.")
    );
}

// Checkpoints accumulate across a turn and clear_thread removes them all.
#[tokio::test]
async fn checkpoints_written_per_transition_and_clearable() {
    let h = harness(
        vec![Scripted::text("short answer")],
        vec![],
        GraphConfig::default(),
    )
    .await;

    let (thread_id, rx) = h.graph.spawn_turn(turn("hi"));
    collect(rx).await;

    assert!(h.checkpoints.count(&thread_id).await >= 2);
    let latest = h.checkpoints.latest(&thread_id).await.unwrap().unwrap();
    assert_eq!(latest.node, NodeKind::End);

    h.checkpoints.clear_thread(&thread_id).await.unwrap();
    assert!(h.checkpoints.latest(&thread_id).await.unwrap().is_none());
}
