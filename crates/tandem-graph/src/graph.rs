use std::sync::Arc;

use anyhow::{bail, Result};
use tandem_llm::{ChatClient, Message};
use tandem_persist::CheckpointStore;
use tandem_tools::ToolRegistry;
use tandem_types::{
    ActorContext, GraphConfig, InterruptKind, NodeKind, ResumeDecision, StreamEvent,
};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::node::{EventSender, Node, Transition};
use crate::nodes::{
    AnswerNode, DecideNode, DocReviewNode, GradeNode, HumanGateNode, RewriteNode, ToolExecNode,
};
use crate::state::TurnState;

/// One conversation turn as submitted by the caller.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub message: String,
    pub thread_id: Option<String>,
    pub actor: Option<ActorContext>,
}

/// The conversation state machine and its streaming orchestrator.
///
/// Turns and resumes run as spawned tasks; each returns a receiver that
/// yields token events followed by exactly one terminal event (`done`,
/// `interrupt` or `error`). Turns on different threads are independent and
/// share nothing but the checkpoint store.
pub struct Graph {
    llm: Arc<dyn ChatClient>,
    registry: Arc<ToolRegistry>,
    checkpoints: Arc<dyn CheckpointStore>,
    config: GraphConfig,
}

impl Graph {
    pub fn new(
        llm: Arc<dyn ChatClient>,
        registry: Arc<ToolRegistry>,
        checkpoints: Arc<dyn CheckpointStore>,
        config: GraphConfig,
    ) -> Self {
        Self {
            llm,
            registry,
            checkpoints,
            config,
        }
    }

    /// Starts a turn in the background. Returns the thread id (generated
    /// when the request carried none) and the event receiver.
    pub fn spawn_turn(&self, request: TurnRequest) -> (String, mpsc::Receiver<StreamEvent>) {
        let thread_id = request
            .thread_id
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let (tx, rx) = mpsc::channel(1000);
        let runner = self.runner(thread_id.clone());
        let message = request.message;
        let actor = request.actor;

        tokio::spawn(async move {
            if let Err(e) = runner.run_turn(message, actor, tx.clone()).await {
                let _ = tx.send(runner.error_event(&e)).await;
            }
        });

        (thread_id, rx)
    }

    /// Re-enters a suspended thread with a human decision.
    pub fn spawn_resume(
        &self,
        thread_id: String,
        decision: ResumeDecision,
        actor: Option<ActorContext>,
    ) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(1000);
        let runner = self.runner(thread_id);

        tokio::spawn(async move {
            if let Err(e) = runner.run_resume(decision, actor, tx.clone()).await {
                let _ = tx.send(runner.error_event(&e)).await;
            }
        });

        rx
    }

    fn runner(&self, thread_id: String) -> TurnRunner {
        TurnRunner {
            thread_id,
            llm: Arc::clone(&self.llm),
            registry: Arc::clone(&self.registry),
            checkpoints: Arc::clone(&self.checkpoints),
            config: self.config.clone(),
        }
    }
}

struct TurnRunner {
    thread_id: String,
    llm: Arc<dyn ChatClient>,
    registry: Arc<ToolRegistry>,
    checkpoints: Arc<dyn CheckpointStore>,
    config: GraphConfig,
}

impl TurnRunner {
    async fn run_turn(
        &self,
        message: String,
        actor: Option<ActorContext>,
        tx: EventSender,
    ) -> Result<()> {
        let mut state = match self.checkpoints.latest(&self.thread_id).await? {
            Some(checkpoint) => TurnState::from_checkpoint(checkpoint),
            None => TurnState::new(&self.thread_id),
        };

        // A new message on a suspended thread abandons the pending gate.
        if state.pending_interrupt.take().is_some() {
            tracing::warn!(
                thread_id = %self.thread_id,
                "new turn on suspended thread, dropping pending interrupt"
            );
        }

        state.push_message(Message::human(message));
        state.node = NodeKind::Decide;
        self.checkpoints.save(state.to_checkpoint()).await?;
        state.seq += 1;

        self.drive(state, actor, tx).await
    }

    async fn run_resume(
        &self,
        decision: ResumeDecision,
        actor: Option<ActorContext>,
        tx: EventSender,
    ) -> Result<()> {
        let Some(checkpoint) = self.checkpoints.latest(&self.thread_id).await? else {
            bail!("No conversation found for thread_id '{}'", self.thread_id);
        };
        let mut state = TurnState::from_checkpoint(checkpoint);

        let Some(interrupt) = state.pending_interrupt.take() else {
            bail!(
                "No pending interrupt for thread_id '{}'. Nothing to resume.",
                self.thread_id
            );
        };

        tracing::info!(
            thread_id = %self.thread_id,
            action = %decision.action,
            "resuming suspended thread"
        );
        state.node = match interrupt.kind {
            InterruptKind::ToolApproval => HumanGateNode::resolve(&mut state, &decision),
            InterruptKind::DocumentReview => {
                DocReviewNode::resolve(&mut state, &decision, &self.config.retrieval_tool)
            }
        };
        self.checkpoints.save(state.to_checkpoint()).await?;
        state.seq += 1;

        self.drive(state, actor, tx).await
    }

    /// Runs nodes until the turn finishes or suspends, checkpointing after
    /// every transition before acting on it.
    async fn drive(
        &self,
        mut state: TurnState,
        actor: Option<ActorContext>,
        tx: EventSender,
    ) -> Result<()> {
        for _ in 0..self.config.max_iterations {
            let transition = self.run_node(&mut state, actor.as_ref(), &tx).await?;

            match transition {
                Transition::To(next) => {
                    state.node = next;
                    self.checkpoints.save(state.to_checkpoint()).await?;
                    state.seq += 1;
                }
                Transition::Suspend(interrupt) => {
                    // Durability first: the interrupt reaches the caller only
                    // after the suspended state is persisted.
                    state.pending_interrupt = Some(interrupt.clone());
                    self.checkpoints.save(state.to_checkpoint()).await?;
                    tx.send(StreamEvent::Interrupt {
                        interrupt_data: interrupt,
                        thread_id: self.thread_id.clone(),
                    })
                    .await?;
                    return Ok(());
                }
                Transition::Finish => {
                    state.node = NodeKind::End;
                    self.checkpoints.save(state.to_checkpoint()).await?;
                    tx.send(StreamEvent::Done {
                        content: state.final_answer.clone(),
                        thread_id: self.thread_id.clone(),
                    })
                    .await?;
                    return Ok(());
                }
            }
        }

        bail!("Max iterations ({}) reached", self.config.max_iterations)
    }

    async fn run_node(
        &self,
        state: &mut TurnState,
        actor: Option<&ActorContext>,
        tx: &EventSender,
    ) -> Result<Transition> {
        tracing::debug!(thread_id = %self.thread_id, node = state.node.as_str(), "running node");
        match state.node {
            NodeKind::Decide => {
                DecideNode::new(
                    Arc::clone(&self.llm),
                    Arc::clone(&self.registry),
                    self.config.clone(),
                )
                .run(state, tx.clone())
                .await
            }
            NodeKind::HumanGate => {
                HumanGateNode::new(self.config.clone())
                    .run(state, tx.clone())
                    .await
            }
            NodeKind::ToolExec => {
                ToolExecNode::new(
                    Arc::clone(&self.registry),
                    self.config.clone(),
                    actor.cloned(),
                )
                .run(state, tx.clone())
                .await
            }
            NodeKind::DocReview => DocReviewNode.run(state, tx.clone()).await,
            NodeKind::Grade => {
                GradeNode::new(Arc::clone(&self.llm), self.config.clone())
                    .run(state, tx.clone())
                    .await
            }
            NodeKind::Rewrite => {
                RewriteNode::new(Arc::clone(&self.llm), self.config.clone())
                    .run(state, tx.clone())
                    .await
            }
            NodeKind::Answer => {
                AnswerNode::new(Arc::clone(&self.llm), self.config.clone())
                    .run(state, tx.clone())
                    .await
            }
            NodeKind::End => Ok(Transition::Finish),
        }
    }

    /// Converts a turn failure into the terminal error event, attaching
    /// recovery guidance for corrupted-checkpoint failures.
    fn error_event(&self, error: &anyhow::Error) -> StreamEvent {
        let text = format!("{error:#}");
        let content = if text.contains("tool_calls") && text.contains("tool_call_id") {
            format!(
                "Checkpoint contains incomplete tool call sequence. This usually happens when \
                 a conversation was interrupted.\n\nSOLUTION: Use a new thread_id (leave empty \
                 or generate a new UUID) or clear the checkpoint for thread_id: {}\n\n\
                 Original error: {text}",
                self.thread_id
            )
        } else {
            text
        };
        tracing::error!(thread_id = %self.thread_id, error = %content, "turn failed");
        StreamEvent::Error {
            content,
            thread_id: self.thread_id.clone(),
        }
    }
}
