//! Prompt templates and fixed user-facing strings.

/// Answer emitted without a model call when no usable context was retrieved.
pub const NO_CONTEXT_FALLBACK: &str = "I don't have enough information in the provided documents \
     to answer this question. Please ensure relevant documents have been ingested.";

/// Injected as a user message when a human rejects a pending action.
pub const REJECTION_MESSAGE: &str =
    "Please don't perform that action. Suggest alternatives instead.";

/// Injected as a user message when a human rejects all retrieved documents.
pub const DOCUMENTS_REJECTED_MESSAGE: &str =
    "The retrieved documents are not relevant. Please reformulate the search.";

pub fn decide_system(current_question: &str) -> String {
    format!(
        "You are an HR assistant. Answer questions using the available tools when needed.\n\
         Use the document retrieval tool for questions about policies or ingested documents, \
         and the HR action tools for leave and attendance requests.\n\
         The user's current question is: {current_question}\n\
         Focus on this question; earlier messages are context only."
    )
}

pub fn grade(question: &str, context: &str) -> String {
    format!(
        "You are grading whether retrieved content is relevant to a question.\n\
         Question: {question}\n\
         Retrieved content:\n{context}\n\
         Does the retrieved content contain information relevant to the question? \
         Answer with exactly one word: yes or no."
    )
}

pub fn rewrite(question: &str) -> String {
    format!(
        "The following question did not retrieve relevant documents. Rephrase it to improve \
         retrieval, keeping the original intent. Reply with the rephrased question only.\n\
         Question: {question}"
    )
}

pub fn answer(question: &str, context: &str) -> String {
    format!(
        "Answer the question using only the context below. Be concise and direct. If the \
         context does not contain the answer, say so.\n\
         Question: {question}\n\
         Context:\n{context}"
    )
}
