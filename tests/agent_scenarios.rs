//! End-to-end agent runs against a scripted model.

mod common;

use std::sync::{Arc, Mutex};

use futures::StreamExt;
use pretty_assertions::assert_eq;
use tinyagents::agent::{Agent, RunOptions, FALLBACK_ANSWER};
use tinyagents::error::AgentError;
use tinyagents::llm::ScriptedModel;
use tinyagents::middleware::ToolCallLimiter;
use tinyagents::tools::{Tool, ToolParameters};
use tinyagents::types::{LlmChunk, Message};

use common::{final_answer_chunks, greet_call_chunks, greet_tool, RecordingMiddleware};

fn scripted_agent(model: &Arc<ScriptedModel>) -> Agent {
    Agent::new(model.clone())
        .with_name("tester")
        .with_plan_interval(0)
}

#[tokio::test]
async fn tool_call_then_text_answer() {
    let model = Arc::new(ScriptedModel::new("scripted:test"));
    model.push_stream_turn(greet_call_chunks("t1", "Alice"));
    model.push_stream_turn(vec![LlmChunk::text("Hello, Alice!"), LlmChunk::End]);

    let (greet, calls) = greet_tool();
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut agent = scripted_agent(&model)
        .with_tool(greet)
        .with_middleware(Arc::new(RecordingMiddleware::new("m", events.clone())));

    let answer = agent.run("Say hello to Alice").await.unwrap();

    assert_eq!(answer, "Hello, Alice!");
    assert_eq!(*calls.lock().unwrap(), 1);

    let recorded = events.lock().unwrap().clone();
    let order: Vec<_> = recorded
        .iter()
        .filter(|e| {
            e.contains("before_llm_call")
                || e.contains("tool_call:greet")
                || e.starts_with("m:on_answer")
        })
        .cloned()
        .collect();
    assert_eq!(
        order,
        vec![
            "m:before_llm_call",
            "m:before_tool_call:greet",
            "m:after_tool_call:greet:Hello, Alice!",
            "m:before_llm_call",
            "m:on_answer_chunk:0:Hello, Alice!",
            "m:on_answer:Hello, Alice!",
        ]
    );

    // The transcript records the call with its result.
    let transcript: Vec<_> = agent
        .memory()
        .copy_chat_messages()
        .iter()
        .map(Message::transcript_line)
        .collect();
    assert!(transcript
        .contains(&"Tool - greet({\"name\":\"Alice\"}): Hello, Alice!".to_string()));
}

#[tokio::test]
async fn final_answer_tool_terminates_run() {
    let model = Arc::new(ScriptedModel::new("scripted:test"));
    model.push_stream_turn(final_answer_chunks("t1", "4"));

    let events = Arc::new(Mutex::new(Vec::new()));
    let mut agent = scripted_agent(&model)
        .with_middleware(Arc::new(RecordingMiddleware::new("m", events.clone())));

    let answer = agent.run("2+2?").await.unwrap();

    assert_eq!(answer, "4");
    assert_eq!(model.stream_calls(), 1);

    let recorded = events.lock().unwrap().clone();
    let answers: Vec<_> = recorded
        .iter()
        .filter(|e| e.starts_with("m:on_answer:"))
        .collect();
    assert_eq!(answers, vec!["m:on_answer:4"]);
}

#[tokio::test]
async fn iteration_exhaustion_falls_back() {
    let model = Arc::new(ScriptedModel::new("scripted:test"));
    model.push_stream_turn(greet_call_chunks("t1", "Alice"));
    model.push_stream_turn(vec![
        LlmChunk::text("Based on context, I cannot complete."),
        LlmChunk::End,
    ]);

    let (greet, _) = greet_tool();
    let mut agent = scripted_agent(&model).with_tool(greet).with_max_iterations(1);

    let answer = agent.run("loop forever").await.unwrap();

    assert_eq!(answer, "Based on context, I cannot complete.");
    assert_eq!(model.stream_calls(), 2);
}

#[tokio::test]
async fn blocked_tool_call_records_synthetic_result_and_continues() {
    let model = Arc::new(ScriptedModel::new("scripted:test"));
    // Two greet calls in one iteration, at indices 0 and 1.
    model.push_stream_turn(vec![
        LlmChunk::fragment(0, Some("t1"), Some("greet"), Some("{\"name\":\"Alice\"}")),
        LlmChunk::fragment(1, Some("t2"), Some("greet"), Some("{\"name\":\"Bob\"}")),
        LlmChunk::End,
    ]);
    model.push_stream_turn(vec![LlmChunk::text("done"), LlmChunk::End]);

    let (greet, calls) = greet_tool();
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut agent = scripted_agent(&model)
        .with_tool(greet)
        .with_middleware(Arc::new(ToolCallLimiter::hard(1)))
        .with_middleware(Arc::new(RecordingMiddleware::new("m", events.clone())));

    let answer = agent.run("greet twice").await.unwrap();

    assert_eq!(answer, "done");
    // The first call executed; the second was blocked before execution.
    assert_eq!(*calls.lock().unwrap(), 1);

    let recorded = events.lock().unwrap().clone();
    let after_tool: Vec<_> = recorded
        .iter()
        .filter(|e| e.starts_with("m:after_tool_call"))
        .collect();
    assert_eq!(after_tool.len(), 1);

    let transcript: Vec<_> = agent
        .memory()
        .copy_chat_messages()
        .iter()
        .map(Message::transcript_line)
        .collect();
    assert!(transcript.iter().any(|line| line.contains("blocked")));
}

#[tokio::test]
async fn plan_phase_runs_on_the_configured_interval() {
    let model = Arc::new(ScriptedModel::new("scripted:test"));
    for _ in 0..5 {
        model.push_stream_turn(greet_call_chunks("t1", "Alice"));
    }
    model.push_stream_turn(vec![LlmChunk::text("gave up"), LlmChunk::End]);
    model.set_default_structured(serde_json::json!({
        "planned_steps": ["greet Alice"],
        "reasoning": "the task asks for a greeting",
    }));

    let (greet, _) = greet_tool();
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut agent = Agent::new(model.clone())
        .with_tool(greet)
        .with_plan_interval(2)
        .with_max_iterations(5)
        .with_middleware(Arc::new(RecordingMiddleware::new("m", events.clone())));

    let answer = agent.run("greet Alice").await.unwrap();

    assert_eq!(answer, "gave up");
    // Plan phase on iterations 1, 3, and 5.
    assert_eq!(model.structured_calls(), 3);

    let recorded = events.lock().unwrap().clone();
    let plans = recorded.iter().filter(|e| e.starts_with("m:on_plan")).count();
    let reasonings = recorded
        .iter()
        .filter(|e| e.starts_with("m:on_reasoning"))
        .count();
    assert_eq!(plans, 3);
    assert_eq!(reasonings, 3);
}

#[tokio::test]
async fn zero_iteration_budget_goes_straight_to_fallback() {
    let model = Arc::new(ScriptedModel::new("scripted:test"));
    model.push_stream_turn(vec![LlmChunk::text("fallback answer"), LlmChunk::End]);

    let mut agent = scripted_agent(&model).with_max_iterations(0);

    let answer = agent.run("anything").await.unwrap();

    assert_eq!(answer, "fallback answer");
    assert_eq!(model.stream_calls(), 1);
}

#[tokio::test]
async fn silent_fallback_commits_the_canned_sentence() {
    let model = Arc::new(ScriptedModel::new("scripted:test"));
    // No scripted turns at all: every stream is empty.
    let mut agent = scripted_agent(&model).with_max_iterations(0);

    let answer = agent.run("anything").await.unwrap();

    assert_eq!(answer, FALLBACK_ANSWER);
}

#[tokio::test]
async fn empty_completion_answers_with_empty_string() {
    let model = Arc::new(ScriptedModel::new("scripted:test"));
    model.push_stream_turn(vec![LlmChunk::End]);

    let events = Arc::new(Mutex::new(Vec::new()));
    let mut agent = scripted_agent(&model)
        .with_middleware(Arc::new(RecordingMiddleware::new("m", events.clone())));

    let answer = agent.run("anything").await.unwrap();

    assert_eq!(answer, "");
    assert!(events.lock().unwrap().contains(&"m:on_answer:".to_string()));
    // Memory records the empty chat reply.
    assert!(agent
        .memory()
        .copy_chat_messages()
        .contains(&Message::chat("")));
}

#[tokio::test]
async fn unknown_tool_is_skipped_without_memory_write() {
    let model = Arc::new(ScriptedModel::new("scripted:test"));
    model.push_stream_turn(vec![
        LlmChunk::fragment(0, Some("t1"), Some("missing"), Some("{}")),
        LlmChunk::End,
    ]);
    model.push_stream_turn(vec![LlmChunk::text("ok"), LlmChunk::End]);

    let mut agent = scripted_agent(&model);

    let answer = agent.run("call something odd").await.unwrap();

    assert_eq!(answer, "ok");
    let tool_calls = agent
        .memory()
        .copy_chat_messages()
        .iter()
        .filter(|m| matches!(m, Message::ToolCall { .. }))
        .count();
    assert_eq!(tool_calls, 0);
}

#[tokio::test]
async fn tool_failure_propagates_and_fires_on_error_once() {
    let model = Arc::new(ScriptedModel::new("scripted:test"));
    model.push_stream_turn(vec![
        LlmChunk::fragment(0, Some("t1"), Some("explode"), Some("{}")),
        LlmChunk::End,
    ]);

    let explode = Tool::sync("explode", "always fails", ToolParameters::empty(), |_| {
        Err(AgentError::tool_execution("explode", "boom"))
    });
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut agent = scripted_agent(&model)
        .with_tool(Arc::new(explode))
        .with_middleware(Arc::new(RecordingMiddleware::new("m", events.clone())));

    let err = agent.run("go").await.unwrap_err();

    assert!(matches!(err, AgentError::ToolExecution { .. }));
    let recorded = events.lock().unwrap().clone();
    let errors = recorded.iter().filter(|e| e.starts_with("m:on_error")).count();
    let answers = recorded.iter().filter(|e| e.starts_with("m:on_answer:")).count();
    assert_eq!(errors, 1);
    assert_eq!(answers, 0);
}

#[tokio::test]
async fn run_stream_yields_text_chunks_in_order() {
    let model = Arc::new(ScriptedModel::new("scripted:test"));
    model.push_stream_turn(vec![
        LlmChunk::text("Hello, "),
        LlmChunk::text("Alice!"),
        LlmChunk::End,
    ]);

    let mut agent = scripted_agent(&model);
    let chunks: Vec<_> = agent
        .run_stream("hi", RunOptions::default())
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(chunks, vec!["Hello, ".to_string(), "Alice!".to_string()]);
}

#[tokio::test]
async fn run_stream_emits_tool_answer_as_single_chunk() {
    let model = Arc::new(ScriptedModel::new("scripted:test"));
    model.push_stream_turn(final_answer_chunks("t1", "4"));

    let mut agent = scripted_agent(&model);
    let chunks: Vec<_> = agent
        .run_stream("2+2?", RunOptions::default())
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(chunks, vec!["4".to_string()]);
}

#[tokio::test]
async fn run_options_control_reset_and_seeded_history() {
    let model = Arc::new(ScriptedModel::new("scripted:test"));
    model.push_stream_turn(vec![LlmChunk::text("first"), LlmChunk::End]);
    model.push_stream_turn(vec![LlmChunk::text("second"), LlmChunk::End]);

    let mut agent = scripted_agent(&model);
    agent.run("one").await.unwrap();

    let options = RunOptions::builder()
        .reset(false)
        .history(vec![Message::system("carry this forward")])
        .build();
    agent.run_with("two", options).await.unwrap();

    let transcript: Vec<_> = agent
        .memory()
        .copy_chat_messages()
        .iter()
        .map(Message::transcript_line)
        .collect();
    assert!(transcript.contains(&"Human: one".to_string()));
    assert!(transcript.contains(&"System: carry this forward".to_string()));
    assert!(transcript.contains(&"Human: two".to_string()));
}

#[tokio::test]
async fn text_alongside_tool_calls_is_not_the_answer() {
    let model = Arc::new(ScriptedModel::new("scripted:test"));
    model.push_stream_turn(vec![
        LlmChunk::text("thinking out loud"),
        LlmChunk::fragment(0, Some("t1"), Some("greet"), Some("{\"name\":\"Alice\"}")),
        LlmChunk::End,
    ]);
    model.push_stream_turn(vec![LlmChunk::text("the real answer"), LlmChunk::End]);

    let (greet, _) = greet_tool();
    let mut agent = scripted_agent(&model).with_tool(greet);

    let answer = agent.run("greet").await.unwrap();

    assert_eq!(answer, "the real answer");
    assert_eq!(model.stream_calls(), 2);
}
