//! Example agent configurations.
//!
//! Each factory wires a model handle into a fixed configuration:
//!
//! - `simple_agent`: single agent, no tools
//! - `tool_agent`: company lookup and arithmetic tools
//! - `team_agent`: coordinator delegating to three specialists
//! - `chain_agent`: coordinator driving `expert1` -> `expert2` -> `expert3`
//! - `streaming_agent` / `streaming_tool_agent`: chunked content delivery
//! - `memory_agent`: note store shared across runs
//! - `approval_agent`: side-effecting tool gated behind approval

pub mod tools;

use std::sync::Arc;

use anyhow::Result;

use crate::cli::ExampleKind;
use crate::framework::{AgentConfig, Memory, Model, Trace};

pub const CHAIN_EXPERTS: [&str; 3] = ["expert1", "expert2", "expert3"];
pub const TEAM_SPECIALISTS: [&str; 3] = ["researcher", "analyst", "writer"];

pub const SIMPLE_INSTRUCTIONS: &str = "You are a helpful assistant. Answer the user's question \
     directly and concisely. Do not add unrelated information.";

pub fn simple_agent(model: Arc<dyn Model>) -> Result<AgentConfig> {
    AgentConfig::builder("assistant")
        .description("General purpose assistant")
        .instructions(SIMPLE_INSTRUCTIONS)
        .model(model)
        .build()
}

pub fn tool_agent(model: Arc<dyn Model>) -> Result<AgentConfig> {
    AgentConfig::builder("company_assistant")
        .description("Answers questions about companies using the company directory")
        .instructions(
            "You are a company research assistant. Always call lookup_company_name to resolve \
             a company id before answering, and include the exact company name returned by \
             the tool in your answer. Use add_numbers for any arithmetic.",
        )
        .model(model)
        .tool(tools::lookup_company_tool())
        .tool(tools::add_numbers_tool())
        .build()
}

fn specialist(model: Arc<dyn Model>, name: &str, focus: &str) -> Result<AgentConfig> {
    AgentConfig::builder(name)
        .description(format!("Specialist responsible for {focus}"))
        .instructions(format!(
            "You are the {name}. Focus only on {focus}. Reply with a short paragraph that \
             starts with '{name}:'."
        ))
        .model(model)
        .build()
}

pub fn team_agent(model: Arc<dyn Model>) -> Result<AgentConfig> {
    let mut builder = AgentConfig::builder("coordinator")
        .description("Coordinates a team of specialists")
        .instructions(format!(
            "You lead a team of specialists: {}. Delegate one focused task to each of them, \
             then combine their replies into a single answer that credits each specialist \
             by name.",
            TEAM_SPECIALISTS.join(", ")
        ))
        .model(model.clone());

    let focus = [
        "gathering relevant facts",
        "analysing trade-offs and risks",
        "writing the final summary",
    ];
    for (name, focus) in TEAM_SPECIALISTS.iter().zip(focus) {
        builder = builder.sub_agent(specialist(model.clone(), name, focus)?);
    }
    builder.build()
}

pub fn expert_agent(model: Arc<dyn Model>, name: &str) -> Result<AgentConfig> {
    AgentConfig::builder(name)
        .description(format!("Chain step '{name}'"))
        .instructions(format!(
            "You are {name}. Repeat the text you are given unchanged and append the word \
             '{name}' at the end. Output nothing else."
        ))
        .model(model)
        .build()
}

pub fn chain_agent(model: Arc<dyn Model>) -> Result<AgentConfig> {
    let mut builder = AgentConfig::builder("chain_coordinator")
        .description("Passes work through a fixed chain of experts")
        .instructions(format!(
            "You must call the experts strictly in this order: {}. Send the user's message \
             to {}, then send each expert's full reply to the next expert. Return the reply \
             of the last expert verbatim.",
            CHAIN_EXPERTS.join(" -> "),
            CHAIN_EXPERTS[0]
        ))
        .model(model.clone());

    for name in CHAIN_EXPERTS {
        builder = builder.sub_agent(expert_agent(model.clone(), name)?);
    }
    builder.build()
}

pub fn streaming_agent(model: Arc<dyn Model>) -> Result<AgentConfig> {
    AgentConfig::builder("streaming_assistant")
        .description("Assistant that streams its answer")
        .instructions(SIMPLE_INSTRUCTIONS)
        .model(model)
        .stream(true)
        .build()
}

pub fn streaming_tool_agent(model: Arc<dyn Model>) -> Result<AgentConfig> {
    AgentConfig::builder("streaming_company_assistant")
        .description("Streams answers that depend on the company directory")
        .instructions(
            "Call lookup_company_name for every company id mentioned by the user and answer \
             in one or two sentences that include the company name.",
        )
        .model(model)
        .tool(tools::lookup_company_tool())
        .stream(true)
        .build()
}

pub fn memory_agent(model: Arc<dyn Model>, memory: Memory) -> Result<AgentConfig> {
    AgentConfig::builder("memory_assistant")
        .description("Remembers facts between runs")
        .instructions(
            "When the user shares a personal fact, store it with save_memory using a short \
             key. When asked a question, answer from the saved memory.",
        )
        .model(model)
        .memory(memory)
        .build()
}

pub fn approval_agent(model: Arc<dyn Model>) -> Result<AgentConfig> {
    AgentConfig::builder("notifier")
        .description("Sends notifications after approval")
        .instructions(
            "Use send_notification to deliver the user's message. Report whether the \
             notification was sent or denied.",
        )
        .model(model)
        .tool(tools::send_notification_tool())
        .build()
}

/// Instruction variants scored by the built-in eval suite.
pub const EVAL_VARIANTS: [(&str, &str); 3] = [
    (
        "concise",
        "Answer the question in one short sentence. Do not add background information.",
    ),
    (
        "detailed",
        "Answer the question accurately, then add two or three sentences of relevant \
         context about the subject.",
    ),
    (
        "step_by_step",
        "Think through the question step by step, numbering each step, and finish with \
         a line that starts with 'Answer:'.",
    ),
];

/// Agent used by the eval suite; only the instructions vary.
pub fn eval_agent(
    model: Arc<dyn Model>,
    variant: &str,
    instructions: &str,
) -> Result<AgentConfig> {
    AgentConfig::builder(format!("eval_{variant}"))
        .description(format!("Prompt variant '{variant}'"))
        .instructions(instructions)
        .model(model)
        .enable_evaluation(true)
        .build()
}

pub fn build_example_agent(
    kind: ExampleKind,
    model: Arc<dyn Model>,
    memory: Option<Memory>,
    trace: Option<Trace>,
) -> Result<AgentConfig> {
    let mut agent = match kind {
        ExampleKind::Simple => simple_agent(model)?,
        ExampleKind::Tools => tool_agent(model)?,
        ExampleKind::Team => team_agent(model)?,
        ExampleKind::Chain => chain_agent(model)?,
        ExampleKind::Streaming => streaming_agent(model)?,
        ExampleKind::StreamingTools => streaming_tool_agent(model)?,
        ExampleKind::Memory => memory_agent(model, memory.unwrap_or_default())?,
        ExampleKind::Approval => approval_agent(model)?,
    };
    agent.trace = trace;
    Ok(agent)
}

pub fn default_example_prompt(kind: ExampleKind) -> &'static str {
    match kind {
        ExampleKind::Simple => "What is the capital of France?",
        ExampleKind::Tools => "What is the name of the company with id 150?",
        ExampleKind::Team => "Should a small team adopt Rust for a new CLI tool?",
        ExampleKind::Chain => "Start the chain with the word 'begin'.",
        ExampleKind::Streaming => "What is the capital of France? Answer in two sentences.",
        ExampleKind::StreamingTools => "Which company has id 150? Answer in two sentences.",
        ExampleKind::Memory => "Remember that my favourite colour is blue.",
        ExampleKind::Approval => "Notify ops@example.com that the nightly build passed.",
    }
}
