//! Benchmark to measure the cost of rendering a conversation into each
//! provider's wire format.
//!
//! Every query round re-renders the full history, so this demonstrates that
//! rendering overhead is negligible compared to the provider round trip.
//!
//! Run with: cargo bench --bench wire_format_bench

use macrochat::conversation::{ContentBlock, Message, MessageContent, Role};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Instant;

fn sample_conversation(rounds: usize) -> Vec<Message> {
    let mut messages = Vec::with_capacity(rounds * 4);
    for i in 0..rounds {
        messages.push(Message::text(
            Role::User,
            format!("Question {} about a data series the model has to look up", i),
        ));
        messages.push(Message::blocks(
            Role::Assistant,
            vec![
                ContentBlock::text(format!("Let me look that up ({}).", i)),
                ContentBlock::tool_use(
                    format!("call_{}", i),
                    "fetch_series",
                    json!({"series_id": format!("SERIES{}", i), "limit": 12}),
                ),
            ],
        ));
        messages.push(Message::blocks(
            Role::User,
            vec![ContentBlock::ToolResult {
                tool_use_id: format!("call_{}", i),
                content: json!(format!("12 observations for SERIES{}", i)),
                is_error: false,
                error_message: None,
            }],
        ));
        messages.push(Message::text(
            Role::Assistant,
            format!("Answer {} with a couple of sentences of explanation so the payload has realistic prose in it", i),
        ));
    }
    messages
}

// Simplified copies of what the adapters do per request.

fn render_anthropic(messages: &[Message]) -> Value {
    let wire: Vec<Value> = messages
        .iter()
        .map(|message| {
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            let content = match &message.content {
                MessageContent::Text(text) => json!(text),
                MessageContent::Blocks(blocks) => {
                    Value::Array(blocks.iter().map(anthropic_block).collect())
                }
            };
            json!({"role": role, "content": content})
        })
        .collect();
    json!({"model": "bench", "max_tokens": 1024, "messages": wire})
}

fn anthropic_block(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text { text } => json!({"type": "text", "text": text}),
        ContentBlock::ToolUse {
            id,
            name,
            arguments,
        } => json!({"type": "tool_use", "id": id, "name": name, "input": arguments}),
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
            ..
        } => json!({
            "type": "tool_result",
            "tool_use_id": tool_use_id,
            "content": content.as_str().map(str::to_string).unwrap_or_else(|| content.to_string()),
            "is_error": is_error,
        }),
    }
}

fn render_openai(messages: &[Message]) -> Vec<Value> {
    let mut wire = Vec::with_capacity(messages.len());
    for message in messages {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        match &message.content {
            MessageContent::Text(text) => wire.push(json!({"role": role, "content": text})),
            MessageContent::Blocks(blocks) => {
                let mut texts = Vec::new();
                let mut tool_calls = Vec::new();
                for block in blocks {
                    match block {
                        ContentBlock::Text { text } => texts.push(text.as_str()),
                        ContentBlock::ToolUse {
                            id,
                            name,
                            arguments,
                        } => tool_calls.push(json!({
                            "id": id,
                            "type": "function",
                            "function": {"name": name, "arguments": arguments.to_string()},
                        })),
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                            ..
                        } => wire.push(json!({
                            "role": "tool",
                            "tool_call_id": tool_use_id,
                            "content": content.as_str().map(str::to_string).unwrap_or_else(|| content.to_string()),
                        })),
                    }
                }
                if !texts.is_empty() || !tool_calls.is_empty() {
                    let mut entry = json!({"role": role, "content": texts.join("\n")});
                    if !tool_calls.is_empty() {
                        entry["tool_calls"] = Value::Array(tool_calls);
                    }
                    wire.push(entry);
                }
            }
        }
    }
    wire
}

fn render_gemini(messages: &[Message]) -> Value {
    // Gemini keys function responses by name, so the renderer carries an
    // id-to-name map across the history.
    let mut call_names: HashMap<&str, &str> = HashMap::new();
    for message in messages {
        if let MessageContent::Blocks(blocks) = &message.content {
            for block in blocks {
                if let ContentBlock::ToolUse { id, name, .. } = block {
                    call_names.insert(id, name);
                }
            }
        }
    }

    let contents: Vec<Value> = messages
        .iter()
        .map(|message| {
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            let parts: Vec<Value> = match &message.content {
                MessageContent::Text(text) => vec![json!({"text": text})],
                MessageContent::Blocks(blocks) => blocks
                    .iter()
                    .map(|block| match block {
                        ContentBlock::Text { text } => json!({"text": text}),
                        ContentBlock::ToolUse {
                            name, arguments, ..
                        } => json!({"functionCall": {"name": name, "args": arguments}}),
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                            ..
                        } => {
                            let name = call_names.get(tool_use_id.as_str()).copied().unwrap_or("unknown");
                            json!({"functionResponse": {"name": name, "response": {"content": content}}})
                        }
                    })
                    .collect(),
            };
            json!({"role": role, "parts": parts})
        })
        .collect();
    json!({"contents": contents})
}

fn main() {
    let conversation = sample_conversation(10);
    println!("Wire Format Rendering Benchmark");
    println!("===============================\n");
    println!("Conversation size: {} messages", conversation.len());

    let iterations = 10_000;

    let start = Instant::now();
    for _ in 0..iterations {
        let _body = render_anthropic(&conversation);
    }
    let anthropic = start.elapsed();

    let start = Instant::now();
    for _ in 0..iterations {
        let _wire = render_openai(&conversation);
    }
    let openai = start.elapsed();

    let start = Instant::now();
    for _ in 0..iterations {
        let _body = render_gemini(&conversation);
    }
    let gemini = start.elapsed();

    let per_round = |total: std::time::Duration| total.as_micros() as f64 / iterations as f64;

    println!("\nAnthropic-style blocks:");
    println!("  {} iterations, total {:?}", iterations, anthropic);
    println!("  Per round: {:.2}µs", per_round(anthropic));

    println!("\nOpenAI-style tool-call fan-out:");
    println!("  {} iterations, total {:?}", iterations, openai);
    println!("  Per round: {:.2}µs", per_round(openai));

    println!("\nGemini-style parts with call map:");
    println!("  {} iterations, total {:?}", iterations, gemini);
    println!("  Per round: {:.2}µs", per_round(gemini));

    // A provider round trip costs hundreds of milliseconds; even the
    // slowest renderer above is four orders of magnitude below that.
    let slowest = per_round(anthropic).max(per_round(openai)).max(per_round(gemini));
    println!(
        "\nWorst renderer: {:.2}µs per round ({:.4}% of a 500ms provider call)",
        slowest,
        slowest / 5_000.0
    );
}
