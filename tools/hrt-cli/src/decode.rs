//! Offline trace decoding.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use hrt_trace::records::{self, alarm, timer};
use hrt_trace::{Frame, FrameDecoder};
use serde_json::json;

/// Typed payload fields of `frame`, after the timer handle.
fn fields(frame: &Frame) -> Vec<(&'static str, u64)> {
    let mut fields: Vec<(&'static str, u64)> = Vec::new();
    let mut push = |name: &'static str, value: Option<u64>| {
        if let Some(value) = value {
            fields.push((name, value));
        }
    };

    match frame.record_type {
        timer::CREATE => push("dispatch", frame.payload.get(8).map(|b| u64::from(*b))),
        timer::ARM => {
            push("deadline", frame.u64_at(8));
            push("period", frame.u64_at(16));
        }
        timer::DISARM | timer::FIRE => push("deadline", frame.u64_at(8)),
        timer::SKIP => push("skipped", frame.u32_at(8).map(u64::from)),
        alarm::SET => push("alarm", frame.u64_at(0)),
        _ => {}
    }
    fields
}

fn colored_name(frame: &Frame) -> ColoredString {
    let name = records::name(frame.record_type);
    match frame.record_type {
        timer::FIRE => name.bright_green(),
        timer::SKIP => name.bright_red(),
        timer::CREATE | timer::DELETE => name.bright_cyan(),
        alarm::SET | alarm::DISABLE => name.bright_yellow(),
        kind if records::is_timer(kind) => name.bright_blue(),
        _ => name.normal(),
    }
}

fn print_text(frame: &Frame) {
    let timestamp = frame
        .timestamp_us
        .map(|ts| format!("{ts:>10} "))
        .unwrap_or_default();
    let handle = frame
        .timer_handle()
        .map(|(index, generation)| format!("timer#{index}.{generation} "))
        .unwrap_or_default();
    let fields: Vec<String> = fields(frame)
        .into_iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect();

    println!(
        "{timestamp}{:>3} {:22} {handle}{}",
        frame.seq,
        colored_name(frame),
        fields.join(" ")
    );
}

fn to_json(frame: &Frame) -> serde_json::Value {
    let mut value = json!({
        "seq": frame.seq,
        "type": records::name(frame.record_type),
        "timestamp_us": frame.timestamp_us,
    });
    if let Some((index, generation)) = frame.timer_handle() {
        value["timer"] = json!({ "index": index, "generation": generation });
    }
    for (name, field) in fields(frame) {
        value[name] = json!(field);
    }
    value
}

/// Prints every frame in the file at `path`. Corrupt frames are reported
/// and skipped.
pub fn run(path: &Path, timestamps: bool, json: bool) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mut frames = Vec::new();
    let mut corrupt = 0usize;

    for result in FrameDecoder::new(timestamps).push_bytes(&bytes) {
        match result {
            Ok(frame) => frames.push(frame),
            Err(err) => {
                corrupt += 1;
                log::warn!("skipping frame: {err}");
            }
        }
    }

    if json {
        let values: Vec<_> = frames.iter().map(to_json).collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
    } else {
        for frame in &frames {
            print_text(frame);
        }
        println!("{} record(s), {corrupt} corrupt frame(s)", frames.len());
    }
    Ok(())
}
