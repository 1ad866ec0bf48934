//! Simulated assembly walkthrough
//!
//! Drives the runtime with an in-process AR session and prints every overlay
//! update to stdout. Pass a runtime config JSON path to override defaults.
//! Run with: RUST_LOG=info cargo run --example simulated_walkthrough

use furniture_xr::assembly::CatalogId;
use furniture_xr::ui::{Control, UiSurface};
use furniture_xr::vr::{Pose, SimulatedArProvider, XrFrame};
use furniture_xr::{ArRuntime, RuntimeConfig, SessionEvent};
use std::path::PathBuf;
use std::time::Duration;

struct ConsoleUi;

impl UiSurface for ConsoleUi {
    fn set_enabled(&mut self, control: &Control, enabled: bool) {
        println!("  [{control}] {}", if enabled { "enabled" } else { "disabled" });
    }

    fn set_label(&mut self, control: &Control, label: &str) {
        println!("  [{control}] label \"{label}\"");
    }

    fn set_instruction(&mut self, text: &str) {
        println!("  instruction: {text}");
    }

    fn set_notice(&mut self, text: Option<&str>) {
        if let Some(text) = text {
            println!("  notice: {text}");
        }
    }

    fn set_info(&mut self, text: &str) {
        println!("  info: {text}");
    }

    fn set_overlay_visible(&mut self, visible: bool) {
        println!("  overlay {}", if visible { "shown" } else { "hidden" });
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => RuntimeConfig::load(&path)?,
        None => RuntimeConfig::default(),
    };

    // the surface shows up a few frames into the session
    let mut script = vec![None; 3];
    script.push(Some(Pose::from_position([0.2, -1.1, -1.4])));
    let provider = SimulatedArProvider::new(script);

    let mut runtime = ArRuntime::new(config, Box::new(provider), Box::new(ConsoleUi))?;
    runtime.check_supported();

    println!("> enter AR");
    runtime.click(&Control::Session);

    let mut index = 0u64;
    let mut step = |runtime: &mut ArRuntime, frames: u64| {
        for _ in 0..frames {
            index += 1;
            runtime.frame(&XrFrame::new(index, Duration::from_millis(index * 16)));
        }
    };
    step(&mut runtime, 5);

    println!("> tap to place");
    runtime.handle_event(SessionEvent::Select);
    step(&mut runtime, 1);

    let stage_count = runtime
        .controller()
        .map(|controller| controller.catalog().stage_count())
        .unwrap_or_default();
    for _ in 1..stage_count {
        println!("> next");
        runtime.click(&Control::Next);
        step(&mut runtime, 1);
    }

    println!("> previous");
    runtime.click(&Control::Previous);
    step(&mut runtime, 1);

    println!("> switch to table");
    runtime.click(&Control::SwitchTo(CatalogId::new("table")));
    step(&mut runtime, 2);

    println!("> exit AR");
    runtime.click(&Control::Session);
    runtime.handle_event(SessionEvent::End);

    println!("rendered {} frames", runtime.frames_rendered());
    Ok(())
}
