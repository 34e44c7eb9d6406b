//! # Example: Run a macro file
//!
//! ```text
//! cargo run --example run_macro -- path/to/homeall.g
//! RUST_LOG=codevisor=debug cargo run --example run_macro -- config.g
//! ```
//!
//! Every code is "executed" by printing it; `M112` fails so the output bus
//! has something to show.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use codevisor::{
    Code, CodeChannel, CodeError, Config, ExecutorFn, ExecutorRef, MacroFile, MacroRuntime,
    Message, OutputBus,
};
use tracing_subscriber::EnvFilter;

/// Executor that pretends every code takes a few milliseconds.
fn printing_executor() -> ExecutorRef {
    ExecutorFn::arc(|code: Arc<Code>| {
        println!("[exec] {code}");
        async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(20)) => {}
                _ = code.cancellation.cancelled() => return Err(CodeError::Canceled),
            }
            if code.to_short_string() == "M112" {
                return Err(CodeError::fail("EmergencyStop", "emergency stop requested"));
            }
            Ok::<_, CodeError>(Message::success(""))
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let path: PathBuf = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: run_macro <file>")?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("path has no file name")?;

    let cfg = Config {
        buffered_macro_codes: 4,
        ..Config::default()
    };
    let bus = OutputBus::new(cfg.output_capacity_clamped());
    let mut output = bus.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(msg) = output.recv().await {
            println!("[output] {msg}");
        }
    });

    let runtime = MacroRuntime::builder(cfg, printing_executor())
        .with_output(Arc::new(bus))
        .build();

    let mf = MacroFile::new(&runtime, name, &path, CodeChannel::File, false, 0);
    if !mf.file_opened() && !mf.is_executing() {
        anyhow::bail!("could not open {}", path.display());
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::select! {
        outcome = mf.wait_for_finish() => println!("[done] {outcome:?}"),
        _ = ctrl_c => {
            mf.abort_async().await;
            println!("[done] {:?} (aborted)", mf.wait_for_finish().await);
        }
    }

    drop(mf);
    drop(runtime);
    printer.abort();
    Ok(())
}
