//! modulate CLI - replay a script of effects through one strategy
//!
//!   modulate run --strategy '{"kind":"debounce","due_ms":300}' --script steps.txt
//!   modulate run -s '{"kind":"throttle","interval_ms":1000,"latest":true}' -e 0:a -e 200:b -e 400:c
//!   modulate strategies          → JSON examples of every strategy kind
//!
//! Script lines are `<at_ms> <value> [run_ms]`, or `<at_ms> cancel`. Each step
//! subscribes an effect at `at_ms` that yields `value` after `run_ms`, all
//! under one identity. Output is the values the pipeline owner received.

use anyhow::{anyhow, bail, Context, Result};
use effect_modulation::logging::init_logging;
use effect_modulation::{Effect, EffectId, Event, Strategy, StrategyDef, Subscription, TokioScheduler};
use serde_json::{json, Value};
use std::env;
use std::io::IsTerminal;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

fn main() {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("modulate {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = match opts.command.as_deref() {
        Some("run") => cmd_run(&opts),
        Some("strategies") => Ok(cmd_strategies()),
        Some(cmd) => Err(anyhow!("unknown command: {}", cmd)),
        None => {
            print_usage();
            return;
        }
    };

    let pretty = opts.pretty || std::io::stdout().is_terminal();
    match result {
        Ok(output) => println!("{}", render(&output, pretty)),
        Err(e) => {
            eprintln!("{}", render(&json!({"error": format!("{:#}", e)}), pretty));
            std::process::exit(1);
        }
    }
}

fn render(value: &Value, pretty: bool) -> String {
    let rendered = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    rendered.unwrap_or_else(|_| value.to_string())
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    strategy: Option<String>,
    script: Option<String>,
    effects: Vec<String>,
    wait_ms: Option<u64>,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        let mut opts = Self::default();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            let next = args.get(i + 1).cloned();
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--pretty" => opts.pretty = true,
                "--strategy" | "-s" if next.is_some() => {
                    opts.strategy = next;
                    i += 1;
                }
                "--script" | "-f" if next.is_some() => {
                    opts.script = next;
                    i += 1;
                }
                "--effect" | "-e" if next.is_some() => {
                    opts.effects.extend(next);
                    i += 1;
                }
                "--wait" | "-w" if next.is_some() => {
                    opts.wait_ms = next.and_then(|v| v.parse().ok());
                    i += 1;
                }
                _ if opts.command.is_none() && !arg.starts_with('-') => opts.command = Some(arg.clone()),
                _ => debug!(arg = %arg, "ignoring argument"),
            }
            i += 1;
        }

        opts
    }
}

fn print_usage() {
    println!(
        r#"modulate - replay keyed effects through a modulation strategy

USAGE:
    modulate <command> [options]

COMMANDS:
    run                     Replay a script and print delivered values
    strategies              Print an example definition of every strategy

RUN OPTIONS:
    --strategy, -s <json>   Strategy definition (default: {{"kind":"cancellable"}})
    --script, -f <path>     Script file, one step per line
    --effect, -e <step>     Inline step `at_ms:value[:run_ms]` (can repeat)
    --wait, -w <ms>         Time to wait for the pipeline after the last step (default: 2000)

OUTPUT OPTIONS:
    --pretty                Pretty-print JSON
    --version, -V           Print version

SCRIPT:
    0    a    500           subscribe at 0ms, yields "a" after 500ms
    100  b                  subscribe at 100ms, yields "b" immediately
    300  cancel             cancel whatever runs at 300ms"#
    );
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Emit { value: String, run: Duration },
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    at: Duration,
    action: Action,
}

impl Step {
    fn parse(fields: &[&str]) -> Result<Self> {
        let (at, rest) = fields.split_first().ok_or_else(|| anyhow!("empty step"))?;
        let at = Duration::from_millis(at.parse().with_context(|| format!("invalid at_ms '{}'", at))?);
        let action = match rest {
            ["cancel"] => Action::Cancel,
            [value] => Action::Emit { value: value.to_string(), run: Duration::ZERO },
            [value, run] => {
                let run = run.parse().with_context(|| format!("invalid run_ms '{}'", run))?;
                Action::Emit { value: value.to_string(), run: Duration::from_millis(run) }
            }
            _ => bail!("expected `<at_ms> <value> [run_ms]` or `<at_ms> cancel`"),
        };
        Ok(Self { at, action })
    }
}

fn load_steps(opts: &ParsedArgs) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    if let Some(path) = opts.script.as_deref() {
        let contents = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
        for (n, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            steps.push(Step::parse(&fields).with_context(|| format!("{}:{}", path, n + 1))?);
        }
    }
    for inline in &opts.effects {
        let fields: Vec<&str> = inline.split(':').collect();
        steps.push(Step::parse(&fields).with_context(|| format!("--effect {}", inline))?);
    }
    if steps.is_empty() {
        bail!("no steps: pass --script or --effect");
    }
    steps.sort_by_key(|step| step.at);
    Ok(steps)
}

fn cmd_strategies() -> Value {
    let defs = [
        StrategyDef::Cancellable,
        StrategyDef::Debounce { due_ms: 300 },
        StrategyDef::Throttle { interval_ms: 1000, latest: true },
        StrategyDef::MaxConcurrent { limit: 2 },
    ];
    json!(defs)
}

fn cmd_run(opts: &ParsedArgs) -> Result<Value> {
    let def = match opts.strategy.as_deref() {
        Some(raw) => serde_json::from_str(raw).context("parsing --strategy")?,
        None => json!({"kind": "cancellable"}),
    };
    let strategy = Strategy::from_value(def, TokioScheduler::shared())?;
    let steps = load_steps(opts)?;
    let wait = Duration::from_millis(opts.wait_ms.unwrap_or(2000));

    let rt = tokio::runtime::Runtime::new().context("creating runtime")?;
    let delivered = rt.block_on(replay(strategy, steps, wait));
    Ok(json!({ "delivered": delivered }))
}

async fn replay(strategy: Strategy, steps: Vec<Step>, wait: Duration) -> Vec<Value> {
    let id = EffectId::new("modulate-cli");
    let start = tokio::time::Instant::now();
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let mut subscriptions: Vec<Subscription> = Vec::new();

    info!(strategy = strategy.name(), steps = steps.len(), "replaying");
    for step in steps {
        tokio::time::sleep_until(start + step.at).await;
        let effect = match step.action {
            Action::Cancel => Effect::<String>::cancel(id.clone()),
            Action::Emit { value, run } => Effect::<String>::future(async move {
                tokio::time::sleep(run).await;
                Ok(value)
            })
            .modulated(id.clone(), strategy.clone()),
        };
        let sink = Arc::clone(&delivered);
        subscriptions.push(effect.subscribe(move |event| {
            if let Event::Output(value) = event {
                let at_ms = start.elapsed().as_millis() as u64;
                sink.lock().unwrap_or_else(|p| p.into_inner()).push(json!({"at_ms": at_ms, "value": value}));
            }
        }));
    }

    let deadline = tokio::time::Instant::now() + wait;
    while tokio::time::Instant::now() < deadline && !subscriptions.iter().all(Subscription::is_finished) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    drop(subscriptions);

    let delivered = delivered.lock().unwrap_or_else(|p| p.into_inner()).clone();
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_script_steps() {
        assert_eq!(
            Step::parse(&["100", "b"]).unwrap(),
            Step { at: Duration::from_millis(100), action: Action::Emit { value: "b".into(), run: Duration::ZERO } }
        );
        assert_eq!(
            Step::parse(&["0", "a", "500"]).unwrap().action,
            Action::Emit { value: "a".into(), run: Duration::from_millis(500) }
        );
        assert_eq!(Step::parse(&["300", "cancel"]).unwrap().action, Action::Cancel);
        assert!(Step::parse(&["soon", "a"]).is_err());
        assert!(Step::parse(&["1"]).is_err());
    }

    #[test]
    fn inline_effects_are_sorted() {
        let opts = ParsedArgs::parse(&["run".into(), "-e".into(), "200:b".into(), "-e".into(), "0:a".into()]);
        let steps = load_steps(&opts).unwrap();
        assert_eq!(steps[0].at, Duration::ZERO);
        assert_eq!(steps[1].at, Duration::from_millis(200));
    }
}
