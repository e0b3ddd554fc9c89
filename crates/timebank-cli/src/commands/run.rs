//! Long-running mode: the service loop driven by stdin lines.
//!
//! Input lines: `background`, `active`, `inactive`, `credit <SECONDS>`,
//! `answer correct|wrong <SECONDS> [CATEGORY]`, `erase`, `status`, `quit`.
//! Every engine event is printed to stdout as one JSON line.

use std::sync::Arc;

use timebank_core::{
    Answer, ChannelLifecycle, Collaborators, Config, Database, EconomyHandle, EconomyService,
    EventBus, HostState, KeyValueStore, LogNotifier, SystemClock,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::session::{load_host_state, HOST_STATE_KEY};

#[derive(Debug, Clone, PartialEq)]
enum Input {
    Host(HostState),
    Credit(i64),
    Answer(Answer),
    Erase,
    Status,
    Quit,
}

fn parse_line(line: &str) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("empty line".into());
    };
    let input = match head.to_ascii_lowercase().as_str() {
        "quit" | "exit" => Input::Quit,
        "status" => Input::Status,
        "erase" => Input::Erase,
        "credit" => {
            let raw = words.next().ok_or("usage: credit <SECONDS>")?;
            let secs = raw
                .parse::<i64>()
                .map_err(|_| format!("invalid seconds: {raw}"))?;
            Input::Credit(secs)
        }
        "answer" => {
            let verdict = words.next().ok_or("usage: answer correct|wrong <SECONDS>")?;
            let elapsed = match words.next() {
                Some(raw) => raw
                    .parse::<f64>()
                    .map_err(|_| format!("invalid seconds: {raw}"))?,
                None => 0.0,
            };
            let mut answer = match verdict {
                "correct" => Answer::correct(elapsed),
                "wrong" => Answer::wrong(elapsed),
                other => return Err(format!("expected correct or wrong, got {other}")),
            };
            answer.category = words.next().map(str::to_string);
            Input::Answer(answer)
        }
        other => match HostState::parse(other) {
            Some(state) => Input::Host(state),
            None => return Err(format!("unknown input: {other}")),
        },
    };
    Ok(input)
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve())
}

async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let store: Arc<dyn KeyValueStore> = Arc::new(Database::open()?);
    let lifecycle = ChannelLifecycle::new(load_host_state(store.as_ref()));

    let bus = EventBus::new();
    let mut events = bus.subscribe();
    let handle = EconomyService::spawn(
        config,
        store.clone(),
        &lifecycle,
        Collaborators {
            clock: Arc::new(SystemClock),
            notifier: Arc::new(LogNotifier),
            bus,
        },
    );
    println!("{}", serde_json::to_string(&handle.snapshot())?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event output lagged"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_line(&line) {
                    Ok(Input::Quit) => break,
                    Ok(input) => apply(&handle, &lifecycle, store.as_ref(), input).await?,
                    Err(message) => eprintln!("{message}"),
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    handle.sync().await;
    handle.cleanup().await;
    while let Ok(event) = events.try_recv() {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

async fn apply(
    handle: &EconomyHandle,
    lifecycle: &ChannelLifecycle,
    store: &dyn KeyValueStore,
    input: Input,
) -> Result<(), Box<dyn std::error::Error>> {
    match input {
        Input::Host(state) => {
            lifecycle.set(state);
            if let Err(e) = store.set(HOST_STATE_KEY, &serde_json::to_string(&state)?) {
                warn!(error = %e, "failed to remember host state");
            }
        }
        Input::Credit(secs) => handle.add_time_credits(secs),
        Input::Answer(answer) => handle.record_answer(answer),
        Input::Erase => handle.erase_all_progress(),
        Input::Status => {
            handle.sync().await;
            println!("{}", serde_json::to_string(&handle.snapshot())?);
        }
        Input::Quit => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_states() {
        assert_eq!(parse_line("background"), Ok(Input::Host(HostState::Background)));
        assert_eq!(parse_line("Active"), Ok(Input::Host(HostState::Active)));
        assert_eq!(parse_line("inactive"), Ok(Input::Host(HostState::Inactive)));
    }

    #[test]
    fn parses_credit_including_negative() {
        assert_eq!(parse_line("credit 300"), Ok(Input::Credit(300)));
        assert_eq!(parse_line("credit -45"), Ok(Input::Credit(-45)));
        assert!(parse_line("credit").is_err());
        assert!(parse_line("credit lots").is_err());
    }

    #[test]
    fn parses_answers() {
        assert_eq!(
            parse_line("answer correct 4.5"),
            Ok(Input::Answer(Answer::correct(4.5)))
        );
        assert_eq!(parse_line("answer wrong"), Ok(Input::Answer(Answer::wrong(0.0))));

        let mut with_category = Answer::correct(2.0);
        with_category.category = Some("math".into());
        assert_eq!(
            parse_line("answer correct 2 math"),
            Ok(Input::Answer(with_category))
        );
        assert!(parse_line("answer maybe 3").is_err());
    }

    #[test]
    fn rejects_unknown_input() {
        assert!(parse_line("dance").is_err());
        assert!(parse_line("   ").is_err());
        assert_eq!(parse_line("quit"), Ok(Input::Quit));
    }
}
