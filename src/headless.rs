use crate::channel::protocol::Envelope;
use crate::channel::CommandChannel;
use crate::command_script::CommandScriptPlayer;
use crate::commands::Interpreter;
use anyhow::Result;
use hexbridge_core::SimTick;
use hexbridge_world::Simulation;
use std::time::Duration;

pub struct HeadlessConfig {
    pub command_script: Option<CommandScriptPlayer>,
    pub max_ticks: Option<u64>,
    pub exit_when_script_finished: bool,
    pub tick: Duration,
}

/// Why the run loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    QuitRequested,
    MaxTicks,
    ScriptFinished,
}

/// Drive the interpreter until the world asks to quit or a configured limit is reached.
///
/// Each tick serves at most one controller request, then any script steps due at that tick,
/// then advances animation by one frame.
pub fn run<S: Simulation>(
    interpreter: &mut Interpreter<S>,
    channel: &mut dyn CommandChannel,
    mut cfg: HeadlessConfig,
) -> Result<StopReason> {
    let mut tick = SimTick::ZERO;
    loop {
        if interpreter.world().quit_requested() {
            tracing::info!(tick = tick.0, "Quit requested");
            return Ok(StopReason::QuitRequested);
        }
        if cfg.max_ticks.is_some_and(|max| tick.0 >= max) {
            tracing::info!(tick = tick.0, "Tick limit reached");
            return Ok(StopReason::MaxTicks);
        }

        if let Some(line) = channel.receive(cfg.tick) {
            serve(interpreter, channel, &line);
        }

        if let Some(script) = cfg.command_script.as_mut() {
            for line in script.drain_ready_commands(tick) {
                tracing::debug!(tick = tick.0, command = %line, "Script step");
                serve(interpreter, channel, &line);
            }
            if cfg.exit_when_script_finished && script.is_finished() {
                tracing::info!(tick = tick.0, "Command script finished");
                return Ok(StopReason::ScriptFinished);
            }
        }

        interpreter.world_mut().animate_frame();
        tick = tick.advance(1);
    }
}

fn serve<S: Simulation>(
    interpreter: &mut Interpreter<S>,
    channel: &mut dyn CommandChannel,
    line: &str,
) {
    let (command, response) = interpreter.execute(line);
    let envelope = if response.ok {
        Envelope::ok(command, response.body)
    } else {
        Envelope::error(command, response.body)
    };
    if let Err(err) = channel.send(&envelope) {
        tracing::warn!(%err, command = %envelope.command, "Failed to deliver response");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;
    use hexbridge_testkit::{parse_envelope, player, ScenarioBuilder};
    use hexbridge_world::SandboxWorld;
    use std::collections::VecDeque;

    /// In-memory channel: queued request lines in, envelopes collected.
    #[derive(Default)]
    struct MemoryChannel {
        requests: VecDeque<String>,
        sent: Vec<Envelope>,
    }

    impl CommandChannel for MemoryChannel {
        fn receive(&mut self, _timeout: Duration) -> Option<String> {
            self.requests.pop_front()
        }

        fn send(&mut self, envelope: &Envelope) -> Result<()> {
            self.sent.push(envelope.clone());
            Ok(())
        }
    }

    fn interpreter() -> Interpreter<SandboxWorld> {
        test_support::interpreter(ScenarioBuilder::default().player(player(1, 100)))
    }

    fn config(script: Option<&str>, max_ticks: Option<u64>) -> HeadlessConfig {
        HeadlessConfig {
            command_script: script.map(|json| CommandScriptPlayer::from_json(json).expect("script")),
            max_ticks,
            exit_when_script_finished: script.is_some(),
            tick: Duration::ZERO,
        }
    }

    #[test]
    fn serves_requests_until_the_tick_limit() {
        let mut it = interpreter();
        let mut channel = MemoryChannel::default();
        channel.requests.extend(["state".to_string(), "bogus".to_string()]);

        let reason = run(&mut it, &mut channel, config(None, Some(5))).expect("runs");
        assert_eq!(reason, StopReason::MaxTicks);
        assert_eq!(channel.sent.len(), 2);
        assert!(channel.sent[0].ok);
        assert_eq!(channel.sent[0].command, "state");
        assert!(!channel.sent[1].ok);
        assert_eq!(channel.sent[1].body, "unknown_command");

        let rendered = parse_envelope(&channel.sent[1].render()).expect("envelope parses");
        assert_eq!(rendered.command, "bogus");
    }

    #[test]
    fn script_steps_run_on_their_tick() {
        let mut it = interpreter();
        let mut channel = MemoryChannel::default();
        let script = r#"{ "steps": [
            { "tick": 0, "command": "move e" },
            { "tick": 3, "command": "state" }
        ] }"#;

        let reason = run(&mut it, &mut channel, config(Some(script), Some(100))).expect("runs");
        assert_eq!(reason, StopReason::ScriptFinished);
        let commands: Vec<_> = channel.sent.iter().map(|e| e.command.as_str()).collect();
        assert_eq!(commands, vec!["move", "state"]);
        assert!(channel.sent[1].body.contains("tile=101"));
    }

    #[test]
    fn exit_command_stops_the_loop() {
        let mut it = interpreter();
        let mut channel = MemoryChannel::default();
        channel.requests.push_back("exit".to_string());

        let reason = run(&mut it, &mut channel, config(None, None)).expect("runs");
        assert_eq!(reason, StopReason::QuitRequested);
        assert_eq!(channel.sent.len(), 1);
    }
}
