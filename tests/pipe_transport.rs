use hexbridge_testkit::{
    critter, item, parse_envelope, player, read_jsonl, unique_temp_dir, Envelope, ScenarioBuilder,
};
use hexbridge_core::ItemType;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

struct Bridge {
    child: Child,
    dir: PathBuf,
    input: PathBuf,
    output: PathBuf,
}

impl Bridge {
    fn spawn(scenario: &ScenarioBuilder, extra: &[&str]) -> Self {
        let dir = unique_temp_dir("hexbridge_pipe_it").expect("temp dir");
        let scenario_path = dir.join("scenario.json");
        scenario.write_to(&scenario_path).expect("write scenario");
        let input = dir.join("cli_cmd.txt");
        let output = dir.join("cli_state.txt");

        let child = Command::new(env!("CARGO_BIN_EXE_hexbridge"))
            .args([
                "--config",
                dir.join("missing.toml").to_str().unwrap(),
                "--scenario",
                scenario_path.to_str().unwrap(),
                "--input",
                input.to_str().unwrap(),
                "--output",
                output.to_str().unwrap(),
                "--tick-ms",
                "5",
            ])
            .args(extra)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn hexbridge");

        let bridge = Self {
            child,
            dir,
            input,
            output,
        };
        let init = bridge.wait_for("init");
        assert!(init.ok);
        assert_eq!(init.body, "cli_ready=1");
        bridge
    }

    /// Poll the response file until it holds an envelope for `command`.
    fn wait_for(&self, command: &str) -> Envelope {
        let start = Instant::now();
        loop {
            if let Ok(text) = fs::read_to_string(&self.output) {
                if let Ok(envelope) = parse_envelope(&text) {
                    if envelope.command == command {
                        return envelope;
                    }
                }
            }
            if start.elapsed() > Duration::from_secs(20) {
                panic!("no {command} response in {}", self.output.display());
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    fn send(&self, line: &str) {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.input)
            .expect("open request file");
        file.write_all(format!("{line}\n").as_bytes())
            .expect("append request");
    }

    fn request(&self, line: &str) -> Envelope {
        let command = line.split_whitespace().next().unwrap_or_default().to_ascii_lowercase();
        // Clear the previous answer so a repeated verb is not mistaken for the new one.
        fs::write(&self.output, "").expect("clear response file");
        self.send(line);
        self.wait_for(&command)
    }

    fn finish(mut self) -> ExitStatus {
        let status = wait_for_exit(&mut self.child, Duration::from_secs(20));
        let _ = fs::remove_dir_all(&self.dir);
        status
    }
}

fn wait_for_exit(child: &mut Child, timeout: Duration) -> ExitStatus {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().expect("try_wait") {
            return status;
        }
        if start.elapsed() > timeout {
            let _ = child.kill();
            panic!("process did not exit within {timeout:?}");
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

fn outpost() -> ScenarioBuilder {
    ScenarioBuilder::new("outpost")
        .player(player(1, 100))
        .object(critter(42, "Guard", 102, 20, 0))
        .object(item(7, "Rope", 103, ItemType::Misc))
}

#[test]
fn pipe_round_trip_and_exit() {
    let bridge = Bridge::spawn(&outpost(), &[]);

    let state = bridge.request("state");
    assert!(state.ok, "{}", state.body);
    assert_eq!(state.field("mode").as_deref(), Some("exploration"));
    assert_eq!(state.field("tile").as_deref(), Some("100"));

    let unknown = bridge.request("dance");
    assert!(!unknown.ok);
    assert_eq!(unknown.body, "unknown_command");

    let goto = bridge.request("goto 42");
    assert!(goto.ok, "{}", goto.body);
    assert_eq!(goto.field("target_object_id").as_deref(), Some("42"));
    assert_eq!(goto.field("planned_steps").as_deref(), Some("1"));
    assert_eq!(goto.field("arrived_adjacent").as_deref(), Some("1"));
    assert_eq!(goto.field("final_tile").as_deref(), Some("101"));

    let far = bridge.request("goto 9999999");
    assert!(!far.ok);
    assert_eq!(far.body, "tile_out_of_range");

    let exit = bridge.request("exit");
    assert!(exit.ok);
    assert_eq!(exit.body, "quit_requested=1");

    let status = bridge.finish();
    assert!(status.success(), "hexbridge exited with {status}");
}

#[test]
fn exchange_log_records_requests_and_responses() {
    let dir = unique_temp_dir("hexbridge_log_it").expect("temp dir");
    let log = dir.join("exchange.jsonl");
    let bridge = Bridge::spawn(&outpost(), &["--log", log.to_str().unwrap()]);

    bridge.request("look");
    bridge.request("exit");
    let status = bridge.finish();
    assert!(status.success());

    let records = read_jsonl(&log).expect("log readable");
    let events: Vec<_> = records
        .iter()
        .map(|r| (r["event"].as_str().unwrap_or_default(), r["command"].as_str()))
        .collect();
    assert!(events.contains(&("response", Some("init"))));
    assert!(records.iter().any(|r| r["event"] == "request" && r["line"] == "look"));
    assert!(records
        .iter()
        .any(|r| r["event"] == "response" && r["command"] == "look" && r["status"] == "ok"));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn unreadable_scenario_is_fatal() {
    let dir = unique_temp_dir("hexbridge_bad_scenario").expect("temp dir");
    let scenario = dir.join("broken.json");
    fs::write(&scenario, "{ \"map_nam\": 1 }").expect("write scenario");

    let status = Command::new(env!("CARGO_BIN_EXE_hexbridge"))
        .args(["--scenario", scenario.to_str().unwrap()])
        .args(["--output", dir.join("out.txt").to_str().unwrap()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("run hexbridge");
    assert!(!status.success());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn channel_open_failure_is_reported_in_the_response_file() {
    let dir = unique_temp_dir("hexbridge_bad_channel").expect("temp dir");
    // A directory cannot be opened as the request stream.
    let input = dir.join("requests");
    fs::create_dir_all(&input).expect("create dir");
    let output = dir.join("out.txt");

    let status = Command::new(env!("CARGO_BIN_EXE_hexbridge"))
        .args(["--input", input.to_str().unwrap()])
        .args(["--output", output.to_str().unwrap()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("run hexbridge");
    assert!(!status.success());

    let envelope = parse_envelope(&read(&output)).expect("init envelope");
    assert!(!envelope.ok);
    assert_eq!(envelope.command, "init");
    assert_eq!(envelope.body, "failed_to_open_cli_pipe");
    let _ = fs::remove_dir_all(&dir);
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}
