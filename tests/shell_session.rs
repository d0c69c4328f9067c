// Integration tests - a real `sh` driven through the session, host and relay

#![cfg(unix)]

mod common;

use shell_panel::app::{Session, SessionOptions, SessionState};
use shell_panel::input::EditorKey;
use shell_panel::model::{DisplaySurface, TextBuffer};
use shell_panel::services::shell::{
    spawn_relay, RelayEvent, ShellCommand, ShellHost, ShellProcess, StreamKind,
};
use std::time::{Duration, Instant};

const DEADLINE: Duration = Duration::from_secs(10);

fn options() -> SessionOptions {
    SessionOptions {
        // `sh` on pipes prints no prompt; let it become editable right away
        startup_unlock: Some(Duration::ZERO),
        show_banner: false,
        terminate_grace: Duration::from_millis(500),
        ..Default::default()
    }
}

fn start_sh() -> Session<TextBuffer> {
    common::tracing::init_tracing_from_env();
    let mut session = Session::start(&ShellCommand::new("sh"), options(), TextBuffer::new());
    wait_until(&mut session, |s| s.state() == SessionState::AwaitingInput);
    session
}

/// Pump until `done` holds, panicking with the buffer contents on timeout.
fn wait_until<F>(session: &mut Session<TextBuffer>, mut done: F)
where
    F: FnMut(&Session<TextBuffer>) -> bool,
{
    let start = Instant::now();
    while !done(session) {
        assert!(
            start.elapsed() < DEADLINE,
            "timed out, buffer: {:?}, state: {:?}",
            session.surface().text(),
            session.state()
        );
        session.pump_timeout(Duration::from_millis(20));
    }
}

fn run(session: &mut Session<TextBuffer>, command: &str) {
    for c in command.chars() {
        session.handle_key(EditorKey::Char(c));
    }
    session.handle_key(EditorKey::Enter);
}

#[test]
fn test_command_output_reenables_editing() {
    let mut session = start_sh();

    run(&mut session, "echo hello");
    assert_eq!(session.state(), SessionState::AwaitingOutput);
    assert!(session.surface().is_read_only());
    assert!(session.surface().text().starts_with("echo hello\n"));

    wait_until(&mut session, |s| s.surface().text().contains("hello\nhello\n"));
    assert_eq!(session.state(), SessionState::AwaitingInput);
    assert_eq!(session.prompt_boundary(), session.surface().buffer_length());
    assert!(!session.surface().is_read_only());
}

#[test]
fn test_stderr_is_shown() {
    let mut session = start_sh();
    run(&mut session, "echo oops 1>&2");
    wait_until(&mut session, |s| s.surface().text().contains("oops\n"));
    assert_eq!(session.state(), SessionState::AwaitingInput);
}

#[test]
fn test_exit_terminates_session_with_code() {
    let mut session = start_sh();
    run(&mut session, "exit 3");
    wait_until(&mut session, |s| s.state() == SessionState::Terminated);

    assert!(session.surface().text().ends_with("\nProcess exited (3)\n"));
    assert!(session.surface().is_read_only());

    let text = session.surface().text().to_string();
    session.handle_key(EditorKey::Char('x'));
    session.on_panel_close();
    session.pump();
    assert_eq!(session.surface().text(), text);
}

#[test]
fn test_panel_close_stops_running_shell() {
    let mut session = start_sh();
    let pid = session.pid().expect("shell should have a pid");
    assert!(pid > 0);

    session.on_panel_close();
    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(session.surface().text().matches("Process exited (").count(), 1);

    session.on_panel_close();
    assert_eq!(session.surface().text().matches("Process exited (").count(), 1);
}

#[test]
fn test_invalid_utf8_is_shown_escaped() {
    let mut session = start_sh();
    run(&mut session, r"printf 'ok\377\n'");
    wait_until(&mut session, |s| s.surface().text().contains("not valid UTF-8"));
    assert!(session
        .surface()
        .text()
        .contains("[stdout: 1 byte not valid UTF-8: \\xff]"));
}

#[test]
fn test_working_directory_is_applied() {
    common::tracing::init_tracing_from_env();
    let dir = tempfile::tempdir().unwrap();
    let name = dir
        .path()
        .file_name()
        .unwrap()
        .to_string_lossy()
        .to_string();

    let command = ShellCommand::new("sh").with_working_dir(dir.path());
    let mut session = Session::start(&command, options(), TextBuffer::new());
    wait_until(&mut session, |s| s.state() == SessionState::AwaitingInput);
    run(&mut session, "pwd");
    wait_until(&mut session, |s| s.surface().text().contains(&format!("{name}\n")));
}

#[test]
fn test_relay_delivers_both_streams_until_closed() {
    common::tracing::init_tracing_from_env();
    let command = ShellCommand::new("sh").with_args(["-c", "echo out; echo err 1>&2"]);
    let mut host = ShellHost::start(&command).unwrap();
    let output = host.take_output().unwrap();
    assert!(host.take_output().is_none());
    let (events, relay) = spawn_relay(output, 16).unwrap();

    let mut stdout = String::new();
    let mut stderr = String::new();
    let mut closed = 0;
    while closed < 2 {
        match events.recv_timeout(DEADLINE).unwrap() {
            RelayEvent::Output {
                stream: StreamKind::Stdout,
                text,
            } => stdout.push_str(&text),
            RelayEvent::Output {
                stream: StreamKind::Stderr,
                text,
            } => stderr.push_str(&text),
            RelayEvent::Closed { .. } => closed += 1,
            other => panic!("unexpected event {:?}", other),
        }
    }
    relay.join();

    assert_eq!(stdout, "out\n");
    assert_eq!(stderr, "err\n");

    let start = Instant::now();
    let exit = loop {
        if let Some(exit) = host.poll_exit() {
            break exit;
        }
        assert!(start.elapsed() < DEADLINE);
        std::thread::sleep(Duration::from_millis(10));
    };
    assert!(exit.success());
}

#[test]
fn test_submit_line_round_trips_through_cat() {
    let mut host = ShellHost::start(&ShellCommand::new("cat")).unwrap();
    let (events, _relay) = spawn_relay(host.take_output().unwrap(), 4096).unwrap();

    host.submit_line("line one").unwrap();
    let mut echoed = String::new();
    while !echoed.ends_with("line one\n") {
        match events.recv_timeout(DEADLINE).unwrap() {
            RelayEvent::Output { text, .. } => echoed.push_str(&text),
            other => panic!("unexpected event {:?}", other),
        }
    }

    host.terminate(Duration::from_millis(500));
    assert!(host.poll_exit().is_some());
    assert!(host.submit_line("too late").is_err());
}
