//! Integration tests for the playback supervisor.
//!
//! These spawn real processes. `/bin/sh` stands in for the audio player:
//! the script keeps the shell alive (so its command line still names the
//! track) while a `sleep` child plays the part of the decoder.
#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::process::Child;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pomoloop_core::playback::process::{self, ProcessTable};
use pomoloop_core::playback::{GracePolicy, Signature};
use pomoloop_core::{Player, Supervisor, SupervisorOptions};

fn fake_player(script: &str) -> Player {
    Player::new(
        "/bin/sh",
        vec!["-c".into(), script.into(), "pomoloop-test".into()],
    )
}

fn supervisor(script: &str, roots: Vec<PathBuf>) -> Supervisor {
    supervisor_with(
        script,
        SupervisorOptions {
            roots,
            ..Default::default()
        },
    )
}

fn supervisor_with(script: &str, options: SupervisorOptions) -> Supervisor {
    Supervisor::new(Some(fake_player(script)), options)
}

fn chime_players(chime: &Path) -> Vec<u32> {
    let signature = Signature::new("sh", vec![chime.to_path_buf()]);
    ProcessTable::snapshot().matching(&signature)
}

fn track_dir(name: &str) -> tempfile::TempDir {
    let dir = tempfile::Builder::new().prefix(name).tempdir().unwrap();
    std::fs::write(dir.path().join("a.mp3"), b"").unwrap();
    dir
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    cond()
}

fn wait_for_pids(sup: &Supervisor) -> Vec<u32> {
    assert!(
        wait_until(Duration::from_secs(3), || !sup.active_pids().is_empty()),
        "player never started"
    );
    sup.active_pids()
}

fn spawn_stray(script: &str, track: &Path) -> Child {
    fake_player(script).command(track).spawn().unwrap()
}

const LONG_TRACK: &str = "sleep 30; :";

#[test]
fn replacing_a_job_leaves_exactly_one() {
    let first = track_dir("pomoloop-work");
    let second = track_dir("pomoloop-break");
    let sup = supervisor(LONG_TRACK, vec![]);

    sup.start(first.path(), false);
    let old = wait_for_pids(&sup);

    sup.start(second.path(), false);
    for pid in &old {
        assert!(!process::is_running(*pid), "old player {pid} survived");
    }
    let new = wait_for_pids(&sup);
    assert!(sup.is_playing());
    assert!(new.iter().all(|pid| !old.contains(pid)));

    sup.stop();
    for pid in &new {
        assert!(!process::is_running(*pid));
    }
}

#[test]
fn stop_is_idempotent_and_kills_descendants() {
    let dir = track_dir("pomoloop-stop");
    let sup = supervisor(LONG_TRACK, vec![]);

    sup.start(dir.path(), false);
    let pids = wait_for_pids(&sup);
    assert!(wait_until(Duration::from_secs(2), || {
        !ProcessTable::snapshot().descendants(pids[0]).is_empty()
    }));
    let descendants = ProcessTable::snapshot().descendants(pids[0]);

    sup.stop();
    sup.stop();

    assert!(!sup.is_playing());
    for pid in pids.iter().chain(descendants.iter()) {
        assert!(
            wait_until(Duration::from_secs(1), || !process::is_running(*pid)),
            "pid {pid} still running"
        );
    }
    let signature = Signature::new("sh", vec![dir.path().to_path_buf()]);
    assert!(ProcessTable::snapshot().matching(&signature).is_empty());
}

#[test]
fn stop_sweeps_untracked_players_for_the_same_directory() {
    let dir = track_dir("pomoloop-stray");
    let mut stray = spawn_stray(LONG_TRACK, &dir.path().join("a.mp3"));
    let sup = supervisor(LONG_TRACK, vec![]);

    sup.start(dir.path(), false);
    wait_for_pids(&sup);
    sup.stop();

    assert!(!process::is_running(stray.id()));
    stray.wait().unwrap();
}

#[test]
fn reconcile_terminates_orphans_from_a_previous_run() {
    let dir = track_dir("pomoloop-orphan");
    let mut orphan = spawn_stray(LONG_TRACK, &dir.path().join("a.mp3"));
    assert!(wait_until(Duration::from_secs(2), || {
        let signature = Signature::new("sh", vec![dir.path().to_path_buf()]);
        !ProcessTable::snapshot().matching(&signature).is_empty()
    }));

    let sup = supervisor(LONG_TRACK, vec![dir.path().to_path_buf()]);
    assert!(sup.reconcile_orphans() >= 1);

    let status = orphan.wait().unwrap();
    assert!(!status.success());
    assert_eq!(sup.reconcile_orphans(), 0);
}

#[test]
fn empty_directory_idles_until_a_track_appears() {
    let dir = tempfile::tempdir().unwrap();
    let sup = supervisor(LONG_TRACK, vec![]);

    sup.start(dir.path(), false);
    std::thread::sleep(Duration::from_millis(300));
    assert!(sup.is_playing());
    assert!(sup.active_pids().is_empty());

    std::fs::write(dir.path().join("late.ogg"), b"").unwrap();
    let pids = wait_for_pids(&sup);
    assert_eq!(pids.len(), 1);
    sup.stop();
}

#[test]
fn finished_tracks_advance_and_loop() {
    let dir = track_dir("pomoloop-loop");
    std::fs::write(dir.path().join("b.mp3"), b"").unwrap();
    let sup = supervisor("sleep 0.1; :", vec![]);

    sup.start(dir.path(), false);
    let mut seen = std::collections::HashSet::new();
    wait_until(Duration::from_secs(4), || {
        seen.extend(sup.active_pids());
        seen.len() >= 3
    });
    sup.stop();
    assert!(seen.len() >= 3, "only saw {} players", seen.len());
}

#[test]
fn chime_blocks_until_it_finishes() {
    let dir = track_dir("pomoloop-chime");
    let sup = supervisor("sleep 0.3; :", vec![]);

    let started = Instant::now();
    sup.play_chime(&dir.path().join("a.mp3"));
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[test]
fn overrunning_chime_is_stopped_at_the_timeout() {
    let dir = track_dir("pomoloop-long-chime");
    let chime = dir.path().join("a.mp3");
    let sup = supervisor_with(
        LONG_TRACK,
        SupervisorOptions {
            chime_timeout: Duration::from_millis(300),
            grace: GracePolicy {
                attempts: 2,
                interval: Duration::from_millis(50),
            },
            ..Default::default()
        },
    );

    let started = Instant::now();
    sup.play_chime(&chime);
    let took = started.elapsed();
    assert!(took >= Duration::from_millis(300));
    assert!(took < Duration::from_secs(5), "chime ran for {took:?}");
    assert!(chime_players(&chime).is_empty());
}

#[test]
fn shutdown_interrupts_a_blocking_chime() {
    let dir = track_dir("pomoloop-chime-teardown");
    let chime = dir.path().join("a.mp3");
    let sup = Arc::new(supervisor(LONG_TRACK, vec![dir.path().to_path_buf()]));

    let playing = {
        let sup = Arc::clone(&sup);
        let chime = chime.clone();
        std::thread::spawn(move || sup.play_chime(&chime))
    };
    assert!(
        wait_until(Duration::from_secs(3), || !chime_players(&chime).is_empty()),
        "chime never started"
    );

    let started = Instant::now();
    sup.shutdown();
    playing.join().unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(chime_players(&chime).is_empty());

    let again = Instant::now();
    sup.play_chime(&chime);
    assert!(again.elapsed() < Duration::from_millis(200));
    assert!(chime_players(&chime).is_empty());
}

#[test]
fn shutdown_stops_playback_and_refuses_restart() {
    let dir = track_dir("pomoloop-shutdown");
    let sup = supervisor(LONG_TRACK, vec![dir.path().to_path_buf()]);

    sup.start(dir.path(), false);
    let pids = wait_for_pids(&sup);
    sup.shutdown();
    sup.shutdown();

    assert!(!sup.is_playing());
    assert!(pids.iter().all(|pid| !process::is_running(*pid)));

    sup.start(dir.path(), false);
    assert!(!sup.is_playing());
}
