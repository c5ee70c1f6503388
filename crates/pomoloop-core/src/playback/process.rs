//! Low-level process signalling and process-table scans.
//!
//! Every function here treats "no such process" as success: a process that
//! is already gone needs no further termination.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use sysinfo::{ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// Ask politely (SIGTERM).
    Terminate,
    /// No negotiation (SIGKILL).
    Kill,
}

#[cfg(unix)]
mod sys {
    use super::StopSignal;
    use nix::errno::Errno;
    use nix::sys::signal::{kill, killpg, Signal};
    use nix::unistd::Pid;

    fn to_pid(pid: u32) -> Option<Pid> {
        // Never address pid 0/1: 0 is our own group, 1 is init.
        i32::try_from(pid).ok().filter(|p| *p > 1).map(Pid::from_raw)
    }

    fn to_signal(sig: StopSignal) -> Signal {
        match sig {
            StopSignal::Terminate => Signal::SIGTERM,
            StopSignal::Kill => Signal::SIGKILL,
        }
    }

    pub fn signal_pid(pid: u32, sig: StopSignal) {
        let Some(target) = to_pid(pid) else { return };
        match kill(target, to_signal(sig)) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => tracing::debug!(pid, ?sig, error = %e, "signal not delivered"),
        }
    }

    pub fn signal_group(pgid: u32, sig: StopSignal) {
        let Some(target) = to_pid(pgid) else { return };
        match killpg(target, to_signal(sig)) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => tracing::debug!(pgid, ?sig, error = %e, "group signal not delivered"),
        }
    }

    pub fn pid_exists(pid: u32) -> bool {
        let Some(target) = to_pid(pid) else {
            return false;
        };
        matches!(kill(target, None), Ok(()) | Err(Errno::EPERM))
    }
}

#[cfg(not(unix))]
mod sys {
    use super::StopSignal;
    use sysinfo::{Pid, ProcessesToUpdate, System};

    fn with_process<T>(pid: u32, f: impl FnOnce(&sysinfo::Process) -> T) -> Option<T> {
        let mut system = System::new();
        let pid = Pid::from_u32(pid);
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
        system.process(pid).map(f)
    }

    pub fn signal_pid(pid: u32, _sig: StopSignal) {
        with_process(pid, |p| p.kill());
    }

    pub fn signal_group(_pgid: u32, _sig: StopSignal) {}

    pub fn pid_exists(pid: u32) -> bool {
        with_process(pid, |_| ()).is_some()
    }
}

pub use sys::{pid_exists, signal_group, signal_pid};

/// Like [`pid_exists`], but a zombie waiting to be reaped counts as gone.
pub fn is_running(pid: u32) -> bool {
    if !pid_exists(pid) {
        return false;
    }
    let mut system = System::new();
    let target = sysinfo::Pid::from_u32(pid);
    system.refresh_processes_specifics(ProcessesToUpdate::Some(&[target]), ProcessRefreshKind::new());
    system
        .process(target)
        .map(|p| p.status() != ProcessStatus::Zombie)
        .unwrap_or(false)
}

/// What a stray player looks like: its executable name plus a command-line
/// argument under one of our track roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub program: String,
    pub roots: Vec<PathBuf>,
}

impl Signature {
    pub fn new(program: impl Into<String>, roots: Vec<PathBuf>) -> Self {
        Self {
            program: program.into(),
            roots,
        }
    }

    fn matches_name(&self, name: &str) -> bool {
        // Linux truncates comm to 15 bytes.
        name == self.program || (name.len() == 15 && self.program.starts_with(name))
    }

    fn matches_args<'a>(&self, mut args: impl Iterator<Item = &'a Path>) -> bool {
        args.any(|arg| self.roots.iter().any(|root| arg.starts_with(root)))
    }
}

/// Snapshot of the process table.
pub struct ProcessTable {
    system: System,
}

impl ProcessTable {
    pub fn snapshot() -> Self {
        let mut system = System::new();
        system.refresh_processes_specifics(ProcessesToUpdate::All, ProcessRefreshKind::everything());
        Self { system }
    }

    /// Every descendant of `root`, breadth-first (parents before children).
    pub fn descendants(&self, root: u32) -> Vec<u32> {
        let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
        for (pid, process) in self.system.processes() {
            if let Some(parent) = process.parent() {
                children
                    .entry(parent.as_u32())
                    .or_default()
                    .push(pid.as_u32());
            }
        }

        let mut found = Vec::new();
        let mut queue = VecDeque::from([root]);
        while let Some(pid) = queue.pop_front() {
            for &child in children.get(&pid).into_iter().flatten() {
                if child != root && !found.contains(&child) {
                    found.push(child);
                    queue.push_back(child);
                }
            }
        }
        found
    }

    /// Live processes matching `signature`, excluding ourselves.
    pub fn matching(&self, signature: &Signature) -> Vec<u32> {
        let own_pid = std::process::id();
        let mut pids: Vec<u32> = self
            .system
            .processes()
            .iter()
            .filter(|(pid, _)| pid.as_u32() != own_pid)
            .filter(|(_, process)| process.status() != ProcessStatus::Zombie)
            .filter(|(_, process)| {
                let name = process.name().to_string_lossy();
                let exe_matches = process
                    .exe()
                    .and_then(|exe| exe.file_name())
                    .map(|exe| exe.to_string_lossy() == signature.program.as_str())
                    .unwrap_or(false);
                signature.matches_name(&name) || exe_matches
            })
            .filter(|(_, process)| {
                signature.matches_args(process.cmd().iter().map(Path::new))
            })
            .map(|(pid, _)| pid.as_u32())
            .collect();
        pids.sort_unstable();
        pids
    }
}

/// Signal every process matching `signature`. Returns how many matched.
pub fn sweep(signature: &Signature, sig: StopSignal) -> usize {
    if signature.roots.is_empty() {
        return 0;
    }
    let matches = ProcessTable::snapshot().matching(signature);
    for &pid in &matches {
        tracing::debug!(pid, program = %signature.program, ?sig, "sweeping stray player");
        signal_pid(pid, sig);
    }
    matches.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_name_handles_truncated_comm() {
        let sig = Signature::new("a-very-long-player-name", vec![]);
        assert!(sig.matches_name("a-very-long-pla"));
        assert!(!sig.matches_name("a-very-long"));
        assert!(Signature::new("mpv", vec![]).matches_name("mpv"));
    }

    #[test]
    fn signature_args_require_a_root_prefix() {
        let sig = Signature::new("mpv", vec![PathBuf::from("/music/work")]);
        let hit = ["--really-quiet", "/music/work/a.mp3"];
        let miss = ["--really-quiet", "/music/workshop/a.mp3"];
        assert!(sig.matches_args(hit.iter().map(Path::new)));
        assert!(!sig.matches_args(miss.iter().map(Path::new)));
    }

    #[test]
    fn empty_roots_never_sweep() {
        assert_eq!(sweep(&Signature::new("sh", vec![]), StopSignal::Kill), 0);
    }

    #[cfg(unix)]
    #[test]
    fn signalling_a_vanished_pid_is_harmless() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        signal_pid(pid, StopSignal::Terminate);
        signal_pid(pid, StopSignal::Kill);
        signal_group(pid, StopSignal::Kill);
    }

    #[cfg(unix)]
    #[test]
    fn pid_zero_and_one_are_never_addressed() {
        assert!(!pid_exists(0));
        assert!(!pid_exists(1));
        assert!(!is_running(0));
    }

    #[cfg(unix)]
    #[test]
    fn descendants_finds_grandchildren() {
        use std::os::unix::process::CommandExt;
        let mut child = std::process::Command::new("sh")
            .args(["-c", "sleep 30 & sleep 30; wait"])
            .process_group(0)
            .spawn()
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(300));

        let found = ProcessTable::snapshot().descendants(child.id());
        assert!(!found.is_empty());

        signal_group(child.id(), StopSignal::Kill);
        child.wait().unwrap();
    }
}
