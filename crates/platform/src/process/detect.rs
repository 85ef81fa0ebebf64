use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};

/// Whether any running process has `name` as its executable name, compared
/// ASCII case-insensitively.
#[must_use]
pub fn is_process_running(name: &str) -> bool {
    let mut system =
        System::new_with_specifics(RefreshKind::nothing().with_processes(ProcessRefreshKind::nothing()));
    system.refresh_processes(ProcessesToUpdate::All, true);
    system
        .processes()
        .values()
        .any(|process| process.name().to_string_lossy().eq_ignore_ascii_case(name))
}

/// Whether a process with id `pid` currently exists.
#[must_use]
pub fn is_pid_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing(),
    );
    system.process(pid).is_some()
}
