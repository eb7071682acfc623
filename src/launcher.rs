//! Child process creation and foreground signal forwarding.
//!
//! Every external command runs in its own process group. While it runs, its
//! group id is published in a single atomic field; the process-wide SIGINT
//! handler reads that field and re-delivers the signal to the whole group,
//! so descendants the child spawned are reached too. The field is written
//! at exactly two points: right after a successful fork in the parent, and
//! right after the reap.

use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::interpreter::Factory;
use anyhow::{Context, Result, anyhow, ensure};
use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{self, ForkResult, Pid, fork};
use std::ffi::CString;
use std::io::Write;
use std::sync::Once;
use std::sync::atomic::{AtomicI32, Ordering};
use tracing::debug;

/// Process group id of the current foreground child, or 0 when none.
///
/// Shared between the normal control flow and the SIGINT handler; an atomic
/// i32 cannot be torn by interruption.
static FOREGROUND_PGID: AtomicI32 = AtomicI32::new(0);

static INSTALL: Once = Once::new();

/// Tests that fork share the one foreground field above; every test that
/// launches a child takes this lock, across modules.
#[cfg(test)]
pub(crate) static LAUNCH_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Async-signal-safe SIGINT handler: load one field, one kill(2), return.
/// No allocation, no buffered I/O, no other state touched.
extern "C" fn forward_to_foreground(signo: libc::c_int) {
    let pgid = FOREGROUND_PGID.load(Ordering::SeqCst);
    if pgid > 0 {
        unsafe {
            libc::kill(-pgid, signo);
        }
    }
}

/// Install the interrupt-forwarding handler, once, for the life of the
/// shell. `SA_RESTART` is deliberately not set so the blocking wait comes
/// back with `EINTR` and the launcher's retry loop decides what to do.
pub fn install_interrupt_forwarding() {
    INSTALL.call_once(|| {
        let action = SigAction::new(
            SigHandler::Handler(forward_to_foreground),
            SaFlags::empty(),
            SigSet::empty(),
        );
        // Installing a handler for SIGINT cannot fail with these arguments.
        unsafe {
            let _ = signal::sigaction(Signal::SIGINT, &action);
        }
    });
}

/// Current foreground process group, if a child is running.
pub fn foreground_pgid() -> Option<i32> {
    match FOREGROUND_PGID.load(Ordering::SeqCst) {
        0 => None,
        pgid => Some(pgid),
    }
}

/// Fork, place the child in a fresh process group, exec `argv`, and wait.
///
/// Returns the child's exit code; `128 + signo` when it died to a signal;
/// an error when the fork or the wait itself failed. A program that cannot
/// be exec'd exits the child with 127 after printing a diagnostic.
pub fn launch(argv: &[String]) -> Result<ExitCode> {
    ensure!(!argv.is_empty(), "empty argument vector");
    let cargs: Vec<CString> = argv
        .iter()
        .map(|arg| CString::new(arg.as_str()))
        .collect::<std::result::Result<_, _>>()
        .context("argument contains an interior NUL byte")?;

    match unsafe { fork() }.context("fork failed")? {
        ForkResult::Child => {
            // Best-effort: losing the fresh group only degrades forwarding
            // precision, the child still runs.
            let _ = unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0));

            if let Err(e) = unistd::execvp(&cargs[0], &cargs) {
                // This address space is a fresh copy of the parent; report
                // and leave via _exit so parent-side cleanup never runs here.
                let _ = writeln!(std::io::stderr(), "krill: {}: {}", argv[0], e.desc());
            }
            unsafe { libc::_exit(127) }
        }
        ForkResult::Parent { child } => {
            debug!(pid = child.as_raw(), program = %argv[0], "spawned child");
            // The child called setpgid(0, 0); its pid is its group id.
            FOREGROUND_PGID.store(child.as_raw(), Ordering::SeqCst);
            let status = wait_for(child);
            FOREGROUND_PGID.store(0, Ordering::SeqCst);
            status
        }
    }
}

/// Block until the child has exited or been killed by a signal. Retries
/// transparently on `EINTR` and keeps waiting through job-control stops.
fn wait_for(child: Pid) -> Result<ExitCode> {
    loop {
        match waitpid(child, Some(WaitPidFlag::WUNTRACED)) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(code),
            Ok(WaitStatus::Signaled(_, sig, _)) => return Ok(128 + sig as i32),
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(anyhow!("waitpid: {e}")),
        }
    }
}

/// Command that is not a built-in; resolved by `execvp` through PATH.
pub struct ExternalCommand {
    argv: Vec<String>,
}

impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(name.to_string());
        argv.extend(args.iter().map(|a| a.to_string()));
        Some(Box::new(ExternalCommand { argv }))
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(
        self: Box<Self>,
        _stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        launch(&self.argv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::thread;
    use std::time::Duration;

    fn sh(script: &str) -> Vec<String> {
        vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_normal_exit_code_is_passed_through() {
        let _lock = LAUNCH_LOCK.lock().unwrap();
        let code = launch(&sh("exit 3")).unwrap();
        assert_eq!(code, 3);
    }

    #[test]
    fn test_successful_command_yields_zero() {
        let _lock = LAUNCH_LOCK.lock().unwrap();
        let code = launch(&sh("true")).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn test_signal_death_maps_to_128_plus_signo() {
        let _lock = LAUNCH_LOCK.lock().unwrap();
        let code = launch(&sh("kill -9 $$")).unwrap();
        assert_eq!(code, 137);
    }

    #[test]
    fn test_missing_program_yields_127() {
        let _lock = LAUNCH_LOCK.lock().unwrap();
        let argv = vec!["krill-no-such-program-24680".to_string()];
        let code = launch(&argv).unwrap();
        assert_eq!(code, 127);
    }

    #[test]
    fn test_empty_argv_is_rejected() {
        assert!(launch(&[]).is_err());
    }

    #[test]
    fn test_foreground_record_is_cleared_after_reap() {
        let _lock = LAUNCH_LOCK.lock().unwrap();
        launch(&sh("true")).unwrap();
        assert_eq!(foreground_pgid(), None);
    }

    #[test]
    fn test_interrupt_is_forwarded_to_the_foreground_group() {
        let _lock = LAUNCH_LOCK.lock().unwrap();
        install_interrupt_forwarding();

        // raise SIGINT in the shell process whenever a foreground group is
        // published, until the launch below has returned
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        let raiser = thread::spawn(move || {
            while !flag.load(Ordering::SeqCst) {
                if foreground_pgid().is_some() {
                    let _ = signal::raise(Signal::SIGINT);
                }
                thread::sleep(Duration::from_millis(20));
            }
        });

        let code = launch(&sh("sleep 30")).unwrap();
        done.store(true, Ordering::SeqCst);
        raiser.join().unwrap();

        // the child died to the forwarded interrupt, long before its sleep
        // could finish
        assert_eq!(code, 128 + Signal::SIGINT as i32);
        assert_eq!(foreground_pgid(), None);
    }

    #[test]
    fn test_handler_without_foreground_child_is_a_no_op() {
        let _lock = LAUNCH_LOCK.lock().unwrap();
        assert_eq!(foreground_pgid(), None);
        // With no foreground group published, the handler must not signal
        // anything; reaching the next line proves the shell untouched.
        forward_to_foreground(libc::SIGINT);
    }
}
