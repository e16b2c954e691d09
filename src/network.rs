//! Network identity: which WiFi network the Pi is on right now.
//!
//! The sensor lives on the plant pot's own access point, so the loop only
//! polls it when the current SSID starts with the configured prefix.

use log::{debug, warn};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Source of the current network name.
pub trait NetworkIdentity {
    /// Current SSID, or `None` when not associated or unknown.
    fn current(&self) -> Option<String>;
}

/// How long the SSID lookup may take before it is abandoned
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Reads the SSID with `iwgetid -r` (wireless-tools).
///
/// The lookup is killed after [`LOOKUP_TIMEOUT`] and reported as unknown.
#[derive(Clone, Debug)]
pub struct Iwgetid {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl Default for Iwgetid {
    fn default() -> Self {
        Self::with_command("iwgetid", &["-r"], LOOKUP_TIMEOUT)
    }
}

impl Iwgetid {
    /// Run `program args..` instead, printing the SSID on stdout.
    pub fn with_command(program: &str, args: &[&str], timeout: Duration) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout,
        }
    }
}

impl NetworkIdentity for Iwgetid {
    fn current(&self) -> Option<String> {
        let mut child = match Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                debug!("{} unavailable: {}", self.program, e);
                return None;
            }
        };

        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
                Ok(None) => {
                    warn!("{} did not answer within {:?}", self.program, self.timeout);
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
                Err(e) => {
                    debug!("waiting for {} failed: {}", self.program, e);
                    return None;
                }
            }
        }

        let output = child.wait_with_output().ok()?;
        if !output.status.success() {
            return None;
        }
        parse_ssid(&output.stdout)
    }
}

/// A fixed identity, for development on machines without WiFi tooling.
#[derive(Clone, Debug, Default)]
pub struct StaticIdentity(pub Option<String>);

impl NetworkIdentity for StaticIdentity {
    fn current(&self) -> Option<String> {
        self.0.clone()
    }
}

fn parse_ssid(stdout: &[u8]) -> Option<String> {
    let ssid = String::from_utf8_lossy(stdout).trim().to_string();
    (!ssid.is_empty()).then_some(ssid)
}

/// True when `ssid` is present and starts with `prefix`.
pub fn matches_prefix(ssid: Option<&str>, prefix: &str) -> bool {
    ssid.is_some_and(|ssid| ssid.starts_with(prefix))
}
