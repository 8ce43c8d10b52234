//! `EXEC` (spec §4.3, flagged a security concern in §9): runs a file's body
//! through a shell and returns captured stdout+stderr, bounded to a
//! configured byte cap and wall-clock timeout. Disabled by default
//! (`exec_enabled = false`); hardened deployments should leave it off.

use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

pub async fn run(body: &str, output_cap_bytes: usize, timeout_secs: u64) -> Result<Vec<u8>, String> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(body)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("failed to spawn shell: {e}"))?;

    let mut stdout = child.stdout.take().expect("piped stdout");
    let mut stderr = child.stderr.take().expect("piped stderr");

    let collect = async {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let _ = stdout.read_to_end(&mut out).await;
        let _ = stderr.read_to_end(&mut err).await;
        out.extend_from_slice(&err);
        out
    };

    let result = tokio::time::timeout(Duration::from_secs(timeout_secs), async {
        let output = collect.await;
        let _ = child.wait().await;
        output
    })
    .await;

    match result {
        Ok(mut output) => {
            output.truncate(output_cap_bytes);
            Ok(output)
        }
        Err(_) => {
            let _ = child.start_kill();
            Err("exec timed out".to_string())
        }
    }
}
