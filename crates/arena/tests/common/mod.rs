//! Scripted UCI engines for the integration tests.
//!
//! Each engine is a small `/bin/sh` script written into a temp directory and
//! run as `sh <script>`, which avoids needing the executable bit. Every line
//! the script receives is appended to `<script>.log`.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use arena::uci_client::{Timeouts, UciClient};

const TEMPLATE: &str = r#"
n=0
while IFS= read -r line; do
  echo "$line" >> "$0.log"
  case "$line" in
    uci) echo "id name Scripted"; echo "id author Arena Tests"; echo "uciok" ;;
    isready) echo "readyok" ;;
    position*)
      set -- $line
      if [ $# -gt 2 ]; then n=$(($# - 3)); else n=0; fi
      ;;
    go*) ON_GO ;;
    quit) QUIT ;;
  esac
done
AFTER
"#;

/// Plays fool's mate from either side, keyed on the number of moves played.
pub const FOOLS_MATE: &str = r#"case $n in
        0) m=f2f3 ;;
        1) m=e7e5 ;;
        2) m=g2g4 ;;
        3) m=d8h4 ;;
        *) m=0000 ;;
      esac
      echo "info depth 1 score cp 10 nodes 20 pv $m"
      echo "bestmove $m""#;

/// Answers every search with `e2e4`.
pub const E2E4: &str = r#"echo "info depth 3 score cp 25"; echo "info depth 5 score cp 31 pv e2e4 e7e5"; echo "bestmove e2e4""#;

/// Never answers a search.
pub const SILENT: &str = ":";

pub fn engine(dir: &Path, name: &str, on_go: &str) -> PathBuf {
    script(dir, name, on_go, "exit 0", "")
}

/// An engine that ignores `quit` and keeps running after stdin closes.
pub fn stubborn_engine(dir: &Path, name: &str, on_go: &str) -> PathBuf {
    script(dir, name, on_go, ":", "exec sleep 30")
}

/// A script with arbitrary contents.
pub fn raw_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(format!("{}.sh", name));
    std::fs::write(&path, body).unwrap();
    path
}

fn script(dir: &Path, name: &str, on_go: &str, on_quit: &str, after: &str) -> PathBuf {
    let body = TEMPLATE
        .replace("ON_GO", on_go)
        .replace("QUIT", on_quit)
        .replace("AFTER", after);
    raw_script(dir, name, &body)
}

pub fn timeouts() -> Timeouts {
    Timeouts {
        handshake: Duration::from_secs(5),
        grace: Duration::from_millis(500),
        quit_grace: Duration::from_millis(500),
    }
}

pub fn client(label: &str, script: &Path) -> UciClient {
    client_with(label, script, timeouts())
}

pub fn client_with(label: &str, script: &Path, timeouts: Timeouts) -> UciClient {
    UciClient::new(
        label,
        "/bin/sh",
        vec![script.to_string_lossy().into_owned()],
        timeouts,
    )
}

/// Everything the script has received so far.
pub fn received(script: &Path) -> Vec<String> {
    let log = PathBuf::from(format!("{}.log", script.display()));
    std::fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}
