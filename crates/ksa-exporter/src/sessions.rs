//! Session counting over sshd log lines
//!
//! A line is an opening marker when it contains `sshd`, then `Accepted`,
//! then `session`, in that order. It is a closing marker when it contains
//! `sshd` followed by `session closed`. A line that matches both counts as
//! an opening only.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Net count of opened minus closed sessions in `reader`, floored at zero.
///
/// The floor is applied once, after the whole log has been read. Lines that
/// are not valid UTF-8 are scanned lossily.
pub fn count_active_sessions<R: BufRead>(mut reader: R) -> io::Result<u64> {
    let mut active: i64 = 0;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);

        if is_session_open(&line) {
            active += 1;
        } else if is_session_close(&line) {
            active -= 1;
        }
    }

    Ok(active.max(0) as u64)
}

/// Count sessions in the log file at `path`
pub fn count_log_file(path: &Path) -> io::Result<u64> {
    let file = File::open(path)?;
    count_active_sessions(BufReader::new(file))
}

fn is_session_open(line: &str) -> bool {
    contains_in_order(line, &["sshd", "Accepted", "session"])
}

fn is_session_close(line: &str) -> bool {
    contains_in_order(line, &["sshd", "session closed"])
}

/// Whether every needle occurs in `haystack`, each after the end of the previous one
fn contains_in_order(haystack: &str, needles: &[&str]) -> bool {
    let mut rest = haystack;
    for needle in needles {
        match rest.find(needle) {
            Some(pos) => rest = &rest[pos + needle.len()..],
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(log: &str) -> u64 {
        count_active_sessions(log.as_bytes()).unwrap()
    }

    #[test]
    fn test_open_then_close() {
        assert_eq!(count("sshd: Accepted session\nsshd: session closed\n"), 0);
    }

    #[test]
    fn test_two_opens() {
        let log = "\
Oct 18 10:00:01 host sshd[101]: Accepted password for ns1-alice from 10.0.0.5 port 50022 ssh2 session 1
Oct 18 10:00:07 host sshd[102]: Accepted publickey for ns1-bob from 10.0.0.6 port 50100 ssh2 session 2
";
        assert_eq!(count(log), 2);
    }

    #[test]
    fn test_more_closes_than_opens_floors_at_zero() {
        let log = "\
sshd[1]: pam_unix(sshd:session): session closed for user a
sshd[2]: pam_unix(sshd:session): session closed for user b
sshd[3]: Accepted password for c session
";
        assert_eq!(count(log), 0);
    }

    #[test]
    fn test_floor_applies_only_at_end() {
        let log = "\
sshd: session closed
sshd: session closed
sshd: Accepted session
sshd: Accepted session
sshd: Accepted session
";
        assert_eq!(count(log), 1);
    }

    #[test]
    fn test_markers_must_appear_in_order() {
        assert_eq!(count("session Accepted sshd\n"), 0);
        assert_eq!(count("Accepted sshd session\n"), 0);
        assert_eq!(count("cron: Accepted session\n"), 0);
    }

    #[test]
    fn test_line_matching_both_counts_as_open() {
        assert!(is_session_open("sshd: Accepted session closed"));
        assert_eq!(count("sshd: Accepted session closed\n"), 1);
    }

    #[test]
    fn test_last_line_without_newline() {
        assert_eq!(count("sshd: Accepted session"), 1);
    }

    #[test]
    fn test_invalid_utf8_is_tolerated() {
        let log: &[u8] = b"sshd: Accepted \xff session\n";
        assert_eq!(count_active_sessions(log).unwrap(), 1);
    }

    #[test]
    fn test_empty_log() {
        assert_eq!(count(""), 0);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(count_log_file(Path::new("/nonexistent/auth.log")).is_err());
    }
}
