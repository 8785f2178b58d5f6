//! Logged-in session reader.
//!
//! Parses the classic utmp record file maintained by login(1) and friends.
//! Records are fixed-size; the offsets below are the glibc layout used on
//! 64-bit Linux. Only `USER_PROCESS` entries with a non-empty user name
//! describe live login sessions.

use super::MetricError;

/// One login session: who, on which terminal, and from where (if remote).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub user: String,
    pub terminal: String,
    pub remote_host: Option<String>,
}

const UTMP_PATH: &str = "/var/run/utmp";

/// glibc `struct utmp`, 64-bit Linux.
pub(crate) const RECORD_LEN: usize = 384;
const TYPE_OFFSET: usize = 0; // i16 ut_type
const LINE_OFFSET: usize = 8; // char ut_line[32]
const LINE_LEN: usize = 32;
const USER_OFFSET: usize = 44; // char ut_user[32]
const USER_LEN: usize = 32;
const HOST_OFFSET: usize = 76; // char ut_host[256]
const HOST_LEN: usize = 256;
const USER_PROCESS: i16 = 7;

/// Reads the live sessions from the system utmp file.
pub fn read_sessions() -> Result<Vec<Session>, MetricError> {
    let bytes = std::fs::read(UTMP_PATH)?;
    Ok(parse_records(&bytes))
}

/// Decodes utmp record bytes into sessions. Trailing partial records and
/// non-login entries are skipped.
pub fn parse_records(bytes: &[u8]) -> Vec<Session> {
    bytes
        .chunks_exact(RECORD_LEN)
        .filter_map(parse_record)
        .collect()
}

fn parse_record(record: &[u8]) -> Option<Session> {
    let kind = i16::from_ne_bytes([record[TYPE_OFFSET], record[TYPE_OFFSET + 1]]);
    if kind != USER_PROCESS {
        return None;
    }

    let user = fixed_str(&record[USER_OFFSET..USER_OFFSET + USER_LEN]);
    if user.is_empty() {
        return None;
    }
    let terminal = fixed_str(&record[LINE_OFFSET..LINE_OFFSET + LINE_LEN]);
    let host = fixed_str(&record[HOST_OFFSET..HOST_OFFSET + HOST_LEN]);

    Some(Session {
        user,
        terminal,
        remote_host: (!host.is_empty()).then_some(host),
    })
}

/// NUL-terminated fixed-width field to an owned string.
fn fixed_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: i16, user: &str, line: &str, host: &str) -> Vec<u8> {
        let mut rec = vec![0u8; RECORD_LEN];
        rec[TYPE_OFFSET..TYPE_OFFSET + 2].copy_from_slice(&kind.to_ne_bytes());
        rec[LINE_OFFSET..LINE_OFFSET + line.len()].copy_from_slice(line.as_bytes());
        rec[USER_OFFSET..USER_OFFSET + user.len()].copy_from_slice(user.as_bytes());
        rec[HOST_OFFSET..HOST_OFFSET + host.len()].copy_from_slice(host.as_bytes());
        rec
    }

    #[test]
    fn user_process_records_become_sessions() {
        let mut bytes = record(USER_PROCESS, "alice", "pts/0", "10.0.0.5");
        bytes.extend(record(USER_PROCESS, "bob", "tty1", ""));

        let sessions = parse_records(&bytes);
        assert_eq!(
            sessions,
            vec![
                Session {
                    user: "alice".into(),
                    terminal: "pts/0".into(),
                    remote_host: Some("10.0.0.5".into()),
                },
                Session {
                    user: "bob".into(),
                    terminal: "tty1".into(),
                    remote_host: None,
                },
            ]
        );
    }

    #[test]
    fn non_login_records_are_skipped() {
        // BOOT_TIME(2) and a USER_PROCESS with an empty user.
        let mut bytes = record(2, "reboot", "~", "");
        bytes.extend(record(USER_PROCESS, "", "pts/3", ""));
        assert!(parse_records(&bytes).is_empty());
    }

    #[test]
    fn trailing_partial_record_is_ignored() {
        let mut bytes = record(USER_PROCESS, "carol", "pts/2", "");
        bytes.extend([0u8; 100]);
        assert_eq!(parse_records(&bytes).len(), 1);
    }

    #[test]
    fn empty_file_yields_no_sessions() {
        assert!(parse_records(&[]).is_empty());
    }
}
