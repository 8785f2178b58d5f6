use crate::metrics::Session;

/// Section divider used throughout the report (39 dashes, as wide as the
/// memory header line).
pub const SEPARATOR: &str = "---------------------------------------";

/// Formats a byte count in decimal gigabytes with two decimals.
pub fn format_gb(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 * 1e-9)
}

/// Byte count as a decimal-GB scalar, the unit the delta encoder works in.
pub fn gb(bytes: u64) -> f64 {
    bytes as f64 * 1e-9
}

pub fn format_session(session: &Session) -> String {
    match &session.remote_host {
        Some(host) => format!(" {}\t{} ({})", session.user, session.terminal, host),
        None => format!(" {}\t{} ", session.user, session.terminal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_gigabytes() {
        assert_eq!(format_gb(2_430_000_000), "2.43 GB");
        assert_eq!(format_gb(0), "0.00 GB");
        assert_eq!(format_gb(16_330_000_000), "16.33 GB");
    }

    #[test]
    fn session_row_with_and_without_host() {
        let remote = Session {
            user: "alice".into(),
            terminal: "pts/0".into(),
            remote_host: Some("10.0.0.5".into()),
        };
        assert_eq!(format_session(&remote), " alice\tpts/0 (10.0.0.5)");

        let local = Session {
            user: "bob".into(),
            terminal: "tty1".into(),
            remote_host: None,
        };
        assert_eq!(format_session(&local), " bob\ttty1 ");
    }
}
