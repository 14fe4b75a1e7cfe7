use std::sync::atomic::{AtomicI64, Ordering};

/// Server-level counters surfaced by the `stats` command, ahead of
/// whatever the storage backend appends to the same response.
#[derive(Default)]
pub struct Stats {
    connects: AtomicI64,
    disconnects: AtomicI64,
    logins: AtomicI64,
    failed_logins: AtomicI64,
    unrestricted_commands: AtomicI64,
    restricted_commands: AtomicI64,
    access_denied: AtomicI64,
}

impl Stats {
    pub fn new() -> Self {
        Stats::default()
    }

    pub fn connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login(&self) {
        self.logins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed_login(&self) {
        self.failed_logins.fetch_add(1, Ordering::Relaxed);
    }

    /// `CLIENT AUTH` and `QUIT` are always dispatchable, so they don't
    /// count toward either the restricted or unrestricted tally.
    pub fn unrestricted_command(&self) {
        self.unrestricted_commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn restricted_command(&self) {
        self.restricted_commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn access_denied(&self) {
        self.access_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> i64 {
        self.connects.load(Ordering::Relaxed) - self.disconnects.load(Ordering::Relaxed)
    }

    /// Rendered in `name:value` pairs, same shape the backend appends
    /// its own counters in.
    pub fn snapshot(&self) -> Vec<(String, i64)> {
        vec![
            ("connects".to_string(), self.connects.load(Ordering::Relaxed)),
            ("disconnects".to_string(), self.disconnects.load(Ordering::Relaxed)),
            ("active".to_string(), self.active_connections()),
            ("logins".to_string(), self.logins.load(Ordering::Relaxed)),
            ("failedlogins".to_string(), self.failed_logins.load(Ordering::Relaxed)),
            (
                "unrestrictedcommands".to_string(),
                self.unrestricted_commands.load(Ordering::Relaxed),
            ),
            (
                "restrictedcommands".to_string(),
                self.restricted_commands.load(Ordering::Relaxed),
            ),
            ("accessdenied".to_string(), self.access_denied.load(Ordering::Relaxed)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_connections_tracks_connect_disconnect() {
        let stats = Stats::new();
        stats.connect();
        stats.connect();
        stats.disconnect();
        assert_eq!(stats.active_connections(), 1);
    }

    #[test]
    fn snapshot_reflects_counters() {
        let stats = Stats::new();
        stats.login();
        stats.failed_login();
        stats.access_denied();
        let snap = stats.snapshot();
        assert!(snap.contains(&("logins".to_string(), 1)));
        assert!(snap.contains(&("failedlogins".to_string(), 1)));
        assert!(snap.contains(&("accessdenied".to_string(), 1)));
    }
}
