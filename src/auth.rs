use crate::config::AuthRule;

/// Index into the pinned rule list (`Settings::rules`). `None` means
/// the connection has not completed `client auth` yet.
pub type PinnedRule = Option<usize>;

/// Evaluates the allow/deny rule pinned to a connection against a
/// command line, and the `client auth` handshake that pins one.
pub struct Authorizer<'a> {
    rules: &'a [AuthRule],
}

impl<'a> Authorizer<'a> {
    pub fn new(rules: &'a [AuthRule]) -> Self {
        Authorizer { rules }
    }

    /// First-match-wins lookup of `passwd` among the configured rules.
    /// Returns the index to pin on the connection, or `None` if no
    /// rule's `passwd` matches (caller responds `EPERM`).
    pub fn client_auth(&self, passwd: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.passwd == passwd)
    }

    /// Whether `line` (not yet lower-cased by the caller) may be
    /// dispatched given the connection's pinned rule, if any.
    ///
    /// An empty rule list means the daemon is open: everything is
    /// permitted. Otherwise a restricted command requires a pinned
    /// rule, and the pinned rule's regex decides allow vs. deny.
    pub fn authorized(&self, pinned: PinnedRule, line: &str) -> bool {
        if self.rules.is_empty() {
            return true;
        }
        match pinned {
            None => false,
            Some(idx) => {
                let rule = &self.rules[idx];
                let lowered = line.to_ascii_lowercase();
                let matches = rule.regex.is_match(&lowered);
                (rule.allow && matches) || (!rule.allow && !matches)
            }
        }
    }
}
