/// A parsed request line, tagged with its fixed-arity arguments.
///
/// Parsing is case-insensitive on the verb only; arguments preserve
/// whatever case the client sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ClientAuth(String),
    Quit,
    Login(String, String),
    Disable(String),
    Enable(String),
    Set(String, String, String),
    Get(String, String),
    GetKeys(String),
    ChangePassword(String, String, String),
    ChangeName(String, String, String),
    UserGroups(String),
    User(String, String),
    DeleteUser(String),
    Users,
    Add(String, String),
    Remove(String, String),
    DeleteGroup(String),
    Groups,
    GroupUsers(String),
    Group(String),
    Stats,
    LoginStats(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    UnknownFunc,
    MissingArgs,
}

type ParseResult = Result<Command, ParseError>;

/// Parses a single already-trimmed line into a [`Command`].
pub fn parse(line: &str) -> ParseResult {
    let mut parts = line.splitn(2, ' ');
    let verb = parts.next().unwrap_or("");
    let rest = parts.next();

    match verb.to_ascii_lowercase().as_str() {
        "login" => two_arg(rest, Command::Login),
        "set" => three_arg(rest, Command::Set),
        "get" => two_arg(rest, Command::Get),
        "getkeys" => one_arg(rest, Command::GetKeys),
        "stats" => Ok(Command::Stats),
        "loginstats" => one_arg(rest, Command::LoginStats),
        "add" => two_arg(rest, Command::Add),
        "remove" => two_arg(rest, Command::Remove),
        "enable" => one_arg(rest, Command::Enable),
        "disable" => one_arg(rest, Command::Disable),
        "user" => parse_user(rest),
        "group" => parse_group(rest),
        "delete" => parse_delete(rest),
        "change" => parse_change(rest),
        "client" => parse_client(rest),
        "quit" => Ok(Command::Quit),
        "groups" => Ok(Command::Groups),
        "users" => Ok(Command::Users),
        _ => Err(ParseError::UnknownFunc),
    }
}

fn parse_client(rest: Option<&str>) -> ParseResult {
    let rest = rest.ok_or(ParseError::UnknownFunc)?;
    let mut parts = rest.splitn(2, ' ');
    let sub = parts.next().unwrap_or("");
    let tail = parts.next();
    match sub.to_ascii_lowercase().as_str() {
        "auth" => one_arg(tail, Command::ClientAuth),
        _ => Err(ParseError::UnknownFunc),
    }
}

fn parse_change(rest: Option<&str>) -> ParseResult {
    let rest = rest.ok_or(ParseError::UnknownFunc)?;
    let mut parts = rest.splitn(2, ' ');
    let sub = parts.next().unwrap_or("");
    let tail = parts.next();
    match sub.to_ascii_lowercase().as_str() {
        "password" => three_arg(tail, Command::ChangePassword),
        "name" => three_arg(tail, Command::ChangeName),
        _ => Err(ParseError::UnknownFunc),
    }
}

fn parse_user(rest: Option<&str>) -> ParseResult {
    let rest = rest.ok_or(ParseError::MissingArgs)?;
    let mut parts = rest.splitn(2, ' ');
    let first = parts.next().unwrap_or("");
    let tail = parts.next();
    if first.eq_ignore_ascii_case("groups") {
        one_arg(tail, Command::UserGroups)
    } else {
        match tail {
            Some(second) => Ok(Command::User(first.to_string(), second.to_string())),
            None => Err(ParseError::MissingArgs),
        }
    }
}

fn parse_group(rest: Option<&str>) -> ParseResult {
    let rest = rest.ok_or(ParseError::MissingArgs)?;
    let mut parts = rest.splitn(2, ' ');
    let first = parts.next().unwrap_or("");
    let tail = parts.next();
    if first.eq_ignore_ascii_case("users") {
        one_arg(tail, Command::GroupUsers)
    } else {
        // `group <name>` is a single-argument command; the name is the
        // whole remainder, same as any other one-arg command.
        Ok(Command::Group(rest.to_string()))
    }
}

fn parse_delete(rest: Option<&str>) -> ParseResult {
    let rest = rest.ok_or(ParseError::UnknownFunc)?;
    let mut parts = rest.splitn(2, ' ');
    let sub = parts.next().unwrap_or("");
    let tail = parts.next();
    match sub.to_ascii_lowercase().as_str() {
        "user" => one_arg(tail, Command::DeleteUser),
        "group" => one_arg(tail, Command::DeleteGroup),
        _ => Err(ParseError::UnknownFunc),
    }
}

fn one_arg(rest: Option<&str>, ctor: impl FnOnce(String) -> Command) -> ParseResult {
    match rest {
        Some(arg) if !arg.is_empty() => Ok(ctor(arg.to_string())),
        _ => Err(ParseError::MissingArgs),
    }
}

fn two_arg(rest: Option<&str>, ctor: impl FnOnce(String, String) -> Command) -> ParseResult {
    let rest = rest.ok_or(ParseError::MissingArgs)?;
    let mut parts = rest.splitn(2, ' ');
    let a = parts.next().unwrap_or("");
    let b = parts.next();
    match b {
        Some(b) if !a.is_empty() => Ok(ctor(a.to_string(), b.to_string())),
        _ => Err(ParseError::MissingArgs),
    }
}

fn three_arg(rest: Option<&str>, ctor: impl FnOnce(String, String, String) -> Command) -> ParseResult {
    let rest = rest.ok_or(ParseError::MissingArgs)?;
    let mut parts = rest.splitn(3, ' ');
    let a = parts.next().unwrap_or("");
    let b = parts.next();
    let c = parts.next();
    match (b, c) {
        (Some(b), Some(c)) if !a.is_empty() => Ok(ctor(a.to_string(), b.to_string(), c.to_string())),
        _ => Err(ParseError::MissingArgs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_case_insensitive_args_preserved() {
        assert_eq!(
            parse("CLIent Auth Secret"),
            Ok(Command::ClientAuth("Secret".to_string()))
        );
        assert_eq!(
            parse("client auth Secret"),
            Ok(Command::ClientAuth("Secret".to_string()))
        );
    }

    #[test]
    fn user_create_vs_user_groups() {
        assert_eq!(
            parse("user alice s3cret"),
            Ok(Command::User("alice".to_string(), "s3cret".to_string()))
        );
        assert_eq!(
            parse("user groups alice"),
            Ok(Command::UserGroups("alice".to_string()))
        );
    }

    #[test]
    fn group_create_vs_group_users() {
        assert_eq!(parse("group admins"), Ok(Command::Group("admins".to_string())));
        assert_eq!(
            parse("group users admins"),
            Ok(Command::GroupUsers("admins".to_string()))
        );
    }

    #[test]
    fn missing_args() {
        assert_eq!(parse("login alice"), Err(ParseError::MissingArgs));
        assert_eq!(parse("set a b"), Err(ParseError::MissingArgs));
    }

    #[test]
    fn unknown_verb() {
        assert_eq!(parse("frobnicate"), Err(ParseError::UnknownFunc));
    }

    #[test]
    fn zero_arg_commands() {
        assert_eq!(parse("quit"), Ok(Command::Quit));
        assert_eq!(parse("stats"), Ok(Command::Stats));
        assert_eq!(parse("users"), Ok(Command::Users));
        assert_eq!(parse("groups"), Ok(Command::Groups));
    }
}
