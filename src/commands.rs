use crate::supervisor::{AddOutcome, RemoveOutcome, SourceSupervisor};

pub const USAGE: &str = "commands:\n  \
    add-source <identifier>     start tracking a source\n  \
    remove-source <identifier>  stop tracking a source\n  \
    list-sources                show tracked sources\n  \
    check                       run one poll cycle now\n  \
    help                        show this message";

/// One operator command, mapped 1:1 to a supervisor method.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    AddSource(String),
    RemoveSource(String),
    ListSources,
    Check,
    Help,
}

/// Parse a command line. Anything malformed yields the usage message as the
/// error, never a panic.
pub fn parse(line: &str) -> std::result::Result<Command, &'static str> {
    let mut words = line.split_whitespace();
    let verb = words.next().ok_or(USAGE)?;
    let arg = words.next();

    // A trailing extra word is malformed, not silently ignored.
    if words.next().is_some() {
        return Err(USAGE);
    }

    match (verb, arg) {
        ("add-source", Some(id)) => Ok(Command::AddSource(id.to_string())),
        ("remove-source", Some(id)) => Ok(Command::RemoveSource(id.to_string())),
        ("list-sources", None) => Ok(Command::ListSources),
        ("check", None) => Ok(Command::Check),
        ("help", None) => Ok(Command::Help),
        _ => Err(USAGE),
    }
}

/// Execute a parsed command against the supervisor, returning the reply text.
pub async fn execute(supervisor: &SourceSupervisor, command: Command) -> String {
    match command {
        Command::AddSource(id) => match supervisor.add_source(&id).await {
            AddOutcome::Added => format!("now tracking {id}"),
            AddOutcome::AlreadyTracked => format!("{id} is already tracked"),
        },
        Command::RemoveSource(id) => match supervisor.remove_source(&id).await {
            RemoveOutcome::Removed => format!("stopped tracking {id}"),
            RemoveOutcome::NotTracked => format!("{id} is not tracked"),
        },
        Command::ListSources => {
            let sources = supervisor.list_sources().await;
            if sources.is_empty() {
                "no sources tracked".to_string()
            } else {
                sources.join("\n")
            }
        }
        Command::Check => {
            let report = supervisor.run_cycle().await;
            format!(
                "checked {} source(s), relayed {} item(s)",
                report.sources, report.relayed
            )
        }
        Command::Help => USAGE.to_string(),
    }
}
