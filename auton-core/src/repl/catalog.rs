//! Static command catalog shared by the parser and host help output.

/// Command keywords recognized by the REPL.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandTag {
    Run,
    Advance,
    Remaining,
    Play,
    Stages,
    Status,
    Reset,
    Help,
}

/// Catalog entry describing a command keyword and its usage line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub usage: &'static str,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "run",
        tag: CommandTag::Run,
        usage: "run                      - dispatch one tick at the current clock",
    },
    CommandSpec {
        name: "advance",
        tag: CommandTag::Advance,
        usage: "advance <duration>       - move the clock forward (e.g. 500ms, 2s)",
    },
    CommandSpec {
        name: "remaining",
        tag: CommandTag::Remaining,
        usage: "remaining [-]<seconds>   - set the time left in the period",
    },
    CommandSpec {
        name: "play",
        tag: CommandTag::Play,
        usage: "play [<duration>]        - tick until the period expires (default 20ms)",
    },
    CommandSpec {
        name: "stages",
        tag: CommandTag::Stages,
        usage: "stages                   - list registered stage thresholds",
    },
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        usage: "status                   - show clock, tick count, and last outcome",
    },
    CommandSpec {
        name: "reset",
        tag: CommandTag::Reset,
        usage: "reset                    - restore the full period and clear stats",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        usage: "help [topic]             - show help for a command",
    },
];

/// Finds a command by keyword, ignoring ASCII case.
pub fn find(keyword: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|spec| spec.name.eq_ignore_ascii_case(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_unique() {
        for (index, spec) in COMMANDS.iter().enumerate() {
            assert!(
                COMMANDS[index + 1..]
                    .iter()
                    .all(|other| !other.name.eq_ignore_ascii_case(spec.name))
            );
        }
    }

    #[test]
    fn usage_lines_start_with_keyword() {
        for spec in COMMANDS {
            assert!(spec.usage.starts_with(spec.name));
        }
    }

    #[test]
    fn find_is_case_insensitive() {
        assert_eq!(find("PLAY").map(|spec| spec.tag), Some(CommandTag::Play));
        assert_eq!(find("reboot"), None);
    }
}
