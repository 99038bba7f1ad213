//! Chat command parsing and the bot's static replies.

use std::sync::OnceLock;

use regex::Regex;

use crate::resolver::ChannelRef;

pub const WELCOME_TEXT: &str = ":wave: *Hi! I'm the Slack search bot!*

:mag: *How to use:*
• `search #channel keyword` - Search a channel
• `help` - Show every command
• `history` - Your search history

*Quick example:*
`search #general deploy`

Type `search` to get started!";

pub const HELP_TEXT: &str = ":robot_face: *Available commands:*

:mag: *Search:*
 • `search #channel keyword` - Find a keyword in a channel
 • `search #channel \"exact phrase\"` - Find an exact phrase
 • `search #channel /pattern/` - Find messages matching a regular expression

:bar_chart: *Info:*
 • `history` - Your latest searches
 • `stats #channel` - Channel statistics
 • `help` - This message

:bulb: *Tips:*
 • Type just `search` to see how it works
 • Quote phrases: `search #general \"hello world\"`
 • Say `hi` or `hello` for a welcome message

*Examples:*
 • `search #general deploy`
 • `search #random \"hello world\"`
 • `stats #general`";

pub const SEARCH_USAGE_TEXT: &str = ":mag: *Search command*

To search a channel, use:
`search #channel keyword`

*Examples:*
• `search #general deploy`
• `search #random \"hello world\"`

Type `help` to see every command.";

pub const SEARCH_MALFORMED_TEXT: &str = ":question: *Wrong format*

The command is:
`search #channel keyword`

*Examples:*
• `search #general deploy`
• `search #random \"hello world\"`

Type `help` to see every command.";

pub const STATS_USAGE_TEXT: &str = ":bar_chart: Usage: `stats #channel`";

pub const UNKNOWN_TEXT: &str =
    ":question: Unknown command. Type `help` to see the available commands.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Greeting,
    Help,
    History,
    Stats(ChannelRef),
    StatsUsage,
    SearchUsage,
    Search { channel: ChannelRef, query: String },
    SearchMalformed,
    Unknown,
}

fn search_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^search\s+(\S+)\s+(.+)$").expect("search command regex is valid")
    })
}

impl BotCommand {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let lower = text.to_lowercase();

        match lower.as_str() {
            "hi" | "hello" | "oi" | "olá" | "ola" => return BotCommand::Greeting,
            "help" => return BotCommand::Help,
            "history" => return BotCommand::History,
            "stats" => return BotCommand::StatsUsage,
            "search" => return BotCommand::SearchUsage,
            _ => {}
        }

        if let Some(caps) = search_re().captures(text) {
            return BotCommand::Search {
                channel: ChannelRef::parse(&caps[1]),
                query: caps[2].trim().to_string(),
            };
        }
        if lower.starts_with("search") {
            return BotCommand::SearchMalformed;
        }

        let mut words = text.split_whitespace();
        if words.next().is_some_and(|w| w.eq_ignore_ascii_case("stats")) {
            if let Some(ch) = words.next() {
                return BotCommand::Stats(ChannelRef::parse(ch));
            }
        }

        BotCommand::Unknown
    }

    /// Reply for commands that need no Slack call.
    pub fn static_reply(&self) -> Option<&'static str> {
        match self {
            BotCommand::Greeting => Some(WELCOME_TEXT),
            BotCommand::Help => Some(HELP_TEXT),
            BotCommand::StatsUsage => Some(STATS_USAGE_TEXT),
            BotCommand::SearchUsage => Some(SEARCH_USAGE_TEXT),
            BotCommand::SearchMalformed => Some(SEARCH_MALFORMED_TEXT),
            BotCommand::Unknown => Some(UNKNOWN_TEXT),
            BotCommand::History | BotCommand::Stats(_) | BotCommand::Search { .. } => None,
        }
    }
}
