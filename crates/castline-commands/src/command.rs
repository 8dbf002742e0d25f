//! Command parsing.

use castline_core::config::CommandsConfig;

/// A parsed command. Transient, built per inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Lower-cased verb.
    pub verb: String,
    /// Everything after the first separator, trimmed.
    pub args_text: String,
    /// The verb expands into a broadcast. Set by the router once the handler is known.
    pub is_nested: bool,
}

/// Marker and separator characters of the command language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSyntax {
    pub marker: char,
    pub separator: char,
}

impl Default for CommandSyntax {
    fn default() -> Self {
        Self {
            marker: '!',
            separator: ':',
        }
    }
}

impl From<&CommandsConfig> for CommandSyntax {
    fn from(config: &CommandsConfig) -> Self {
        Self {
            marker: config.marker,
            separator: config.separator,
        }
    }
}

impl CommandSyntax {
    /// Whether `text` starts with the command marker.
    pub fn is_command(&self, text: &str) -> bool {
        text.trim_start().starts_with(self.marker)
    }

    /// Parse `text`; `None` unless it begins with the marker.
    pub fn parse(&self, text: &str) -> Option<Command> {
        let body = text.trim().strip_prefix(self.marker)?;
        let (verb, args_text) = body.split_once(self.separator).unwrap_or((body, ""));
        let args_text = args_text.trim().to_string();
        Some(Command {
            verb: verb.trim().to_lowercase(),
            args_text,
            is_nested: false,
        })
    }

    /// How a verb is written, e.g. `!enviar`.
    pub fn render(&self, verb: &str) -> String {
        format!("{}{}", self.marker, verb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verb_only() {
        let cmd = CommandSyntax::default().parse("  !HELP ").unwrap();
        assert_eq!(cmd.verb, "help");
        assert_eq!(cmd.args_text, "");
        assert!(!cmd.is_nested);
    }

    #[test]
    fn test_parse_splits_on_first_separator() {
        let cmd = CommandSyntax::default()
            .parse("!enviar: Corte 10:30 hs")
            .unwrap();
        assert_eq!(cmd.verb, "enviar");
        assert_eq!(cmd.args_text, "Corte 10:30 hs");
    }

    #[test]
    fn test_parse_nested_command_argument() {
        let cmd = CommandSyntax::default().parse("!enviar:!tormenta").unwrap();
        assert_eq!(cmd.args_text, "!tormenta");
        assert!(CommandSyntax::default().is_command(&cmd.args_text));
    }

    #[test]
    fn test_non_command_text() {
        let syntax = CommandSyntax::default();
        assert!(syntax.parse("hola").is_none());
        assert!(!syntax.is_command("hola !help"));
    }

    #[test]
    fn test_custom_syntax() {
        let syntax = CommandSyntax {
            marker: '/',
            separator: ' ',
        };
        let cmd = syntax.parse("/send hello world").unwrap();
        assert_eq!(cmd.verb, "send");
        assert_eq!(cmd.args_text, "hello world");
        assert_eq!(syntax.render("send"), "/send");
    }
}
