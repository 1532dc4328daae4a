//! Canned replies for slash commands.

use crate::chatbot::event::CommandCall;
use crate::chatbot::handlers::{HandlerKind, HandlerSet};

struct CommandEntry {
    kind: HandlerKind,
    name: &'static str,
    description: &'static str,
}

const COMMANDS: &[CommandEntry] = &[
    CommandEntry {
        kind: HandlerKind::Start,
        name: "start",
        description: "Saludo de bienvenida",
    },
    CommandEntry {
        kind: HandlerKind::Help,
        name: "help",
        description: "Muestra los comandos disponibles",
    },
];

/// Static command name → reply lookup. Makes no external calls.
pub struct CommandDispatcher {
    greeting: String,
    enabled: HandlerSet,
    bot_username: Option<String>,
}

impl CommandDispatcher {
    pub fn new(greeting: String, enabled: HandlerSet, bot_username: Option<String>) -> Self {
        Self {
            greeting,
            enabled,
            bot_username,
        }
    }

    /// Reply for `call`, or `None` when the command is unknown, disabled,
    /// or addressed to another bot.
    pub fn dispatch(&self, call: &CommandCall) -> Option<String> {
        if let (Some(addressee), Some(me)) = (&call.addressee, &self.bot_username) {
            if !addressee.eq_ignore_ascii_case(me) {
                return None;
            }
        }

        let entry = self.enabled_commands().find(|c| c.name == call.name)?;
        Some(match entry.kind {
            HandlerKind::Start => self.greeting.clone(),
            HandlerKind::Help => self.help_text(),
            HandlerKind::Voice | HandlerKind::Text => return None,
        })
    }

    /// `(name, description)` of every enabled command, for the bot menu.
    pub fn menu(&self) -> Vec<(&'static str, &'static str)> {
        self.enabled_commands().map(|c| (c.name, c.description)).collect()
    }

    fn enabled_commands(&self) -> impl Iterator<Item = &'static CommandEntry> + '_ {
        COMMANDS.iter().filter(|c| self.enabled.contains(c.kind))
    }

    fn help_text(&self) -> String {
        let mut text = String::from("Comandos disponibles:");
        for (name, description) in self.menu() {
            text.push_str(&format!("\n/{name} - {description}"));
        }
        if self.enabled.contains(HandlerKind::Voice) {
            text.push_str("\n\nEnvíame una nota de voz y te respondo.");
        }
        if self.enabled.contains(HandlerKind::Text) {
            text.push_str("\nTambién puedes escribirme.");
        }
        text
    }
}
