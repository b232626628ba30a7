//! List-commands - print the operation registry.

use anyhow::Result;
use async_trait::async_trait;

use crate::registry::Operation;
use crate::session::Session;

/// Registry entry for [`ListCommands`] itself.
pub const LIST_COMMANDS_ENTRY: (&str, &str) = ("list-commands", "List valid commands");

/// Prints the usage line followed by every command name.
#[derive(Debug, Clone, Default)]
pub struct ListCommands {
    entries: Vec<(&'static str, &'static str)>,
}

impl ListCommands {
    /// Creates the listing from `(name, summary)` pairs, printed in order.
    #[must_use]
    pub fn new(entries: Vec<(&'static str, &'static str)>) -> Self {
        Self { entries }
    }

    /// Renders the listing.
    #[must_use]
    pub fn render(&self) -> String {
        let width = self.entries.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
        let mut text = String::from("Usage: thaw --command <command>\n\nCommands:\n");
        for (name, summary) in &self.entries {
            text.push_str(&format!("  {name:<width$}  {summary}\n"));
        }
        text
    }
}

#[async_trait]
impl Operation for ListCommands {
    fn name(&self) -> &'static str {
        LIST_COMMANDS_ENTRY.0
    }

    fn summary(&self) -> &'static str {
        LIST_COMMANDS_ENTRY.1
    }

    fn requires_store(&self) -> bool {
        false
    }

    async fn run(&self, _session: &Session) -> Result<()> {
        print!("{}", self.render());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CommandRegistry;

    #[test]
    fn renders_usage_and_aligned_entries() {
        let registry = CommandRegistry::builtin();
        let op = registry.lookup("list-commands").unwrap();
        assert!(!op.requires_store());

        let listing = ListCommands::new(vec![("b-cmd", "second"), ("a", "first")]);
        let text = listing.render();
        assert!(text.starts_with("Usage: thaw --command <command>\n"));
        assert!(text.contains("  b-cmd  second\n"));
        assert!(text.contains("  a      first\n"));
    }

    #[tokio::test]
    async fn runs_without_a_store() {
        let session = Session::offline(crate::Config::default());
        ListCommands::new(vec![LIST_COMMANDS_ENTRY])
            .run(&session)
            .await
            .unwrap();
    }
}
