//! Operation registry.
//!
//! Operations are registered once at startup into an explicit table and
//! dispatched by name or alias. Selectors are normalized so the underscore
//! spellings (`get_object_byte`) resolve to the same operation as the hyphenated
//! ones (`get-object-byte`).

use async_trait::async_trait;
use thaw_core::Error;

use crate::commands;
use crate::session::Session;

/// A named CLI operation.
#[async_trait]
pub trait Operation: Send + Sync {
    /// Canonical name.
    fn name(&self) -> &'static str;

    /// Alternative names.
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// One-line description.
    fn summary(&self) -> &'static str;

    /// Whether the operation talks to the storage service. Local operations
    /// run without a connection and do not print the readiness line.
    fn requires_store(&self) -> bool {
        true
    }

    /// Runs the operation.
    async fn run(&self, session: &Session) -> anyhow::Result<()>;
}

/// Table of registered operations.
#[derive(Default)]
pub struct CommandRegistry {
    operations: Vec<Box<dyn Operation>>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in operation.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(commands::buckets::ListBuckets));
        registry.register(Box::new(commands::objects::ListObjects));
        registry.register(Box::new(commands::restore::Restore));
        registry.register(Box::new(commands::fetch::GetObject));
        registry.register(Box::new(commands::delete::DeleteObject));
        registry.register(Box::new(commands::verify::VerifyByte));
        registry.register(Box::new(commands::verify::TestByteRestore));
        registry.register(Box::new(commands::restore::HeadObject));
        registry.register(Box::new(commands::restore::RestoreAndWaitAndFetch));

        let mut listing = registry.listing();
        listing.push(commands::list::LIST_COMMANDS_ENTRY);
        listing.sort_by_key(|(name, _)| *name);
        registry.register(Box::new(commands::list::ListCommands::new(listing)));
        registry
    }

    /// Adds an operation.
    pub fn register(&mut self, operation: Box<dyn Operation>) {
        self.operations.push(operation);
    }

    /// Canonical form of a selector.
    #[must_use]
    pub fn normalize(selector: &str) -> String {
        selector.trim().to_ascii_lowercase().replace('_', "-")
    }

    /// Finds the operation named by `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOperation`] for an unknown selector.
    pub fn lookup(&self, selector: &str) -> Result<&dyn Operation, Error> {
        let wanted = Self::normalize(selector);
        self.operations
            .iter()
            .find(|op| op.name() == wanted || op.aliases().iter().any(|alias| *alias == wanted))
            .map(|op| &**op)
            .ok_or_else(|| Error::UnsupportedOperation {
                name: selector.to_string(),
            })
    }

    /// Names and summaries of the registered operations.
    #[must_use]
    pub fn listing(&self) -> Vec<(&'static str, &'static str)> {
        self.operations
            .iter()
            .map(|op| (op.name(), op.summary()))
            .collect()
    }

    /// Number of registered operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.operations.iter().map(|op| op.name()))
            .finish()
    }
}
