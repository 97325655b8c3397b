//! Vendor system prompts, loaded once at startup

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::vendor::Vendor;

/// Templates compiled into the binary, one per vendor
const BUNDLED: [(Vendor, &str); 4] = [
    (Vendor::Datadog, include_str!("../../prompts/datadog.md")),
    (Vendor::Github, include_str!("../../prompts/github.md")),
    (Vendor::NewRelic, include_str!("../../prompts/newrelic.md")),
    (Vendor::Aws, include_str!("../../prompts/aws.md")),
];

/// Lookup table of vendor system prompts with a generic fallback
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    templates: HashMap<Vendor, String>,
}

impl PromptLibrary {
    /// Library with no templates; every vendor gets the fallback prompt
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The templates shipped with the binary
    #[must_use]
    pub fn bundled() -> Self {
        Self {
            templates: BUNDLED
                .iter()
                .map(|(vendor, text)| (*vendor, (*text).to_string()))
                .collect(),
        }
    }

    /// Bundled templates, overridden by `<vendor>.md` files found in `dir`.
    ///
    /// A missing directory or file keeps the bundled template. Unreadable
    /// files are logged and skipped.
    pub fn load(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let mut library = Self::bundled();
        let mut overrides = 0;

        for vendor in Vendor::ALL {
            let path = dir.join(format!("{vendor}.md"));
            if !path.exists() {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    library.templates.insert(vendor, text);
                    overrides += 1;
                }
                Err(e) => {
                    warn!(vendor = %vendor, path = %path.display(), error = %e, "Failed to read prompt template");
                }
            }
        }

        if overrides == 0 {
            debug!(directory = %dir.display(), "No prompt overrides, using bundled templates");
        } else {
            info!(directory = %dir.display(), overrides, "Prompt templates loaded");
        }
        library
    }

    /// Register a template, replacing any existing one
    #[must_use]
    pub fn with_template(mut self, vendor: Vendor, text: impl Into<String>) -> Self {
        self.templates.insert(vendor, text.into());
        self
    }

    /// System prompt for `vendor`
    #[must_use]
    pub fn system_prompt(&self, vendor: Vendor) -> Cow<'_, str> {
        self.templates
            .get(&vendor)
            .map_or_else(|| Cow::Owned(fallback_prompt(vendor)), |t| Cow::Borrowed(t.as_str()))
    }
}

/// Generic instruction used when a vendor has no template
#[must_use]
pub fn fallback_prompt(vendor: Vendor) -> String {
    format!(
        "You are a {vendor} MCP server. Generate realistic responses based on the provided context."
    )
}
