use serde::{Deserialize, Serialize};

/// One command of a skill, as produced by the catalog scanner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    pub keywords: Vec<String>,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            keywords: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }
}

/// A skill and its commands, the indexing unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillSpec {
    pub name: String,
    pub description: String,
    pub routing_keywords: Vec<String>,
    pub intents: Vec<String>,
    pub commands: Vec<CommandSpec>,
}

impl SkillSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_command(mut self, command: CommandSpec) -> Self {
        self.commands.push(command);
        self
    }

    #[must_use]
    pub fn with_intents(mut self, intents: &[&str]) -> Self {
        self.intents = intents.iter().map(|i| i.to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_routing_keywords(mut self, keywords: &[&str]) -> Self {
        self.routing_keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }
}
