use std::{collections::HashMap, fmt::Display, path::Path};

use chrono::Local;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persistence::{self, PersistenceError};

/// A [ThreadMemory] keeps one [Conversation] per thread id.
/// It plays the role of an in-memory checkpointer: an agent reloads the history of
/// a thread before each turn and writes it back afterwards.
#[derive(Clone, Default, Serialize)]
pub struct ThreadMemory(pub DashMap<String, Conversation>);

impl ThreadMemory {
    pub fn new() -> Self {
        Self(DashMap::new())
    }

    /// Append a message to the conversation of `thread`, creating it if needed.
    ///
    /// # Arguments
    ///
    /// * `thread` - The thread the conversation belongs to.
    /// * `conversation_owner` - The owner of the conversation, used when it is created.
    /// * `role` - The role of the message.
    /// * `message` - The text to add.
    pub fn add(
        &self,
        thread: impl Into<String>,
        conversation_owner: impl Into<String>,
        role: Role,
        message: impl Into<String>,
    ) {
        let mut conversation = self
            .0
            .entry(thread.into())
            .or_insert_with(|| Conversation::new(conversation_owner.into()));
        conversation.add(role, message.into());
    }

    /// Snapshot of the history of `thread`. Unknown threads have an empty history.
    pub fn history(&self, thread: &str) -> Vec<Message> {
        self.0
            .get(thread)
            .map(|conversation| conversation.history.clone())
            .unwrap_or_default()
    }

    /// Replace the history of `thread`.
    pub fn store(
        &self,
        thread: impl Into<String>,
        owner: impl Into<String>,
        history: Vec<Message>,
    ) {
        let mut conversation = self
            .0
            .entry(thread.into())
            .or_insert_with(|| Conversation::new(owner.into()));
        conversation.history = history;
    }

    pub fn forget(&self, thread: &str) -> bool {
        self.0.remove(thread).is_some()
    }

    pub fn thread_count(&self) -> usize {
        self.0.len()
    }
}

/// A [Conversation] is the ordered message history of one agent.
#[derive(Clone, Debug, Serialize)]
pub struct Conversation {
    agent_name: String,
    pub history: Vec<Message>,
}

impl Conversation {
    pub fn new(agent_name: String) -> Self {
        Self {
            agent_name,
            history: Vec::new(),
        }
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Add a text message to the conversation history.
    pub fn add(&mut self, role: Role, message: String) {
        self.push(Message::new(role, Content::Text(message)));
    }

    pub fn push(&mut self, message: Message) {
        self.history.push(message);
    }

    /// Delete a message from the conversation history.
    pub fn delete(&mut self, index: usize) -> Option<Message> {
        (index < self.history.len()).then(|| self.history.remove(index))
    }

    /// Update a message in the conversation history. Returns false if `index` is out of range.
    pub fn update(&mut self, index: usize, role: Role, content: Content) -> bool {
        match self.history.get_mut(index) {
            Some(message) => {
                message.role = role;
                message.content = content;
                true
            }
            None => false,
        }
    }

    pub fn query(&self, index: usize) -> Option<&Message> {
        self.history.get(index)
    }

    pub fn last(&self) -> Option<&Message> {
        self.history.last()
    }

    /// Messages whose rendered content contains `keyword`.
    pub fn search(&self, keyword: &str) -> Vec<&Message> {
        self.history
            .iter()
            .filter(|message| message.content.to_string().contains(keyword))
            .collect()
    }

    // Clear the conversation history.
    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn to_json(&self) -> Result<String, ConversationError> {
        Ok(serde_json::to_string(&self.history)?)
    }

    /// Export the text messages to a file; the content can be read back by `import_from_file`.
    pub async fn export_to_file(&self, filepath: &Path) -> Result<(), ConversationError> {
        let data = self.to_string();
        persistence::save_to_file(data.as_bytes(), filepath).await?;
        Ok(())
    }

    /// Import a history written by `export_to_file`, replacing the current one.
    pub async fn import_from_file(&mut self, filepath: &Path) -> Result<(), ConversationError> {
        let data = persistence::load_from_file(filepath).await?;
        let data = String::from_utf8_lossy(&data);
        self.history = parse_transcript(&data)?;
        Ok(())
    }

    /// Count the number of messages by role
    pub fn count_messages_by_role(&self) -> HashMap<String, usize> {
        let mut count = HashMap::new();
        for message in &self.history {
            *count.entry(message.role.to_string()).or_insert(0) += 1;
        }
        count
    }
}

// M4n5ter(User): hello
fn parse_transcript(data: &str) -> Result<Vec<Message>, ConversationError> {
    data.lines()
        .enumerate()
        .filter(|(_, line)| !line.is_empty())
        .map(|(number, line)| {
            let (speaker, text) = line
                .split_once(": ")
                .ok_or(ConversationError::MalformedLine(number + 1))?;
            let role = Role::parse(speaker).ok_or(ConversationError::MalformedLine(number + 1))?;
            let text = unescape_line(text);
            Ok(Message::new(role, Content::Text(text)))
        })
        .collect()
}

// One message per line: backslashes and line breaks are escaped.
fn escape_line(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn unescape_line(line: &str) -> String {
    let mut text = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => text.push('\n'),
                Some('r') => text.push('\r'),
                Some(other) => text.push(other),
                None => text.push('\\'),
            }
        } else {
            text.push(c);
        }
    }
    text
}

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("Json error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("FilePersistence error: {0}")]
    FilePersistenceError(#[from] PersistenceError),
    #[error("Malformed transcript line {0}")]
    MalformedLine(usize),
}

/// A [Message] consists of a [Role], a [Content] and the local unix time it was created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
    pub timestamp: i64,
}

impl Message {
    pub fn new(role: Role, content: Content) -> Self {
        Self {
            role,
            content,
            timestamp: Local::now().timestamp(),
        }
    }

    pub fn user(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(Role::User(name.into()), Content::Text(text.into()))
    }

    pub fn assistant(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(Role::Assistant(name.into()), Content::Text(text.into()))
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Content::Text(text) => Some(text),
            Content::ToolCalls(_) | Content::ToolResults(_) => None,
        }
    }

    pub fn tool_calls(&self) -> &[ToolInvocation] {
        match &self.content {
            Content::ToolCalls(calls) => calls,
            Content::Text(_) | Content::ToolResults(_) => &[],
        }
    }
}

/// A [Role] identifies the sender of a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User(String),
    Assistant(String),
    Tool(String),
}

impl Role {
    fn parse(speaker: &str) -> Option<Self> {
        if let Some(name) = speaker.strip_suffix("(User)") {
            Some(Role::User(name.to_owned()))
        } else if let Some(name) = speaker.strip_suffix("(Assistant)") {
            Some(Role::Assistant(name.to_owned()))
        } else {
            speaker
                .strip_suffix("(Tool)")
                .map(|name| Role::Tool(name.to_owned()))
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Content {
    Text(String),
    ToolCalls(Vec<ToolInvocation>),
    ToolResults(Vec<ToolOutcome>),
}

/// A tool call requested by a model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// The observation produced by running a [ToolInvocation].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub id: String,
    pub name: String,
    pub output: String,
}

impl Display for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for message in &self.history {
            if let Content::Text(text) = &message.content {
                writeln!(f, "{}: {}", message.role, escape_line(text))?;
            }
        }
        Ok(())
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User(name) => write!(f, "{name}(User)"),
            Role::Assistant(name) => write!(f, "{name}(Assistant)"),
            Role::Tool(name) => write!(f, "{name}(Tool)"),
        }
    }
}

impl Display for Content {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Content::Text(text) => f.pad(text),
            Content::ToolCalls(calls) => {
                let calls = calls
                    .iter()
                    .map(|call| format!("{}({})", call.name, call.arguments))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "[tool calls: {calls}]")
            }
            Content::ToolResults(results) => {
                for (i, result) in results.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "[{}] {}", result.name, result.output)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Conversation {
        let mut conversation = Conversation::new("Assistant".to_owned());
        conversation.add(Role::User("User".to_owned()), "What is the weather?".to_owned());
        conversation.add(
            Role::Assistant("Assistant".to_owned()),
            "Sunny,\nwith light wind.".to_owned(),
        );
        conversation
    }

    #[test]
    fn query_delete_and_update_respect_bounds() {
        let mut conversation = sample();

        assert!(conversation.query(5).is_none());
        assert!(conversation.delete(5).is_none());
        assert!(!conversation.update(9, Role::User("x".to_owned()), Content::Text("y".to_owned())));

        assert!(conversation.update(
            0,
            Role::User("User".to_owned()),
            Content::Text("Is it raining?".to_owned())
        ));
        assert_eq!(conversation.query(0).unwrap().text(), Some("Is it raining?"));

        let removed = conversation.delete(0).unwrap();
        assert_eq!(removed.role, Role::User("User".to_owned()));
        assert_eq!(conversation.len(), 1);
    }

    #[test]
    fn search_and_count() {
        let conversation = sample();

        assert_eq!(conversation.search("Sunny").len(), 1);
        assert!(conversation.search("snow").is_empty());

        let counts = conversation.count_messages_by_role();
        assert_eq!(counts["User(User)"], 1);
        assert_eq!(counts["Assistant(Assistant)"], 1);
    }

    #[tokio::test]
    async fn transcript_survives_export_and_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.txt");
        let conversation = sample();

        conversation.export_to_file(&path).await.unwrap();

        let mut restored = Conversation::new("Assistant".to_owned());
        restored.import_from_file(&path).await.unwrap();

        let texts: Vec<_> = restored.history.iter().filter_map(Message::text).collect();
        assert_eq!(texts, ["What is the weather?", "Sunny,\nwith light wind."]);
        assert_eq!(restored.history[1].role, Role::Assistant("Assistant".to_owned()));
    }

    #[tokio::test]
    async fn transcript_keeps_backslashes_and_line_breaks_apart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("escapes.txt");
        let texts = [r"C:\new\table", "first\r\nsecond", r"ends with \", "literal \\n"];
        let mut conversation = Conversation::new("Assistant".to_owned());
        for text in texts {
            conversation.add(Role::User("User".to_owned()), text.to_owned());
        }

        conversation.export_to_file(&path).await.unwrap();
        let mut restored = Conversation::new("Assistant".to_owned());
        restored.import_from_file(&path).await.unwrap();

        let restored: Vec<_> = restored.history.iter().filter_map(Message::text).collect();
        assert_eq!(restored, texts);
    }

    #[test]
    fn malformed_transcript_is_rejected() {
        let err = parse_transcript("User(User): hi\nno separator here\n").unwrap_err();
        assert!(matches!(err, ConversationError::MalformedLine(2)));
    }

    #[test]
    fn tool_content_renders_readably() {
        let calls = Content::ToolCalls(vec![ToolInvocation {
            id: "call_1".to_owned(),
            name: "get_weather".to_owned(),
            arguments: serde_json::json!({"location": "Paris"}),
        }]);
        assert_eq!(
            calls.to_string(),
            r#"[tool calls: get_weather({"location":"Paris"})]"#
        );
    }

    #[test]
    fn thread_memory_isolates_threads() {
        let memory = ThreadMemory::new();
        memory.add("a", "Agent", Role::User("User".to_owned()), "hello");
        memory.add("a", "Agent", Role::Assistant("Agent".to_owned()), "hi");
        memory.add("b", "Agent", Role::User("User".to_owned()), "other");

        assert_eq!(memory.history("a").len(), 2);
        assert_eq!(memory.history("b").len(), 1);
        assert!(memory.history("missing").is_empty());

        memory.store("b", "Agent", Vec::new());
        assert!(memory.history("b").is_empty());
        assert!(memory.forget("a"));
        assert_eq!(memory.thread_count(), 1);
    }
}
