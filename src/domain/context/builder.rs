use crate::domain::item::ScoredResult;
use crate::domain::llm::{last_turns, ConversationTurn};

pub const DEFAULT_HISTORY_TURNS: usize = 6;

const ITEMS_HEADER: &str = "## Retrieved context";
const HISTORY_HEADER: &str = "## Conversation history";

/// Renders retrieved items and the conversation tail into one text block
///
/// Sections with nothing to show are left out, header included. Items keep
/// the order they are given in; history turns are verbatim, oldest first.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    history_turns: usize,
}

impl ContextBuilder {
    pub fn new(history_turns: usize) -> Self {
        Self { history_turns }
    }

    pub fn history_turns(&self) -> usize {
        self.history_turns
    }

    /// The history slice that `build` will include
    pub fn trim_history<'a>(&self, history: &'a [ConversationTurn]) -> &'a [ConversationTurn] {
        last_turns(history, self.history_turns)
    }

    pub fn build(&self, items: &[ScoredResult], history: &[ConversationTurn]) -> String {
        let mut sections = Vec::with_capacity(2);

        if !items.is_empty() {
            let mut section = String::from(ITEMS_HEADER);
            for (idx, result) in items.iter().enumerate() {
                section.push_str(&format!("\n\n[{}] {}", idx + 1, result.item.render()));
            }
            sections.push(section);
        }

        let turns = self.trim_history(history);
        if !turns.is_empty() {
            let mut section = String::from(HISTORY_HEADER);
            section.push('\n');
            for turn in turns {
                section.push_str(&format!("\n{}: {}", turn.role.as_str(), turn.content));
            }
            sections.push(section);
        }

        sections.join("\n\n")
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_TURNS)
    }
}
